//! # market-analytics
//!
//! Market analytics and demand forecasting for e-commerce data.
//!
//! Forecasting covers ARIMA with automatic order search, seasonal
//! decomposition and a small recurrent network, with holdout-based model
//! selection. Market intelligence covers trend analysis, USD-normalized
//! regional price comparison, MCDA opportunity scoring and competitor
//! analysis. [`engine::AnalyticsEngine`] ties these to a pluggable
//! [`data::DataSource`].

// Allow some clippy warnings for cleaner code in specific cases
#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::needless_range_loop)]

pub mod core;
pub mod data;
pub mod detection;
pub mod engine;
pub mod error;
pub mod market;
pub mod models;
pub mod seasonality;
pub mod selection;
pub mod utils;
pub mod validation;

pub use error::{AnalyticsError, Result};

pub mod prelude {
    pub use crate::core::{ForecastResult, TimeSeries};
    pub use crate::engine::{AnalyticsEngine, AnalyticsRequest, AnalyticsResponse, EngineConfig};
    pub use crate::error::{AnalyticsError, Result};
    pub use crate::market::{
        CompetitorAnalyzer, OpportunityScorer, RegionalComparator, TrendAnalyzer,
    };
    pub use crate::models::{Forecaster, ModelKind};
    pub use crate::selection::ModelSelector;
    pub use crate::utils::{evaluate, EvaluationMetrics};
}
