//! Request dispatch over the data source and the analytics components.

mod config;
mod handler;
mod request;

pub use config::EngineConfig;
pub use handler::AnalyticsEngine;
pub use request::{
    AnalyticsRequest, AnalyticsResponse, CompetitorAnalysisType, CompetitorPricingReport,
    CompetitorRequest, ForecastReport, ForecastRequest, ModelChoice, OpportunityReport,
    OpportunityRequest, PriceComparisonRequest, PriceReport, TrendRequest,
};
