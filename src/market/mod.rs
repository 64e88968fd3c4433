//! Market intelligence over regional sales, price and competitor data.
//!
//! - [`TrendAnalyzer`]: trend line, seasonality, growth and breakpoints
//! - [`RegionalComparator`]: USD-normalized cross-region price statistics
//! - [`OpportunityScorer`]: MCDA market-entry scoring
//! - [`CompetitorAnalyzer`]: pricing strategy and market concentration

pub mod competitor;
pub mod opportunity;
pub mod pricing;
pub mod trend;

pub use competitor::{
    herfindahl_index, CompetitorAnalyzer, CompetitorConfig, CompetitorProfile, CompetitorRecord,
    Concentration, MarketShareAnalysis, Positioning, PricingAnalysis, PricingStrategy,
};
pub use opportunity::{
    OpportunityCategory, OpportunityCriteria, OpportunityScore, OpportunityScorer,
    RegionIndicators, SensitivityReport,
};
pub use pricing::{
    gini, welch_t_test, EffectSize, ExchangeRates, PriceComparison, PriceRecord,
    RegionalComparator, RegionalObservation,
};
pub use trend::{
    growth_metrics, TrendAnalysis, TrendAnalyzer, TrendConfig, TrendDirection, RegionalTrends,
};
