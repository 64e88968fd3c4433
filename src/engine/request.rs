//! Inbound requests and outbound responses.

use crate::core::ForecastResult;
use crate::error::{AnalyticsError, Result};
use crate::market::competitor::CompetitiveAdvantages;
use crate::market::opportunity::ScenarioResult;
use crate::market::pricing::CurrencyImpact;
use crate::market::{
    CompetitorProfile, MarketShareAnalysis, OpportunityScore, PriceComparison, PricingAnalysis,
    RegionalTrends, TrendAnalysis,
};
use crate::models::ModelKind;
use crate::selection::CandidateReport;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_metric() -> String {
    "total_sales".to_string()
}

/// Which model a forecast request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelChoice {
    /// Compare every model and keep the best.
    #[default]
    Auto,
    Arima,
    Seasonal,
    #[serde(alias = "lstm")]
    Sequence,
}

impl ModelChoice {
    /// The fixed model, or `None` for automatic selection.
    pub fn kind(&self) -> Option<ModelKind> {
        match self {
            ModelChoice::Auto => None,
            ModelChoice::Arima => Some(ModelKind::Arima),
            ModelChoice::Seasonal => Some(ModelKind::Seasonal),
            ModelChoice::Sequence => Some(ModelKind::Sequence),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    /// Numeric column of the sales table to forecast.
    #[serde(default = "default_metric")]
    pub metric: String,
    pub horizon: usize,
    #[serde(default)]
    pub model: ModelChoice,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRequest {
    /// Without a region, every region in the data is analyzed separately.
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceComparisonRequest {
    pub product_ids: Vec<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpportunityRequest {
    /// Criteria weights; the configured baseline when absent.
    pub weights: Option<BTreeMap<String, f64>>,
    pub top_n: Option<usize>,
    /// Named alternative weightings for sensitivity analysis.
    pub scenarios: BTreeMap<String, BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompetitorAnalysisType {
    #[default]
    Pricing,
    #[serde(alias = "market_share")]
    MarketShare,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitorRequest {
    pub region: Option<String>,
    pub analysis_type: CompetitorAnalysisType,
}

/// One analytics operation, tagged by `operation` in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum AnalyticsRequest {
    Forecast(ForecastRequest),
    Trend(TrendRequest),
    PriceComparison(PriceComparisonRequest),
    Opportunity(OpportunityRequest),
    CompetitorAnalysis(CompetitorRequest),
}

impl AnalyticsRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| AnalyticsError::InvalidParameter(format!("invalid request: {}", e)))
    }

    /// Operation name as it appears in the `operation` tag.
    pub fn operation(&self) -> &'static str {
        match self {
            AnalyticsRequest::Forecast(_) => "forecast",
            AnalyticsRequest::Trend(_) => "trend",
            AnalyticsRequest::PriceComparison(_) => "price_comparison",
            AnalyticsRequest::Opportunity(_) => "opportunity",
            AnalyticsRequest::CompetitorAnalysis(_) => "competitor_analysis",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastReport {
    pub metric: String,
    pub model: ModelKind,
    pub data_points: usize,
    pub forecast: ForecastResult,
    /// Candidate comparison; empty when a fixed model was requested.
    pub comparison: Vec<CandidateReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceReport {
    pub comparison: PriceComparison,
    pub currency_impact: Vec<CurrencyImpact>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunityReport {
    pub opportunities: Vec<OpportunityScore>,
    pub total_regions: usize,
    pub weights_used: BTreeMap<String, f64>,
    pub scenarios: Vec<ScenarioResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitorPricingReport {
    pub pricing: PricingAnalysis,
    pub profiles: Vec<CompetitorProfile>,
    pub advantages: Vec<CompetitiveAdvantages>,
}

/// Result of one request, tagged by `operation` with the payload under `result`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operation", content = "result", rename_all = "snake_case")]
pub enum AnalyticsResponse {
    Forecast(ForecastReport),
    Trend(TrendAnalysis),
    RegionalTrends(RegionalTrends),
    PriceComparison(PriceReport),
    Opportunity(OpportunityReport),
    CompetitorPricing(CompetitorPricingReport),
    MarketShare(MarketShareAnalysis),
}

impl AnalyticsResponse {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| AnalyticsError::ComputationError(format!("failed to serialize response: {}", e)))
    }
}
