//! Engine-wide configuration.

use crate::data::DEFAULT_ROW_LIMIT;
use crate::error::{AnalyticsError, Result};
use crate::market::{CompetitorConfig, ExchangeRates, OpportunityCriteria, TrendConfig};
use crate::selection::SelectorConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration passed to [`AnalyticsEngine`](super::AnalyticsEngine).
///
/// Every field has a default, so a partial JSON document is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub exchange_rates: ExchangeRates,
    pub selector: SelectorConfig,
    pub trend: TrendConfig,
    pub competitor: CompetitorConfig,
    /// Baseline criteria weights when a request carries none.
    pub opportunity: OpportunityCriteria,
    /// Row cap applied to every data query.
    pub query_limit: usize,
    /// Upper bound on a single data fetch, in milliseconds.
    pub query_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            exchange_rates: ExchangeRates::default(),
            selector: SelectorConfig::default(),
            trend: TrendConfig::default(),
            competitor: CompetitorConfig::default(),
            opportunity: OpportunityCriteria::default(),
            query_limit: DEFAULT_ROW_LIMIT,
            query_timeout_ms: 30_000,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| AnalyticsError::InvalidParameter(format!("invalid engine config: {}", e)))
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn with_exchange_rates(mut self, rates: ExchangeRates) -> Self {
        self.exchange_rates = rates;
        self
    }

    pub fn with_selector(mut self, selector: SelectorConfig) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_trend(mut self, trend: TrendConfig) -> Self {
        self.trend = trend;
        self
    }

    pub fn with_competitor(mut self, competitor: CompetitorConfig) -> Self {
        self.competitor = competitor;
        self
    }

    pub fn with_opportunity(mut self, criteria: OpportunityCriteria) -> Self {
        self.opportunity = criteria;
        self
    }

    pub fn with_query_limit(mut self, limit: usize) -> Self {
        self.query_limit = limit;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout_ms = timeout.as_millis() as u64;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(
            r#"{"query_timeout_ms": 500, "exchange_rates": {"SEK": 0.095}, "competitor": {"uniform_pricing_cv": 0.2}}"#,
        )
        .unwrap();
        assert_eq!(config.query_timeout(), Duration::from_millis(500));
        assert_eq!(config.exchange_rates.rate("SEK").unwrap(), 0.095);
        assert_eq!(config.competitor.uniform_pricing_cv, 0.2);
        assert_eq!(config.query_limit, DEFAULT_ROW_LIMIT);
        assert_eq!(config.opportunity, OpportunityCriteria::default());
    }

    #[test]
    fn invalid_weights_are_rejected_at_load() {
        let err = EngineConfig::from_json(r#"{"opportunity": {"market_size": 0.5}}"#).unwrap_err();
        assert_eq!(err.kind(), "invalid_parameter");
    }
}
