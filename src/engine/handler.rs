use super::config::EngineConfig;
use super::request::{
    AnalyticsRequest, AnalyticsResponse, CompetitorAnalysisType, CompetitorPricingReport,
    CompetitorRequest, ForecastReport, ForecastRequest, OpportunityReport, OpportunityRequest,
    PriceComparisonRequest, PriceReport, TrendRequest,
};
use crate::data::{fetch_with_timeout, DataQuery, DataSource, DataTable, EntityKind, QueryFilters};
use crate::error::{AnalyticsError, Result};
use crate::market::{
    CompetitorAnalyzer, OpportunityCriteria, OpportunityScorer, RegionalComparator, TrendAnalyzer,
};
use crate::selection::ModelSelector;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stateless request dispatcher.
///
/// Each call to [`handle`](Self::handle) validates the request, issues exactly
/// one data query and runs exactly one analytics component.
pub struct AnalyticsEngine {
    source: Arc<dyn DataSource>,
    config: EngineConfig,
}

impl std::fmt::Debug for AnalyticsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AnalyticsEngine {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self::with_config(source, EngineConfig::default())
    }

    pub fn with_config(source: Arc<dyn DataSource>, config: EngineConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Serve one request.
    pub fn handle(&self, request: &AnalyticsRequest) -> Result<AnalyticsResponse> {
        info!(operation = request.operation(), "handling analytics request");
        match request {
            AnalyticsRequest::Forecast(r) => self.forecast(r),
            AnalyticsRequest::Trend(r) => self.trend(r),
            AnalyticsRequest::PriceComparison(r) => self.price_comparison(r),
            AnalyticsRequest::Opportunity(r) => self.opportunity(r),
            AnalyticsRequest::CompetitorAnalysis(r) => self.competitor(r),
        }
    }

    /// Parse a JSON request, serve it and serialize the response.
    pub fn handle_json(&self, json: &str) -> Result<String> {
        let request = AnalyticsRequest::from_json(json)?;
        self.handle(&request)?.to_json()
    }

    fn fetch(&self, entity: EntityKind, filters: QueryFilters) -> Result<DataTable> {
        let query = DataQuery::new(entity)
            .with_filters(filters)
            .with_limit(self.config.query_limit);
        debug!(entity = %entity, limit = query.limit, "issuing data query");
        fetch_with_timeout(Arc::clone(&self.source), &query, self.config.query_timeout())
    }

    fn forecast(&self, request: &ForecastRequest) -> Result<AnalyticsResponse> {
        if request.horizon == 0 {
            return Err(AnalyticsError::InvalidParameter(
                "horizon must be positive".to_string(),
            ));
        }
        let mut filters = QueryFilters::default()
            .with_date_range(request.start, request.end)
            .with_product_ids(request.product_id.iter().cloned().collect());
        if let Some(category) = &request.category {
            filters = filters.with_category(category.clone());
        }

        let table = self.fetch(EntityKind::Sales, filters)?;
        let series = table.to_time_series("date", &request.metric)?;
        let selector = ModelSelector::with_config(self.config.selector.clone());

        let (model, forecast, comparison) = match request.model.kind() {
            Some(kind) => (kind, selector.forecast_with(kind, &series, request.horizon)?, Vec::new()),
            None => {
                let selection = selector.select(&series, request.horizon, None)?;
                (selection.selected, selection.forecast, selection.comparison)
            }
        };

        Ok(AnalyticsResponse::Forecast(ForecastReport {
            metric: request.metric.clone(),
            model,
            data_points: series.len(),
            forecast,
            comparison,
        }))
    }

    fn trend(&self, request: &TrendRequest) -> Result<AnalyticsResponse> {
        let mut filters = QueryFilters::default()
            .with_date_range(request.start, request.end)
            .with_product_ids(request.product_id.iter().cloned().collect());
        if let Some(region) = &request.region {
            filters = filters.with_region(region.clone());
        }

        let table = self.fetch(EntityKind::Sales, filters)?;
        let analyzer = TrendAnalyzer::with_config(self.config.trend.clone());

        if request.region.is_none() && table.has_column("region") {
            let mut regions = BTreeMap::new();
            let mut unusable = BTreeMap::new();
            for (region, part) in table.partition_by("region")? {
                match part.to_time_series("date", &request.metric) {
                    Ok(series) => {
                        regions.insert(region, series);
                    }
                    Err(e) => {
                        warn!(region = %region, error = %e, "no usable series for region");
                        unusable.insert(region, e.to_string());
                    }
                }
            }
            let mut trends = analyzer.analyze_regions(&regions);
            trends.skipped.extend(unusable);
            return Ok(AnalyticsResponse::RegionalTrends(trends));
        }

        let series = table.to_time_series("date", &request.metric)?;
        Ok(AnalyticsResponse::Trend(analyzer.analyze(&series)?))
    }

    fn price_comparison(&self, request: &PriceComparisonRequest) -> Result<AnalyticsResponse> {
        let mut filters = QueryFilters::default().with_product_ids(request.product_ids.clone());
        if let Some(region) = &request.region {
            filters = filters.with_region(region.clone());
        }

        let records = self.fetch(EntityKind::RegionalPrices, filters)?.to_price_records()?;
        let comparator = RegionalComparator::new(self.config.exchange_rates.clone());
        Ok(AnalyticsResponse::PriceComparison(PriceReport {
            comparison: comparator.compare(&records)?,
            currency_impact: comparator.currency_impact(&records)?,
        }))
    }

    fn opportunity(&self, request: &OpportunityRequest) -> Result<AnalyticsResponse> {
        let criteria = match &request.weights {
            Some(weights) => OpportunityCriteria::new(weights.clone())?,
            None => self.config.opportunity.clone(),
        };
        if request.top_n == Some(0) {
            return Err(AnalyticsError::InvalidParameter(
                "top_n must be positive".to_string(),
            ));
        }

        let regions = self
            .fetch(EntityKind::MarketIndicators, QueryFilters::default())?
            .to_region_indicators()?;
        let scorer = OpportunityScorer::new(criteria);
        let scenarios = scorer.compare_scenarios(&regions, &request.scenarios)?;

        Ok(AnalyticsResponse::Opportunity(OpportunityReport {
            opportunities: scorer.top(&regions, request.top_n)?,
            total_regions: regions.len(),
            weights_used: scorer.criteria().weights().clone(),
            scenarios,
        }))
    }

    fn competitor(&self, request: &CompetitorRequest) -> Result<AnalyticsResponse> {
        let mut filters = QueryFilters::default();
        if let Some(region) = &request.region {
            filters = filters.with_region(region.clone());
        }

        let records = self
            .fetch(EntityKind::Competitors, filters)?
            .to_competitor_records()?;
        let analyzer = CompetitorAnalyzer::with_config(self.config.competitor.clone());

        match request.analysis_type {
            CompetitorAnalysisType::Pricing => Ok(AnalyticsResponse::CompetitorPricing(CompetitorPricingReport {
                pricing: analyzer.analyze_pricing(&records)?,
                profiles: analyzer.profiles(&records)?,
                advantages: analyzer.competitive_advantages(&records)?,
            })),
            CompetitorAnalysisType::MarketShare => Ok(AnalyticsResponse::MarketShare(
                analyzer.analyze_market_share(&records)?,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CellValue, StaticSource};
    use chrono::{Duration, NaiveDate};

    fn sales_table(days: usize) -> DataTable {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rows = (0..days)
            .map(|i| {
                let date = start + Duration::days(i as i64);
                vec![
                    CellValue::Text(date.format("%Y-%m-%d").to_string()),
                    CellValue::Number(100.0 + 2.0 * i as f64 + ((i * 7) % 5) as f64),
                ]
            })
            .collect();
        DataTable::new(vec!["date".into(), "total_sales".into()], rows).unwrap()
    }

    fn engine(source: StaticSource) -> (Arc<StaticSource>, AnalyticsEngine) {
        let source = Arc::new(source);
        let engine = AnalyticsEngine::new(source.clone());
        (source, engine)
    }

    #[test]
    fn zero_horizon_is_rejected_before_querying() {
        let (source, engine) = engine(StaticSource::new());
        let request = AnalyticsRequest::from_json(r#"{"operation": "forecast", "horizon": 0}"#).unwrap();
        assert_eq!(engine.handle(&request).unwrap_err().kind(), "invalid_parameter");
        assert!(source.queries().is_empty());
    }

    #[test]
    fn trend_request_issues_one_query() {
        let (source, engine) = engine(StaticSource::new().with_table(EntityKind::Sales, sales_table(60)));
        let request = AnalyticsRequest::from_json(r#"{"operation": "trend"}"#).unwrap();
        let response = engine.handle(&request).unwrap();
        match response {
            AnalyticsResponse::Trend(analysis) => assert_eq!(analysis.data_points, 60),
            other => panic!("unexpected response {other:?}"),
        }
        assert_eq!(source.queries().len(), 1);
        assert_eq!(source.queries()[0].entity, EntityKind::Sales);
    }

    #[test]
    fn unusable_region_is_skipped_not_fatal() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut rows = Vec::new();
        for i in 0..30 {
            let date = CellValue::Text((start + Duration::days(i)).format("%Y-%m-%d").to_string());
            rows.push(vec![date.clone(), "NA".into(), CellValue::Number(50.0 + i as f64)]);
            rows.push(vec![date, "EU".into(), CellValue::Null]);
        }
        let table = DataTable::new(vec!["date".into(), "region".into(), "total_sales".into()], rows).unwrap();
        let (_, engine) = engine(StaticSource::new().with_table(EntityKind::Sales, table));

        let request = AnalyticsRequest::from_json(r#"{"operation": "trend"}"#).unwrap();
        match engine.handle(&request).unwrap() {
            AnalyticsResponse::RegionalTrends(trends) => {
                assert_eq!(trends.regions.len(), 1);
                assert_eq!(trends.regions["NA"].data_points, 30);
                assert_eq!(trends.skipped.len(), 1);
                assert!(trends.skipped["EU"].contains("empty"));
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn missing_table_is_data_unavailable() {
        let (_, engine) = engine(StaticSource::new());
        let request = AnalyticsRequest::from_json(r#"{"operation": "competitor_analysis"}"#).unwrap();
        assert_eq!(engine.handle(&request).unwrap_err().kind(), "data_unavailable");
    }

    #[test]
    fn invalid_weights_surface() {
        let (source, engine) = engine(StaticSource::new());
        let request = AnalyticsRequest::from_json(
            r#"{"operation": "opportunity", "weights": {"market_size": 0.5, "growth_rate": 0.4}}"#,
        )
        .unwrap();
        assert_eq!(engine.handle(&request).unwrap_err().kind(), "invalid_weights");
        assert!(source.queries().is_empty());
    }

    #[test]
    fn fixed_model_forecast_skips_comparison() {
        let (_, engine) = engine(StaticSource::new().with_table(EntityKind::Sales, sales_table(120)));
        let json = engine
            .handle_json(r#"{"operation": "forecast", "horizon": 7, "model": "arima"}"#)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["operation"], "forecast");
        assert_eq!(value["result"]["model"], "arima");
        assert_eq!(value["result"]["comparison"].as_array().map(Vec::len), Some(0));
    }
}
