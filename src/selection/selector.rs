//! Holdout-based model selection.

use crate::core::{ForecastResult, TimeSeries};
use crate::error::{AnalyticsError, CandidateFailure, Result};
use crate::models::{AnyModel, Forecaster, ModelConfigs, ModelKind};
use crate::utils::metrics::{evaluate_with_intervals, EvaluationMetrics};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info, warn};

/// Configuration for [`ModelSelector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Trailing share of the series held out for scoring.
    pub test_fraction: f64,
    /// Evaluate candidates on the rayon thread pool.
    pub parallel: bool,
    /// Configuration of each candidate model.
    pub models: ModelConfigs,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            parallel: true,
            models: ModelConfigs::default(),
        }
    }
}

impl SelectorConfig {
    pub fn with_test_fraction(mut self, test_fraction: f64) -> Self {
        self.test_fraction = test_fraction;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_models(mut self, models: ModelConfigs) -> Self {
        self.models = models;
        self
    }
}

/// Result of evaluating one candidate on the holdout.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateOutcome {
    Scored {
        kind: ModelKind,
        metrics: EvaluationMetrics,
    },
    Failed {
        kind: ModelKind,
        error: AnalyticsError,
    },
}

impl CandidateOutcome {
    pub fn kind(&self) -> ModelKind {
        match self {
            CandidateOutcome::Scored { kind, .. } | CandidateOutcome::Failed { kind, .. } => *kind,
        }
    }
}

/// One row of the model comparison table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateReport {
    pub model: ModelKind,
    /// 1 = best; absent for failed candidates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
    pub is_best: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<EvaluationMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Winning model, its forecast and the full comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionResult {
    pub selected: ModelKind,
    /// Forecast from the winner retrained on the full series, carrying its holdout metrics.
    pub forecast: ForecastResult,
    /// Ranked candidates first, then failures in candidate order.
    pub comparison: Vec<CandidateReport>,
}

/// Order scored candidates by RMSE, then MAPE; `sort_by` keeps candidate order on ties.
fn compare_scores(a: &EvaluationMetrics, b: &EvaluationMetrics) -> Ordering {
    a.rmse
        .total_cmp(&b.rmse)
        .then_with(|| a.mape.total_cmp(&b.mape))
}

/// Reduce candidate outcomes to a ranked comparison table.
///
/// Fails when no candidate was scored: with `InsufficientData` if every
/// candidate lacked data, otherwise with `NoViableModel`.
pub fn rank_candidates(outcomes: &[CandidateOutcome]) -> Result<Vec<CandidateReport>> {
    let mut scored: Vec<(ModelKind, &EvaluationMetrics)> = outcomes
        .iter()
        .filter_map(|o| match o {
            CandidateOutcome::Scored { kind, metrics } => Some((*kind, metrics)),
            CandidateOutcome::Failed { .. } => None,
        })
        .collect();

    if scored.is_empty() {
        return Err(no_candidate_error(outcomes));
    }
    scored.sort_by(|a, b| compare_scores(a.1, b.1));

    let mut reports: Vec<CandidateReport> = scored
        .iter()
        .enumerate()
        .map(|(i, (kind, metrics))| CandidateReport {
            model: *kind,
            rank: Some(i + 1),
            is_best: i == 0,
            metrics: Some((*metrics).clone()),
            failure: None,
        })
        .collect();

    reports.extend(outcomes.iter().filter_map(|o| match o {
        CandidateOutcome::Failed { kind, error } => Some(CandidateReport {
            model: *kind,
            rank: None,
            is_best: false,
            metrics: None,
            failure: Some(error.to_string()),
        }),
        CandidateOutcome::Scored { .. } => None,
    }));

    Ok(reports)
}

fn no_candidate_error(outcomes: &[CandidateOutcome]) -> AnalyticsError {
    let failures: Vec<CandidateFailure> = outcomes
        .iter()
        .filter_map(|o| match o {
            CandidateOutcome::Failed { kind, error } => {
                Some(CandidateFailure::new(kind.name(), error.to_string()))
            }
            CandidateOutcome::Scored { .. } => None,
        })
        .collect();

    let mut largest: Option<(usize, usize)> = None;
    for outcome in outcomes {
        match outcome {
            CandidateOutcome::Failed {
                error: AnalyticsError::InsufficientData { needed, got, .. },
                ..
            } => {
                if largest.map_or(true, |(n, _)| *needed > n) {
                    largest = Some((*needed, *got));
                }
            }
            _ => return AnalyticsError::NoViableModel { failures },
        }
    }

    match largest {
        Some((needed, got)) => {
            let reasons: Vec<String> = failures
                .iter()
                .map(|f| format!("{}: {}", f.model, f.reason))
                .collect();
            AnalyticsError::InsufficientData {
                context: format!("model selection ({})", reasons.join("; ")),
                needed,
                got,
            }
        }
        None => AnalyticsError::NoViableModel { failures },
    }
}

/// Fits every candidate on a chronological training split, scores it on the
/// holdout and retrains the winner on the full series.
#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    config: SelectorConfig,
}

impl ModelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SelectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Select the best of `candidates` (all models when `None`) and forecast `horizon` steps.
    ///
    /// # Arguments
    /// * `series` - Full history
    /// * `horizon` - Steps to forecast with the winner
    /// * `candidates` - Models to compare; duplicates are ignored
    pub fn select(
        &self,
        series: &TimeSeries,
        horizon: usize,
        candidates: Option<&[ModelKind]>,
    ) -> Result<SelectionResult> {
        if horizon == 0 {
            return Err(AnalyticsError::InvalidParameter(
                "horizon must be positive".to_string(),
            ));
        }
        let kinds = dedup_candidates(candidates.unwrap_or(&ModelKind::ALL[..]));
        if kinds.is_empty() {
            return Err(AnalyticsError::InvalidParameter(
                "at least one candidate model is required".to_string(),
            ));
        }

        let (train, test) = self.split(series)?;
        info!(
            candidates = kinds.len(),
            train = train.len(),
            test = test.len(),
            "evaluating candidate models"
        );

        let outcomes: Vec<CandidateOutcome> = if self.config.parallel {
            kinds
                .par_iter()
                .map(|&kind| self.evaluate_candidate(kind, &train, &test))
                .collect()
        } else {
            kinds
                .iter()
                .map(|&kind| self.evaluate_candidate(kind, &train, &test))
                .collect()
        };

        let comparison = rank_candidates(&outcomes)?;
        let best = &comparison[0];
        let selected = best.model;
        info!(model = %selected, rmse = best.metrics.as_ref().map(|m| m.rmse), "selected model");

        let forecast = self.retrain(selected, series, horizon)?;
        let forecast = match &best.metrics {
            Some(metrics) => forecast.with_metrics(metrics.clone()),
            None => forecast,
        };

        Ok(SelectionResult {
            selected,
            forecast,
            comparison,
        })
    }

    /// Fit a single model on the full series and forecast.
    ///
    /// When the training split still satisfies the model's minimum length the
    /// forecast carries holdout metrics. Numerical failures are reported as
    /// `NoViableModel`; data and parameter errors pass through.
    pub fn forecast_with(
        &self,
        kind: ModelKind,
        series: &TimeSeries,
        horizon: usize,
    ) -> Result<ForecastResult> {
        let mut model = AnyModel::new(kind, &self.config.models);
        let forecast = model
            .fit(series)
            .and_then(|_| model.forecast(horizon))
            .map_err(|e| lone_candidate_error(kind, e))?;

        let metrics = match self.split(series) {
            Ok((train, test)) if train.len() >= kind.min_observations() => {
                match self.evaluate_candidate(kind, &train, &test) {
                    CandidateOutcome::Scored { metrics, .. } => Some(metrics),
                    CandidateOutcome::Failed { .. } => None,
                }
            }
            _ => None,
        };

        Ok(match metrics {
            Some(metrics) => forecast.with_metrics(metrics),
            None => forecast,
        })
    }

    /// Refit the winner on the full series; any failure leaves no viable model.
    fn retrain(&self, kind: ModelKind, series: &TimeSeries, horizon: usize) -> Result<ForecastResult> {
        let mut model = AnyModel::new(kind, &self.config.models);
        model
            .fit(series)
            .and_then(|_| model.forecast(horizon))
            .map_err(|e| {
                warn!(model = %kind, error = %e, "retraining the selected model failed");
                AnalyticsError::NoViableModel {
                    failures: vec![CandidateFailure::new(kind.name(), e.to_string())],
                }
            })
    }

    /// Chronological split at `floor(n × (1 − test_fraction))`.
    fn split(&self, series: &TimeSeries) -> Result<(TimeSeries, TimeSeries)> {
        let fraction = self.config.test_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(AnalyticsError::InvalidParameter(format!(
                "test_fraction must be in (0, 1), got {}",
                fraction
            )));
        }
        let n = series.len();
        let split = (n as f64 * (1.0 - fraction)).floor() as usize;
        if split == 0 || split >= n {
            return Err(AnalyticsError::insufficient("train/test split", 2, n));
        }
        series.split_at(split)
    }

    fn evaluate_candidate(
        &self,
        kind: ModelKind,
        train: &TimeSeries,
        test: &TimeSeries,
    ) -> CandidateOutcome {
        let mut model = AnyModel::new(kind, &self.config.models);
        let scored = model.fit(train).and_then(|_| {
            let forecast = model.forecast(test.len())?;
            evaluate_with_intervals(
                test.values(),
                &forecast.points(),
                &forecast.lower(),
                &forecast.upper(),
            )
        });

        match scored {
            Ok(metrics) => {
                debug!(model = %kind, rmse = metrics.rmse, mape = metrics.mape, "candidate scored");
                CandidateOutcome::Scored { kind, metrics }
            }
            Err(error) => {
                warn!(model = %kind, error = %error, "candidate excluded");
                CandidateOutcome::Failed { kind, error }
            }
        }
    }
}

fn dedup_candidates(candidates: &[ModelKind]) -> Vec<ModelKind> {
    let mut kinds = Vec::with_capacity(candidates.len());
    for kind in candidates {
        if !kinds.contains(kind) {
            kinds.push(*kind);
        }
    }
    kinds
}

fn lone_candidate_error(kind: ModelKind, error: AnalyticsError) -> AnalyticsError {
    match error {
        AnalyticsError::ComputationError(_) => AnalyticsError::NoViableModel {
            failures: vec![CandidateFailure::new(kind.name(), error.to_string())],
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn make_timestamps(n: usize) -> Vec<DateTime<Utc>> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| base + Duration::days(i as i64)).collect()
    }

    fn metrics(rmse: f64, mape: f64) -> EvaluationMetrics {
        EvaluationMetrics {
            rmse,
            mse: rmse * rmse,
            mae: rmse,
            mape,
            smape: mape,
            r_squared: 0.5,
            coverage: None,
            avg_interval_width: None,
        }
    }

    #[test]
    fn lowest_rmse_wins() {
        let outcomes = vec![
            CandidateOutcome::Scored {
                kind: ModelKind::Arima,
                metrics: metrics(8.0, 3.0),
            },
            CandidateOutcome::Scored {
                kind: ModelKind::Seasonal,
                metrics: metrics(5.0, 9.0),
            },
        ];
        let table = rank_candidates(&outcomes).unwrap();
        assert_eq!(table[0].model, ModelKind::Seasonal);
        assert!(table[0].is_best);
        assert_eq!(table[1].rank, Some(2));
        assert!(!table[1].is_best);
    }

    #[test]
    fn rmse_ties_break_on_mape_then_order() {
        let outcomes = vec![
            CandidateOutcome::Scored {
                kind: ModelKind::Arima,
                metrics: metrics(5.0, 4.0),
            },
            CandidateOutcome::Scored {
                kind: ModelKind::Seasonal,
                metrics: metrics(5.0, 2.0),
            },
            CandidateOutcome::Scored {
                kind: ModelKind::Sequence,
                metrics: metrics(5.0, 2.0),
            },
        ];
        let table = rank_candidates(&outcomes).unwrap();
        let order: Vec<ModelKind> = table.iter().map(|r| r.model).collect();
        assert_eq!(
            order,
            vec![ModelKind::Seasonal, ModelKind::Sequence, ModelKind::Arima]
        );
    }

    #[test]
    fn failed_candidates_are_listed_after_ranked_ones() {
        let outcomes = vec![
            CandidateOutcome::Failed {
                kind: ModelKind::Sequence,
                error: AnalyticsError::insufficient("sequence", 200, 80),
            },
            CandidateOutcome::Scored {
                kind: ModelKind::Arima,
                metrics: metrics(2.0, 1.0),
            },
        ];
        let table = rank_candidates(&outcomes).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].model, ModelKind::Arima);
        assert_eq!(table[1].rank, None);
        assert!(table[1].failure.as_ref().unwrap().contains("need at least 200"));
    }

    #[test]
    fn all_insufficient_reports_largest_requirement() {
        let outcomes = vec![
            CandidateOutcome::Failed {
                kind: ModelKind::Arima,
                error: AnalyticsError::insufficient("ARIMA", 50, 32),
            },
            CandidateOutcome::Failed {
                kind: ModelKind::Sequence,
                error: AnalyticsError::insufficient("sequence", 200, 32),
            },
        ];
        match rank_candidates(&outcomes).unwrap_err() {
            AnalyticsError::InsufficientData {
                context,
                needed,
                got,
            } => {
                assert_eq!(needed, 200);
                assert_eq!(got, 32);
                assert!(context.contains("ARIMA"));
                assert!(context.contains("Sequence"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn mixed_failures_are_no_viable_model() {
        let outcomes = vec![
            CandidateOutcome::Failed {
                kind: ModelKind::Arima,
                error: AnalyticsError::ComputationError("diverged".to_string()),
            },
            CandidateOutcome::Failed {
                kind: ModelKind::Sequence,
                error: AnalyticsError::insufficient("sequence", 200, 150),
            },
        ];
        match rank_candidates(&outcomes).unwrap_err() {
            AnalyticsError::NoViableModel { failures } => {
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].model, "ARIMA");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn short_series_fails_with_insufficient_data() {
        let ts = TimeSeries::new(make_timestamps(40), (0..40).map(|i| i as f64).collect()).unwrap();
        let err = ModelSelector::new().select(&ts, 5, None).unwrap_err();
        assert_eq!(err.kind(), "insufficient_data");
    }

    #[test]
    fn selects_and_retrains_on_full_series() {
        let values: Vec<f64> = (0..150)
            .map(|i| 100.0 + 0.5 * i as f64 + 6.0 * (2.0 * std::f64::consts::PI * i as f64 / 7.0).sin())
            .collect();
        let ts = TimeSeries::new(make_timestamps(150), values).unwrap();
        let mut models = ModelConfigs::default();
        models.arima = models.arima.with_max_orders(1, 1, 1);
        let selector = ModelSelector::with_config(SelectorConfig::default().with_models(models));

        let result = selector
            .select(&ts, 14, Some(&[ModelKind::Arima, ModelKind::Seasonal, ModelKind::Arima][..]))
            .unwrap();
        assert_eq!(result.comparison.len(), 2);
        assert_eq!(result.forecast.horizon(), 14);
        assert_eq!(result.forecast.model(), result.selected.name());
        let best = &result.comparison[0];
        assert!(best.is_best);
        assert_relative_eq!(
            result.forecast.metrics().unwrap().rmse,
            best.metrics.as_ref().unwrap().rmse
        );
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let values: Vec<f64> = (0..120).map(|i| 50.0 + (i as f64 * 0.4).sin() * 5.0 + 0.1 * i as f64).collect();
        let ts = TimeSeries::new(make_timestamps(120), values).unwrap();
        let mut models = ModelConfigs::default();
        models.arima = models.arima.with_max_orders(1, 1, 1);
        let base = SelectorConfig::default().with_models(models);

        let parallel = ModelSelector::with_config(base.clone().with_parallel(true))
            .select(&ts, 7, None)
            .unwrap();
        let sequential = ModelSelector::with_config(base.with_parallel(false))
            .select(&ts, 7, None)
            .unwrap();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn forecast_with_propagates_data_errors() {
        let ts = TimeSeries::new(make_timestamps(60), vec![1.0; 60]).unwrap();
        let err = ModelSelector::new()
            .forecast_with(ModelKind::Seasonal, &ts, 5)
            .unwrap_err();
        assert_eq!(err.kind(), "insufficient_data");
    }

    fn weekly_series(n: usize) -> TimeSeries {
        let values: Vec<f64> = (0..n)
            .map(|i| 80.0 + 0.3 * i as f64 + 9.0 * (2.0 * std::f64::consts::PI * i as f64 / 7.0).sin() + ((i * 7) % 5) as f64)
            .collect();
        TimeSeries::new(make_timestamps(n), values).unwrap()
    }

    /// Seasonal model whose interval multiplier is infinite, so every forecast is non-finite.
    fn broken_seasonal() -> ModelConfigs {
        let mut models = ModelConfigs::default();
        models.arima = models.arima.with_max_orders(1, 1, 1);
        models.seasonal = models.seasonal.with_confidence_level(1.5);
        models
    }

    #[test]
    fn lone_numerical_failure_is_no_viable_model() {
        let ts = weekly_series(150);
        let selector = ModelSelector::with_config(SelectorConfig::default().with_models(broken_seasonal()));
        match selector.forecast_with(ModelKind::Seasonal, &ts, 7).unwrap_err() {
            AnalyticsError::NoViableModel { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].model, "Seasonal");
                assert!(failures[0].reason.contains("non-finite"));
            }
            other => panic!("expected no viable model, got {other:?}"),
        }
    }

    #[test]
    fn numerically_failing_candidate_is_excluded() {
        let ts = weekly_series(150);
        let selector = ModelSelector::with_config(
            SelectorConfig::default().with_models(broken_seasonal()).with_parallel(false),
        );
        let result = selector
            .select(&ts, 7, Some(&[ModelKind::Seasonal, ModelKind::Arima][..]))
            .unwrap();
        assert_eq!(result.selected, ModelKind::Arima);
        assert_eq!(result.comparison.len(), 2);
        let failed = &result.comparison[1];
        assert_eq!(failed.model, ModelKind::Seasonal);
        assert_eq!(failed.rank, None);
        assert!(failed.failure.as_deref().unwrap().contains("non-finite"));
    }

    #[test]
    fn failed_retrain_is_no_viable_model() {
        let ts = weekly_series(150);
        let selector = ModelSelector::with_config(SelectorConfig::default().with_models(broken_seasonal()));
        let err = selector.retrain(ModelKind::Seasonal, &ts, 7).unwrap_err();
        assert_eq!(err.kind(), "no_viable_model");

        // data errors are folded too: the winner already passed on the training split
        let short = weekly_series(60);
        let err = selector.retrain(ModelKind::Seasonal, &short, 7).unwrap_err();
        assert_eq!(err.kind(), "no_viable_model");
    }

    #[test]
    fn zero_horizon_rejected() {
        let ts = TimeSeries::new(make_timestamps(60), vec![1.0; 60]).unwrap();
        let err = ModelSelector::new().select(&ts, 0, None).unwrap_err();
        assert_eq!(err.kind(), "invalid_parameter");
    }
}
