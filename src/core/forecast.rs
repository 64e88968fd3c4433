//! Forecast result structure for holding predictions.

use crate::error::{AnalyticsError, Result};
use crate::utils::metrics::EvaluationMetrics;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One forecast step with its prediction interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastStep {
    pub timestamp: DateTime<Utc>,
    pub point: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Horizon-length forecast produced by a single model.
///
/// Every step satisfies `lower <= point <= upper`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    model: String,
    confidence_level: f64,
    steps: Vec<ForecastStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<EvaluationMetrics>,
}

impl ForecastResult {
    /// Assemble a forecast from parallel arrays.
    ///
    /// # Arguments
    /// * `model` - Name of the producing model
    /// * `timestamps` - Future timestamps, one per step
    /// * `point` - Point predictions
    /// * `lower` / `upper` - Interval bounds; widened to contain the point if needed
    /// * `confidence_level` - Nominal interval coverage, e.g. 0.95
    pub fn new(
        model: impl Into<String>,
        timestamps: Vec<DateTime<Utc>>,
        point: Vec<f64>,
        lower: Vec<f64>,
        upper: Vec<f64>,
        confidence_level: f64,
    ) -> Result<Self> {
        let horizon = point.len();
        for len in [timestamps.len(), lower.len(), upper.len()] {
            if len != horizon {
                return Err(AnalyticsError::DimensionMismatch {
                    expected: horizon,
                    got: len,
                });
            }
        }

        let mut steps = Vec::with_capacity(horizon);
        for i in 0..horizon {
            let (p, lo, hi) = (point[i], lower[i], upper[i]);
            if !p.is_finite() || !lo.is_finite() || !hi.is_finite() {
                return Err(AnalyticsError::ComputationError(format!(
                    "non-finite forecast at step {}",
                    i + 1
                )));
            }
            steps.push(ForecastStep {
                timestamp: timestamps[i],
                point: p,
                lower: lo.min(p),
                upper: hi.max(p),
            });
        }

        Ok(Self {
            model: model.into(),
            confidence_level,
            steps,
            metrics: None,
        })
    }

    /// Attach evaluation metrics.
    pub fn with_metrics(mut self, metrics: EvaluationMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Name of the producing model.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    /// Number of steps.
    pub fn horizon(&self) -> usize {
        self.steps.len()
    }

    pub fn steps(&self) -> &[ForecastStep] {
        &self.steps
    }

    pub fn metrics(&self) -> Option<&EvaluationMetrics> {
        self.metrics.as_ref()
    }

    /// Point predictions.
    pub fn points(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.point).collect()
    }

    /// Lower interval bounds.
    pub fn lower(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.lower).collect()
    }

    /// Upper interval bounds.
    pub fn upper(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.upper).collect()
    }
}
