//! Seasonal decomposition forecaster: linear trend combined with per-phase offsets.

use crate::core::{ForecastResult, TimeSeries};
use crate::detection::detect_period;
use crate::error::{AnalyticsError, Result};
use crate::models::traits::{require_horizon, require_length};
use crate::models::Forecaster;
use crate::seasonality::DecompositionMode;
use crate::utils::ols::{linear_regression, LinearFit};
use crate::utils::stats::{std_dev, z_for_level};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Period used when the spectrum shows no clear peak.
pub const FALLBACK_PERIOD: usize = 7;

/// Configuration for [`SeasonalModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalConfig {
    /// Seasonal period; detected from the periodogram when `None`.
    pub period: Option<usize>,
    /// Preferred mode. Multiplicative falls back to additive for non-positive data.
    pub mode: DecompositionMode,
    /// Prediction interval level.
    pub confidence_level: f64,
}

impl Default for SeasonalConfig {
    fn default() -> Self {
        Self {
            period: None,
            mode: DecompositionMode::Multiplicative,
            confidence_level: 0.95,
        }
    }
}

impl SeasonalConfig {
    pub fn with_period(mut self, period: usize) -> Self {
        self.period = Some(period);
        self
    }

    pub fn with_mode(mut self, mode: DecompositionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }
}

#[derive(Debug, Clone)]
struct SeasonalFit {
    period: usize,
    mode: DecompositionMode,
    trend: LinearFit,
    offsets: Vec<f64>,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
    sigma: f64,
}

/// Trend line plus seasonal offsets, extrapolated together.
#[derive(Debug, Clone)]
pub struct SeasonalModel {
    config: SeasonalConfig,
    series: Option<TimeSeries>,
    fit: Option<SeasonalFit>,
}

impl SeasonalModel {
    /// Minimum series length accepted by `fit`.
    pub const MIN_OBSERVATIONS: usize = 100;

    pub fn new() -> Self {
        Self::with_config(SeasonalConfig::default())
    }

    pub fn with_config(config: SeasonalConfig) -> Self {
        Self {
            config,
            series: None,
            fit: None,
        }
    }

    /// Period used by the last fit.
    pub fn period(&self) -> Option<usize> {
        self.fit.as_ref().map(|f| f.period)
    }

    /// Mode actually used by the last fit.
    pub fn mode(&self) -> Option<DecompositionMode> {
        self.fit.as_ref().map(|f| f.mode)
    }

    /// Seasonal offsets (differences or ratios) indexed by phase.
    pub fn seasonal_pattern(&self) -> Option<&[f64]> {
        self.fit.as_ref().map(|f| f.offsets.as_slice())
    }

    fn resolve_period(&self, values: &[f64]) -> usize {
        if let Some(period) = self.config.period {
            return period;
        }
        match detect_period(values, 2, values.len() / 2, 4.0) {
            Some(period) => {
                debug!(period, "detected seasonal period");
                period
            }
            None => {
                debug!(period = FALLBACK_PERIOD, "no dominant period, using fallback");
                FALLBACK_PERIOD
            }
        }
    }
}

impl Default for SeasonalModel {
    fn default() -> Self {
        Self::new()
    }
}

fn combine(mode: DecompositionMode, trend: f64, seasonal: f64) -> f64 {
    match mode {
        DecompositionMode::Additive => trend + seasonal,
        DecompositionMode::Multiplicative => trend * seasonal,
    }
}

impl Forecaster for SeasonalModel {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        require_length("seasonal", series, Self::MIN_OBSERVATIONS)?;
        let values = series.values();
        let n = values.len();

        let period = self.resolve_period(values);
        if period < 2 {
            return Err(AnalyticsError::InvalidParameter(format!(
                "period must be at least 2, got {}",
                period
            )));
        }
        if n < 2 * period {
            return Err(AnalyticsError::insufficient("seasonal", 2 * period, n));
        }

        let index: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let trend = linear_regression(&index, values)?;
        let trend_values: Vec<f64> = index.iter().map(|&t| trend.predict(t)).collect();

        let mut mode = self.config.mode;
        if mode == DecompositionMode::Multiplicative
            && (values.iter().any(|v| *v <= 0.0) || trend_values.iter().any(|t| *t <= 0.0))
        {
            warn!("non-positive values, falling back to additive seasonality");
            mode = DecompositionMode::Additive;
        }

        let detrended: Vec<f64> = values
            .iter()
            .zip(&trend_values)
            .map(|(v, t)| match mode {
                DecompositionMode::Additive => v - t,
                DecompositionMode::Multiplicative => v / t,
            })
            .collect();

        let mut offsets: Vec<f64> = (0..period)
            .map(|phase| {
                let members: Vec<f64> = detrended.iter().skip(phase).step_by(period).copied().collect();
                members.iter().sum::<f64>() / members.len() as f64
            })
            .collect();
        let centre = offsets.iter().sum::<f64>() / period as f64;
        for o in &mut offsets {
            match mode {
                DecompositionMode::Additive => *o -= centre,
                DecompositionMode::Multiplicative => *o /= centre,
            }
        }

        let fitted: Vec<f64> = (0..n)
            .map(|i| combine(mode, trend_values[i], offsets[i % period]))
            .collect();
        let residuals: Vec<f64> = values.iter().zip(&fitted).map(|(v, f)| v - f).collect();
        let sigma = std_dev(&residuals);

        debug!(period, ?mode, slope = trend.slope, sigma, "fitted seasonal model");
        self.fit = Some(SeasonalFit {
            period,
            mode,
            trend,
            offsets,
            fitted,
            residuals,
            sigma,
        });
        self.series = Some(series.clone());
        Ok(())
    }

    fn forecast(&self, horizon: usize) -> Result<ForecastResult> {
        let (fit, series) = match (&self.fit, &self.series) {
            (Some(fit), Some(series)) => (fit, series),
            _ => return Err(AnalyticsError::NotFitted),
        };
        require_horizon(horizon)?;

        let n = series.len();
        let z = z_for_level(self.config.confidence_level);
        let mut points = Vec::with_capacity(horizon);
        let mut lower = Vec::with_capacity(horizon);
        let mut upper = Vec::with_capacity(horizon);

        for h in 1..=horizon {
            let t = n - 1 + h;
            let point = combine(fit.mode, fit.trend.predict(t as f64), fit.offsets[t % fit.period]);
            let half_width = z * fit.sigma * (1.0 + h as f64 / n as f64).sqrt();
            points.push(point);
            lower.push(point - half_width);
            upper.push(point + half_width);
        }

        ForecastResult::new(
            self.name(),
            series.future_timestamps(horizon),
            points,
            lower,
            upper,
            self.config.confidence_level,
        )
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.fit.as_ref().map(|f| f.fitted.as_slice())
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.fit.as_ref().map(|f| f.residuals.as_slice())
    }

    fn name(&self) -> &str {
        "Seasonal"
    }

    fn min_observations(&self) -> usize {
        Self::MIN_OBSERVATIONS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::f64::consts::PI;

    fn make_timestamps(n: usize) -> Vec<DateTime<Utc>> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| base + Duration::days(i as i64)).collect()
    }

    fn weekly_series(n: usize, level: f64) -> TimeSeries {
        let values = (0..n)
            .map(|i| level + 0.2 * i as f64 + 8.0 * (2.0 * PI * i as f64 / 7.0).sin())
            .collect();
        TimeSeries::new(make_timestamps(n), values).unwrap()
    }

    #[test]
    fn detects_weekly_period() {
        let mut model = SeasonalModel::new();
        model.fit(&weekly_series(140, 100.0)).unwrap();
        assert_eq!(model.period(), Some(7));
        assert_eq!(model.mode(), Some(DecompositionMode::Multiplicative));
    }

    #[test]
    fn additive_forecast_tracks_pattern() {
        let ts = weekly_series(140, 100.0);
        let mut model = SeasonalModel::with_config(
            SeasonalConfig::default()
                .with_period(7)
                .with_mode(DecompositionMode::Additive),
        );
        model.fit(&ts).unwrap();
        let forecast = model.forecast(14).unwrap();

        assert_eq!(forecast.horizon(), 14);
        let expected: Vec<f64> = (140..154)
            .map(|i| 100.0 + 0.2 * i as f64 + 8.0 * (2.0 * PI * i as f64 / 7.0).sin())
            .collect();
        for (step, want) in forecast.steps().iter().zip(&expected) {
            assert_relative_eq!(step.point, *want, epsilon = 1.0);
            assert!(step.lower <= step.point && step.point <= step.upper);
        }
        let pattern_sum: f64 = model.seasonal_pattern().unwrap().iter().sum();
        assert_relative_eq!(pattern_sum, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn non_positive_data_falls_back_to_additive() {
        let ts = weekly_series(120, 0.0);
        let mut model = SeasonalModel::with_config(SeasonalConfig::default().with_period(7));
        model.fit(&ts).unwrap();
        assert_eq!(model.mode(), Some(DecompositionMode::Additive));
    }

    #[test]
    fn rejects_short_series() {
        let ts = weekly_series(99, 100.0);
        let err = SeasonalModel::new().fit(&ts).unwrap_err();
        assert_eq!(err.kind(), "insufficient_data");
    }

    #[test]
    fn period_longer_than_half_series_is_rejected() {
        let ts = weekly_series(100, 100.0);
        let mut model = SeasonalModel::with_config(SeasonalConfig::default().with_period(60));
        assert_eq!(model.fit(&ts).unwrap_err().kind(), "insufficient_data");
    }

    #[test]
    fn intervals_widen_with_horizon() {
        let ts = weekly_series(140, 100.0);
        let mut model = SeasonalModel::new();
        model.fit(&ts).unwrap();
        let forecast = model.forecast(30).unwrap();
        let first = forecast.steps()[0].upper - forecast.steps()[0].lower;
        let last = forecast.steps()[29].upper - forecast.steps()[29].lower;
        assert!(last >= first);
    }
}
