//! Market trend analysis: decomposition, direction, seasonality, stationarity,
//! growth and breakpoints.

use crate::core::TimeSeries;
use crate::error::{AnalyticsError, Result};
use crate::seasonality::{decompose, DecompositionMode, DecompositionResult};
use crate::utils::ols::linear_regression;
use crate::utils::stats::{max, mean, median, min, population_variance, std_dev};
use crate::validation::{adf_test, StationarityResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Configuration for [`TrendAnalyzer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Decomposition period, capped at half the series length.
    pub seasonal_period: usize,
    /// Seasonality is reported when amplitude exceeds this fraction of |mean|.
    pub seasonality_threshold: f64,
    /// Significance level for the slope and ADF tests.
    pub significance: f64,
    pub breakpoint_window: usize,
    /// Minimum |z| of a mean shift to flag a breakpoint.
    pub breakpoint_threshold: f64,
    pub decomposition_mode: DecompositionMode,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            seasonal_period: 7,
            seasonality_threshold: 0.05,
            significance: 0.05,
            breakpoint_window: 7,
            breakpoint_threshold: 2.0,
            decomposition_mode: DecompositionMode::Additive,
        }
    }
}

impl TrendConfig {
    pub fn with_seasonal_period(mut self, period: usize) -> Self {
        self.seasonal_period = period;
        self
    }

    pub fn with_seasonality_threshold(mut self, threshold: f64) -> Self {
        self.seasonality_threshold = threshold;
        self
    }

    /// Set breakpoint window and z threshold.
    pub fn with_breakpoints(mut self, window: usize, threshold: f64) -> Self {
        self.breakpoint_window = window;
        self.breakpoint_threshold = threshold;
        self
    }

    pub fn with_decomposition_mode(mut self, mode: DecompositionMode) -> Self {
        self.decomposition_mode = mode;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// Linear trend of value against time index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendLine {
    pub direction: TrendDirection,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub p_value: f64,
    pub std_err: f64,
    /// Change of the trend component from first to last point, in percent.
    pub percentage_change: Option<f64>,
    pub start_value: f64,
    pub end_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalitySummary {
    pub has_seasonality: bool,
    /// max − min of the seasonal component.
    pub amplitude: f64,
    pub variance: f64,
    pub strength: f64,
    pub peak_count: usize,
    pub trough_count: usize,
    pub max_value: f64,
    pub min_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthMetrics {
    /// (last − first) / first × 100; absent when the first value is zero.
    pub total_growth_pct: Option<f64>,
    /// Compound annual growth as a fraction; absent for non-positive endpoints.
    pub cagr: Option<f64>,
    /// std(returns) / |mean(returns)| × 100; absent when the mean return is zero.
    pub volatility_pct: Option<f64>,
    pub avg_period_growth_pct: Option<f64>,
    pub min_value: f64,
    pub max_value: f64,
    pub mean_value: f64,
    pub median_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Significance {
    High,
    Medium,
}

/// A significant shift between the windows before and after `index`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakpoint {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub before_mean: f64,
    pub after_mean: f64,
    /// after_mean − before_mean
    pub magnitude: f64,
    pub change_pct: Option<f64>,
    pub z_score: f64,
    pub significance: Significance,
}

/// Full analysis of one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendAnalysis {
    pub data_points: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub decomposition: DecompositionResult,
    pub trend: TrendLine,
    pub seasonality: SeasonalitySummary,
    pub stationarity: StationarityResult,
    pub growth: GrowthMetrics,
    pub breakpoints: Vec<Breakpoint>,
}

/// Per-region analyses; regions that could not be analyzed carry the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionalTrends {
    pub regions: BTreeMap<String, TrendAnalysis>,
    pub skipped: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct TrendAnalyzer {
    config: TrendConfig,
}

impl TrendAnalyzer {
    /// Minimum series length for an analysis.
    pub const MIN_OBSERVATIONS: usize = 14;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TrendConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrendConfig {
        &self.config
    }

    /// Analyze a single (daily) series.
    pub fn analyze(&self, series: &TimeSeries) -> Result<TrendAnalysis> {
        let n = series.len();
        if n < Self::MIN_OBSERVATIONS {
            return Err(AnalyticsError::insufficient(
                "trend analysis",
                Self::MIN_OBSERVATIONS,
                n,
            ));
        }
        let values = series.values();
        let timestamps = series.timestamps();

        let decomposition = self.decompose(values)?;
        let trend = self.trend_line(values, &decomposition.trend)?;
        let seasonality = self.seasonality(values, &decomposition);
        let stationarity = adf_test(values, None, self.config.significance);
        let growth = growth_metrics(values, series.span_days())?;
        let breakpoints = self.detect_breakpoints(series);

        debug!(
            points = n,
            direction = ?trend.direction,
            breakpoints = breakpoints.len(),
            "trend analysis complete"
        );

        Ok(TrendAnalysis {
            data_points: n,
            start: timestamps[0],
            end: timestamps[n - 1],
            decomposition,
            trend,
            seasonality,
            stationarity,
            growth,
            breakpoints,
        })
    }

    /// Analyze each region's series independently.
    pub fn analyze_regions(&self, regions: &BTreeMap<String, TimeSeries>) -> RegionalTrends {
        let mut analyzed = BTreeMap::new();
        let mut skipped = BTreeMap::new();
        for (region, series) in regions {
            match self.analyze(series) {
                Ok(analysis) => {
                    analyzed.insert(region.clone(), analysis);
                }
                Err(e) => {
                    warn!(region = %region, error = %e, "skipping region");
                    skipped.insert(region.clone(), e.to_string());
                }
            }
        }
        RegionalTrends {
            regions: analyzed,
            skipped,
        }
    }

    /// Boundaries where the mean shift between adjacent windows is significant.
    ///
    /// For boundary `i` the shift is `mean(x[i..i+w]) − mean(x[i−w..i])`,
    /// scaled by the sample std of the window ending at `i`.
    pub fn detect_breakpoints(&self, series: &TimeSeries) -> Vec<Breakpoint> {
        let values = series.values();
        let timestamps = series.timestamps();
        let w = self.config.breakpoint_window;
        let n = values.len();
        if w < 2 || n < 2 * w {
            return Vec::new();
        }

        let mut breakpoints = Vec::new();
        for i in w..n - w {
            let before = mean(&values[i - w..i]);
            let after = mean(&values[i..i + w]);
            let sigma = std_dev(&values[i + 1 - w..=i]);
            if sigma <= 0.0 || !sigma.is_finite() {
                continue;
            }
            let z = (after - before) / sigma;
            if z.abs() <= self.config.breakpoint_threshold {
                continue;
            }
            let magnitude = after - before;
            breakpoints.push(Breakpoint {
                index: i,
                timestamp: timestamps[i],
                before_mean: before,
                after_mean: after,
                magnitude,
                change_pct: percent_change(before, after),
                z_score: z,
                significance: if z.abs() > 3.0 {
                    Significance::High
                } else {
                    Significance::Medium
                },
            });
        }
        breakpoints
    }

    fn decompose(&self, values: &[f64]) -> Result<DecompositionResult> {
        let period = self.config.seasonal_period.min(values.len() / 2);
        let mode = self.config.decomposition_mode;
        if mode == DecompositionMode::Multiplicative && values.iter().any(|v| *v <= 0.0) {
            warn!("non-positive values, using additive decomposition");
            return decompose(values, period, DecompositionMode::Additive);
        }
        decompose(values, period, mode)
    }

    fn trend_line(&self, values: &[f64], trend_component: &[f64]) -> Result<TrendLine> {
        let index: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
        let fit = linear_regression(&index, values)?;

        let significant = fit.p_value < self.config.significance;
        let direction = if significant && fit.slope > 0.0 {
            TrendDirection::Increasing
        } else if significant && fit.slope < 0.0 {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        };

        let start_value = trend_component[0];
        let end_value = trend_component[trend_component.len() - 1];
        Ok(TrendLine {
            direction,
            slope: fit.slope,
            intercept: fit.intercept,
            r_squared: fit.r_squared,
            p_value: fit.p_value,
            std_err: fit.std_err,
            percentage_change: percent_change(start_value, end_value),
            start_value,
            end_value,
        })
    }

    fn seasonality(&self, values: &[f64], decomposition: &DecompositionResult) -> SeasonalitySummary {
        let seasonal = &decomposition.seasonal;
        let amplitude = decomposition.seasonal_amplitude();
        let level = mean(values).abs();

        let mut peak_count = 0;
        let mut trough_count = 0;
        for w in seasonal.windows(3) {
            if w[1] > w[0] && w[1] > w[2] {
                peak_count += 1;
            } else if w[1] < w[0] && w[1] < w[2] {
                trough_count += 1;
            }
        }

        SeasonalitySummary {
            has_seasonality: amplitude > self.config.seasonality_threshold * level,
            amplitude,
            variance: population_variance(seasonal),
            strength: decomposition.seasonal_strength(),
            peak_count,
            trough_count,
            max_value: max(seasonal),
            min_value: min(seasonal),
        }
    }
}

fn percent_change(from: f64, to: f64) -> Option<f64> {
    if from == 0.0 {
        None
    } else {
        Some((to - from) / from * 100.0)
    }
}

/// Growth statistics of a series spanning `period_days` days.
pub fn growth_metrics(values: &[f64], period_days: f64) -> Result<GrowthMetrics> {
    let (first, last) = match (values.first(), values.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => return Err(AnalyticsError::EmptyData),
    };

    let returns: Vec<f64> = values
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    let mean_return = if returns.is_empty() {
        None
    } else {
        Some(mean(&returns))
    };

    let volatility_pct = match mean_return {
        Some(m) if m != 0.0 && returns.len() >= 2 => Some(std_dev(&returns) / m.abs() * 100.0),
        _ => None,
    };

    let cagr = if first > 0.0 && last >= 0.0 && period_days > 0.0 {
        let value = (last / first).powf(365.0 / period_days) - 1.0;
        value.is_finite().then_some(value)
    } else {
        None
    };

    Ok(GrowthMetrics {
        total_growth_pct: percent_change(first, last),
        cagr,
        volatility_pct,
        avg_period_growth_pct: mean_return.map(|m| m * 100.0),
        min_value: min(values),
        max_value: max(values),
        mean_value: mean(values),
        median_value: median(values),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};
    use std::f64::consts::PI;

    fn make_series(values: Vec<f64>) -> TimeSeries {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        TimeSeries::daily(base, values).unwrap()
    }

    #[test]
    fn noiseless_linear_series_is_increasing() {
        let series = make_series((0..120).map(|i| 100.0 + 2.0 * i as f64).collect());
        let analysis = TrendAnalyzer::new().analyze(&series).unwrap();

        assert_eq!(analysis.trend.direction, TrendDirection::Increasing);
        assert_relative_eq!(analysis.trend.r_squared, 1.0, epsilon = 1e-9);
        assert_relative_eq!(analysis.trend.slope, 2.0, epsilon = 1e-9);
        assert!(!analysis.seasonality.has_seasonality);
        assert!(analysis.breakpoints.is_empty() || analysis.breakpoints.iter().all(|b| b.magnitude > 0.0));
        assert_eq!(analysis.data_points, 120);
    }

    #[test]
    fn decomposition_reconstructs_input() {
        let values: Vec<f64> = (0..60)
            .map(|i| 40.0 + 0.5 * i as f64 + 4.0 * (2.0 * PI * i as f64 / 7.0).sin())
            .collect();
        let analysis = TrendAnalyzer::new().analyze(&make_series(values.clone())).unwrap();
        for (v, r) in values.iter().zip(analysis.decomposition.reconstruct()) {
            assert_relative_eq!(*v, r, max_relative = 1e-6);
        }
        assert!(analysis.seasonality.has_seasonality);
        assert!(analysis.seasonality.peak_count > 0);
    }

    #[test]
    fn flat_series_is_stable() {
        let values: Vec<f64> = (0..30).map(|i| 10.0 + if i % 2 == 0 { 0.1 } else { -0.1 }).collect();
        let analysis = TrendAnalyzer::new().analyze(&make_series(values)).unwrap();
        assert_eq!(analysis.trend.direction, TrendDirection::Stable);
    }

    #[test]
    fn short_series_is_rejected() {
        let err = TrendAnalyzer::new()
            .analyze(&make_series(vec![1.0; 13]))
            .unwrap_err();
        assert_eq!(
            err,
            AnalyticsError::InsufficientData {
                context: "trend analysis".to_string(),
                needed: 14,
                got: 13
            }
        );
    }

    #[test]
    fn level_shift_is_a_breakpoint() {
        let values: Vec<f64> = (0..40)
            .map(|i| {
                let base = if i < 20 { 100.0 } else { 150.0 };
                base + if i % 2 == 0 { 1.0 } else { -1.0 }
            })
            .collect();
        let series = make_series(values);
        let breakpoints = TrendAnalyzer::new().detect_breakpoints(&series);

        let at_shift = breakpoints.iter().find(|b| b.index == 20).unwrap();
        assert!(at_shift.magnitude > 45.0);
        assert_relative_eq!(at_shift.change_pct.unwrap(), 50.0, epsilon = 1.0);
        assert_eq!(at_shift.timestamp, series.timestamps()[20]);
        assert!(breakpoints.iter().any(|b| b.significance == Significance::High));
        assert!(breakpoints.iter().all(|b| b.magnitude > 0.0));
    }

    #[test]
    fn growth_metrics_for_doubling_year() {
        let values: Vec<f64> = (0..366).map(|i| 100.0 + 100.0 * i as f64 / 365.0).collect();
        let growth = growth_metrics(&values, 365.0).unwrap();
        assert_relative_eq!(growth.total_growth_pct.unwrap(), 100.0, epsilon = 1e-9);
        assert_relative_eq!(growth.cagr.unwrap(), 1.0, epsilon = 1e-9);
        assert!(growth.volatility_pct.unwrap() > 0.0);
        assert_relative_eq!(growth.min_value, 100.0);
        assert_relative_eq!(growth.max_value, 200.0);
    }

    #[test]
    fn constant_series_has_no_volatility() {
        let growth = growth_metrics(&[5.0; 20], 19.0).unwrap();
        assert_eq!(growth.volatility_pct, None);
        assert_relative_eq!(growth.total_growth_pct.unwrap(), 0.0);
        assert_relative_eq!(growth.cagr.unwrap(), 0.0);
    }

    #[test]
    fn growth_of_nothing_is_an_error() {
        assert_eq!(growth_metrics(&[], 30.0).unwrap_err(), AnalyticsError::EmptyData);
        let single = growth_metrics(&[42.0], 0.0).unwrap();
        assert_eq!(single.cagr, None);
        assert_eq!(single.volatility_pct, None);
        assert_relative_eq!(single.median_value, 42.0);
    }

    #[test]
    fn regions_are_analyzed_separately() {
        let mut regions = BTreeMap::new();
        regions.insert(
            "EU".to_string(),
            make_series((0..30).map(|i| 50.0 - i as f64).collect()),
        );
        regions.insert("APAC".to_string(), make_series(vec![1.0; 5]));
        let result = TrendAnalyzer::new().analyze_regions(&regions);
        assert_eq!(
            result.regions["EU"].trend.direction,
            TrendDirection::Decreasing
        );
        assert!(result.skipped.contains_key("APAC"));
    }
}
