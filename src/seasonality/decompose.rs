//! Classical moving-average decomposition.

use crate::error::{AnalyticsError, Result};
use crate::utils::stats::{max, min, variance};
use serde::{Deserialize, Serialize};

/// How the components combine into the observed series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecompositionMode {
    /// observed = trend + seasonal + residual
    #[default]
    Additive,
    /// observed = trend × seasonal × residual
    Multiplicative,
}

/// Trend, seasonal and residual components of a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecompositionResult {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
    pub period: usize,
    pub mode: DecompositionMode,
}

impl DecompositionResult {
    /// Recombine the components.
    pub fn reconstruct(&self) -> Vec<f64> {
        (0..self.trend.len())
            .map(|i| match self.mode {
                DecompositionMode::Additive => self.trend[i] + self.seasonal[i] + self.residual[i],
                DecompositionMode::Multiplicative => {
                    self.trend[i] * self.seasonal[i] * self.residual[i]
                }
            })
            .collect()
    }

    /// One seasonal cycle, indexed by phase.
    pub fn seasonal_pattern(&self) -> &[f64] {
        &self.seasonal[..self.period.min(self.seasonal.len())]
    }

    /// max - min of the seasonal component.
    pub fn seasonal_amplitude(&self) -> f64 {
        if self.seasonal.is_empty() {
            return 0.0;
        }
        max(&self.seasonal) - min(&self.seasonal)
    }

    /// Seasonal strength in [0, 1] (Wang, Smith & Hyndman).
    ///
    /// Computed on the additive scale; multiplicative components are logged.
    pub fn seasonal_strength(&self) -> f64 {
        let (seasonal, residual) = self.additive_parts(&self.seasonal);
        strength(&seasonal, &residual)
    }

    /// Trend strength in [0, 1].
    pub fn trend_strength(&self) -> f64 {
        let (trend, residual) = self.additive_parts(&self.trend);
        strength(&trend, &residual)
    }

    fn additive_parts(&self, component: &[f64]) -> (Vec<f64>, Vec<f64>) {
        match self.mode {
            DecompositionMode::Additive => (component.to_vec(), self.residual.clone()),
            DecompositionMode::Multiplicative => (
                component.iter().map(|v| v.max(1e-12).ln()).collect(),
                self.residual.iter().map(|v| v.max(1e-12).ln()).collect(),
            ),
        }
    }
}

fn strength(component: &[f64], residual: &[f64]) -> f64 {
    let combined: Vec<f64> = component.iter().zip(residual).map(|(c, r)| c + r).collect();
    let var_combined = variance(&combined);
    if var_combined.is_nan() || var_combined <= 1e-10 {
        return 0.0;
    }
    (1.0 - variance(residual) / var_combined).clamp(0.0, 1.0)
}

/// Decompose `values` with a centred moving average of length `period`.
///
/// The trend is extended linearly over the half-window at each end so every
/// component has the input's length. Residuals are whatever the trend and
/// seasonal components leave, so the components always recombine exactly.
///
/// # Arguments
/// * `values` - Observed series, at least two full periods
/// * `period` - Seasonal period (>= 2)
/// * `mode` - Additive or multiplicative; multiplicative needs positive values
pub fn decompose(
    values: &[f64],
    period: usize,
    mode: DecompositionMode,
) -> Result<DecompositionResult> {
    if period < 2 {
        return Err(AnalyticsError::InvalidParameter(format!(
            "period must be at least 2, got {}",
            period
        )));
    }
    let n = values.len();
    if n < 2 * period {
        return Err(AnalyticsError::insufficient(
            "seasonal decomposition",
            2 * period,
            n,
        ));
    }
    if mode == DecompositionMode::Multiplicative && values.iter().any(|v| *v <= 0.0) {
        return Err(AnalyticsError::InvalidParameter(
            "multiplicative decomposition requires positive values".to_string(),
        ));
    }

    let trend = centred_moving_average(values, period);

    let detrended: Vec<f64> = match mode {
        DecompositionMode::Additive => values.iter().zip(&trend).map(|(v, t)| v - t).collect(),
        DecompositionMode::Multiplicative => {
            if trend.iter().any(|t| *t <= 0.0) {
                return Err(AnalyticsError::ComputationError(
                    "extrapolated trend is not positive".to_string(),
                ));
            }
            values.iter().zip(&trend).map(|(v, t)| v / t).collect()
        }
    };

    let mut phase_means: Vec<f64> = (0..period)
        .map(|phase| {
            let members: Vec<f64> = detrended.iter().skip(phase).step_by(period).copied().collect();
            members.iter().sum::<f64>() / members.len() as f64
        })
        .collect();
    let centre = phase_means.iter().sum::<f64>() / period as f64;
    for m in &mut phase_means {
        match mode {
            DecompositionMode::Additive => *m -= centre,
            DecompositionMode::Multiplicative => *m /= centre,
        }
    }

    let seasonal: Vec<f64> = (0..n).map(|i| phase_means[i % period]).collect();
    let residual: Vec<f64> = (0..n)
        .map(|i| match mode {
            DecompositionMode::Additive => values[i] - trend[i] - seasonal[i],
            DecompositionMode::Multiplicative => values[i] / (trend[i] * seasonal[i]),
        })
        .collect();

    Ok(DecompositionResult {
        trend,
        seasonal,
        residual,
        period,
        mode,
    })
}

/// Centred moving average (2×m for even `period`) with linear extension at both ends.
fn centred_moving_average(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let half = period / 2;
    let mut trend = vec![f64::NAN; n];

    for i in half..n - half {
        trend[i] = if period % 2 == 1 {
            values[i - half..=i + half].iter().sum::<f64>() / period as f64
        } else {
            let inner: f64 = values[i - half + 1..i + half].iter().sum();
            (0.5 * values[i - half] + inner + 0.5 * values[i + half]) / period as f64
        };
    }

    let first = half;
    let last = n - half - 1;
    let span = period.min(last - first + 1);

    // head: line through the first `span` defined points
    let (slope, intercept) = line_through(&trend, first, first + span);
    for i in 0..first {
        trend[i] = intercept + slope * i as f64;
    }
    // tail: line through the last `span` defined points
    let (slope, intercept) = line_through(&trend, last + 1 - span, last + 1);
    for i in last + 1..n {
        trend[i] = intercept + slope * i as f64;
    }

    trend
}

/// Least-squares line through `(i, values[i])` for `i` in `start..end`.
fn line_through(values: &[f64], start: usize, end: usize) -> (f64, f64) {
    let count = (end - start) as f64;
    if end - start < 2 {
        return (0.0, values[start]);
    }
    let mean_x = (start..end).map(|i| i as f64).sum::<f64>() / count;
    let mean_y = values[start..end].iter().sum::<f64>() / count;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for i in start..end {
        let dx = i as f64 - mean_x;
        sxx += dx * dx;
        sxy += dx * (values[i] - mean_y);
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    (slope, mean_y - slope * mean_x)
}
