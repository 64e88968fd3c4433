//! Accuracy metrics for forecast evaluation.

use crate::error::{AnalyticsError, Result};
use serde::Serialize;

/// Accuracy of a forecast against held-out actuals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationMetrics {
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Absolute Percentage Error over non-zero actuals (0 when every actual is zero)
    pub mape: f64,
    /// Symmetric Mean Absolute Percentage Error
    pub smape: f64,
    /// R-squared; negative when worse than predicting the mean
    pub r_squared: f64,
    /// Fraction of actuals inside the prediction interval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f64>,
    /// Mean width of the prediction interval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_interval_width: Option<f64>,
}

fn check_lengths(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.is_empty() || predicted.is_empty() {
        return Err(AnalyticsError::EmptyData);
    }
    if actual.len() != predicted.len() {
        return Err(AnalyticsError::DimensionMismatch {
            expected: actual.len(),
            got: predicted.len(),
        });
    }
    Ok(())
}

/// Score point predictions against actual values.
///
/// # Arguments
/// * `actual` - Actual observed values
/// * `predicted` - Predicted/forecast values
///
/// # Returns
/// `EvaluationMetrics` without interval statistics
pub fn evaluate(actual: &[f64], predicted: &[f64]) -> Result<EvaluationMetrics> {
    check_lengths(actual, predicted)?;

    let mse = mse(actual, predicted);
    Ok(EvaluationMetrics {
        rmse: mse.sqrt(),
        mse,
        mae: mae(actual, predicted),
        mape: mape(actual, predicted),
        smape: smape(actual, predicted),
        r_squared: r_squared(actual, predicted),
        coverage: None,
        avg_interval_width: None,
    })
}

/// Score predictions and their intervals against actual values.
pub fn evaluate_with_intervals(
    actual: &[f64],
    predicted: &[f64],
    lower: &[f64],
    upper: &[f64],
) -> Result<EvaluationMetrics> {
    let mut metrics = evaluate(actual, predicted)?;
    check_lengths(actual, lower)?;
    check_lengths(actual, upper)?;

    metrics.coverage = Some(coverage(actual, lower, upper));
    metrics.avg_interval_width = Some(interval_width(lower, upper));
    Ok(metrics)
}

/// Calculate MAE between two slices.
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

/// Calculate MSE between two slices.
pub fn mse(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64
}

/// Calculate RMSE between two slices.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    mse(actual, predicted).sqrt()
}

/// MAPE in percent, skipping observations whose actual value is zero.
pub fn mape(actual: &[f64], predicted: &[f64]) -> f64 {
    let terms: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| **a != 0.0)
        .map(|(a, p)| ((a - p) / a).abs())
        .collect();
    if terms.is_empty() {
        return 0.0;
    }
    100.0 * terms.iter().sum::<f64>() / terms.len() as f64
}

/// Calculate SMAPE between two slices.
pub fn smape(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    let n = actual.len() as f64;
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| {
            let denom = a.abs() + p.abs();
            if denom == 0.0 {
                0.0
            } else {
                2.0 * (a - p).abs() / denom
            }
        })
        .sum::<f64>()
        * 100.0
        / n
}

/// Coefficient of determination.
///
/// A constant actual series has no variance to explain: a perfect fit scores
/// 1, anything else 0.
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len() as f64;
    let mean_actual = actual.iter().sum::<f64>() / n;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();

    if ss_tot == 0.0 {
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    }
}

/// Fraction of actual values within `[lower, upper]`.
pub fn coverage(actual: &[f64], lower: &[f64], upper: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let inside = actual
        .iter()
        .zip(lower.iter().zip(upper))
        .filter(|(a, (lo, hi))| *a >= *lo && *a <= *hi)
        .count();
    inside as f64 / actual.len() as f64
}

/// Mean interval width.
pub fn interval_width(lower: &[f64], upper: &[f64]) -> f64 {
    if lower.is_empty() {
        return 0.0;
    }
    lower.iter().zip(upper).map(|(lo, hi)| hi - lo).sum::<f64>() / lower.len() as f64
}
