//! Differencing utilities for ARIMA models.

/// Apply ordinary differencing `d` times.
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut result = series.to_vec();
    for _ in 0..d {
        if result.len() <= 1 {
            return Vec::new();
        }
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    result
}

/// Undo `d` rounds of differencing for values that continue `history`.
///
/// # Arguments
/// * `forecast_diff` - Forecasts on the `d`-times differenced scale
/// * `history` - Observed series on the original scale
/// * `d` - Differencing order used
///
/// # Returns
/// Forecasts on the original scale.
pub fn integrate(forecast_diff: &[f64], history: &[f64], d: usize) -> Vec<f64> {
    let mut result = forecast_diff.to_vec();
    for level in (0..d).rev() {
        let anchor = difference(history, level).last().copied().unwrap_or(0.0);
        let mut acc = anchor;
        for v in &mut result {
            acc += *v;
            *v = acc;
        }
    }
    result
}
