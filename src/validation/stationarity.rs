//! Augmented Dickey-Fuller unit-root test.
//!
//! Used by ARIMA to choose the differencing order and by the trend analyzer
//! to report stationarity.

use crate::utils::ols::least_squares;
use crate::utils::stats::normal_cdf;
use serde::Serialize;

/// Result of a stationarity test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationarityResult {
    /// ADF t statistic on the lagged level.
    pub statistic: f64,
    /// Approximate p-value (MacKinnon).
    pub p_value: f64,
    /// Number of lagged differences in the regression.
    pub lags: usize,
    /// Observations used in the regression.
    pub n_obs: usize,
    /// `p_value < significance`
    pub is_stationary: bool,
    /// Critical values at common significance levels
    pub critical_values: CriticalValues,
}

/// Critical values for the constant-only ADF regression.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CriticalValues {
    pub cv_1pct: f64,
    pub cv_5pct: f64,
    pub cv_10pct: f64,
}

impl CriticalValues {
    /// Finite-sample critical values for `n_obs` observations.
    pub fn for_sample(n_obs: usize) -> Self {
        let t = n_obs.max(1) as f64;
        let cv = |c: [f64; 3]| c[0] + c[1] / t + c[2] / (t * t);
        Self {
            cv_1pct: cv([-3.43035, -6.5393, -16.786]),
            cv_5pct: cv([-2.86154, -2.8903, -4.234]),
            cv_10pct: cv([-2.56677, -1.5384, -2.809]),
        }
    }
}

impl StationarityResult {
    fn undefined(lags: usize, n_obs: usize) -> Self {
        Self {
            statistic: f64::NAN,
            p_value: f64::NAN,
            lags,
            n_obs,
            is_stationary: false,
            critical_values: CriticalValues::for_sample(n_obs),
        }
    }
}

/// Augmented Dickey-Fuller test with a constant.
///
/// Tests the null hypothesis that the series has a unit root. The lag order
/// is chosen by AIC up to `max_lags` (default `(n-1)^(1/3)`).
///
/// # Arguments
/// * `series` - Time series data
/// * `max_lags` - Maximum lagged differences to include
/// * `significance` - Level below which the unit root is rejected (usually 0.05)
///
/// # Returns
/// `StationarityResult`; statistic and p-value are NaN when the regression is
/// degenerate (e.g. a constant series).
pub fn adf_test(series: &[f64], max_lags: Option<usize>, significance: f64) -> StationarityResult {
    let n = series.len();
    if n < 6 {
        return StationarityResult::undefined(0, 0);
    }

    let max_lags = max_lags
        .unwrap_or_else(|| ((n - 1) as f64).powf(1.0 / 3.0).floor() as usize)
        .min((n - 1) / 2 - 1);

    let diff: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();

    // lag selection on a common sample so AIC values are comparable
    let mut best_lag = 0;
    let mut best_aic = f64::INFINITY;
    for lag in 0..=max_lags {
        if let Some((_, _, sse, n_eff)) = adf_regression(&diff, series, lag, max_lags) {
            if sse <= 0.0 {
                continue;
            }
            let aic = n_eff as f64 * (sse / n_eff as f64).ln() + 2.0 * (lag + 2) as f64;
            if aic < best_aic {
                best_aic = aic;
                best_lag = lag;
            }
        }
    }

    let Some((beta, se, _, n_obs)) = adf_regression(&diff, series, best_lag, best_lag) else {
        return StationarityResult::undefined(best_lag, 0);
    };
    if se == 0.0 || !se.is_finite() {
        return StationarityResult::undefined(best_lag, n_obs);
    }

    let statistic = beta / se;
    let p_value = mackinnon_p_value(statistic);

    StationarityResult {
        statistic,
        p_value,
        lags: best_lag,
        n_obs,
        is_stationary: p_value < significance,
        critical_values: CriticalValues::for_sample(n_obs),
    }
}

/// Regress `diff[t]` on `[1, level[t], diff[t-1..=t-lag]]` for `t >= start`.
///
/// Returns `(beta, se(beta), sse, n_obs)` for the lagged-level coefficient.
fn adf_regression(
    diff: &[f64],
    level: &[f64],
    lag: usize,
    start: usize,
) -> Option<(f64, f64, f64, usize)> {
    let rows: Vec<Vec<f64>> = (start..diff.len())
        .map(|t| {
            let mut row = Vec::with_capacity(lag + 2);
            row.push(1.0);
            row.push(level[t]);
            row.extend((1..=lag).map(|i| diff[t - i]));
            row
        })
        .collect();
    let y = &diff[start..];

    let fit = least_squares(&rows, y).ok()?;
    Some((fit.coefficients[1], fit.std_errors[1], fit.sse, fit.n))
}

/// MacKinnon (1994) approximate p-value for the constant-only ADF statistic.
pub fn mackinnon_p_value(statistic: f64) -> f64 {
    const TAU_MAX: f64 = 2.74;
    const TAU_MIN: f64 = -18.83;
    const TAU_STAR: f64 = -1.61;
    const SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
    const LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

    if statistic.is_nan() {
        return f64::NAN;
    }
    if statistic > TAU_MAX {
        return 1.0;
    }
    if statistic < TAU_MIN {
        return 0.0;
    }

    let coefs: &[f64] = if statistic <= TAU_STAR {
        &SMALL_P
    } else {
        &LARGE_P
    };
    let poly = coefs
        .iter()
        .rev()
        .fold(0.0, |acc, c| acc * statistic + c);
    normal_cdf(poly)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn ar1(phi: f64, n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut values = vec![0.0];
        for i in 1..n {
            let shock: f64 = rng.gen_range(-1.0..1.0);
            values.push(phi * values[i - 1] + shock);
        }
        values
    }

    #[test]
    fn p_value_at_five_percent_critical_value() {
        assert_relative_eq!(mackinnon_p_value(-2.86), 0.05, epsilon = 5e-3);
        assert_relative_eq!(mackinnon_p_value(-3.43), 0.01, epsilon = 3e-3);
        assert_eq!(mackinnon_p_value(5.0), 1.0);
        assert_eq!(mackinnon_p_value(-25.0), 0.0);
    }

    #[test]
    fn p_value_is_monotone_in_statistic() {
        let stats = [-6.0, -4.0, -3.0, -2.0, -1.61, -1.0, 0.0, 1.0, 2.0];
        let ps: Vec<f64> = stats.iter().map(|&s| mackinnon_p_value(s)).collect();
        for w in ps.windows(2) {
            assert!(w[0] <= w[1], "{:?}", ps);
        }
    }

    #[test]
    fn weakly_autocorrelated_series_is_stationary() {
        let series = ar1(0.3, 300, 7);
        let result = adf_test(&series, None, 0.05);
        assert!(result.is_stationary, "{:?}", result);
        assert!(result.statistic < result.critical_values.cv_1pct);
    }

    #[test]
    fn explosive_series_is_not_stationary() {
        let series: Vec<f64> = ar1(1.05, 120, 11).iter().map(|v| v + 10.0).collect();
        let result = adf_test(&series, None, 0.05);
        assert!(!result.is_stationary, "{:?}", result);
    }

    #[test]
    fn constant_series_is_undefined() {
        let result = adf_test(&[3.0; 50], None, 0.05);
        assert!(result.statistic.is_nan());
        assert!(!result.is_stationary);
    }

    #[test]
    fn short_series_is_undefined() {
        let result = adf_test(&[1.0, 2.0, 3.0], None, 0.05);
        assert!(result.p_value.is_nan());
    }

    #[test]
    fn critical_values_approach_asymptotic_limits() {
        let cv = CriticalValues::for_sample(100_000);
        assert_relative_eq!(cv.cv_5pct, -2.86154, epsilon = 1e-3);
        assert!(cv.cv_1pct < cv.cv_5pct && cv.cv_5pct < cv.cv_10pct);
    }
}
