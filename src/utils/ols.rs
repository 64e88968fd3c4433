//! Ordinary Least Squares (OLS) regression utilities.
//!
//! Simple linear regression drives trend direction and the seasonal model's
//! trend line; the multi-column solver backs the ADF regression.

use crate::error::{AnalyticsError, Result};
use crate::utils::stats::t_two_sided_p;
use serde::Serialize;

/// Simple linear regression of `y` on `x`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Two-sided p-value for `slope != 0` (t-test, n-2 df).
    pub p_value: f64,
    /// Standard error of the slope.
    pub std_err: f64,
}

impl LinearFit {
    /// Fitted value at `x`.
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fit `y = intercept + slope * x`.
///
/// # Arguments
/// * `x` - Regressor values
/// * `y` - Target values (same length, at least 3 points)
///
/// # Returns
/// `LinearFit` with slope inference. A perfect fit with non-zero slope has
/// p-value 0.
pub fn linear_regression(x: &[f64], y: &[f64]) -> Result<LinearFit> {
    let n = y.len();
    if x.len() != n {
        return Err(AnalyticsError::DimensionMismatch {
            expected: n,
            got: x.len(),
        });
    }
    if n < 3 {
        return Err(AnalyticsError::insufficient("linear regression", 3, n));
    }

    let nf = n as f64;
    let mean_x = x.iter().sum::<f64>() / nf;
    let mean_y = y.iter().sum::<f64>() / nf;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        sxx += (xi - mean_x).powi(2);
        sxy += (xi - mean_x) * (yi - mean_y);
        syy += (yi - mean_y).powi(2);
    }

    if sxx == 0.0 {
        return Err(AnalyticsError::InvalidParameter(
            "regressor has zero variance".to_string(),
        ));
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let sse = (syy - slope * sxy).max(0.0);
    let r_squared = if syy == 0.0 { 0.0 } else { (sxy * sxy) / (sxx * syy) };

    let df = nf - 2.0;
    let std_err = (sse / df / sxx).sqrt();
    // relative threshold so floating noise on an exact line still reads as exact
    let exact = sse <= 1e-20 * syy.max(1e-300);
    let p_value = if exact || std_err == 0.0 {
        if slope == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        t_two_sided_p(slope / std_err, df)
    };

    Ok(LinearFit {
        slope,
        intercept,
        r_squared: r_squared.min(1.0),
        p_value,
        std_err: if exact { 0.0 } else { std_err },
    })
}

/// Multi-column least squares result.
#[derive(Debug, Clone)]
pub struct LeastSquares {
    /// One coefficient per design column.
    pub coefficients: Vec<f64>,
    /// Standard errors of the coefficients.
    pub std_errors: Vec<f64>,
    /// Residual sum of squares.
    pub sse: f64,
    /// Number of observations.
    pub n: usize,
}

/// Solve `y = X @ beta` for a row-major design matrix.
///
/// Uses Cholesky decomposition of the normal equations.
pub fn least_squares(rows: &[Vec<f64>], y: &[f64]) -> Result<LeastSquares> {
    let n = y.len();
    if rows.len() != n {
        return Err(AnalyticsError::DimensionMismatch {
            expected: n,
            got: rows.len(),
        });
    }
    let k = rows.first().map_or(0, Vec::len);
    if k == 0 || n <= k {
        return Err(AnalyticsError::insufficient("least squares", k + 1, n));
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &yi) in rows.iter().zip(y) {
        if row.len() != k {
            return Err(AnalyticsError::DimensionMismatch {
                expected: k,
                got: row.len(),
            });
        }
        for i in 0..k {
            xty[i] += row[i] * yi;
            for j in 0..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }

    let l = cholesky(&xtx).ok_or_else(|| {
        AnalyticsError::ComputationError("normal equations are not positive definite".into())
    })?;
    let coefficients = cholesky_solve(&l, &xty);

    let sse: f64 = rows
        .iter()
        .zip(y)
        .map(|(row, yi)| {
            let fitted: f64 = row.iter().zip(&coefficients).map(|(a, b)| a * b).sum();
            (yi - fitted).powi(2)
        })
        .sum();
    let sigma2 = sse / (n - k) as f64;

    // diag((X'X)^-1) column by column
    let std_errors = (0..k)
        .map(|i| {
            let mut e = vec![0.0; k];
            e[i] = 1.0;
            let col = cholesky_solve(&l, &e);
            (sigma2 * col[i]).max(0.0).sqrt()
        })
        .collect();

    Ok(LeastSquares {
        coefficients,
        std_errors,
        sse,
        n,
    })
}

/// Lower-triangular Cholesky factor, `None` when not positive definite.
fn cholesky(a: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let mut l = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }

            if i == j {
                if sum <= 1e-12 * a[i][i].abs() {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }
    Some(l)
}

fn cholesky_solve(l: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
    let n = b.len();

    // L @ y = b
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i][j] * y[j];
        }
        y[i] = sum / l[i][i];
    }

    // L' @ x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[j][i] * x[j];
        }
        x[i] = sum / l[i][i];
    }
    x
}
