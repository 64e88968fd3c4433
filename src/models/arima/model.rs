//! Fixed-order ARIMA estimation by conditional sum of squares.

use crate::error::{AnalyticsError, Result};
use crate::models::arima::diff::{difference, integrate};
use crate::utils::optimization::{nelder_mead, NelderMeadConfig};
use serde::Serialize;
use std::fmt;

/// ARIMA model order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ArimaOrder {
    /// AR order (p)
    pub p: usize,
    /// Differencing order (d)
    pub d: usize,
    /// MA order (q)
    pub q: usize,
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }

    /// Estimated parameters: AR + MA + intercept.
    pub fn num_params(&self) -> usize {
        self.p + self.q + 1
    }

    /// p + q, used to break AIC ties toward simpler models.
    pub fn complexity(&self) -> usize {
        self.p + self.q
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
    }
}

/// Estimated ARIMA(p, d, q) with fixed order.
#[derive(Debug, Clone)]
pub struct ArimaFit {
    order: ArimaOrder,
    ar: Vec<f64>,
    ma: Vec<f64>,
    intercept: f64,
    history: Vec<f64>,
    differenced: Vec<f64>,
    /// Residuals on the differenced scale, zero before the conditioning window.
    diff_residuals: Vec<f64>,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
    sigma2: f64,
    aic: f64,
    converged: bool,
}

// floor for the residual variance so exact fits keep a finite AIC
const MIN_VARIANCE: f64 = 1e-12;

impl ArimaFit {
    /// Estimate coefficients for `order` on `values`.
    ///
    /// Fails when the differenced series is too short for the order or the
    /// objective is non-finite at the optimum.
    pub fn estimate(values: &[f64], order: ArimaOrder) -> Result<Self> {
        let differenced = difference(values, order.d);
        let start = order.p.max(order.q);
        let needed = start + order.num_params() + 2;
        if differenced.len() < needed {
            return Err(AnalyticsError::insufficient(
                order.to_string(),
                needed + order.d,
                values.len(),
            ));
        }

        let mean = differenced.iter().sum::<f64>() / differenced.len() as f64;
        let (intercept, ar, ma, converged) = if order.p == 0 && order.q == 0 {
            (mean, Vec::new(), Vec::new(), true)
        } else {
            let mut initial = Vec::with_capacity(order.num_params());
            initial.push(mean);
            initial.extend((0..order.p).map(|i| 0.1 / (i + 1) as f64));
            initial.extend((0..order.q).map(|i| 0.1 / (i + 1) as f64));

            let mut bounds = vec![(f64::NEG_INFINITY, f64::INFINITY)];
            bounds.extend(std::iter::repeat((-0.99, 0.99)).take(order.p + order.q));

            let result = nelder_mead(
                |params| {
                    let (ar, ma) = params[1..].split_at(order.p);
                    conditional_residuals(&differenced, params[0], ar, ma, start).1
                },
                &initial,
                Some(&bounds),
                &NelderMeadConfig::default(),
            );
            let (ar, ma) = result.optimal_point[1..].split_at(order.p);
            (
                result.optimal_point[0],
                ar.to_vec(),
                ma.to_vec(),
                result.converged,
            )
        };

        let (diff_residuals, css) = conditional_residuals(&differenced, intercept, &ar, &ma, start);
        if !css.is_finite() {
            return Err(AnalyticsError::ComputationError(format!(
                "{} produced a non-finite sum of squares",
                order
            )));
        }

        let n_eff = (differenced.len() - start) as f64;
        let sigma2 = (css / n_eff).max(MIN_VARIANCE);
        let log_likelihood = -0.5 * n_eff * (1.0 + sigma2.ln() + (2.0 * std::f64::consts::PI).ln());
        let aic = -2.0 * log_likelihood + 2.0 * order.num_params() as f64;

        // level residual equals the differenced residual once lower orders are known
        let mut residuals = vec![0.0; order.d];
        residuals.extend_from_slice(&diff_residuals);
        let fitted = values.iter().zip(&residuals).map(|(y, e)| y - e).collect();

        Ok(Self {
            order,
            ar,
            ma,
            intercept,
            history: values.to_vec(),
            differenced,
            diff_residuals,
            fitted,
            residuals,
            sigma2,
            aic,
            converged,
        })
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma
    }

    /// Mean of the differenced series.
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn aic(&self) -> f64 {
        self.aic
    }

    #[cfg(test)]
    pub(crate) fn with_aic(mut self, aic: f64) -> Self {
        self.aic = aic;
        self
    }

    /// Residual variance on the differenced scale.
    pub fn residual_variance(&self) -> f64 {
        self.sigma2
    }

    /// Whether the optimiser met its tolerance.
    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn fitted_values(&self) -> &[f64] {
        &self.fitted
    }

    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    /// Point forecasts on the original scale.
    pub fn forecast_levels(&self, horizon: usize) -> Vec<f64> {
        let p = self.order.p;
        let q = self.order.q;
        let mut extended = self.differenced.clone();
        let mut shocks = self.diff_residuals.clone();

        for _ in 0..horizon {
            let t = extended.len();
            let mut pred = self.intercept;
            for i in 0..p.min(t) {
                pred += self.ar[i] * (extended[t - 1 - i] - self.intercept);
            }
            for i in 0..q.min(t) {
                pred += self.ma[i] * shocks[t - 1 - i];
            }
            extended.push(pred);
            // future shocks have zero expectation
            shocks.push(0.0);
        }

        let forecast_diff = &extended[self.differenced.len()..];
        integrate(forecast_diff, &self.history, self.order.d)
    }
}

/// One-step residuals and their sum of squares from `start` onward.
fn conditional_residuals(
    series: &[f64],
    intercept: f64,
    ar: &[f64],
    ma: &[f64],
    start: usize,
) -> (Vec<f64>, f64) {
    let n = series.len();
    let mut residuals = vec![0.0; n];
    let mut css = 0.0;

    for t in start..n {
        let mut pred = intercept;
        for (i, phi) in ar.iter().enumerate() {
            pred += phi * (series[t - 1 - i] - intercept);
        }
        for (i, theta) in ma.iter().enumerate() {
            pred += theta * residuals[t - 1 - i];
        }
        let error = series[t] - pred;
        residuals[t] = error;
        css += error * error;
    }

    if css.is_nan() {
        css = f64::INFINITY;
    }
    (residuals, css)
}
