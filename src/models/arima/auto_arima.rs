//! Automatic ARIMA order selection.

use crate::core::{ForecastResult, TimeSeries};
use crate::error::{AnalyticsError, Result};
use crate::models::arima::diff::difference;
use crate::models::arima::model::{ArimaFit, ArimaOrder};
use crate::models::traits::{require_horizon, require_length};
use crate::models::Forecaster;
use crate::utils::stats::{variance, z_for_level};
use crate::validation::adf_test;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Configuration for [`Arima`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArimaConfig {
    /// Maximum AR order to consider.
    pub max_p: usize,
    /// Maximum differencing order.
    pub max_d: usize,
    /// Maximum MA order to consider.
    pub max_q: usize,
    /// Prediction interval level.
    pub confidence_level: f64,
    /// ADF significance used when choosing `d`.
    pub significance: f64,
}

impl Default for ArimaConfig {
    fn default() -> Self {
        Self {
            max_p: 5,
            max_d: 2,
            max_q: 5,
            confidence_level: 0.95,
            significance: 0.05,
        }
    }
}

impl ArimaConfig {
    /// Set maximum orders searched.
    pub fn with_max_orders(mut self, max_p: usize, max_d: usize, max_q: usize) -> Self {
        self.max_p = max_p;
        self.max_d = max_d;
        self.max_q = max_q;
        self
    }

    /// Set the prediction interval level.
    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    /// Set the ADF significance level.
    pub fn with_significance(mut self, significance: f64) -> Self {
        self.significance = significance;
        self
    }
}

/// ARIMA with differencing chosen by ADF tests and (p, q) by AIC.
#[derive(Debug, Clone)]
pub struct Arima {
    config: ArimaConfig,
    series: Option<TimeSeries>,
    fit: Option<ArimaFit>,
    candidates: Vec<(ArimaOrder, f64)>,
}

impl Arima {
    /// Minimum series length accepted by `fit`.
    pub const MIN_OBSERVATIONS: usize = 50;

    pub fn new() -> Self {
        Self::with_config(ArimaConfig::default())
    }

    pub fn with_config(config: ArimaConfig) -> Self {
        Self {
            config,
            series: None,
            fit: None,
            candidates: Vec::new(),
        }
    }

    pub fn config(&self) -> &ArimaConfig {
        &self.config
    }

    /// Order selected by the last fit.
    pub fn selected_order(&self) -> Option<ArimaOrder> {
        self.fit.as_ref().map(ArimaFit::order)
    }

    /// AIC of the selected order.
    pub fn aic(&self) -> Option<f64> {
        self.fit.as_ref().map(ArimaFit::aic)
    }

    /// Every order that produced a finite AIC during the last fit.
    pub fn candidates(&self) -> &[(ArimaOrder, f64)] {
        &self.candidates
    }
}

impl Default for Arima {
    fn default() -> Self {
        Self::new()
    }
}

/// Smallest `d <= max_d` whose differenced series passes the ADF test.
///
/// A differenced series with no variation counts as stationary.
pub fn select_differencing(values: &[f64], max_d: usize, significance: f64) -> usize {
    for d in 0..max_d {
        let differenced = difference(values, d);
        if variance(&differenced) <= 1e-12 {
            return d;
        }
        let test = adf_test(&differenced, None, significance);
        debug!(d, statistic = test.statistic, p_value = test.p_value, "ADF test");
        if test.is_stationary {
            return d;
        }
    }
    max_d
}

impl Forecaster for Arima {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        require_length("ARIMA", series, Self::MIN_OBSERVATIONS)?;
        let values = series.values();
        let d = select_differencing(values, self.config.max_d, self.config.significance);

        let mut candidates = Vec::new();
        let mut best: Option<ArimaFit> = None;
        for p in 0..=self.config.max_p {
            for q in 0..=self.config.max_q {
                let order = ArimaOrder::new(p, d, q);
                let fit = match ArimaFit::estimate(values, order) {
                    Ok(fit) if fit.aic().is_finite() => fit,
                    Ok(_) => {
                        debug!(%order, "skipping order with non-finite AIC");
                        continue;
                    }
                    Err(e) => {
                        debug!(%order, error = %e, "skipping order");
                        continue;
                    }
                };
                debug!(%order, aic = fit.aic(), converged = fit.converged(), "grid candidate");
                candidates.push((order, fit.aic()));

                let better = match &best {
                    None => true,
                    Some(current) => ranks_before(&fit, current),
                };
                if better {
                    best = Some(fit);
                }
            }
        }

        let best = best.ok_or_else(|| {
            AnalyticsError::ComputationError("no ARIMA order converged".to_string())
        })?;
        info!(order = %best.order(), aic = best.aic(), "selected ARIMA order");

        self.candidates = candidates;
        self.fit = Some(best);
        self.series = Some(series.clone());
        Ok(())
    }

    fn forecast(&self, horizon: usize) -> Result<ForecastResult> {
        let (fit, series) = match (&self.fit, &self.series) {
            (Some(fit), Some(series)) => (fit, series),
            _ => return Err(AnalyticsError::NotFitted),
        };
        require_horizon(horizon)?;

        let points = fit.forecast_levels(horizon);
        let sigma = fit.residual_variance().sqrt();
        let z = z_for_level(self.config.confidence_level);

        let mut lower = Vec::with_capacity(horizon);
        let mut upper = Vec::with_capacity(horizon);
        for (h, point) in points.iter().enumerate() {
            let half_width = z * sigma * ((h + 1) as f64).sqrt();
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
        self.fit.as_ref().map(ArimaFit::fitted_values)
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.fit.as_ref().map(ArimaFit::residuals)
    }

    fn name(&self) -> &str {
        "ARIMA"
    }

    fn min_observations(&self) -> usize {
        Self::MIN_OBSERVATIONS
    }
}

/// Lower AIC wins; ties go to smaller p + q, then smaller p.
fn ranks_before(candidate: &ArimaFit, current: &ArimaFit) -> bool {
    let a = candidate.order();
    let b = current.order();
    (candidate.aic(), a.complexity(), a.p) < (current.aic(), b.complexity(), b.p)
}
