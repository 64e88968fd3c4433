//! Forecaster trait defining the common interface for all models.

use crate::core::{ForecastResult, TimeSeries};
use crate::error::{AnalyticsError, Result};

/// Common interface for all forecasting models.
///
/// Models are fitted fresh per request; `forecast` never mutates the model.
pub trait Forecaster {
    /// Fit the model to the time series data.
    ///
    /// Fails with `InsufficientData` below [`Forecaster::min_observations`].
    fn fit(&mut self, series: &TimeSeries) -> Result<()>;

    /// Forecast `horizon` steps past the end of the fitted series.
    ///
    /// Fails with `NotFitted` before `fit` and `InvalidParameter` for a zero horizon.
    fn forecast(&self, horizon: usize) -> Result<ForecastResult>;

    /// In-sample one-step predictions.
    fn fitted_values(&self) -> Option<&[f64]>;

    /// Residuals (actual - fitted).
    fn residuals(&self) -> Option<&[f64]>;

    /// Get the model name.
    fn name(&self) -> &str;

    /// Minimum series length accepted by `fit`.
    fn min_observations(&self) -> usize;

    /// Check if the model has been fitted.
    fn is_fitted(&self) -> bool {
        self.fitted_values().is_some()
    }
}

/// Reject series shorter than `needed`.
pub(crate) fn require_length(model: &str, series: &TimeSeries, needed: usize) -> Result<()> {
    if series.len() < needed {
        return Err(AnalyticsError::insufficient(model, needed, series.len()));
    }
    Ok(())
}

/// Reject a zero forecast horizon.
pub(crate) fn require_horizon(horizon: usize) -> Result<()> {
    if horizon == 0 {
        return Err(AnalyticsError::InvalidParameter(
            "horizon must be positive".to_string(),
        ));
    }
    Ok(())
}
