//! Closed set of forecasting models selectable by name.

use crate::core::{ForecastResult, TimeSeries};
use crate::error::{AnalyticsError, Result};
use crate::models::arima::{Arima, ArimaConfig};
use crate::models::seasonal::{SeasonalConfig, SeasonalModel};
use crate::models::sequence::{SequenceConfig, SequenceModel};
use crate::models::Forecaster;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Forecasting model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Arima,
    Seasonal,
    Sequence,
}

impl ModelKind {
    /// Every model, in candidate order.
    pub const ALL: [ModelKind; 3] = [ModelKind::Arima, ModelKind::Seasonal, ModelKind::Sequence];

    /// Display name used in forecasts and comparison tables.
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Arima => "ARIMA",
            ModelKind::Seasonal => "Seasonal",
            ModelKind::Sequence => "Sequence",
        }
    }

    /// Minimum series length the model accepts.
    pub fn min_observations(&self) -> usize {
        match self {
            ModelKind::Arima => Arima::MIN_OBSERVATIONS,
            ModelKind::Seasonal => SeasonalModel::MIN_OBSERVATIONS,
            ModelKind::Sequence => SequenceModel::MIN_OBSERVATIONS,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "arima" => Ok(ModelKind::Arima),
            "seasonal" => Ok(ModelKind::Seasonal),
            "sequence" | "lstm" | "rnn" => Ok(ModelKind::Sequence),
            other => Err(AnalyticsError::InvalidParameter(format!(
                "unknown model '{}'",
                other
            ))),
        }
    }
}

/// Per-model configuration bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfigs {
    pub arima: ArimaConfig,
    pub seasonal: SeasonalConfig,
    pub sequence: SequenceConfig,
}

/// A model of any kind, dispatching [`Forecaster`] calls by variant.
#[derive(Debug, Clone)]
pub enum AnyModel {
    Arima(Arima),
    Seasonal(SeasonalModel),
    Sequence(SequenceModel),
}

impl AnyModel {
    /// Unfitted model of `kind` configured from `configs`.
    pub fn new(kind: ModelKind, configs: &ModelConfigs) -> Self {
        match kind {
            ModelKind::Arima => AnyModel::Arima(Arima::with_config(configs.arima.clone())),
            ModelKind::Seasonal => {
                AnyModel::Seasonal(SeasonalModel::with_config(configs.seasonal.clone()))
            }
            ModelKind::Sequence => {
                AnyModel::Sequence(SequenceModel::with_config(configs.sequence.clone()))
            }
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            AnyModel::Arima(_) => ModelKind::Arima,
            AnyModel::Seasonal(_) => ModelKind::Seasonal,
            AnyModel::Sequence(_) => ModelKind::Sequence,
        }
    }

    fn inner(&self) -> &dyn Forecaster {
        match self {
            AnyModel::Arima(m) => m,
            AnyModel::Seasonal(m) => m,
            AnyModel::Sequence(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Forecaster {
        match self {
            AnyModel::Arima(m) => m,
            AnyModel::Seasonal(m) => m,
            AnyModel::Sequence(m) => m,
        }
    }
}

impl Forecaster for AnyModel {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        self.inner_mut().fit(series)
    }

    fn forecast(&self, horizon: usize) -> Result<ForecastResult> {
        self.inner().forecast(horizon)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.inner().fitted_values()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.inner().residuals()
    }

    fn name(&self) -> &str {
        self.inner().name()
    }

    fn min_observations(&self) -> usize {
        self.inner().min_observations()
    }
}
