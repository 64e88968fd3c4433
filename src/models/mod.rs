//! Forecasting models.

mod kind;
mod traits;

pub mod arima;
pub mod seasonal;
pub mod sequence;

pub use arima::{Arima, ArimaConfig, ArimaOrder};
pub use kind::{AnyModel, ModelConfigs, ModelKind};
pub use seasonal::{SeasonalConfig, SeasonalModel};
pub use sequence::{SequenceConfig, SequenceModel};
pub use traits::Forecaster;
