//! ARIMA (Autoregressive Integrated Moving Average) models.
//!
//! This module provides:
//! - Fixed-order estimation by conditional sum of squares
//! - [`Arima`], which picks `d` by ADF tests and `(p, q)` by AIC

mod auto_arima;
mod diff;
mod model;

pub use auto_arima::{select_differencing, Arima, ArimaConfig};
pub use diff::{difference, integrate};
pub use model::{ArimaFit, ArimaOrder};
