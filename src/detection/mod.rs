//! Detection utilities for time series analysis.
//!
//! This module provides tools for detecting:
//! - Dominant seasonal periods (FFT periodogram)
//! - Outliers via interquartile fences

pub mod fft;
mod outlier;

pub use fft::{detect_period, periodogram};
pub use outlier::{iqr_fences, iqr_outliers, IqrFences};
