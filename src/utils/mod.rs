//! Numerical utilities shared by the models and market analyses.

pub mod metrics;
pub mod ols;
pub mod optimization;
pub mod stats;

pub use metrics::{evaluate, evaluate_with_intervals, EvaluationMetrics};
pub use ols::{least_squares, linear_regression, LeastSquares, LinearFit};
pub use optimization::{nelder_mead, NelderMeadConfig, NelderMeadResult};
pub use stats::{quantile_normal, z_for_level};
