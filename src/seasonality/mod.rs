//! Seasonal decomposition.
//!
//! Classical moving-average decomposition into trend, seasonal and residual
//! components, additive or multiplicative.

mod decompose;

pub use decompose::{decompose, DecompositionMode, DecompositionResult};
