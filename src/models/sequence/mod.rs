//! Recurrent neural network forecaster.

mod model;
mod network;

pub use model::{SequenceConfig, SequenceModel};
