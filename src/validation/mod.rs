//! Statistical tests on series.

pub mod stationarity;

pub use stationarity::{adf_test, mackinnon_p_value, CriticalValues, StationarityResult};
