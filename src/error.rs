//! Error types for the market-analytics library.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;

/// Why a single forecasting candidate was excluded from selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateFailure {
    /// Model name, e.g. "ARIMA".
    pub model: String,
    /// Human readable failure reason.
    pub reason: String,
}

impl CandidateFailure {
    pub fn new(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            reason: reason.into(),
        }
    }
}

fn describe_failures(failures: &[CandidateFailure]) -> String {
    if failures.is_empty() {
        return "no candidates requested".to_string();
    }
    failures
        .iter()
        .map(|f| format!("{}: {}", f.model, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur during forecasting and market analysis.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Series or record set shorter than an operation requires.
    #[error("insufficient data for {context}: need at least {needed}, got {got}")]
    InsufficientData {
        context: String,
        needed: usize,
        got: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Timestamp-related error.
    #[error("timestamp error: {0}")]
    TimestampError(String),

    /// Forecast requested before fit.
    #[error("model must be fitted before forecasting")]
    NotFitted,

    /// Missing values detected when not allowed.
    #[error("missing values detected in data")]
    MissingValues,

    /// MCDA weights do not form a valid distribution.
    #[error("invalid weights (sum = {sum}): {detail}")]
    InvalidWeights { sum: f64, detail: String },

    /// Upstream data fetch failed or timed out.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// Every forecasting candidate failed.
    #[error("no viable model: {}", describe_failures(.failures))]
    NoViableModel { failures: Vec<CandidateFailure> },

    /// Expected column absent from a fetched table.
    #[error("missing column: {0}")]
    MissingColumn(String),

    /// Currency with no configured exchange rate.
    #[error("unknown currency: {0}")]
    UnknownCurrency(String),

    /// Numerical problem such as non-convergence or divergence.
    #[error("computation error: {0}")]
    ComputationError(String),
}

impl AnalyticsError {
    /// Shorthand for [`AnalyticsError::InsufficientData`].
    pub fn insufficient(context: impl Into<String>, needed: usize, got: usize) -> Self {
        Self::InsufficientData {
            context: context.into(),
            needed,
            got,
        }
    }

    /// Stable discriminator callers can match on without parsing messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyData => "empty_data",
            Self::InsufficientData { .. } => "insufficient_data",
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::TimestampError(_) => "timestamp_error",
            Self::NotFitted => "not_fitted",
            Self::MissingValues => "missing_values",
            Self::InvalidWeights { .. } => "invalid_weights",
            Self::DataUnavailable(_) => "data_unavailable",
            Self::NoViableModel { .. } => "no_viable_model",
            Self::MissingColumn(_) => "missing_column",
            Self::UnknownCurrency(_) => "unknown_currency",
            Self::ComputationError(_) => "computation_error",
        }
    }

    /// Whether retrying with the same inputs could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::DataUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_descriptive() {
        let err = AnalyticsError::EmptyData;
        assert_eq!(err.to_string(), "empty input data");

        let err = AnalyticsError::insufficient("ARIMA", 50, 12);
        assert_eq!(
            err.to_string(),
            "insufficient data for ARIMA: need at least 50, got 12"
        );

        let err = AnalyticsError::NotFitted;
        assert_eq!(err.to_string(), "model must be fitted before forecasting");

        let err = AnalyticsError::InvalidWeights {
            sum: 0.9,
            detail: "weights must sum to 1.0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid weights (sum = 0.9): weights must sum to 1.0"
        );
    }

    #[test]
    fn no_viable_model_lists_every_candidate() {
        let err = AnalyticsError::NoViableModel {
            failures: vec![
                CandidateFailure::new("ARIMA", "did not converge"),
                CandidateFailure::new("Sequence", "loss diverged"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "no viable model: ARIMA: did not converge; Sequence: loss diverged"
        );
    }

    #[test]
    fn kinds_are_stable() {
        assert_eq!(AnalyticsError::NotFitted.kind(), "not_fitted");
        assert_eq!(
            AnalyticsError::DataUnavailable("timeout".into()).kind(),
            "data_unavailable"
        );
        assert!(AnalyticsError::DataUnavailable("timeout".into()).is_transient());
        assert!(!AnalyticsError::EmptyData.is_transient());
    }

    #[test]
    fn errors_are_clonable_and_comparable() {
        let err1 = AnalyticsError::insufficient("trend analysis", 14, 3);
        let err2 = err1.clone();
        assert_eq!(err1, err2);
    }
}
