//! Error types for the Kalman estimation library

use thiserror::Error;

/// Result type alias for filter operations
pub type Result<T> = std::result::Result<T, FilterError>;

/// Errors raised by the motion models and the Kalman estimator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Estimator used before initialization")]
    NotInitialized,

    #[error("Dimension mismatch for {what}: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Invalid filter parameter: {0}")]
    InvalidParameter(String),

    #[error("Innovation covariance is not invertible")]
    SingularInnovation,

    #[error("Unknown motion model: {0}")]
    UnknownModel(String),
}

impl FilterError {
    pub fn dimension(what: &'static str, expected: (usize, usize), actual: (usize, usize)) -> Self {
        Self::DimensionMismatch {
            what,
            expected,
            actual,
        }
    }

    pub fn parameter<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameter(msg.into())
    }
}
