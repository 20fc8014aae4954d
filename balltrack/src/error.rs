//! Error types for the blob tracking pipeline

use kftrack::FilterError;
use thiserror::Error;

/// Result type alias for the tracking pipeline
pub type Result<T> = std::result::Result<T, TrackingError>;

/// Errors that can occur while running the tracker
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Frame source error: {0}")]
    SourceError(String),

    #[error("Invalid frame dimensions: expected {expected:?}, got {actual:?}")]
    InvalidDimensions {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Estimator error: {0}")]
    FilterError(#[from] FilterError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl TrackingError {
    pub fn input<S: Into<String>>(msg: S) -> Self {
        Self::SourceError(msg.into())
    }

    pub fn dimensions(expected: (u32, u32), actual: (u32, u32)) -> Self {
        Self::InvalidDimensions { expected, actual }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }
}
