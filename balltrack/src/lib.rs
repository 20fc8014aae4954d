//! Single-Object Blob Tracking Library
//!
//! Tracks one moving object through a video: an adaptive per-pixel background
//! model separates the foreground, the largest connected blob is taken as the
//! measurement, and a Kalman estimator (from `kftrack`) smooths and predicts
//! its position. Results are kept as measured, predicted, estimated and final
//! trajectories.

pub mod blob_detector;
pub mod error;
pub mod foreground;
pub mod image_utils;
pub mod render;
pub mod source;
pub mod tracking;
pub mod tracking_types;
pub mod types;

#[cfg(feature = "opencv")]
pub mod video;

pub use blob_detector::{BlobDetector, Component};
pub use error::{Result, TrackingError};
pub use foreground::{ForegroundConfig, ForegroundExtractor};
pub use render::{AnnotatedFrameWriter, NullSink, SinkControl, TrackingSink};
pub use source::{FrameSource, ImageSequenceSource, VecSource};
pub use tracking::{RunSummary, TrackStep, TrackingController};
pub use tracking_types::TrackerConfig;
pub use types::{Blob, Frame, FrameReport};

#[cfg(feature = "opencv")]
pub use video::VideoFileSource;

pub use kftrack::{MotionModel, PointSource, Trajectory, TrajectoryPoint};

/// Get library version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
