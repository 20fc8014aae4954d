//! Kalman estimation for single-object 2D tracking
//!
//! This crate provides the estimation half of the blob tracker: kinematic
//! motion models, a linear Kalman filter, the single-object estimator state
//! machine built on top of it, and the trajectory store.
//!
//! ```rust,ignore
//! use kftrack::{KalmanConfig, KalmanEstimator, MotionModel, TrajectoryPoint};
//!
//! let mut kf = KalmanEstimator::new(MotionModel::ConstantVelocity, &KalmanConfig::default())?;
//! kf.initialize(TrajectoryPoint::new(120.0, 40.0))?;
//! let predicted = kf.predict()?;
//! let corrected = kf.correct(TrajectoryPoint::new(123.0, 41.0))?;
//! ```

pub mod error;
pub mod estimator;
pub mod kalman;
pub mod motion_model;
pub mod trajectory;

pub use error::{FilterError, Result};
pub use estimator::{KalmanConfig, KalmanEstimator};
pub use kalman::{KalmanFilter, KalmanFilterParams};
pub use motion_model::MotionModel;
pub use trajectory::{FinalPoint, PointSource, Trajectory, TrajectoryPoint};
