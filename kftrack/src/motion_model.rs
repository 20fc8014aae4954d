//! Kinematic motion models for the single-object Kalman estimator
//!
//! A motion model fixes the state layout and the three constant matrices used
//! by the filter:
//! - `A`: state transition (one frame step)
//! - `Q`: process noise covariance
//! - `H`: measurement matrix picking the (x, y) position out of the state

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FilterError;

/// Number of measured quantities (x, y)
pub const MEASUREMENT_DIM: usize = 2;

/// Assumed kinematics of the tracked object between two frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionModel {
    /// State: [x, vx, y, vy]
    ConstantVelocity,
    /// State: [x, vx, ax, y, vy, ay]
    ConstantAcceleration,
}

impl Default for MotionModel {
    fn default() -> Self {
        Self::ConstantAcceleration
    }
}

impl MotionModel {
    /// Length of the state vector
    pub fn state_dim(&self) -> usize {
        match self {
            Self::ConstantVelocity => 4,
            Self::ConstantAcceleration => 6,
        }
    }

    /// Length of the measurement vector
    pub fn measurement_dim(&self) -> usize {
        MEASUREMENT_DIM
    }

    /// Number of state entries per axis (position, velocity[, acceleration])
    fn axis_len(&self) -> usize {
        self.state_dim() / 2
    }

    /// State indices holding the x and y positions
    pub fn position_indices(&self) -> (usize, usize) {
        (0, self.axis_len())
    }

    /// State indices holding the x and y velocities
    pub fn velocity_indices(&self) -> (usize, usize) {
        (1, self.axis_len() + 1)
    }

    /// Transition matrix A for a unit time step
    pub fn transition(&self) -> DMatrix<f32> {
        let n = self.axis_len();
        let mut a = DMatrix::identity(self.state_dim(), self.state_dim());
        for axis in 0..2 {
            let o = axis * n;
            // p += v
            a[(o, o + 1)] = 1.0;
            if let Self::ConstantAcceleration = self {
                // p += 0.5 a, v += a
                a[(o, o + 2)] = 0.5;
                a[(o + 1, o + 2)] = 1.0;
            }
        }
        a
    }

    /// Diagonal of the default process noise Q, position terms first
    pub fn default_process_noise(&self) -> Vec<f32> {
        let axis: &[f32] = match self {
            Self::ConstantVelocity => &[25.0, 10.0],
            Self::ConstantAcceleration => &[25.0, 10.0, 1.0],
        };
        axis.iter().chain(axis.iter()).copied().collect()
    }

    /// Process noise covariance Q with the default diagonal
    pub fn process_noise(&self) -> DMatrix<f32> {
        DMatrix::from_diagonal(&DVector::from_vec(self.default_process_noise()))
    }

    /// Measurement matrix H, selecting the x and y positions
    pub fn measurement(&self) -> DMatrix<f32> {
        let (ix, iy) = self.position_indices();
        let mut h = DMatrix::zeros(MEASUREMENT_DIM, self.state_dim());
        h[(0, ix)] = 1.0;
        h[(1, iy)] = 1.0;
        h
    }
}

impl fmt::Display for MotionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConstantVelocity => write!(f, "Constant Velocity"),
            Self::ConstantAcceleration => write!(f, "Constant Acceleration"),
        }
    }
}

impl FromStr for MotionModel {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "velocity" | "constant_velocity" | "cv" => Ok(Self::ConstantVelocity),
            "acceleration" | "constant_acceleration" | "ca" => Ok(Self::ConstantAcceleration),
            other => Err(FilterError::UnknownModel(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions() {
        assert_eq!(MotionModel::ConstantVelocity.state_dim(), 4);
        assert_eq!(MotionModel::ConstantAcceleration.state_dim(), 6);
        assert_eq!(MotionModel::ConstantVelocity.position_indices(), (0, 2));
        assert_eq!(MotionModel::ConstantAcceleration.position_indices(), (0, 3));
    }

    #[test]
    fn test_constant_velocity_matrices() {
        let model = MotionModel::ConstantVelocity;
        let expected_a = DMatrix::from_row_slice(
            4,
            4,
            &[
                1.0, 1.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 0.0, //
                0.0, 0.0, 1.0, 1.0, //
                0.0, 0.0, 0.0, 1.0,
            ],
        );
        assert_eq!(model.transition(), expected_a);

        let expected_h = DMatrix::from_row_slice(2, 4, &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(model.measurement(), expected_h);
        assert_eq!(model.default_process_noise(), vec![25.0, 10.0, 25.0, 10.0]);
    }

    #[test]
    fn test_constant_acceleration_matrices() {
        let model = MotionModel::ConstantAcceleration;
        let a = model.transition();
        assert_eq!(a[(0, 1)], 1.0);
        assert_eq!(a[(0, 2)], 0.5);
        assert_eq!(a[(1, 2)], 1.0);
        assert_eq!(a[(3, 4)], 1.0);
        assert_eq!(a[(3, 5)], 0.5);
        assert_eq!(a[(4, 5)], 1.0);
        // No coupling between the axes
        assert_eq!(a[(0, 3)], 0.0);
        assert_eq!(a[(3, 0)], 0.0);

        let h = model.measurement();
        assert_eq!(h[(0, 0)], 1.0);
        assert_eq!(h[(1, 3)], 1.0);
        assert_eq!(h.sum(), 2.0);

        let q = model.process_noise();
        assert!(q[(0, 0)] > q[(1, 1)] && q[(1, 1)] > q[(2, 2)]);
    }

    #[test]
    fn test_parse_model() {
        assert_eq!(
            "velocity".parse::<MotionModel>().unwrap(),
            MotionModel::ConstantVelocity
        );
        assert_eq!(
            "Acceleration".parse::<MotionModel>().unwrap(),
            MotionModel::ConstantAcceleration
        );
        assert!(matches!(
            "jerk".parse::<MotionModel>(),
            Err(FilterError::UnknownModel(_))
        ));
    }
}
