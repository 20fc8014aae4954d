//! Single-object Kalman estimator driven by a [`MotionModel`]
//!
//! The estimator is a small state machine: it starts `Uninitialized`, is
//! seeded by the first position measurement and from then on alternates
//! `predict` (every frame) and `correct` (frames with a measurement).

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{FilterError, Result};
use crate::kalman::{KalmanFilter, KalmanFilterParams};
use crate::motion_model::MotionModel;
use crate::trajectory::TrajectoryPoint;

/// Noise configuration of the estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanConfig {
    /// Diagonal of the initial error covariance P (total initial uncertainty)
    pub initial_covariance: f32,
    /// Diagonal of the measurement noise covariance R (pixels^2)
    pub measurement_noise: f32,
    /// Optional override of the process noise diagonal Q, one entry per state
    pub process_noise: Option<Vec<f32>>,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            initial_covariance: 1e5,
            measurement_noise: 50.0,
            process_noise: None,
        }
    }
}

impl KalmanConfig {
    /// Process noise diagonal for `model`, checked against its state size
    pub fn process_noise_for(&self, model: MotionModel) -> Result<Vec<f32>> {
        let diag = match &self.process_noise {
            Some(q) => q.clone(),
            None => model.default_process_noise(),
        };
        if diag.len() != model.state_dim() {
            return Err(FilterError::dimension(
                "Q",
                (model.state_dim(), 1),
                (diag.len(), 1),
            ));
        }
        if diag.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(FilterError::parameter(
                "process noise must be finite and non-negative",
            ));
        }
        Ok(diag)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("initial_covariance", self.initial_covariance),
            ("measurement_noise", self.measurement_noise),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(FilterError::parameter(format!(
                    "{} must be finite and positive, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum EstimatorState {
    Uninitialized,
    Tracking(KalmanFilter),
}

/// Kalman estimator for the (x, y) position of one object
#[derive(Debug, Clone)]
pub struct KalmanEstimator {
    model: MotionModel,
    transition: DMatrix<f32>,
    process_noise: DMatrix<f32>,
    measurement: DMatrix<f32>,
    initial_covariance: DMatrix<f32>,
    measurement_noise: DMatrix<f32>,
    state: EstimatorState,
}

impl KalmanEstimator {
    /// Create an uninitialized estimator; fails fast on inconsistent configuration
    pub fn new(model: MotionModel, config: &KalmanConfig) -> Result<Self> {
        config.validate()?;
        let n = model.state_dim();
        let m = model.measurement_dim();
        let q = config.process_noise_for(model)?;

        let estimator = Self {
            model,
            transition: model.transition(),
            process_noise: DMatrix::from_diagonal(&DVector::from_vec(q)),
            measurement: model.measurement(),
            initial_covariance: DMatrix::identity(n, n) * config.initial_covariance,
            measurement_noise: DMatrix::identity(m, m) * config.measurement_noise,
            state: EstimatorState::Uninitialized,
        };

        // Validate the matrix set once so that initialize() cannot fail on shapes
        estimator.params(DVector::zeros(n)).validate()?;

        log::debug!(
            "Created Kalman estimator: model={}, dim_x={}, dim_z={}, P0={}, R={}",
            model,
            n,
            m,
            config.initial_covariance,
            config.measurement_noise
        );
        Ok(estimator)
    }

    fn params(&self, x: DVector<f32>) -> KalmanFilterParams {
        KalmanFilterParams {
            dim_x: self.model.state_dim(),
            dim_z: self.model.measurement_dim(),
            x,
            p: self.initial_covariance.clone(),
            f: self.transition.clone(),
            h: self.measurement.clone(),
            r: self.measurement_noise.clone(),
            q: self.process_noise.clone(),
        }
    }

    /// Seed the filter at `measurement` with zero velocity (and acceleration)
    pub fn initialize(&mut self, measurement: TrajectoryPoint) -> Result<()> {
        let mut x = DVector::zeros(self.model.state_dim());
        let (ix, iy) = self.model.position_indices();
        x[ix] = measurement.x;
        x[iy] = measurement.y;
        self.initialize_with_state(x)
    }

    /// Seed the filter with a complete state vector in the model's layout
    pub fn initialize_with_state(&mut self, state: DVector<f32>) -> Result<()> {
        let filter = KalmanFilter::new(self.params(state))?;
        if self.is_initialized() {
            log::debug!("Re-initializing Kalman estimator");
        }
        self.state = EstimatorState::Tracking(filter);
        Ok(())
    }

    /// Time update: x = A x, P = A P A^T + Q. Returns the predicted position.
    pub fn predict(&mut self) -> Result<TrajectoryPoint> {
        let filter = self.filter_mut()?;
        filter.predict();
        self.position()
    }

    /// Measurement update with the observed position. Returns the corrected position.
    pub fn correct(&mut self, measurement: TrajectoryPoint) -> Result<TrajectoryPoint> {
        let z = DVector::from_vec(vec![measurement.x, measurement.y]);
        self.filter_mut()?.update(&z)?;
        self.position()
    }

    fn filter_mut(&mut self) -> Result<&mut KalmanFilter> {
        match &mut self.state {
            EstimatorState::Tracking(filter) => Ok(filter),
            EstimatorState::Uninitialized => Err(FilterError::NotInitialized),
        }
    }

    fn filter(&self) -> Result<&KalmanFilter> {
        match &self.state {
            EstimatorState::Tracking(filter) => Ok(filter),
            EstimatorState::Uninitialized => Err(FilterError::NotInitialized),
        }
    }

    /// Current position estimate
    pub fn position(&self) -> Result<TrajectoryPoint> {
        let x = self.filter()?.state();
        let (ix, iy) = self.model.position_indices();
        Ok(TrajectoryPoint::new(x[ix], x[iy]))
    }

    /// Current velocity estimate (pixels per frame)
    pub fn velocity(&self) -> Result<TrajectoryPoint> {
        let x = self.filter()?.state();
        let (ix, iy) = self.model.velocity_indices();
        Ok(TrajectoryPoint::new(x[ix], x[iy]))
    }

    pub fn state(&self) -> Option<&DVector<f32>> {
        self.filter().ok().map(|f| f.state())
    }

    pub fn covariance(&self) -> Option<&DMatrix<f32>> {
        self.filter().ok().map(|f| f.covariance())
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, EstimatorState::Tracking(_))
    }

    pub fn model(&self) -> MotionModel {
        self.model
    }

    /// Drop the filter state, back to `Uninitialized`
    pub fn reset(&mut self) {
        self.state = EstimatorState::Uninitialized;
    }
}
