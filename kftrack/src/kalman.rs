//! Linear Kalman filter core

use nalgebra::{DMatrix, DVector};

use crate::error::{FilterError, Result};

#[derive(Debug, Clone)]
pub struct KalmanFilterParams {
    pub dim_x: usize,    // State dimension
    pub dim_z: usize,    // Observation dimension
    pub x: DVector<f32>, // Initial state
    pub p: DMatrix<f32>, // Initial state covariance
    pub f: DMatrix<f32>, // State transition matrix
    pub h: DMatrix<f32>, // Observation matrix
    pub r: DMatrix<f32>, // Observation noise covariance
    pub q: DMatrix<f32>, // Process noise covariance
}

impl KalmanFilterParams {
    /// Check every matrix against the declared state/observation dimensions
    pub fn validate(&self) -> Result<()> {
        let (nx, nz) = (self.dim_x, self.dim_z);
        if nx == 0 || nz == 0 {
            return Err(FilterError::parameter("filter dimensions must be non-zero"));
        }
        check_shape("x", (nx, 1), self.x.shape())?;
        check_shape("P", (nx, nx), self.p.shape())?;
        check_shape("F", (nx, nx), self.f.shape())?;
        check_shape("H", (nz, nx), self.h.shape())?;
        check_shape("R", (nz, nz), self.r.shape())?;
        check_shape("Q", (nx, nx), self.q.shape())?;
        Ok(())
    }
}

fn check_shape(what: &'static str, expected: (usize, usize), actual: (usize, usize)) -> Result<()> {
    if expected != actual {
        return Err(FilterError::dimension(what, expected, actual));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    pub dim_x: usize,
    pub dim_z: usize,
    pub x: DVector<f32>, // State vector
    pub p: DMatrix<f32>, // State covariance matrix
    pub f: DMatrix<f32>, // State transition matrix
    pub h: DMatrix<f32>, // Observation matrix
    pub r: DMatrix<f32>, // Observation noise covariance
    pub q: DMatrix<f32>, // Process noise covariance
    pub y: DVector<f32>, // Residual
    pub s: DMatrix<f32>, // Innovation covariance
    pub k: DMatrix<f32>, // Kalman gain
}

impl KalmanFilter {
    /// Build a filter, rejecting inconsistent matrix shapes
    pub fn new(params: KalmanFilterParams) -> Result<Self> {
        params.validate()?;
        let dim_x = params.dim_x;
        let dim_z = params.dim_z;

        Ok(Self {
            dim_x,
            dim_z,
            x: params.x,
            p: params.p,
            f: params.f,
            h: params.h,
            r: params.r,
            q: params.q,
            y: DVector::zeros(dim_z),
            s: DMatrix::zeros(dim_z, dim_z),
            k: DMatrix::zeros(dim_x, dim_z),
        })
    }

    /// Predict the next state
    pub fn predict(&mut self) {
        // x = F * x
        self.x = &self.f * &self.x;

        // P = F * P * F^T + Q
        self.p = &self.f * &self.p * self.f.transpose() + &self.q;
    }

    /// Correct the predicted state with an observation
    pub fn update(&mut self, z: &DVector<f32>) -> Result<()> {
        check_shape("z", (self.dim_z, 1), z.shape())?;

        // Innovation covariance: S = H * P * H^T + R
        let s = &self.h * &self.p * self.h.transpose() + &self.r;
        let s_inv = s.clone().try_inverse().ok_or(FilterError::SingularInnovation)?;

        // Residual: y = z - H * x
        self.y = z - &self.h * &self.x;
        self.s = s;

        // Kalman gain: K = P * H^T * S^-1
        self.k = &self.p * self.h.transpose() * s_inv;

        // x = x + K * y
        self.x = &self.x + &self.k * &self.y;

        // P = (I - K * H) * P
        let i = DMatrix::identity(self.dim_x, self.dim_x);
        self.p = (i - &self.k * &self.h) * &self.p;

        Ok(())
    }

    pub fn state(&self) -> &DVector<f32> {
        &self.x
    }

    pub fn covariance(&self) -> &DMatrix<f32> {
        &self.p
    }
}
