/// Configuration types for the tracking pipeline
///
/// All tunables of a run are gathered in [`TrackerConfig`], resolved once at
/// startup and never changed during the run.
use kftrack::{KalmanConfig, MotionModel};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, TrackingError};
use crate::foreground::ForegroundConfig;

/// Configuration of one tracking run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Kinematic model of the estimator
    pub motion_model: MotionModel,
    /// Background adaptation rate; lower keeps slow objects in the foreground longer.
    /// Negative selects the automatic rate.
    pub learning_rate: f64,
    /// Minimum blob size (width, height), compared strictly
    pub min_blob_size: (u32, u32),
    /// Background model parameters
    pub foreground: ForegroundConfig,
    /// Estimator noise parameters
    pub kalman: KalmanConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            motion_model: MotionModel::ConstantAcceleration,
            learning_rate: 0.001,
            min_blob_size: (10, 10),
            foreground: ForegroundConfig::default(),
            kalman: KalmanConfig::default(),
        }
    }
}

impl TrackerConfig {
    pub fn with_motion_model(mut self, model: MotionModel) -> Self {
        self.motion_model = model;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_min_blob_size(mut self, width: u32, height: u32) -> Self {
        self.min_blob_size = (width, height);
        self
    }

    /// Load a configuration from a JSON file; missing fields keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&text)?;
        log::info!("Loaded tracker configuration from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.learning_rate.is_finite() || self.learning_rate > 1.0 {
            return Err(TrackingError::config(format!(
                "learning_rate must be finite and at most 1, got {}",
                self.learning_rate
            )));
        }
        self.foreground.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_setup() {
        let config = TrackerConfig::default();
        assert_eq!(config.learning_rate, 0.001);
        assert_eq!(config.min_blob_size, (10, 10));
        assert_eq!(config.foreground.history, 50);
        assert_eq!(config.foreground.var_threshold, 16.0);
        assert!(config.foreground.detect_shadows);
        assert_eq!(config.kalman.measurement_noise, 50.0);
        assert_eq!(config.kalman.initial_covariance, 1e5);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = TrackerConfig::from_json_str(
            r#"{
                "motion_model": "constant_velocity",
                "learning_rate": 0.01,
                "foreground": { "morph_radius": 2 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.motion_model, MotionModel::ConstantVelocity);
        assert_eq!(config.learning_rate, 0.01);
        assert_eq!(config.foreground.morph_radius, 2);
        assert_eq!(config.foreground.max_modes, 5);
        assert_eq!(config.min_blob_size, (10, 10));
    }

    #[test]
    fn test_json_round_trip() {
        let config = TrackerConfig::default()
            .with_motion_model(MotionModel::ConstantVelocity)
            .with_min_blob_size(4, 6);
        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(TrackerConfig::from_json_str(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            TrackerConfig::from_json_str(r#"{ "learning_rate": 2.0 }"#),
            Err(TrackingError::ConfigError(_))
        ));
        assert!(matches!(
            TrackerConfig::from_json_str(r#"{ "motion_model": "jerk" }"#),
            Err(TrackingError::SerializationError(_))
        ));
    }
}
