//! Trajectory store: measured, predicted, estimated and final positions

use serde::{Deserialize, Serialize};
use std::fmt;

/// 2D position in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub x: f32,
    pub y: f32,
}

impl TrajectoryPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &TrajectoryPoint) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl fmt::Display for TrajectoryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// Where a final-trajectory entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointSource {
    Measured,
    Predicted,
    Estimated,
}

/// One entry of the final trajectory, bound to the frame it was produced for
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinalPoint {
    pub frame_id: u64,
    pub point: TrajectoryPoint,
    pub source: PointSource,
}

/// Append-only per-run trajectory sequences
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trajectory {
    measured: Vec<TrajectoryPoint>,
    predicted: Vec<TrajectoryPoint>,
    estimated: Vec<TrajectoryPoint>,
    #[serde(rename = "final")]
    final_points: Vec<FinalPoint>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_measured(&mut self, point: TrajectoryPoint) {
        self.measured.push(point);
    }

    /// Record the prediction for `frame_id`; it also opens that frame's final entry
    pub fn record_predicted(&mut self, frame_id: u64, point: TrajectoryPoint) {
        self.predicted.push(point);
        self.final_points.push(FinalPoint {
            frame_id,
            point,
            source: PointSource::Predicted,
        });
    }

    /// Record the corrected estimate for `frame_id`, replacing that frame's final entry.
    ///
    /// Returns false (and leaves the final trajectory untouched) when no
    /// prediction was recorded for `frame_id`.
    pub fn record_estimated(&mut self, frame_id: u64, point: TrajectoryPoint) -> bool {
        self.estimated.push(point);
        // Entries are in frame order, the match is almost always the last one
        match self
            .final_points
            .iter_mut()
            .rev()
            .find(|entry| entry.frame_id == frame_id)
        {
            Some(entry) => {
                entry.point = point;
                entry.source = PointSource::Estimated;
                true
            }
            None => {
                log::warn!("No final trajectory entry for frame {}", frame_id);
                false
            }
        }
    }

    pub fn measured(&self) -> &[TrajectoryPoint] {
        &self.measured
    }

    pub fn predicted(&self) -> &[TrajectoryPoint] {
        &self.predicted
    }

    pub fn estimated(&self) -> &[TrajectoryPoint] {
        &self.estimated
    }

    pub fn final_points(&self) -> &[FinalPoint] {
        &self.final_points
    }

    /// Positions of the final trajectory in frame order
    pub fn final_positions(&self) -> impl Iterator<Item = TrajectoryPoint> + '_ {
        self.final_points.iter().map(|entry| entry.point)
    }

    /// Final entry of a given frame, if the frame was tracked
    pub fn final_for_frame(&self, frame_id: u64) -> Option<&FinalPoint> {
        self.final_points
            .iter()
            .rev()
            .find(|entry| entry.frame_id == frame_id)
    }

    pub fn is_empty(&self) -> bool {
        self.measured.is_empty() && self.predicted.is_empty()
    }

    pub fn clear(&mut self) {
        self.measured.clear();
        self.predicted.clear();
        self.estimated.clear();
        self.final_points.clear();
    }
}
