//! Core data types shared by the pipeline stages

use image::{GrayImage, RgbImage};
use kftrack::TrajectoryPoint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Frame with metadata
#[derive(Clone)]
pub struct Frame {
    pub frame_id: u64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(frame_id: u64, image: RgbImage) -> Self {
        Self { frame_id, image }
    }

    /// Build a frame from any decoded image; grayscale is expanded to RGB
    pub fn from_dynamic(frame_id: u64, image: image::DynamicImage) -> Self {
        Self::new(frame_id, image.to_rgb8())
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("frame_id", &self.frame_id)
            .field("dimensions", &self.image.dimensions())
            .finish()
    }
}

/// Axis-aligned bounding box of a foreground component, in pixels.
/// A zero-area blob means "nothing detected".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Blob {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Blob {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The "no detection" blob
    pub fn empty() -> Self {
        Self::default()
    }

    /// Bounding box spanning the inclusive pixel corners (x0, y0) .. (x1, y1)
    pub fn from_corners(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    /// Integer centre, used as the position measurement
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn center_point(&self) -> TrajectoryPoint {
        let (cx, cy) = self.center();
        TrajectoryPoint::new(cx as f32, cy as f32)
    }

    /// True when both sides are strictly larger than `min_size` (width, height)
    pub fn exceeds(&self, min_size: (u32, u32)) -> bool {
        self.width > min_size.0 && self.height > min_size.1
    }
}

impl fmt::Display for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Blob({}, {}, {}x{})",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Everything the pipeline produced for one frame
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame_id: u64,
    /// Cleaned binary foreground mask (0 / 255)
    pub mask: GrayImage,
    pub blob: Blob,
    /// Filter prediction for this frame, once tracking has started
    pub predicted: Option<TrajectoryPoint>,
    /// Corrected estimate, when the frame had a measurement and tracking was running
    pub estimated: Option<TrajectoryPoint>,
    /// True for the frame that seeded the estimator
    pub initialized_here: bool,
}

impl FrameReport {
    pub fn measurement(&self) -> Option<TrajectoryPoint> {
        (!self.blob.is_empty()).then(|| self.blob.center_point())
    }
}
