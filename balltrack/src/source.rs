//! Frame sources feeding the tracking loop

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::error::{Result, TrackingError};
use crate::types::Frame;

/// Sequential producer of frames. `Ok(None)` marks the end of the sequence.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }
}

/// In-memory frames, numbered in order
pub struct VecSource {
    frames: VecDeque<RgbImage>,
    next_id: u64,
}

impl VecSource {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self {
            frames: frames.into(),
            next_id: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for VecSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.pop_front().map(|image| {
            let frame = Frame::new(self.next_id, image);
            self.next_id += 1;
            frame
        }))
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Image files of a directory, decoded lazily in file-name order
pub struct ImageSequenceSource {
    paths: VecDeque<PathBuf>,
    next_id: u64,
}

impl ImageSequenceSource {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| {
            TrackingError::input(format!("Failed to open image directory {}: {}", dir.display(), e))
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if path.is_file() && is_image {
                paths.push(path);
            }
        }
        paths.sort();

        if paths.is_empty() {
            log::warn!("No image files found in {}", dir.display());
        } else {
            log::info!("Image sequence opened: {} ({} frames)", dir.display(), paths.len());
        }

        Ok(Self {
            paths: paths.into(),
            next_id: 0,
        })
    }

    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };
        let image = image::open(&path).map_err(|e| {
            TrackingError::input(format!("Failed to decode {}: {}", path.display(), e))
        })?;
        let frame = Frame::from_dynamic(self.next_id, image);
        self.next_id += 1;
        Ok(Some(frame))
    }
}
