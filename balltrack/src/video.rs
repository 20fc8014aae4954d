//! Video file decoding through OpenCV
//! Only available with the `opencv` feature.

#[cfg(target_os = "macos")]
use opencv::core::AlgorithmHint;
use opencv::{
    core::Mat,
    imgproc::{cvt_color, COLOR_BGR2RGB},
    prelude::*,
    videoio::{VideoCapture, CAP_ANY},
};

use image::RgbImage;

use crate::error::{Result, TrackingError};
use crate::source::FrameSource;
use crate::types::Frame;

/// Frames of a video file, in decoding order
pub struct VideoFileSource {
    cap: VideoCapture,
    next_id: u64,
}

impl VideoFileSource {
    pub fn open(file_path: &str) -> Result<Self> {
        let cap = VideoCapture::from_file(file_path, CAP_ANY)
            .map_err(|e| TrackingError::input(format!("Failed to open video file: {}", e)))?;

        if !cap
            .is_opened()
            .map_err(|e| TrackingError::input(format!("Video file check failed: {}", e)))?
        {
            return Err(TrackingError::input(format!(
                "Could not open video file {}",
                file_path
            )));
        }

        log::info!("Video file opened: {}", file_path);
        Ok(Self { cap, next_id: 0 })
    }

    /// Convert an OpenCV BGR Mat to an RGB image
    fn mat_to_rgb(mat: &Mat) -> Result<RgbImage> {
        let mut rgb_mat = Mat::default();

        // macOS OpenCV requires AlgorithmHint parameter, Linux does not
        #[cfg(target_os = "macos")]
        cvt_color(
            mat,
            &mut rgb_mat,
            COLOR_BGR2RGB,
            0,
            AlgorithmHint::ALGO_HINT_DEFAULT,
        )
        .map_err(|e| TrackingError::input(format!("Color conversion failed: {}", e)))?;

        #[cfg(not(target_os = "macos"))]
        cvt_color(mat, &mut rgb_mat, COLOR_BGR2RGB, 0)
            .map_err(|e| TrackingError::input(format!("Color conversion failed: {}", e)))?;

        let width = rgb_mat.cols() as u32;
        let height = rgb_mat.rows() as u32;
        let data = rgb_mat
            .data_bytes()
            .map_err(|e| TrackingError::input(format!("Mat data extraction failed: {}", e)))?
            .to_vec();

        RgbImage::from_vec(width, height, data)
            .ok_or_else(|| TrackingError::input("Decoded frame has an unexpected layout"))
    }
}

impl FrameSource for VideoFileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut mat = Mat::default();
        let grabbed = self
            .cap
            .read(&mut mat)
            .map_err(|e| TrackingError::input(format!("Frame read failed: {}", e)))?;

        // End of video
        if !grabbed || mat.empty() {
            return Ok(None);
        }

        let frame = Frame::new(self.next_id, Self::mat_to_rgb(&mat)?);
        self.next_id += 1;
        Ok(Some(frame))
    }
}
