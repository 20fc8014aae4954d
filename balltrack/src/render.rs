//! Output sinks for the tracking loop
//!
//! A sink sees every processed frame together with the frame's report and
//! the trajectory so far, and gets one final call once the run ends. Its
//! return value is how a consumer stops a run early.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::RgbImage;
use kftrack::{PointSource, Trajectory};

use crate::error::Result;
use crate::image_utils::{
    draw_blob, draw_legend, draw_points, draw_polyline, mask_to_rgb, side_by_side, source_color,
    BLUE, FINAL_DOT_RADIUS, GREEN, RED, TRACK_DOT_RADIUS,
};
use crate::types::{Frame, FrameReport};

/// Whether the run should keep pulling frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkControl {
    Continue,
    Stop,
}

pub trait TrackingSink {
    fn on_frame(
        &mut self,
        frame: &Frame,
        report: &FrameReport,
        trajectory: &Trajectory,
    ) -> Result<SinkControl>;

    /// Called once after the last processed frame
    fn finish(&mut self, last_frame: Option<&Frame>, trajectory: &Trajectory) -> Result<()>;
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TrackingSink for NullSink {
    fn on_frame(&mut self, _: &Frame, _: &FrameReport, _: &Trajectory) -> Result<SinkControl> {
        Ok(SinkControl::Continue)
    }

    fn finish(&mut self, _: Option<&Frame>, _: &Trajectory) -> Result<()> {
        Ok(())
    }
}

/// Frame with the detected blob and all trajectory points drawn on it
pub fn render_tracking_overlay(
    frame: &Frame,
    report: &FrameReport,
    trajectory: &Trajectory,
) -> RgbImage {
    let mut canvas = frame.image.clone();
    draw_blob(&mut canvas, &report.blob, RED);

    for (points, source) in [
        (trajectory.predicted(), PointSource::Predicted),
        (trajectory.measured(), PointSource::Measured),
        (trajectory.estimated(), PointSource::Estimated),
    ] {
        draw_points(&mut canvas, points, TRACK_DOT_RADIUS, source_color(source));
    }

    draw_legend(
        &mut canvas,
        &[("Measurements", RED), ("Predictions", GREEN), ("Estimations", BLUE)],
    );
    canvas
}

/// Measurements and the final trajectory as connected dots over `base`
pub fn render_final_trajectory(base: &RgbImage, trajectory: &Trajectory) -> RgbImage {
    let mut canvas = base.clone();

    draw_points(&mut canvas, trajectory.measured(), FINAL_DOT_RADIUS, RED);
    draw_polyline(&mut canvas, trajectory.measured().iter().copied(), RED);

    let final_points: Vec<_> = trajectory.final_positions().collect();
    draw_points(&mut canvas, &final_points, FINAL_DOT_RADIUS, BLUE);
    draw_polyline(&mut canvas, final_points, BLUE);

    draw_legend(
        &mut canvas,
        &[("Measurements", RED), ("Final estimation trajectory", BLUE)],
    );
    canvas
}

/// Writes annotated frames as PNG files, then the final trajectory image and
/// `trajectory.json` when the run finishes
pub struct AnnotatedFrameWriter {
    output_dir: PathBuf,
    include_mask: bool,
    frame_limit: Option<u64>,
    frames_written: u64,
}

impl AnnotatedFrameWriter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)?;
        log::info!("Writing annotated frames to {}", output_dir.display());
        Ok(Self {
            output_dir,
            include_mask: false,
            frame_limit: None,
            frames_written: 0,
        })
    }

    /// Place the foreground mask to the right of each annotated frame
    pub fn with_mask(mut self, include_mask: bool) -> Self {
        self.include_mask = include_mask;
        self
    }

    /// Ask the run to stop once this many frames were written
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn frame_path(&self, frame_id: u64) -> PathBuf {
        self.output_dir.join(format!("frame_{:06}.png", frame_id))
    }
}

impl TrackingSink for AnnotatedFrameWriter {
    fn on_frame(
        &mut self,
        frame: &Frame,
        report: &FrameReport,
        trajectory: &Trajectory,
    ) -> Result<SinkControl> {
        let overlay = render_tracking_overlay(frame, report, trajectory);
        let output = if self.include_mask {
            side_by_side(&overlay, &mask_to_rgb(&report.mask))
        } else {
            overlay
        };
        output.save(self.frame_path(frame.frame_id))?;
        self.frames_written += 1;

        match self.frame_limit {
            Some(limit) if self.frames_written >= limit => {
                log::info!("Frame limit {} reached, stopping", limit);
                Ok(SinkControl::Stop)
            }
            _ => Ok(SinkControl::Continue),
        }
    }

    fn finish(&mut self, last_frame: Option<&Frame>, trajectory: &Trajectory) -> Result<()> {
        if let Some(frame) = last_frame {
            let final_image = render_final_trajectory(&frame.image, trajectory);
            final_image.save(self.output_dir.join("final_trajectory.png"))?;
        }

        let json_path = self.output_dir.join("trajectory.json");
        let writer = BufWriter::new(File::create(&json_path)?);
        serde_json::to_writer_pretty(writer, trajectory)?;

        log::info!(
            "Wrote {} frames and {} to {}",
            self.frames_written,
            json_path.display(),
            self.output_dir.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Blob;
    use image::GrayImage;
    use kftrack::TrajectoryPoint;

    fn sample_trajectory() -> Trajectory {
        let mut trajectory = Trajectory::new();
        trajectory.record_measured(TrajectoryPoint::new(10.0, 30.0));
        trajectory.record_predicted(1, TrajectoryPoint::new(10.0, 30.0));
        trajectory.record_measured(TrajectoryPoint::new(20.0, 30.0));
        trajectory.record_estimated(1, TrajectoryPoint::new(19.0, 30.0));
        trajectory
    }

    fn sample_report(frame_id: u64) -> FrameReport {
        FrameReport {
            frame_id,
            mask: GrayImage::new(48, 48),
            blob: Blob::new(14, 24, 12, 12),
            predicted: Some(TrajectoryPoint::new(10.0, 30.0)),
            estimated: Some(TrajectoryPoint::new(19.0, 30.0)),
            initialized_here: false,
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("balltrack_{}_{}", name, std::process::id()))
    }

    #[test]
    fn test_overlay_draws_estimate_on_top() {
        let frame = Frame::new(1, RgbImage::new(48, 48));
        let overlay = render_tracking_overlay(&frame, &sample_report(1), &sample_trajectory());
        assert_eq!(overlay.dimensions(), (48, 48));
        // Estimated dots are drawn last
        assert_eq!(*overlay.get_pixel(19, 30), BLUE);
        assert_eq!(*overlay.get_pixel(10, 30), RED);
    }

    #[test]
    fn test_final_image_connects_final_points() {
        let base = RgbImage::new(48, 48);
        let image = render_final_trajectory(&base, &sample_trajectory());
        assert_eq!(*image.get_pixel(19, 30), BLUE);
        assert_eq!(*image.get_pixel(14, 30), RED);
    }

    #[test]
    fn test_writer_outputs_and_frame_limit() {
        let dir = temp_dir("writer");
        let mut writer = AnnotatedFrameWriter::new(&dir)
            .unwrap()
            .with_mask(true)
            .with_frame_limit(2);
        let trajectory = sample_trajectory();

        let frame0 = Frame::new(0, RgbImage::new(48, 48));
        let frame1 = Frame::new(1, RgbImage::new(48, 48));
        assert_eq!(
            writer.on_frame(&frame0, &sample_report(0), &trajectory).unwrap(),
            SinkControl::Continue
        );
        assert_eq!(
            writer.on_frame(&frame1, &sample_report(1), &trajectory).unwrap(),
            SinkControl::Stop
        );
        writer.finish(Some(&frame1), &trajectory).unwrap();

        let written = image::open(dir.join("frame_000001.png")).unwrap();
        assert_eq!((written.width(), written.height()), (96, 48));
        assert!(dir.join("final_trajectory.png").exists());

        let json = std::fs::read_to_string(dir.join("trajectory.json")).unwrap();
        let restored: Trajectory = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.measured().len(), 2);
        assert_eq!(restored.final_points()[0].source, PointSource::Estimated);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
