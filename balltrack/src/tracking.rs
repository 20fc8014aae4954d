/// Single-object tracking loop: foreground extraction, blob selection and
/// Kalman estimation, frame by frame
use std::time::{Duration, Instant};

use kftrack::{KalmanEstimator, MotionModel, Trajectory, TrajectoryPoint};

use crate::blob_detector::BlobDetector;
use crate::error::{Result, TrackingError};
use crate::foreground::ForegroundExtractor;
use crate::render::{SinkControl, TrackingSink};
use crate::source::FrameSource;
use crate::tracking_types::TrackerConfig;
use crate::types::{Blob, Frame, FrameReport};

/// Estimation outcome of one frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackStep {
    pub predicted: Option<TrajectoryPoint>,
    pub estimated: Option<TrajectoryPoint>,
    pub initialized_here: bool,
}

/// Counters of a run
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunSummary {
    pub frames_processed: u64,
    /// Frames with a qualifying blob
    pub detections: u64,
    /// Tracking-phase frames without a blob, where only the prediction was recorded
    pub coasted_frames: u64,
    /// True when the sink ended the run before the source was exhausted
    pub stopped_by_sink: bool,
    pub elapsed: Duration,
}

pub struct TrackingController {
    config: TrackerConfig,
    extractor: ForegroundExtractor,
    detector: BlobDetector,
    estimator: KalmanEstimator,
    trajectory: Trajectory,
    frame_size: Option<(u32, u32)>,
    summary: RunSummary,
}

impl TrackingController {
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        let extractor = ForegroundExtractor::new(config.foreground.clone())?;
        let detector = BlobDetector::new(config.min_blob_size);
        let estimator = KalmanEstimator::new(config.motion_model, &config.kalman)?;

        log::info!(
            "Tracker ready: model={}, learning_rate={}, min_blob_size={:?}",
            config.motion_model,
            config.learning_rate,
            config.min_blob_size
        );

        Ok(Self {
            config,
            extractor,
            detector,
            estimator,
            trajectory: Trajectory::new(),
            frame_size: None,
            summary: RunSummary::default(),
        })
    }

    /// Controller with default settings and the given motion model
    pub fn with_model(model: MotionModel) -> Result<Self> {
        Self::new(TrackerConfig::default().with_motion_model(model))
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn is_initialized(&self) -> bool {
        self.estimator.is_initialized()
    }

    pub fn estimator(&self) -> &KalmanEstimator {
        &self.estimator
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Drop all learned state; the next frame starts a fresh run
    pub fn reset(&mut self) {
        self.extractor.reset();
        self.estimator.reset();
        self.trajectory.clear();
        self.frame_size = None;
        self.summary = RunSummary::default();
    }

    /// Run one frame through the whole pipeline
    pub fn process_frame(&mut self, frame: &Frame) -> Result<FrameReport> {
        let size = frame.dimensions();
        match self.frame_size {
            Some(expected) if expected != size => {
                return Err(TrackingError::dimensions(expected, size));
            }
            Some(_) => {}
            None => self.frame_size = Some(size),
        }

        let mask = self.extractor.extract(frame, self.config.learning_rate)?;
        let blob = self.detector.detect(&mask);
        let step = self.track_blob(frame.frame_id, blob)?;

        Ok(FrameReport {
            frame_id: frame.frame_id,
            mask,
            blob,
            predicted: step.predicted,
            estimated: step.estimated,
            initialized_here: step.initialized_here,
        })
    }

    /// Estimation half of a frame: predict once tracking runs, then seed or
    /// correct the estimator with the blob centre when a blob was found
    pub fn track_blob(&mut self, frame_id: u64, blob: Blob) -> Result<TrackStep> {
        let mut step = TrackStep::default();
        self.summary.frames_processed += 1;

        if self.estimator.is_initialized() {
            let predicted = self.estimator.predict()?;
            self.trajectory.record_predicted(frame_id, predicted);
            step.predicted = Some(predicted);
        }

        if blob.area() == 0 {
            if step.predicted.is_some() {
                self.summary.coasted_frames += 1;
                log::debug!("Frame {}: no blob, coasting", frame_id);
            }
            return Ok(step);
        }

        self.summary.detections += 1;
        let measurement = blob.center_point();
        self.trajectory.record_measured(measurement);

        if self.estimator.is_initialized() {
            let estimated = self.estimator.correct(measurement)?;
            self.trajectory.record_estimated(frame_id, estimated);
            step.estimated = Some(estimated);
            log::debug!(
                "Frame {}: {} measured {} estimated {}",
                frame_id,
                blob,
                measurement,
                estimated
            );
        } else {
            self.estimator.initialize(measurement)?;
            step.initialized_here = true;
            log::info!("Tracking started at frame {} from {}", frame_id, measurement);
        }

        Ok(step)
    }

    /// Pull frames until the source is exhausted or the sink asks to stop
    pub fn run<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<RunSummary>
    where
        S: FrameSource + ?Sized,
        K: TrackingSink + ?Sized,
    {
        let start = Instant::now();
        let mut last_frame: Option<Frame> = None;

        while let Some(frame) = source.next_frame()? {
            let report = self.process_frame(&frame)?;
            let control = sink.on_frame(&frame, &report, &self.trajectory)?;
            last_frame = Some(frame);
            if control == SinkControl::Stop {
                log::info!("Run stopped by sink after {} frames", self.summary.frames_processed);
                self.summary.stopped_by_sink = true;
                break;
            }
        }

        sink.finish(last_frame.as_ref(), &self.trajectory)?;
        self.summary.elapsed += start.elapsed();

        let summary = self.summary;
        let fps = if summary.elapsed.as_secs_f64() > 0.0 {
            summary.frames_processed as f64 / summary.elapsed.as_secs_f64()
        } else {
            0.0
        };
        log::info!(
            "Run finished: {} frames, {} detections, {} coasted ({:.1} fps)",
            summary.frames_processed,
            summary.detections,
            summary.coasted_frames,
            fps
        );
        Ok(summary)
    }
}
