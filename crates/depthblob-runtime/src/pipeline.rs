//! [`FramePipeline`] – the auto-calibrating consumer of depth frames.
//!
//! Each call to [`FramePipeline::process`] advances the detector by one
//! frame:
//!
//! 1. **Not calibrated** – start a calibration run at the frame's
//!    resolution and push the frame into it.
//! 2. **Calibrating** – push the frame; the run completes after
//!    `calibration_frames` frames.
//! 3. **Calibrated** – detect blobs and place every reconstructed blob in
//!    world space using the sensor's [`SensorPose`].
//!
//! [`FramePipeline::recalibrate`] drops the background model so the next
//! frame starts a fresh run.
//!
//! # Example
//!
//! ```rust
//! use depthblob_runtime::pipeline::{FramePipeline, PipelineConfig, PipelineEvent};
//! use depthblob_types::DepthFrame;
//!
//! let mut pipeline = FramePipeline::new(PipelineConfig {
//!     calibration_frames: 2,
//!     ..PipelineConfig::default()
//! });
//!
//! let empty = DepthFrame::filled(32, 24, 1500);
//! assert!(matches!(pipeline.process(&empty), Ok(PipelineEvent::Calibrating { remaining: 1 })));
//! assert!(matches!(pipeline.process(&empty), Ok(PipelineEvent::Calibrated { .. })));
//! assert!(matches!(pipeline.process(&empty), Ok(PipelineEvent::Detection(_))));
//! ```

use depthblob_perception::calibration::CalibrationStatus;
use depthblob_perception::tracker::{BlobTracker, DetectionResult};
use depthblob_perception::transform::{place_blob, SensorPlacement, SensorPose, WorldBlob};
use depthblob_types::{CalibrationConfig, DepthError, DepthFrame, DetectionConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Calibration run length used when none is configured.
pub const DEFAULT_CALIBRATION_FRAMES: usize = 60;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`FramePipeline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Frames per calibration run.
    pub calibration_frames: usize,
    pub calibration: CalibrationConfig,
    pub detection: DetectionConfig,
    /// Where the sensor sits in the world.
    pub placement: SensorPlacement,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            calibration_frames: DEFAULT_CALIBRATION_FRAMES,
            calibration: CalibrationConfig::default(),
            detection: DetectionConfig::default(),
            placement: SensorPlacement::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// One detection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub timestamp_us: u64,
    pub result: DetectionResult,
    /// `result.blobs_3d` placed in world space (centimetres).
    pub world_blobs: Vec<WorldBlob>,
}

/// What a processed frame did.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Frame consumed by the calibration run.
    Calibrating { remaining: usize },
    /// Frame completed the calibration run.
    Calibrated {
        width: u32,
        height: u32,
        valid_pixels: usize,
    },
    Detection(Detection),
}

/// Running counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub frames: u64,
    pub rejected: u64,
    pub detections: u64,
    pub calibrations: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// FramePipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Owns one [`BlobTracker`] and drives it from a stream of frames.
#[derive(Debug)]
pub struct FramePipeline {
    tracker: BlobTracker,
    calibration_frames: usize,
    pose: SensorPose,
    stats: PipelineStats,
}

impl FramePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            tracker: BlobTracker::new(config.calibration, config.detection),
            calibration_frames: config.calibration_frames,
            pose: SensorPose::from(config.placement),
            stats: PipelineStats::default(),
        }
    }

    pub fn tracker(&self) -> &BlobTracker {
        &self.tracker
    }

    pub fn pose(&self) -> &SensorPose {
        &self.pose
    }

    pub fn set_pose(&mut self, pose: SensorPose) {
        self.pose = pose;
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn status(&self) -> CalibrationStatus {
        self.tracker.calibration_status()
    }

    /// Discard the background model; the next frame starts a new run.
    pub fn recalibrate(&mut self) {
        info!("recalibration requested");
        self.tracker.reset();
    }

    /// Feed one frame through the pipeline.
    ///
    /// # Errors
    ///
    /// Whatever the tracker rejects the frame with (resolution changes
    /// mid-run or after calibration).  The pipeline state is unchanged and
    /// the next frame is processed normally.
    pub fn process(&mut self, frame: &DepthFrame) -> Result<PipelineEvent, DepthError> {
        self.stats.frames += 1;
        let event = self.advance(frame);
        match &event {
            Ok(PipelineEvent::Calibrated { .. }) => self.stats.calibrations += 1,
            Ok(PipelineEvent::Detection(_)) => self.stats.detections += 1,
            Ok(PipelineEvent::Calibrating { .. }) => {}
            Err(_) => self.stats.rejected += 1,
        }
        event
    }

    fn advance(&mut self, frame: &DepthFrame) -> Result<PipelineEvent, DepthError> {
        if self.tracker.calibration_status() == CalibrationStatus::NotCalibrated {
            info!(
                frames = self.calibration_frames,
                width = frame.width,
                height = frame.height,
                "starting calibration"
            );
            self.tracker
                .begin_calibration(self.calibration_frames, frame.width, frame.height);
        }

        match self.tracker.calibration_status() {
            CalibrationStatus::Calibrated => self.detect(frame).map(PipelineEvent::Detection),
            _ => match self.tracker.push_calibration_frame(frame)? {
                CalibrationStatus::Calibrated => {
                    let (width, height, valid_pixels) = self
                        .tracker
                        .background()
                        .map(|m| (m.width, m.height, m.valid_count()))
                        .unwrap_or_default();
                    Ok(PipelineEvent::Calibrated {
                        width,
                        height,
                        valid_pixels,
                    })
                }
                _ => Ok(PipelineEvent::Calibrating {
                    remaining: self.tracker.calibration_frames_remaining(),
                }),
            },
        }
    }

    fn detect(&mut self, frame: &DepthFrame) -> Result<Detection, DepthError> {
        let result = self.tracker.detect(frame)?;
        let world_blobs: Vec<WorldBlob> = result
            .blobs_3d
            .iter()
            .map(|b| place_blob(b, &self.pose))
            .collect();
        debug!(
            ts = frame.timestamp_us,
            blobs = world_blobs.len(),
            "frame processed"
        );
        Ok(Detection {
            timestamp_us: frame.timestamp_us,
            result,
            world_blobs,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
