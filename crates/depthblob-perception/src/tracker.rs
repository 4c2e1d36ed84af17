//! [`BlobTracker`] – the per-sensor detector instance.
//!
//! Owns the calibration state machine, the background model it produces and
//! every scratch buffer the detection stages need.  Buffers are sized to the
//! calibrated resolution and reallocated only when that resolution changes.
//!
//! The tracker is single-writer: feed it frames from one thread at a time.
//!
//! # Example
//!
//! ```rust
//! use depthblob_perception::tracker::BlobTracker;
//! use depthblob_types::{CalibrationConfig, CameraIntrinsics, DepthFrame, DetectionConfig};
//!
//! let mut tracker = BlobTracker::new(CalibrationConfig::default(), DetectionConfig {
//!     min_blob_pixels: 50,
//!     ..DetectionConfig::default()
//! });
//!
//! tracker.begin_calibration(10, 64, 48);
//! for _ in 0..10 {
//!     tracker.push_calibration_frame(&DepthFrame::filled(64, 48, 1000)).unwrap();
//! }
//!
//! let mut live = DepthFrame::filled(64, 48, 1000)
//!     .with_intrinsics(CameraIntrinsics::new(60.0, 60.0, 32.0, 24.0));
//! live.fill_rect(20, 10, 40, 30, 700);
//!
//! let result = tracker.detect(&live).unwrap();
//! assert_eq!(result.blobs_2d.len(), 1);
//! assert_eq!(result.blobs_3d.len(), 1);
//! ```

use depthblob_types::{
    Blob2D, Blob3D, CalibrationConfig, DepthError, DepthFrame, DepthSource, DetectionConfig,
};
use tracing::{debug, instrument, warn};

use crate::blobs::BlobExtractor;
use crate::calibration::{BackgroundModel, CalibrationAccumulator, CalibrationStatus};
use crate::despeckle::despeckle;
use crate::foreground::{classify, BACKGROUND};
use crate::projection::project_blobs;

/// Output of one detection call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResult {
    /// Despeckled foreground mask, one byte per pixel.
    pub foreground: Vec<u8>,
    pub blobs_2d: Vec<Blob2D>,
    pub blobs_3d: Vec<Blob3D>,
}

impl DetectionResult {
    pub fn clear(&mut self) {
        self.foreground.clear();
        self.blobs_2d.clear();
        self.blobs_3d.clear();
    }

    pub fn foreground_count(&self) -> usize {
        self.foreground.iter().filter(|&&v| v != BACKGROUND).count()
    }
}

#[derive(Debug, Default)]
struct Scratch {
    width: u32,
    height: u32,
    despeckle: Vec<u8>,
    extractor: BlobExtractor,
    samples: Vec<u16>,
}

impl Scratch {
    fn fit(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }
        debug!(width, height, "resizing detection scratch buffers");
        self.width = width;
        self.height = height;
        self.despeckle = vec![BACKGROUND; width as usize * height as usize];
    }
}

/// Background-subtraction blob detector.
#[derive(Debug)]
pub struct BlobTracker {
    calibration: CalibrationAccumulator,
    detection: DetectionConfig,
    scratch: Scratch,
}

impl Default for BlobTracker {
    fn default() -> Self {
        Self::new(CalibrationConfig::default(), DetectionConfig::default())
    }
}

impl BlobTracker {
    pub fn new(calibration: CalibrationConfig, detection: DetectionConfig) -> Self {
        Self {
            calibration: CalibrationAccumulator::new(calibration),
            detection,
            scratch: Scratch::default(),
        }
    }

    // ── Configuration ──────────────────────────────────────────────────────

    pub fn calibration_config(&self) -> &CalibrationConfig {
        self.calibration.config()
    }

    pub fn set_calibration_config(&mut self, config: CalibrationConfig) {
        self.calibration.set_config(config);
    }

    pub fn detection_config(&self) -> &DetectionConfig {
        &self.detection
    }

    /// Applies from the next [`detect`](Self::detect) call.
    pub fn set_detection_config(&mut self, config: DetectionConfig) {
        self.detection = config;
    }

    // ── Calibration ────────────────────────────────────────────────────────

    /// Discard any background model and start collecting `frame_count`
    /// frames of `width × height`.
    pub fn begin_calibration(&mut self, frame_count: usize, width: u32, height: u32) {
        self.calibration.begin(frame_count, width, height);
    }

    /// See [`CalibrationAccumulator::push`].
    pub fn push_calibration_frame(
        &mut self,
        frame: &DepthFrame,
    ) -> Result<CalibrationStatus, DepthError> {
        self.calibration.push(frame)
    }

    pub fn calibration_status(&self) -> CalibrationStatus {
        self.calibration.status()
    }

    pub fn calibration_frames_remaining(&self) -> usize {
        self.calibration.frames_remaining()
    }

    /// Forget the background model.
    pub fn reset(&mut self) {
        self.calibration.reset();
    }

    pub fn background(&self) -> Option<&BackgroundModel> {
        self.calibration.model()
    }

    /// Per-pixel background depth, for diagnostic display.
    pub fn background_depth_mm(&self) -> Option<&[u16]> {
        self.background().map(|m| m.depth_mm.as_slice())
    }

    /// Per-pixel background validity, for diagnostic display.
    pub fn background_valid_mask(&self) -> Option<&[bool]> {
        self.background().map(|m| m.valid.as_slice())
    }

    // ── Detection ──────────────────────────────────────────────────────────

    /// Run detection and return a freshly allocated result.
    pub fn detect(&mut self, frame: &DepthFrame) -> Result<DetectionResult, DepthError> {
        let mut out = DetectionResult::default();
        self.detect_into(frame, &mut out)?;
        Ok(out)
    }

    /// Run detection on `frame`, writing into `out`.
    ///
    /// Stages: foreground classification, two despeckle passes, blob
    /// extraction and, when the frame carries usable intrinsics, 3-D
    /// reconstruction.  Without intrinsics `blobs_3d` is left empty.
    ///
    /// # Errors
    ///
    /// [`DepthError::NotCalibrated`] without a background model, and
    /// [`DepthError::DimensionMismatch`] / [`DepthError::BufferLength`] when
    /// the frame does not match it.  On error `out` is cleared.
    #[instrument(skip_all, fields(width = frame.width, height = frame.height, ts = frame.timestamp_us))]
    pub fn detect_into(
        &mut self,
        frame: &DepthFrame,
        out: &mut DetectionResult,
    ) -> Result<(), DepthError> {
        out.clear();

        let Some(model) = self.calibration.model() else {
            warn!("detection requested before calibration");
            return Err(DepthError::NotCalibrated);
        };
        if let Err(err) = model.check_frame(frame) {
            warn!(%err, "skipping detection for mismatched frame");
            return Err(err);
        }

        let (width, height) = (model.width, model.height);
        let scratch = &mut self.scratch;
        scratch.fit(width, height);

        out.foreground.resize(model.pixel_count(), BACKGROUND);
        classify(&frame.depth_mm, model, &self.detection, &mut out.foreground);
        despeckle(
            &mut out.foreground,
            &mut scratch.despeckle,
            width as usize,
            height as usize,
        );

        scratch.extractor.extract(
            &out.foreground,
            width,
            height,
            self.detection.min_blob_pixels,
            &mut out.blobs_2d,
        );

        match frame.intrinsics.filter(|k| k.is_usable()) {
            Some(intrinsics) => {
                let depth = match self.detection.depth_source {
                    DepthSource::Background => &model.depth_mm,
                    DepthSource::LiveFrame => &frame.depth_mm,
                };
                project_blobs(
                    depth,
                    width,
                    height,
                    &out.blobs_2d,
                    &intrinsics,
                    &self.detection,
                    &mut scratch.samples,
                    &mut out.blobs_3d,
                );
            }
            None => {
                if !out.blobs_2d.is_empty() {
                    debug!("frame has no usable intrinsics, skipping 3-D reconstruction");
                }
            }
        }

        debug!(
            foreground = out.foreground_count(),
            blobs_2d = out.blobs_2d.len(),
            blobs_3d = out.blobs_3d.len(),
            "detection complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foreground::FOREGROUND;
    use depthblob_types::CameraIntrinsics;

    const W: u32 = 64;
    const H: u32 = 48;

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics::new(60.0, 60.0, 32.0, 24.0)
    }

    fn detection(source: DepthSource) -> DetectionConfig {
        DetectionConfig {
            depth_delta_mm: 80,
            min_blob_pixels: 100,
            stride_pixels: 3,
            min_samples: 4,
            depth_source: source,
            ..DetectionConfig::default()
        }
    }

    fn calibrated(source: DepthSource) -> BlobTracker {
        let mut t = BlobTracker::new(CalibrationConfig::default(), detection(source));
        t.begin_calibration(10, W, H);
        for _ in 0..10 {
            t.push_calibration_frame(&DepthFrame::filled(W, H, 1000)).unwrap();
        }
        assert_eq!(t.calibration_status(), CalibrationStatus::Calibrated);
        t
    }

    /// A 30×30 square at 800 mm against the 1000 mm background.
    fn square_frame() -> DepthFrame {
        let mut f = DepthFrame::filled(W, H, 1000).with_intrinsics(intrinsics());
        f.fill_rect(10, 8, 40, 38, 800);
        f
    }

    #[test]
    fn end_to_end_square_with_live_depth() {
        let mut t = calibrated(DepthSource::LiveFrame);
        let r = t.detect(&square_frame()).unwrap();

        assert_eq!(r.blobs_2d.len(), 1);
        let b = r.blobs_2d[0];
        assert_eq!((b.min_x, b.max_x, b.min_y, b.max_y), (10, 39, 8, 37));
        // Despeckling trims the four corners only.
        assert_eq!(b.pixel_count, 30 * 30 - 4);
        assert_eq!(b.id, 0);

        assert_eq!(r.blobs_3d.len(), 1);
        let b3 = r.blobs_3d[0];
        assert!(b3.valid);
        assert_eq!(b3.id, 0);
        assert!((b3.median_depth_m - 0.8).abs() < 1e-3, "median {}", b3.median_depth_m);
        assert!((b3.position_m.z - 0.8).abs() < 1e-3);
    }

    #[test]
    fn end_to_end_square_with_background_depth() {
        // The default source samples the calibrated background behind the
        // blob, so the reported depth is the 1000 mm surface.
        let mut t = calibrated(DepthSource::Background);
        let r = t.detect(&square_frame()).unwrap();

        assert_eq!(r.blobs_2d.len(), 1);
        assert_eq!(r.blobs_3d.len(), 1);
        assert!((r.blobs_3d[0].median_depth_m - 1.0).abs() < 1e-3);
    }

    #[test]
    fn detection_is_deterministic() {
        let mut t = calibrated(DepthSource::Background);
        let mut frame = square_frame();
        frame.fill_rect(50, 5, 60, 20, 500);

        let first = t.detect(&frame).unwrap();
        let second = t.detect(&frame).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.blobs_2d.len(), 2);
    }

    #[test]
    fn detect_before_calibration_is_rejected() {
        let mut t = BlobTracker::default();
        let mut out = DetectionResult {
            foreground: vec![FOREGROUND],
            ..DetectionResult::default()
        };
        let err = t.detect_into(&square_frame(), &mut out).unwrap_err();
        assert_eq!(err, DepthError::NotCalibrated);
        assert!(out.foreground.is_empty());
    }

    #[test]
    fn mismatched_frame_skips_detection() {
        let mut t = calibrated(DepthSource::Background);
        let mut out = t.detect(&square_frame()).unwrap();
        assert!(!out.blobs_2d.is_empty());

        let err = t
            .detect_into(&DepthFrame::filled(W + 1, H, 800), &mut out)
            .unwrap_err();
        assert!(matches!(err, DepthError::DimensionMismatch { .. }));
        assert!(out.blobs_2d.is_empty());
        assert!(out.blobs_3d.is_empty());

        let mut short = DepthFrame::filled(W, H, 800);
        short.depth_mm.pop();
        let err = t.detect_into(&short, &mut out).unwrap_err();
        assert!(matches!(err, DepthError::BufferLength { .. }));
        // Model untouched.
        assert_eq!(t.calibration_status(), CalibrationStatus::Calibrated);
    }

    #[test]
    fn missing_intrinsics_skip_3d_stage() {
        let mut t = calibrated(DepthSource::LiveFrame);
        let mut frame = square_frame();
        frame.intrinsics = None;
        let r = t.detect(&frame).unwrap();
        assert_eq!(r.blobs_2d.len(), 1);
        assert!(r.blobs_3d.is_empty());

        frame.intrinsics = Some(CameraIntrinsics::new(0.0, 60.0, 32.0, 24.0));
        assert!(t.detect(&frame).unwrap().blobs_3d.is_empty());
    }

    #[test]
    fn empty_scene_yields_no_blobs() {
        let mut t = calibrated(DepthSource::Background);
        let r = t
            .detect(&DepthFrame::filled(W, H, 1000).with_intrinsics(intrinsics()))
            .unwrap();
        assert_eq!(r.foreground.len(), (W * H) as usize);
        assert_eq!(r.foreground_count(), 0);
        assert!(r.blobs_2d.is_empty());
    }

    #[test]
    fn recalibration_resizes_scratch() {
        let mut t = calibrated(DepthSource::Background);
        t.detect(&square_frame()).unwrap();

        t.begin_calibration(10, 32, 32);
        assert!(t.background().is_none());
        for _ in 0..10 {
            t.push_calibration_frame(&DepthFrame::filled(32, 32, 2000)).unwrap();
        }
        let mut f = DepthFrame::filled(32, 32, 2000);
        f.fill_rect(8, 8, 24, 24, 1500);
        let r = t.detect(&f).unwrap();
        assert_eq!(r.foreground.len(), 32 * 32);
        assert_eq!(r.blobs_2d.len(), 1);
        assert_eq!(t.background_depth_mm().map(<[u16]>::len), Some(32 * 32));
        assert!(t.background_valid_mask().unwrap().iter().all(|&v| v));
    }
}
