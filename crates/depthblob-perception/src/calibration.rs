//! Background calibration.
//!
//! [`CalibrationAccumulator`] collects a bounded run of raw depth frames and
//! reduces them, per pixel, to a robust background depth (the median of the
//! in-range samples) plus a validity flag.
//!
//! ```text
//! NotCalibrated ──begin──▶ CalibrationInProgress ──last push──▶ Calibrated
//!       ▲                                                         │
//!       └──────────────────────── begin (re-calibrate) ◀──────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use depthblob_perception::calibration::{CalibrationAccumulator, CalibrationStatus};
//! use depthblob_types::{CalibrationConfig, DepthFrame};
//!
//! let mut acc = CalibrationAccumulator::new(CalibrationConfig::default());
//! acc.begin(10, 4, 4);
//! for _ in 0..10 {
//!     acc.push(&DepthFrame::filled(4, 4, 1000)).unwrap();
//! }
//! assert_eq!(acc.status(), CalibrationStatus::Calibrated);
//! assert_eq!(acc.model().unwrap().depth_mm[0], 1000);
//! ```

use depthblob_types::{CalibrationConfig, DepthError, DepthFrame};
use tracing::{info, warn};

/// Upper bound on the number of frames a calibration run may collect.
pub const MAX_CALIBRATION_FRAMES: usize = 128;

/// Minimum number of in-range samples for a pixel's background to be valid.
pub const MIN_VALID_SAMPLES: usize = 10;

// ────────────────────────────────────────────────────────────────────────────
// BackgroundModel
// ────────────────────────────────────────────────────────────────────────────

/// Per-pixel background depth and validity for a fixed resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundModel {
    pub width: u32,
    pub height: u32,
    /// Median background depth, `0` where the pixel is invalid.
    pub depth_mm: Vec<u16>,
    pub valid: Vec<bool>,
}

impl BackgroundModel {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    /// Check that `frame` can be compared against this model.
    pub fn check_frame(&self, frame: &DepthFrame) -> Result<(), DepthError> {
        if frame.width != self.width || frame.height != self.height {
            return Err(DepthError::DimensionMismatch {
                expected_width: self.width,
                expected_height: self.height,
                width: frame.width,
                height: frame.height,
            });
        }
        if frame.depth_mm.len() != self.pixel_count() {
            return Err(DepthError::BufferLength {
                expected: self.pixel_count(),
                actual: frame.depth_mm.len(),
            });
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// State machine
// ────────────────────────────────────────────────────────────────────────────

/// Public, copyable view of the accumulator's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStatus {
    NotCalibrated,
    CalibrationInProgress,
    Calibrated,
}

impl std::fmt::Display for CalibrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibrationStatus::NotCalibrated => write!(f, "not_calibrated"),
            CalibrationStatus::CalibrationInProgress => write!(f, "calibration_in_progress"),
            CalibrationStatus::Calibrated => write!(f, "calibrated"),
        }
    }
}

/// Raw samples collected so far by an in-progress run.
#[derive(Debug)]
struct CalibrationRun {
    width: u32,
    height: u32,
    frames_remaining: usize,
    /// Frames appended back to back: sample `p` of frame `f` lives at
    /// `f * width * height + p`.
    samples: Vec<u16>,
}

#[derive(Debug)]
enum State {
    NotCalibrated,
    InProgress(CalibrationRun),
    Calibrated(BackgroundModel),
}

/// Collects calibration frames and produces a [`BackgroundModel`].
#[derive(Debug)]
pub struct CalibrationAccumulator {
    config: CalibrationConfig,
    state: State,
}

impl CalibrationAccumulator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            state: State::NotCalibrated,
        }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Replace the sample-acceptance bounds.  Takes effect at the next
    /// background computation.
    pub fn set_config(&mut self, config: CalibrationConfig) {
        self.config = config;
    }

    pub fn status(&self) -> CalibrationStatus {
        match self.state {
            State::NotCalibrated => CalibrationStatus::NotCalibrated,
            State::InProgress(_) => CalibrationStatus::CalibrationInProgress,
            State::Calibrated(_) => CalibrationStatus::Calibrated,
        }
    }

    /// The background model, available only once calibrated.
    pub fn model(&self) -> Option<&BackgroundModel> {
        match &self.state {
            State::Calibrated(model) => Some(model),
            _ => None,
        }
    }

    /// Frames still expected by an in-progress run (`0` otherwise).
    pub fn frames_remaining(&self) -> usize {
        match &self.state {
            State::InProgress(run) => run.frames_remaining,
            _ => 0,
        }
    }

    /// Start a new calibration run, discarding any previous model.
    ///
    /// `frame_count` is clamped to `[1, MAX_CALIBRATION_FRAMES]`; zero
    /// dimensions are raised to `1`.
    pub fn begin(&mut self, frame_count: usize, width: u32, height: u32) {
        let frame_count = frame_count.clamp(1, MAX_CALIBRATION_FRAMES);
        let width = width.max(1);
        let height = height.max(1);
        let pixels = width as usize * height as usize;

        self.state = State::InProgress(CalibrationRun {
            width,
            height,
            frames_remaining: frame_count,
            samples: Vec::with_capacity(frame_count * pixels),
        });
    }

    /// Drop any model or in-progress run.
    pub fn reset(&mut self) {
        self.state = State::NotCalibrated;
    }

    /// Append one calibration frame.
    ///
    /// When the last expected frame arrives the background is computed, the
    /// raw buffer is released and the accumulator becomes
    /// [`CalibrationStatus::Calibrated`].
    ///
    /// # Errors
    ///
    /// Rejected frames leave the state untouched:
    /// - [`DepthError::NotCalibrating`] outside an in-progress run,
    /// - [`DepthError::CalibrationComplete`] once the run has all its frames,
    /// - [`DepthError::DimensionMismatch`] / [`DepthError::BufferLength`] when
    ///   the frame does not match the declared resolution.
    pub fn push(&mut self, frame: &DepthFrame) -> Result<CalibrationStatus, DepthError> {
        let status = self.status();
        let State::InProgress(run) = &mut self.state else {
            warn!(state = %status, "calibration frame received in invalid state");
            return Err(DepthError::NotCalibrating {
                state: status.to_string(),
            });
        };

        if run.frames_remaining == 0 {
            warn!("calibration frame received after end of calibration");
            return Err(DepthError::CalibrationComplete);
        }

        if frame.width != run.width || frame.height != run.height {
            warn!(
                expected_width = run.width,
                expected_height = run.height,
                width = frame.width,
                height = frame.height,
                "calibration frame size mismatch"
            );
            return Err(DepthError::DimensionMismatch {
                expected_width: run.width,
                expected_height: run.height,
                width: frame.width,
                height: frame.height,
            });
        }

        let pixels = run.width as usize * run.height as usize;
        if frame.depth_mm.len() != pixels {
            warn!(
                expected = pixels,
                actual = frame.depth_mm.len(),
                "calibration frame buffer length mismatch"
            );
            return Err(DepthError::BufferLength {
                expected: pixels,
                actual: frame.depth_mm.len(),
            });
        }

        run.samples.extend_from_slice(&frame.depth_mm);
        run.frames_remaining -= 1;

        if run.frames_remaining == 0 {
            let model = compute_background(run.width, run.height, &run.samples, &self.config);
            info!(
                width = model.width,
                height = model.height,
                valid_pixels = model.valid_count(),
                total_pixels = model.pixel_count(),
                "background calibration complete"
            );
            // Replacing the state drops the raw sample buffer.
            self.state = State::Calibrated(model);
        }

        Ok(self.status())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Background computation
// ────────────────────────────────────────────────────────────────────────────

/// Reduce a contiguous run of frames to a [`BackgroundModel`].
///
/// For every pixel, the samples within `config`'s depth range are gathered
/// into a fixed-size scratch array; pixels with at least
/// [`MIN_VALID_SAMPLES`] samples get their [`select_median`] as background,
/// the rest are marked invalid with depth `0`.
pub fn compute_background(
    width: u32,
    height: u32,
    samples: &[u16],
    config: &CalibrationConfig,
) -> BackgroundModel {
    let pixels = width as usize * height as usize;
    let frames = if pixels == 0 {
        0
    } else {
        (samples.len() / pixels).min(MAX_CALIBRATION_FRAMES)
    };

    let mut depth_mm = vec![0u16; pixels];
    let mut valid = vec![false; pixels];
    let mut scratch = [0u16; MAX_CALIBRATION_FRAMES];

    for p in 0..pixels {
        let mut count = 0;
        for f in 0..frames {
            let d = samples[f * pixels + p];
            if config.accepts(d) {
                scratch[count] = d;
                count += 1;
            }
        }

        if count >= MIN_VALID_SAMPLES {
            depth_mm[p] = select_median(&mut scratch[..count]);
            valid[p] = true;
        }
    }

    BackgroundModel {
        width,
        height,
        depth_mm,
        valid,
    }
}

/// Median by selection: the element that would sit at index `len / 2` after
/// sorting.  For even lengths this is the upper of the two middle values,
/// the element a `nth_element(n / 2)` selection yields.  Some descriptions
/// of the background model call this the lower median; the index is kept at
/// `n / 2` so calibrated backgrounds stay identical to the selection result.
///
/// Reorders `samples`.  Returns `0` for an empty slice.
pub fn select_median(samples: &mut [u16]) -> u16 {
    if samples.is_empty() {
        return 0;
    }
    let mid = samples.len() / 2;
    *samples.select_nth_unstable(mid).1
}
