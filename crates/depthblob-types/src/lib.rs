//! `depthblob-types` – value types shared by every layer of the detector.
//!
//! Frames flow in from the sensor layer as [`DepthFrame`]s, the perception
//! core is tuned with [`CalibrationConfig`] and [`DetectionConfig`], and the
//! results leave as [`Blob2D`] / [`Blob3D`] records.  All recoverable
//! failures are expressed as [`DepthError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Frames
// ────────────────────────────────────────────────────────────────────────────

/// Pinhole camera intrinsics, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl CameraIntrinsics {
    pub fn new(fx: f32, fy: f32, cx: f32, cy: f32) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// True when both focal lengths are strictly positive and finite, i.e.
    /// the intrinsics can be used to unproject pixels.
    pub fn is_usable(&self) -> bool {
        self.fx.is_finite() && self.fy.is_finite() && self.fx > 0.0 && self.fy > 0.0
    }
}

/// A single depth image: row-major `u16` samples in millimetres.
///
/// A sample of `0` conventionally means "no return" and is rejected by every
/// range check because configured minimum depths are positive.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthFrame {
    pub width: u32,
    pub height: u32,
    /// Capture timestamp in microseconds, as reported by the sensor.
    pub timestamp_us: u64,
    pub depth_mm: Vec<u16>,
    /// Required for 3-D reconstruction; frames without intrinsics still
    /// produce 2-D blobs.
    pub intrinsics: Option<CameraIntrinsics>,
}

impl DepthFrame {
    /// Build a frame filled with a single depth value.
    pub fn filled(width: u32, height: u32, depth_mm: u16) -> Self {
        Self {
            width,
            height,
            timestamp_us: 0,
            depth_mm: vec![depth_mm; width as usize * height as usize],
            intrinsics: None,
        }
    }

    pub fn with_intrinsics(mut self, intrinsics: CameraIntrinsics) -> Self {
        self.intrinsics = Some(intrinsics);
        self
    }

    pub fn with_timestamp(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }

    /// Number of pixels implied by the declared dimensions.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Read-only access to the sample at `(x, y)`.  Returns `None` when the
    /// coordinate lies outside the frame or the buffer is short.
    pub fn depth_at(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.depth_mm
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Overwrite an axis-aligned rectangle `[x0, x1) × [y0, y1)` with
    /// `depth_mm`, clipped to the frame.
    pub fn fill_rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, depth_mm: u16) {
        let width = self.width as usize;
        for y in y0.min(self.height)..y1.min(self.height) {
            let row = y as usize * width;
            for x in x0.min(self.width)..x1.min(self.width) {
                self.depth_mm[row + x as usize] = depth_mm;
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Bounds for a calibration sample to be considered valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub min_depth_mm: u16,
    pub max_depth_mm: u16,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_depth_mm: 50,
            max_depth_mm: 6000,
        }
    }
}

impl CalibrationConfig {
    pub fn accepts(&self, depth_mm: u16) -> bool {
        depth_mm >= self.min_depth_mm && depth_mm <= self.max_depth_mm
    }
}

/// Which depth buffer the 3-D reconstruction samples inside a blob's
/// bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthSource {
    /// Sample the calibrated background model (the surface behind the blob).
    #[default]
    Background,
    /// Sample the live frame that produced the blob.
    LiveFrame,
}

impl std::fmt::Display for DepthSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DepthSource::Background => write!(f, "background"),
            DepthSource::LiveFrame => write!(f, "live_frame"),
        }
    }
}

impl std::str::FromStr for DepthSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "background" => Ok(DepthSource::Background),
            "live_frame" | "live" => Ok(DepthSource::LiveFrame),
            other => Err(format!("unknown depth source '{other}'")),
        }
    }
}

/// Per-frame detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Lower bound (inclusive) of a usable live sample.
    pub min_depth_mm: u16,
    /// Upper bound (inclusive) of a usable live sample.
    pub max_depth_mm: u16,
    /// A pixel is foreground when `background − live` exceeds this.
    pub depth_delta_mm: i32,
    /// Connected components smaller than this are discarded.
    pub min_blob_pixels: u32,
    /// Sampling stride used by the 3-D reconstruction.  `0` behaves as `1`.
    pub stride_pixels: u32,
    /// Minimum in-range samples needed to reconstruct a blob in 3-D.
    pub min_samples: u32,
    /// Half-width of the depth window around a blob's median depth.
    pub z_window_mm: i32,
    pub depth_source: DepthSource,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_depth_mm: 50,
            max_depth_mm: 6000,
            depth_delta_mm: 80,
            min_blob_pixels: 500,
            stride_pixels: 3,
            min_samples: 20,
            z_window_mm: 300,
            depth_source: DepthSource::Background,
        }
    }
}

impl DetectionConfig {
    pub fn accepts(&self, depth_mm: u16) -> bool {
        depth_mm >= self.min_depth_mm && depth_mm <= self.max_depth_mm
    }

    /// The effective sampling stride (never zero).
    pub fn stride(&self) -> u32 {
        self.stride_pixels.max(1)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Results
// ────────────────────────────────────────────────────────────────────────────

/// A minimal 3-component vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn scale(self, k: f32) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }

    pub fn distance_squared(self, other: Self) -> f32 {
        let d = self.sub(other);
        d.x * d.x + d.y * d.y + d.z * d.z
    }
}

/// A connected foreground region in image space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob2D {
    /// Sequential id in raster discovery order, reset every frame.
    pub id: u32,
    pub pixel_count: u32,
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
    pub sum_x: u64,
    pub sum_y: u64,
}

impl Blob2D {
    /// Mean pixel coordinate of the region.
    pub fn centroid(&self) -> (f32, f32) {
        if self.pixel_count == 0 {
            return (0.0, 0.0);
        }
        let n = self.pixel_count as f64;
        ((self.sum_x as f64 / n) as f32, (self.sum_y as f64 / n) as f32)
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

/// Camera-space reconstruction of a [`Blob2D`].
///
/// Camera space is right-handed with +X right, +Y down and +Z forward, in
/// metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Blob3D {
    /// Id of the [`Blob2D`] this blob was reconstructed from.
    pub id: u32,
    pub valid: bool,
    pub position_m: Vec3,
    pub half_extents_m: Vec3,
    pub median_depth_m: f32,
    pub sample_count: u32,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Recoverable failures across the detector.  None of these are fatal: the
/// offending frame is dropped and state is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepthError {
    #[error("calibration frame received in invalid state ({state})")]
    NotCalibrating { state: String },

    #[error("calibration frame received after end of calibration")]
    CalibrationComplete,

    #[error("frame size mismatch: expected ({expected_width}, {expected_height}), got ({width}, {height})")]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    #[error("frame buffer length mismatch: expected {expected} samples, got {actual}")]
    BufferLength { expected: usize, actual: usize },

    #[error("detection requested before a background model was calibrated")]
    NotCalibrated,

    #[error("unsupported frame format: {0}")]
    UnsupportedFormat(String),

    #[error("frame packet size mismatch: expected {expected} bytes, got {actual}")]
    PacketSize { expected: usize, actual: usize },

    #[error("sensor fault on {sensor}: {details}")]
    SensorFault { sensor: String, details: String },
}
