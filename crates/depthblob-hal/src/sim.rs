//! Simulated depth sensor for headless runs and tests.
//!
//! [`SimDepthSensor`] renders a flat background at a fixed depth, then draws
//! a set of axis-aligned boxes nearer to the camera.  Boxes may drift by a
//! fixed number of pixels per frame (wrapping at the image edge) and a list
//! of single-pixel speckles can be sprinkled on top to exercise the
//! despeckle stage.  Every capture yields a `Y16` [`FramePacket`] carrying
//! the configured intrinsics.
//!
//! # Example
//!
//! ```rust
//! use depthblob_hal::sensor::DepthSensor;
//! use depthblob_hal::sim::{SimBox, SimDepthSensor, SimScene};
//!
//! let mut sensor = SimDepthSensor::new("sim", SimScene::default())
//!     .with_box(SimBox::new(100, 80, 40, 40, 900));
//!
//! let frame = sensor.capture().unwrap().unwrap().to_depth_frame().unwrap();
//! assert_eq!(frame.depth_at(120, 100), Some(900));
//! ```

use depthblob_types::{CameraIntrinsics, DepthError};
use serde::{Deserialize, Serialize};

use crate::packet::FramePacket;
use crate::sensor::DepthSensor;

// ────────────────────────────────────────────────────────────────────────────
// Scene description
// ────────────────────────────────────────────────────────────────────────────

/// An axis-aligned box drawn at a constant depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub depth_mm: u16,
    /// Pixels per frame along X.
    #[serde(default)]
    pub velocity_x: i32,
    /// Pixels per frame along Y.
    #[serde(default)]
    pub velocity_y: i32,
}

impl SimBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32, depth_mm: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
            depth_mm,
            velocity_x: 0,
            velocity_y: 0,
        }
    }

    pub fn moving(mut self, velocity_x: i32, velocity_y: i32) -> Self {
        self.velocity_x = velocity_x;
        self.velocity_y = velocity_y;
        self
    }

    /// Top-left corner at `frame`, wrapped into the image.
    fn origin_at(&self, frame: u64, width: u32, height: u32) -> (u32, u32) {
        let shift = |start: u32, velocity: i32, extent: u32| -> u32 {
            if extent == 0 {
                return 0;
            }
            let pos = i64::from(start) + i64::from(velocity) * frame as i64;
            pos.rem_euclid(i64::from(extent)) as u32
        };
        (
            shift(self.x, self.velocity_x, width),
            shift(self.y, self.velocity_y, height),
        )
    }
}

/// Static scene parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimScene {
    pub width: u32,
    pub height: u32,
    pub background_mm: u16,
    /// Time between consecutive frames, used for timestamps.
    pub frame_interval_us: u64,
    /// Number of leading frames rendered without boxes, so a calibration
    /// run sees the empty scene.
    pub empty_frames: u64,
    /// Single pixels forced to `speckle_mm`.
    pub speckles: Vec<[u32; 2]>,
    pub speckle_mm: u16,
    pub intrinsics: CameraIntrinsics,
    pub boxes: Vec<SimBox>,
}

impl Default for SimScene {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            background_mm: 2500,
            frame_interval_us: 33_333,
            empty_frames: 0,
            speckles: Vec::new(),
            speckle_mm: 1000,
            intrinsics: CameraIntrinsics::new(285.0, 285.0, 160.0, 120.0),
            boxes: Vec::new(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sensor
// ────────────────────────────────────────────────────────────────────────────

/// A simulated depth camera.  Never faults.
#[derive(Debug, Clone)]
pub struct SimDepthSensor {
    id: String,
    scene: SimScene,
    frame: u64,
}

impl SimDepthSensor {
    pub fn new(id: impl Into<String>, scene: SimScene) -> Self {
        Self {
            id: id.into(),
            scene,
            frame: 0,
        }
    }

    pub fn with_box(mut self, b: SimBox) -> Self {
        self.scene.boxes.push(b);
        self
    }

    pub fn with_speckle(mut self, x: u32, y: u32) -> Self {
        self.scene.speckles.push([x, y]);
        self
    }

    pub fn scene(&self) -> &SimScene {
        &self.scene
    }

    /// Frames rendered so far.
    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    /// Render the depth image for frame number `frame`.
    pub fn render(&self, frame: u64) -> Vec<u16> {
        let SimScene { width, height, .. } = self.scene;
        let (w, h) = (width as usize, height as usize);
        let mut depth = vec![self.scene.background_mm; w * h];

        if frame >= self.scene.empty_frames {
            let moved = frame - self.scene.empty_frames;
            for b in &self.scene.boxes {
                let (ox, oy) = b.origin_at(moved, width, height);
                for y in oy..oy.saturating_add(b.height).min(height) {
                    let row = y as usize * w;
                    for x in ox..ox.saturating_add(b.width).min(width) {
                        depth[row + x as usize] = b.depth_mm;
                    }
                }
            }
        }

        for &[x, y] in &self.scene.speckles {
            if x < width && y < height {
                depth[y as usize * w + x as usize] = self.scene.speckle_mm;
            }
        }
        depth
    }
}

impl DepthSensor for SimDepthSensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<Option<FramePacket>, DepthError> {
        let depth = self.render(self.frame);
        let timestamp_us = self.frame * self.scene.frame_interval_us;
        self.frame += 1;
        Ok(Some(
            FramePacket::from_depth_mm(self.scene.width, self.scene.height, timestamp_us, &depth)
                .with_intrinsics(self.scene.intrinsics),
        ))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
