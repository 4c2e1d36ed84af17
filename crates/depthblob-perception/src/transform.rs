//! Coordinate transforms applied to reconstructed blobs.
//!
//! Two stateless steps take a [`Blob3D`] from the camera to the world:
//!
//! 1. [`camera_to_display_cm`] / [`camera_extents_to_display_cm`] remap the
//!    camera basis (+X right, +Y down, +Z forward, metres) onto the display
//!    basis (+X forward, +Y right, +Z up, centimetres).
//! 2. A [`SensorPose`] (sensor position in centimetres plus orientation)
//!    places display-space points and extents in the world.
//!
//! # Example
//!
//! ```rust
//! use depthblob_perception::transform::{camera_to_display_cm, SensorPose};
//! use depthblob_types::Vec3;
//!
//! // 2 m straight ahead of the lens, 10 cm below the optical axis.
//! let display = camera_to_display_cm(Vec3::new(0.0, 0.1, 2.0));
//! assert!((display.x - 200.0).abs() < 1e-3);
//! assert!((display.z + 10.0).abs() < 1e-3);
//!
//! // Sensor mounted 150 cm above the world origin.
//! let pose = SensorPose::from_degrees(Vec3::new(0.0, 0.0, 150.0), 0.0, 0.0, 0.0);
//! let world = pose.transform_point(display);
//! assert!((world.z - 140.0).abs() < 1e-3);
//! ```

use depthblob_types::{Blob3D, Vec3};
use serde::{Deserialize, Serialize};

/// Metres to centimetres.
pub const M_TO_CM: f32 = 100.0;

// ────────────────────────────────────────────────────────────────────────────
// Basis remap
// ────────────────────────────────────────────────────────────────────────────

/// Camera-space position (metres) → display-space position (centimetres).
pub fn camera_to_display_cm(p: Vec3) -> Vec3 {
    Vec3::new(p.z, p.x, -p.y).scale(M_TO_CM)
}

/// Camera-space half-extents (metres) → display-space half-extents
/// (centimetres).  Extents are magnitudes, so the flipped up axis keeps its
/// sign.
pub fn camera_extents_to_display_cm(e: Vec3) -> Vec3 {
    Vec3::new(e.z, e.x, e.y).scale(M_TO_CM)
}

// ────────────────────────────────────────────────────────────────────────────
// Quaternion
// ────────────────────────────────────────────────────────────────────────────

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `angle_rad` about a unit `axis`.
    pub fn from_axis_angle(axis: Vec3, angle_rad: f32) -> Self {
        let (s, c) = (angle_rad * 0.5).sin_cos();
        Self::new(c, axis.x * s, axis.y * s, axis.z * s)
    }

    /// Yaw about +Z, then pitch about +Y, then roll about +X (intrinsic),
    /// all in degrees.
    pub fn from_yaw_pitch_roll_deg(yaw: f32, pitch: f32, roll: f32) -> Self {
        let qz = Self::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), yaw.to_radians());
        let qy = Self::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), pitch.to_radians());
        let qx = Self::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), roll.to_radians());
        qz.mul(qy).mul(qx)
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SensorPose
// ────────────────────────────────────────────────────────────────────────────

/// Placement of a sensor in the world, as configured (centimetres and
/// degrees).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorPlacement {
    pub yaw_deg: f32,
    pub pitch_deg: f32,
    pub roll_deg: f32,
    pub position_cm: Vec3,
}

/// A rigid-body transform taking display-space coordinates of one sensor
/// into the world: rotate by `rotation`, then add `translation_cm`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorPose {
    pub translation_cm: Vec3,
    pub rotation: Quaternion,
}

impl Default for SensorPose {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<SensorPlacement> for SensorPose {
    fn from(p: SensorPlacement) -> Self {
        Self::from_degrees(p.position_cm, p.yaw_deg, p.pitch_deg, p.roll_deg)
    }
}

impl SensorPose {
    pub fn new(translation_cm: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation_cm,
            rotation,
        }
    }

    /// The identity pose: sensor at the world origin, axes aligned.
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    pub fn from_degrees(translation_cm: Vec3, yaw: f32, pitch: f32, roll: f32) -> Self {
        Self::new(
            translation_cm,
            Quaternion::from_yaw_pitch_roll_deg(yaw, pitch, roll),
        )
    }

    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.rotation.rotate(p).add(self.translation_cm)
    }

    /// Rotate a direction (no translation).
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        self.rotation.rotate(v)
    }

    /// Half-extents of the axis-aligned box enclosing a box with
    /// half-extents `e` after rotation.
    pub fn transform_extents(&self, e: Vec3) -> Vec3 {
        let ax = self.rotation.rotate(Vec3::new(e.x, 0.0, 0.0));
        let ay = self.rotation.rotate(Vec3::new(0.0, e.y, 0.0));
        let az = self.rotation.rotate(Vec3::new(0.0, 0.0, e.z));
        Vec3::new(
            ax.x.abs() + ay.x.abs() + az.x.abs(),
            ax.y.abs() + ay.y.abs() + az.y.abs(),
            ax.z.abs() + ay.z.abs() + az.z.abs(),
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Placed blobs
// ────────────────────────────────────────────────────────────────────────────

/// A [`Blob3D`] expressed in world space (centimetres).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldBlob {
    pub id: u32,
    pub position_cm: Vec3,
    pub half_extents_cm: Vec3,
    pub sample_count: u32,
}

/// Remap a camera-space blob to display space and place it with `pose`.
pub fn place_blob(blob: &Blob3D, pose: &SensorPose) -> WorldBlob {
    WorldBlob {
        id: blob.id,
        position_cm: pose.transform_point(camera_to_display_cm(blob.position_m)),
        half_extents_cm: pose.transform_extents(camera_extents_to_display_cm(blob.half_extents_m)),
        sample_count: blob.sample_count,
    }
}
