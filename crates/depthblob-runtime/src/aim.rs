//! Aim points: fixed world positions that turn to face the nearest blob.
//!
//! Only the horizontal plane matters for aiming: the reported yaw is the
//! heading (degrees, counter-clockwise from world +X) from the aim point to
//! its target.

use depthblob_perception::transform::WorldBlob;
use depthblob_types::Vec3;
use serde::{Deserialize, Serialize};

/// A fixed point in the world that tracks the nearest target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AimPoint {
    /// Address of whatever is mounted here (a device id, a channel).
    pub id: String,
    pub position_cm: Vec3,
}

/// The result of aiming one [`AimPoint`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aim {
    /// Index of the chosen target in the slice passed to [`AimPoint::aim`].
    pub target: usize,
    pub target_position_cm: Vec3,
    pub distance_cm: f32,
    pub yaw_deg: f32,
}

impl AimPoint {
    pub fn new(id: impl Into<String>, position_cm: Vec3) -> Self {
        Self {
            id: id.into(),
            position_cm,
        }
    }

    /// Aim at the nearest of `targets` (squared distance, first wins ties).
    /// `None` when there are no targets.
    pub fn aim(&self, targets: &[Vec3]) -> Option<Aim> {
        let (target, &pos, dist_sq) = targets
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p, self.position_cm.distance_squared(*p)))
            .fold(None, |best: Option<(usize, &Vec3, f32)>, cand| match best {
                Some(b) if b.2 <= cand.2 => Some(b),
                _ => Some(cand),
            })?;

        Some(Aim {
            target,
            target_position_cm: pos,
            distance_cm: dist_sq.sqrt(),
            yaw_deg: yaw_towards(self.position_cm, pos),
        })
    }

    /// Aim at the nearest world blob.
    pub fn aim_at_blobs(&self, blobs: &[WorldBlob]) -> Option<Aim> {
        let positions: Vec<Vec3> = blobs.iter().map(|b| b.position_cm).collect();
        self.aim(&positions)
    }
}

/// Heading in degrees from `from` to `to` in the XY plane.  Zero when the
/// two points share X and Y.
pub fn yaw_towards(from: Vec3, to: Vec3) -> f32 {
    let d = to.sub(from);
    if d.x == 0.0 && d.y == 0.0 {
        return 0.0;
    }
    d.y.atan2(d.x).to_degrees()
}

/// Aim every point at the current blobs.
pub fn aim_all<'a>(
    points: &'a [AimPoint],
    blobs: &[WorldBlob],
) -> Vec<(&'a AimPoint, Option<Aim>)> {
    let positions: Vec<Vec3> = blobs.iter().map(|b| b.position_cm).collect();
    points.iter().map(|p| (p, p.aim(&positions))).collect()
}
