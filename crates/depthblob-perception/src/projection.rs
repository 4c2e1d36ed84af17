//! Depth projection of 2-D blobs into camera space.
//!
//! For each [`Blob2D`] the bounding box is sampled on a strided grid.  The
//! in-range samples give a median depth; a second pass keeps only samples
//! within `±z_window_mm` of that median and unprojects them with the pinhole
//! model
//!
//! ```text
//! Z = d · 0.001
//! X = (x − cx) · Z / fx
//! Y = (y − cy) · Z / fy
//! ```
//!
//! The emitted [`Blob3D`] carries the mean of those points and half of their
//! per-axis span.  Blobs with too few samples at either stage are dropped.

use depthblob_types::{Blob2D, Blob3D, CameraIntrinsics, DetectionConfig, Vec3};

/// Millimetres to metres.
pub const MM_TO_M: f32 = 0.001;

/// Unproject pixel `(x, y)` at depth `depth_mm` into camera space (metres).
#[inline]
pub fn unproject(x: u32, y: u32, depth_mm: u16, k: &CameraIntrinsics) -> Vec3 {
    let z = f32::from(depth_mm) * MM_TO_M;
    Vec3::new(
        (x as f32 - k.cx) * z / k.fx,
        (y as f32 - k.cy) * z / k.fy,
        z,
    )
}

/// Reconstruct one blob from `depth` (row-major, `width × height`).
///
/// `samples` is caller-owned scratch, cleared on entry.
pub fn project_blob(
    depth: &[u16],
    width: u32,
    height: u32,
    blob: &Blob2D,
    intrinsics: &CameraIntrinsics,
    config: &DetectionConfig,
    samples: &mut Vec<u16>,
) -> Option<Blob3D> {
    samples.clear();
    if width == 0 || height == 0 {
        return None;
    }

    let min_x = blob.min_x.min(width - 1);
    let max_x = blob.max_x.min(width - 1);
    let min_y = blob.min_y.min(height - 1);
    let max_y = blob.max_y.min(height - 1);
    let stride = config.stride() as usize;
    let w = width as usize;

    let grid = move || {
        (min_y..=max_y).step_by(stride).flat_map(move |y| {
            (min_x..=max_x)
                .step_by(stride)
                .map(move |x| (x, y, depth[y as usize * w + x as usize]))
        })
    };

    samples.extend(grid().map(|(_, _, d)| d).filter(|&d| config.accepts(d)));
    if samples.is_empty() || (samples.len() as u32) < config.min_samples {
        tracing::trace!(
            blob = blob.id,
            samples = samples.len(),
            min_samples = config.min_samples,
            "too few depth samples"
        );
        return None;
    }

    samples.sort_unstable();
    let median_mm = samples[samples.len() / 2];
    // Widened so any configured window is representable.
    let lo = i64::from(median_mm) - i64::from(config.z_window_mm);
    let hi = i64::from(median_mm) + i64::from(config.z_window_mm);

    let mut count = 0u32;
    let mut sum = [0f64; 3];
    let mut min = Vec3::new(f32::MAX, f32::MAX, f32::MAX);
    let mut max = Vec3::new(f32::MIN, f32::MIN, f32::MIN);

    for (x, y, d) in grid() {
        let di = i64::from(d);
        if !config.accepts(d) || di < lo || di > hi {
            continue;
        }
        let p = unproject(x, y, d, intrinsics);
        sum[0] += f64::from(p.x);
        sum[1] += f64::from(p.y);
        sum[2] += f64::from(p.z);
        min = Vec3::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z));
        max = Vec3::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z));
        count += 1;
    }

    if count == 0 || count < config.min_samples / 2 {
        tracing::trace!(blob = blob.id, in_window = count, "too few samples in depth window");
        return None;
    }

    let n = f64::from(count);
    Some(Blob3D {
        id: blob.id,
        valid: true,
        position_m: Vec3::new((sum[0] / n) as f32, (sum[1] / n) as f32, (sum[2] / n) as f32),
        half_extents_m: max.sub(min).scale(0.5),
        median_depth_m: f32::from(median_mm) * MM_TO_M,
        sample_count: count,
    })
}

/// Reconstruct every blob in `blobs`, appending successes to `out` (cleared
/// first).  Blobs that fail reconstruction are simply absent from `out`.
#[allow(clippy::too_many_arguments)]
pub fn project_blobs(
    depth: &[u16],
    width: u32,
    height: u32,
    blobs: &[Blob2D],
    intrinsics: &CameraIntrinsics,
    config: &DetectionConfig,
    samples: &mut Vec<u16>,
    out: &mut Vec<Blob3D>,
) {
    out.clear();
    out.extend(
        blobs
            .iter()
            .filter_map(|b| project_blob(depth, width, height, b, intrinsics, config, samples)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: u32 = 40;
    const H: u32 = 30;

    fn k() -> CameraIntrinsics {
        CameraIntrinsics::new(100.0, 100.0, 10.0, 10.0)
    }

    fn cfg(stride: u32, min_samples: u32) -> DetectionConfig {
        DetectionConfig {
            stride_pixels: stride,
            min_samples,
            z_window_mm: 100,
            ..DetectionConfig::default()
        }
    }

    fn blob(min_x: u32, max_x: u32, min_y: u32, max_y: u32) -> Blob2D {
        Blob2D {
            id: 3,
            pixel_count: (max_x - min_x + 1) * (max_y - min_y + 1),
            min_x,
            max_x,
            min_y,
            max_y,
            sum_x: 0,
            sum_y: 0,
        }
    }

    fn plane(depth: u16) -> Vec<u16> {
        vec![depth; (W * H) as usize]
    }

    #[test]
    fn unproject_principal_point_lies_on_axis() {
        let p = unproject(10, 10, 1500, &k());
        assert!(p.x.abs() < 1e-6 && p.y.abs() < 1e-6);
        assert!((p.z - 1.5).abs() < 1e-6);
    }

    #[test]
    fn planar_surface_matches_pinhole_projection() {
        let depth = plane(2000);
        let mut scratch = Vec::new();
        let b = project_blob(&depth, W, H, &blob(10, 20, 5, 15), &k(), &cfg(1, 4), &mut scratch)
            .expect("blob must reconstruct");

        // X spans (0..=10) * 2 / 100 = [0, 0.2]; Y spans (-5..=5) * 0.02 = [-0.1, 0.1].
        assert!((b.position_m.x - 0.1).abs() < 1e-5, "x={}", b.position_m.x);
        assert!(b.position_m.y.abs() < 1e-5, "y={}", b.position_m.y);
        assert!((b.position_m.z - 2.0).abs() < 1e-5);
        assert!((b.half_extents_m.x - 0.1).abs() < 1e-5);
        assert!((b.half_extents_m.y - 0.1).abs() < 1e-5);
        assert!(b.half_extents_m.z.abs() < 1e-6);
        assert!((b.median_depth_m - 2.0).abs() < 1e-6);
        assert_eq!(b.sample_count, 11 * 11);
        assert_eq!(b.id, 3);
        assert!(b.valid);
    }

    #[test]
    fn stride_subsamples_the_bounding_box() {
        let depth = plane(1000);
        let mut scratch = Vec::new();
        let b = project_blob(&depth, W, H, &blob(0, 9, 0, 9), &k(), &cfg(3, 1), &mut scratch)
            .unwrap();
        // x, y ∈ {0, 3, 6, 9}.
        assert_eq!(b.sample_count, 16);
    }

    #[test]
    fn too_few_samples_drops_the_blob() {
        let depth = plane(1000);
        let mut scratch = Vec::new();
        assert!(
            project_blob(&depth, W, H, &blob(0, 1, 0, 1), &k(), &cfg(1, 5), &mut scratch).is_none()
        );
    }

    #[test]
    fn out_of_range_samples_are_ignored() {
        let depth = plane(0);
        let mut scratch = Vec::new();
        assert!(
            project_blob(&depth, W, H, &blob(5, 15, 5, 15), &k(), &cfg(1, 1), &mut scratch)
                .is_none()
        );
    }

    #[test]
    fn depth_window_rejects_outliers() {
        let mut depth = plane(1000);
        // One far outlier inside the box.
        depth[(12 * W + 12) as usize] = 3000;
        let mut scratch = Vec::new();
        let b = project_blob(&depth, W, H, &blob(10, 14, 10, 14), &k(), &cfg(1, 4), &mut scratch)
            .unwrap();
        assert_eq!(b.sample_count, 24);
        assert!(b.half_extents_m.z.abs() < 1e-6);
    }

    #[test]
    fn in_window_threshold_is_half_min_samples() {
        // 9 samples: 4 near, 5 far.  Median is far; only 5 fall in the window.
        let mut depth = plane(3000);
        for (x, y) in [(10, 10), (11, 10), (12, 10), (10, 11)] {
            depth[(y * W + x) as usize] = 1000;
        }
        let mut scratch = Vec::new();
        // min_samples 9 → needs ≥ 4 in window → succeeds with 5.
        assert!(
            project_blob(&depth, W, H, &blob(10, 12, 10, 12), &k(), &cfg(1, 9), &mut scratch)
                .is_some()
        );
        // min_samples 12 is already unmet at the first stage.
        assert!(
            project_blob(&depth, W, H, &blob(10, 12, 10, 12), &k(), &cfg(1, 12), &mut scratch)
                .is_none()
        );
    }

    #[test]
    fn spread_samples_fail_the_window_stage() {
        // 3x3 box at 1000, 1200, ... 2600 mm: every sample is valid, but a
        // 50 mm window around the median keeps only the median itself.
        let mut depth = plane(1000);
        for (i, (x, y)) in (10..13)
            .flat_map(|y| (10..13).map(move |x| (x, y)))
            .enumerate()
        {
            depth[(y * W + x) as usize] = 1000 + 200 * i as u16;
        }
        let config = DetectionConfig {
            z_window_mm: 50,
            ..cfg(1, 9)
        };
        let mut scratch = Vec::new();
        // Stage one passes (9 >= 9); stage two keeps 1 < 9 / 2.
        assert!(
            project_blob(&depth, W, H, &blob(10, 12, 10, 12), &k(), &config, &mut scratch)
                .is_none()
        );
    }

    #[test]
    fn extreme_depth_windows_do_not_overflow() {
        let depth = plane(1000);
        let mut scratch = Vec::new();
        let wide = DetectionConfig {
            z_window_mm: i32::MAX,
            ..cfg(1, 1)
        };
        let b = project_blob(&depth, W, H, &blob(0, 9, 0, 9), &k(), &wide, &mut scratch);
        assert_eq!(b.map(|b| b.sample_count), Some(100));

        // A negative half-width leaves an empty window.
        let negative = DetectionConfig {
            z_window_mm: i32::MIN,
            ..cfg(1, 1)
        };
        assert!(
            project_blob(&depth, W, H, &blob(0, 9, 0, 9), &k(), &negative, &mut scratch).is_none()
        );
    }

    #[test]
    fn bounding_box_is_clamped_to_image() {
        let depth = plane(1000);
        let mut scratch = Vec::new();
        let b = project_blob(
            &depth,
            W,
            H,
            &blob(W - 2, W + 50, H - 2, H + 50),
            &k(),
            &cfg(1, 1),
            &mut scratch,
        )
        .unwrap();
        assert_eq!(b.sample_count, 4);
    }

    #[test]
    fn project_blobs_skips_failures() {
        let depth = plane(1000);
        let blobs = [blob(0, 9, 0, 9), blob(20, 20, 20, 20)];
        let mut scratch = Vec::new();
        let mut out = vec![];
        project_blobs(&depth, W, H, &blobs, &k(), &cfg(1, 4), &mut scratch, &mut out);
        assert_eq!(out.len(), 1);
    }
}
