//! Background subtraction.
//!
//! Labels each live pixel as foreground when something sits measurably
//! *nearer* than the calibrated background.  Objects further away than the
//! background surface are never detected.
//!
//! Per pixel, in order:
//! 1. live depth outside the detection range → background;
//! 2. background invalid at this pixel → foreground;
//! 3. background ≤ live → background;
//! 4. `background − live > depth_delta_mm` → foreground.

use depthblob_types::DetectionConfig;

use crate::calibration::BackgroundModel;

/// Mask value for a foreground pixel.
pub const FOREGROUND: u8 = u8::MAX;
/// Mask value for a background pixel.
pub const BACKGROUND: u8 = 0;

/// Classify a single sample.
#[inline]
pub fn is_foreground(
    live_mm: u16,
    background_mm: u16,
    background_valid: bool,
    config: &DetectionConfig,
) -> bool {
    if !config.accepts(live_mm) {
        return false;
    }
    if !background_valid {
        return true;
    }
    if background_mm <= live_mm {
        return false;
    }
    let delta = i32::from(background_mm) - i32::from(live_mm);
    delta > config.depth_delta_mm
}

/// Write the foreground mask for `live` into `mask`.
///
/// All three slices must have the model's pixel count; callers validate the
/// frame against the model first.
pub fn classify(live: &[u16], model: &BackgroundModel, config: &DetectionConfig, mask: &mut [u8]) {
    debug_assert_eq!(live.len(), model.pixel_count());
    debug_assert_eq!(mask.len(), model.pixel_count());

    for (((out, &d), &bg), &valid) in mask
        .iter_mut()
        .zip(live)
        .zip(&model.depth_mm)
        .zip(&model.valid)
    {
        *out = if is_foreground(d, bg, valid, config) {
            FOREGROUND
        } else {
            BACKGROUND
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> DetectionConfig {
        DetectionConfig {
            min_depth_mm: 50,
            max_depth_mm: 6000,
            depth_delta_mm: 80,
            ..DetectionConfig::default()
        }
    }

    #[test]
    fn out_of_range_live_sample_is_background() {
        assert!(!is_foreground(0, 1000, true, &cfg()));
        assert!(!is_foreground(7000, 1000, false, &cfg()));
        assert!(!is_foreground(49, 0, false, &cfg()));
    }

    #[test]
    fn invalid_background_defaults_to_foreground() {
        assert!(is_foreground(1000, 0, false, &cfg()));
    }

    #[test]
    fn farther_or_equal_than_background_is_background() {
        assert!(!is_foreground(1000, 1000, true, &cfg()));
        assert!(!is_foreground(1500, 1000, true, &cfg()));
    }

    #[test]
    fn delta_must_strictly_exceed_threshold() {
        assert!(!is_foreground(920, 1000, true, &cfg())); // delta = 80
        assert!(is_foreground(919, 1000, true, &cfg())); // delta = 81
        assert!(is_foreground(800, 1000, true, &cfg())); // delta = 200
    }

    #[test]
    fn classify_writes_full_mask() {
        let model = BackgroundModel {
            width: 4,
            height: 1,
            depth_mm: vec![1000, 1000, 0, 1000],
            valid: vec![true, true, false, true],
        };
        let live = [800, 1000, 1200, 0];
        let mut mask = [7u8; 4];
        classify(&live, &model, &cfg(), &mut mask);
        assert_eq!(mask, [FOREGROUND, BACKGROUND, FOREGROUND, BACKGROUND]);
    }
}
