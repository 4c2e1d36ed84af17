//! 3×3 majority filter.
//!
//! A pixel survives when at least [`MAJORITY`] pixels of its 3×3
//! neighbourhood (itself included) are foreground.  Neighbours outside the
//! image are left out of the count rather than treated as background.
//! [`despeckle`] runs the filter twice, ping-ponging through a scratch mask.

use crate::foreground::{BACKGROUND, FOREGROUND};

/// Neighbourhood votes needed to keep a pixel.
pub const MAJORITY: u32 = 5;

/// One majority-filter pass from `src` into `dst`.
pub fn majority_filter(src: &[u8], dst: &mut [u8], width: usize, height: usize) {
    debug_assert_eq!(src.len(), width * height);
    debug_assert_eq!(dst.len(), width * height);

    for y in 0..height {
        let y0 = y.saturating_sub(1);
        let y1 = (y + 1).min(height - 1);
        for x in 0..width {
            let x0 = x.saturating_sub(1);
            let x1 = (x + 1).min(width - 1);

            let mut votes = 0u32;
            for ny in y0..=y1 {
                let row = ny * width;
                for nx in x0..=x1 {
                    if src[row + nx] != BACKGROUND {
                        votes += 1;
                    }
                }
            }

            dst[y * width + x] = if votes >= MAJORITY { FOREGROUND } else { BACKGROUND };
        }
    }
}

/// Two majority passes: `mask → scratch → mask`.
pub fn despeckle(mask: &mut [u8], scratch: &mut [u8], width: usize, height: usize) {
    if width == 0 || height == 0 {
        return;
    }
    majority_filter(mask, scratch, width, height);
    majority_filter(scratch, mask, width, height);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_with(width: usize, height: usize, on: &[(usize, usize)]) -> Vec<u8> {
        let mut m = vec![BACKGROUND; width * height];
        for &(x, y) in on {
            m[y * width + x] = FOREGROUND;
        }
        m
    }

    fn fill_rect(m: &mut [u8], width: usize, x0: usize, y0: usize, x1: usize, y1: usize) {
        for y in y0..y1 {
            for x in x0..x1 {
                m[y * width + x] = FOREGROUND;
            }
        }
    }

    #[test]
    fn isolated_pixel_is_removed_in_one_pass() {
        let src = mask_with(5, 5, &[(2, 2)]);
        let mut dst = vec![FOREGROUND; 25];
        majority_filter(&src, &mut dst, 5, 5);
        assert!(dst.iter().all(|&v| v == BACKGROUND));
    }

    #[test]
    fn filled_interior_survives() {
        let src = vec![FOREGROUND; 9];
        let mut dst = vec![BACKGROUND; 9];
        majority_filter(&src, &mut dst, 3, 3);
        // Corner pixels see only 4 in-bounds neighbours (themselves included).
        assert_eq!(dst[0], BACKGROUND);
        assert_eq!(dst[2], BACKGROUND);
        // Edge pixels see 6, the centre 9.
        assert_eq!(dst[1], FOREGROUND);
        assert_eq!(dst[4], FOREGROUND);
    }

    #[test]
    fn out_of_bounds_neighbours_are_not_counted_as_votes() {
        // A full 2×2 image: every pixel has exactly 4 in-bounds neighbours,
        // below the majority of 5.
        let src = vec![FOREGROUND; 4];
        let mut dst = vec![FOREGROUND; 4];
        majority_filter(&src, &mut dst, 2, 2);
        assert!(dst.iter().all(|&v| v == BACKGROUND));
    }

    #[test]
    fn two_passes_trim_only_square_corners() {
        let (w, h) = (12, 12);
        let mut mask = vec![BACKGROUND; w * h];
        fill_rect(&mut mask, w, 3, 3, 9, 9);
        let mut scratch = vec![BACKGROUND; w * h];
        despeckle(&mut mask, &mut scratch, w, h);

        for y in 3..9 {
            for x in 3..9 {
                let corner = (x == 3 || x == 8) && (y == 3 || y == 8);
                let expected = if corner { BACKGROUND } else { FOREGROUND };
                assert_eq!(mask[y * w + x], expected, "pixel ({x}, {y})");
            }
        }
        let on = mask.iter().filter(|&&v| v == FOREGROUND).count();
        assert_eq!(on, 36 - 4);
    }

    #[test]
    fn thin_line_is_removed() {
        let (w, h) = (10, 5);
        let mut mask = vec![BACKGROUND; w * h];
        fill_rect(&mut mask, w, 1, 2, 9, 3);
        let mut scratch = vec![BACKGROUND; w * h];
        despeckle(&mut mask, &mut scratch, w, h);
        assert!(mask.iter().all(|&v| v == BACKGROUND));
    }
}
