//! Connected-component labelling of a foreground mask.
//!
//! [`BlobExtractor`] scans the mask in raster order and grows an 8-connected
//! component from every unvisited foreground pixel with an explicit FIFO
//! work-list.  Pixels are marked visited when they are *enqueued*, so each
//! pixel enters the queue at most once and a frame costs `O(width × height)`
//! regardless of how many components it holds.
//!
//! Edge policy:
//! - seeds are taken only from the interior (the outermost ring of pixels is
//!   never a seed), so a region living entirely on the border is never
//!   reported;
//! - neighbour expansion has no such restriction, so an interior-seeded
//!   component absorbs any border pixels it touches.
//!
//! Components smaller than the configured minimum are dropped, but their
//! pixels stay visited and are never rescanned or merged into another blob.

use std::collections::VecDeque;

use depthblob_types::Blob2D;

use crate::foreground::BACKGROUND;

const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

// ────────────────────────────────────────────────────────────────────────────
// VisitedBits
// ────────────────────────────────────────────────────────────────────────────

/// One bit per pixel, indexed by linear offset.
#[derive(Debug, Default, Clone)]
pub struct VisitedBits {
    words: Vec<u64>,
    len: usize,
}

impl VisitedBits {
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Clear every bit, resizing to `len` only when the resolution changed.
    pub fn reset(&mut self, len: usize) {
        if self.len != len {
            *self = Self::new(len);
        } else {
            self.words.iter_mut().for_each(|w| *w = 0);
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, i: usize) -> bool {
        self.words[i >> 6] & (1u64 << (i & 63)) != 0
    }

    #[inline]
    pub fn set(&mut self, i: usize) {
        self.words[i >> 6] |= 1u64 << (i & 63);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// BlobExtractor
// ────────────────────────────────────────────────────────────────────────────

/// Running aggregate for the component currently being filled.
struct Aggregate {
    pixel_count: u32,
    min_x: u32,
    max_x: u32,
    min_y: u32,
    max_y: u32,
    sum_x: u64,
    sum_y: u64,
}

impl Aggregate {
    fn new(x: u32, y: u32) -> Self {
        Self {
            pixel_count: 0,
            min_x: x,
            max_x: x,
            min_y: y,
            max_y: y,
            sum_x: 0,
            sum_y: 0,
        }
    }

    fn fold(&mut self, x: u32, y: u32) {
        self.pixel_count += 1;
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
        self.sum_x += u64::from(x);
        self.sum_y += u64::from(y);
    }

    fn into_blob(self, id: u32) -> Blob2D {
        Blob2D {
            id,
            pixel_count: self.pixel_count,
            min_x: self.min_x,
            max_x: self.max_x,
            min_y: self.min_y,
            max_y: self.max_y,
            sum_x: self.sum_x,
            sum_y: self.sum_y,
        }
    }
}

/// Flood-fill labeller with reusable visited bits and work queue.
#[derive(Debug, Default)]
pub struct BlobExtractor {
    visited: VisitedBits,
    queue: VecDeque<u32>,
}

impl BlobExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label `mask` and append every component of at least `min_pixels`
    /// pixels to `out` (which is cleared first).  Ids start at `0` and
    /// follow seed discovery order.
    pub fn extract(
        &mut self,
        mask: &[u8],
        width: u32,
        height: u32,
        min_pixels: u32,
        out: &mut Vec<Blob2D>,
    ) {
        out.clear();
        let w = width as usize;
        let h = height as usize;
        debug_assert_eq!(mask.len(), w * h);

        self.visited.reset(w * h);
        self.queue.clear();

        if w < 3 || h < 3 {
            return;
        }

        let mut next_id = 0u32;
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let seed = y * w + x;
                if mask[seed] == BACKGROUND || self.visited.get(seed) {
                    continue;
                }

                let aggregate = self.fill(mask, w, h, seed);
                if aggregate.pixel_count >= min_pixels {
                    out.push(aggregate.into_blob(next_id));
                    next_id += 1;
                } else {
                    tracing::trace!(
                        pixels = aggregate.pixel_count,
                        min_pixels,
                        "discarding undersized component"
                    );
                }
            }
        }
    }

    fn fill(&mut self, mask: &[u8], w: usize, h: usize, seed: usize) -> Aggregate {
        let mut aggregate = Aggregate::new((seed % w) as u32, (seed / w) as u32);

        self.visited.set(seed);
        self.queue.push_back(seed as u32);

        while let Some(idx) = self.queue.pop_front() {
            let idx = idx as usize;
            let x = (idx % w) as i32;
            let y = (idx / w) as i32;
            aggregate.fold(x as u32, y as u32);

            for (dx, dy) in NEIGHBOURS {
                let nx = x + dx;
                let ny = y + dy;
                if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                    continue;
                }
                let n = ny as usize * w + nx as usize;
                if mask[n] != BACKGROUND && !self.visited.get(n) {
                    self.visited.set(n);
                    self.queue.push_back(n as u32);
                }
            }
        }

        aggregate
    }
}

/// Deterministic overlay colour for a blob id: Knuth multiplicative hash
/// split into RGB, each channel floored at 50 so no box is drawn near-black.
pub fn color_for_id(id: u32) -> [u8; 3] {
    let h = id.wrapping_mul(2_654_435_761);
    let r = (h & 0xFF) as u8;
    let g = ((h >> 8) & 0xFF) as u8;
    let b = ((h >> 16) & 0xFF) as u8;
    [r.max(50), g.max(50), b.max(50)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foreground::FOREGROUND;

    struct Mask {
        w: u32,
        h: u32,
        data: Vec<u8>,
    }

    impl Mask {
        fn new(w: u32, h: u32) -> Self {
            Self {
                w,
                h,
                data: vec![BACKGROUND; (w * h) as usize],
            }
        }

        fn set(&mut self, x: u32, y: u32) {
            self.data[(y * self.w + x) as usize] = FOREGROUND;
        }

        fn rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32) {
            for y in y0..y1 {
                for x in x0..x1 {
                    self.set(x, y);
                }
            }
        }

        fn extract(&self, min_pixels: u32) -> Vec<Blob2D> {
            let mut out = Vec::new();
            BlobExtractor::new().extract(&self.data, self.w, self.h, min_pixels, &mut out);
            out
        }
    }

    fn assert_bbox_invariant(blobs: &[Blob2D], min_pixels: u32) {
        for b in blobs {
            assert!(b.min_x <= b.max_x);
            assert!(b.min_y <= b.max_y);
            assert!(b.pixel_count >= min_pixels);
        }
    }

    #[test]
    fn visited_bits_set_and_reset() {
        let mut bits = VisitedBits::new(130);
        assert!(!bits.get(129));
        bits.set(129);
        bits.set(0);
        assert!(bits.get(129) && bits.get(0));
        bits.reset(130);
        assert!(!bits.get(129) && !bits.get(0));
        bits.reset(10);
        assert_eq!(bits.len(), 10);
    }

    #[test]
    fn single_region_yields_one_blob() {
        let mut m = Mask::new(20, 20);
        m.rect(5, 5, 10, 9);
        let blobs = m.extract(1);
        assert_eq!(blobs.len(), 1);
        let b = blobs[0];
        assert_eq!(b.id, 0);
        assert_eq!(b.pixel_count, 20);
        assert_eq!((b.min_x, b.max_x, b.min_y, b.max_y), (5, 9, 5, 8));
        let (cx, cy) = b.centroid();
        assert!((cx - 7.0).abs() < 1e-5);
        assert!((cy - 6.5).abs() < 1e-5);
        assert_bbox_invariant(&blobs, 1);
    }

    #[test]
    fn separated_regions_yield_two_blobs_in_raster_order() {
        let mut m = Mask::new(20, 20);
        m.rect(10, 2, 14, 6); // discovered first (smaller y)
        m.rect(2, 10, 6, 14);
        let blobs = m.extract(1);
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].id, 0);
        assert_eq!(blobs[0].min_x, 10);
        assert_eq!(blobs[1].id, 1);
        assert_eq!(blobs[1].min_x, 2);
        assert_bbox_invariant(&blobs, 1);
    }

    #[test]
    fn diagonal_neighbours_are_connected() {
        let mut m = Mask::new(10, 10);
        m.set(2, 2);
        m.set(3, 3);
        m.set(4, 4);
        let blobs = m.extract(1);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].pixel_count, 3);
    }

    #[test]
    fn undersized_region_is_dropped_and_not_rescanned() {
        let mut m = Mask::new(20, 20);
        m.rect(2, 2, 5, 5); // 9 pixels
        let blobs = m.extract(10);
        assert!(blobs.is_empty());

        // A qualifying region elsewhere still gets id 0 and only its own pixels.
        m.rect(10, 10, 15, 15); // 25 pixels
        let blobs = m.extract(10);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].id, 0);
        assert_eq!(blobs[0].pixel_count, 25);
    }

    #[test]
    fn pixel_count_equals_visited_pixels() {
        let mut m = Mask::new(16, 16);
        m.rect(3, 3, 8, 8);
        m.rect(7, 7, 12, 12); // overlaps at (7, 7)
        let expected = m.data.iter().filter(|&&v| v != BACKGROUND).count() as u32;
        let blobs = m.extract(1);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].pixel_count, expected);
    }

    #[test]
    fn border_only_region_is_never_seeded() {
        let mut m = Mask::new(10, 10);
        for x in 0..10 {
            m.set(x, 0);
        }
        for y in 0..10 {
            m.set(9, y);
        }
        assert!(m.extract(1).is_empty());
    }

    #[test]
    fn interior_seed_absorbs_border_pixels() {
        let mut m = Mask::new(10, 10);
        m.rect(0, 0, 4, 4); // touches the top-left border
        let blobs = m.extract(1);
        assert_eq!(blobs.len(), 1);
        let b = blobs[0];
        assert_eq!(b.pixel_count, 16);
        assert_eq!((b.min_x, b.min_y), (0, 0));
    }

    #[test]
    fn tiny_images_produce_no_blobs() {
        let m = Mask {
            w: 2,
            h: 2,
            data: vec![FOREGROUND; 4],
        };
        assert!(m.extract(1).is_empty());
    }

    #[test]
    fn extractor_reuse_is_deterministic() {
        let mut m = Mask::new(20, 20);
        m.rect(4, 4, 9, 9);
        m.rect(12, 12, 16, 18);
        let mut ex = BlobExtractor::new();
        let mut first = Vec::new();
        let mut second = Vec::new();
        ex.extract(&m.data, m.w, m.h, 1, &mut first);
        ex.extract(&m.data, m.w, m.h, 1, &mut second);
        assert_eq!(first, second);
    }

    #[test]
    fn color_for_id_is_stable_and_bright() {
        assert_eq!(color_for_id(7), color_for_id(7));
        for id in 0..64 {
            assert!(color_for_id(id).iter().all(|&c| c >= 50));
        }
    }
}
