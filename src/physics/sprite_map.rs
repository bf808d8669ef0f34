//! Uniform-grid spatial hash
//!
//! Buckets sprite indices into fixed-size grid cells so the overlap pass
//! tests near-neighbors instead of all pairs. Cells are sized from the
//! largest hitbox observed (about 2x its extent, clamped to the playfield),
//! so any overlapping pair lands in the same or an adjacent cell. Sprites
//! larger than one cell are inserted into every bucket they span; that
//! duplication is what keeps the candidate query free of false negatives.
//!
//! The map is cleared and rebuilt once per physics tick.

use crate::hitbox::Bounds;
use crate::sprite::{Sprite, SpriteFlags};

const MIN_CELL: i32 = 8;

/// Spatial hash over sprite indices. Holds no sprite ownership — indices
/// refer into the engine's sprite list for the current tick.
#[derive(Debug, Default)]
pub struct SpriteMap {
    cell_width: i32,
    cell_height: i32,
    column_count: i32,
    row_count: i32,
    buckets: Vec<Vec<usize>>,
}

impl SpriteMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty every bucket; called once per tick before re-insertion.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|b| b.is_empty())
    }

    /// Recompute the grid resolution from the sprite population's maximum
    /// hitbox extents and the playfield size.
    pub fn resize_buckets(&mut self, sprites: &[Sprite], area_width: i32, area_height: i32) {
        let mut max_width = 0;
        let mut max_height = 0;
        for sprite in sprites {
            let hb = sprite.hitbox();
            max_width = max_width.max(hb.width.to_int());
            max_height = max_height.max(hb.height.to_int());
        }

        self.cell_width = (max_width * 2).clamp(MIN_CELL, (area_width >> 2).max(MIN_CELL));
        self.cell_height = (max_height * 2).clamp(MIN_CELL, (area_height >> 2).max(MIN_CELL));
        self.column_count = area_width / self.cell_width + 1;
        self.row_count = area_height / self.cell_height + 1;

        let cells = (self.column_count * self.row_count) as usize;
        if self.buckets.len() != cells {
            self.buckets = vec![Vec::new(); cells];
        } else {
            self.clear();
        }
    }

    #[inline]
    fn bucket_index(&self, column: i32, row: i32) -> usize {
        let c = column.clamp(0, self.column_count - 1);
        let r = row.clamp(0, self.row_count - 1);
        (r * self.column_count + c) as usize
    }

    /// Cell range spanned by bounds, in (c0, r0, c1, r1) form.
    #[inline]
    fn cell_range(&self, bounds: &Bounds) -> (i32, i32, i32, i32) {
        (
            bounds.left.to_int() / self.cell_width,
            bounds.top.to_int() / self.cell_height,
            bounds.right.to_int() / self.cell_width,
            bounds.bottom.to_int() / self.cell_height,
        )
    }

    /// Insert a sprite into every bucket its hitbox spans.
    pub fn insert_aabb(&mut self, sprites: &[Sprite], idx: usize) {
        if self.buckets.is_empty() {
            return;
        }
        let bounds = sprites[idx].bounds();
        let (c0, r0, c1, r1) = self.cell_range(&bounds);
        for row in r0..=r1 {
            for column in c0..=c1 {
                let at = self.bucket_index(column, row);
                let bucket = &mut self.buckets[at];
                // Clamping at the playfield border can fold several cells
                // into one bucket; keep entries unique.
                if bucket.last() != Some(&idx) && !bucket.contains(&idx) {
                    bucket.push(idx);
                }
            }
        }
    }

    /// Candidate neighbors: the deduplicated union of every bucket the
    /// sprite's hitbox spans. Candidates only — callers confirm overlap.
    pub fn neighbors(&self, sprites: &[Sprite], idx: usize) -> Vec<usize> {
        let mut out = Vec::new();
        if self.buckets.is_empty() {
            return out;
        }
        let bounds = sprites[idx].bounds();
        let (c0, r0, c1, r1) = self.cell_range(&bounds);
        for row in r0..=r1 {
            for column in c0..=c1 {
                for &other in &self.buckets[self.bucket_index(column, row)] {
                    if other != idx && !out.contains(&other) {
                        out.push(other);
                    }
                }
            }
        }
        out.sort_unstable();
        out
    }

    /// Neighbors confirmed by the full overlap test, excluding destroyed
    /// sprites and sprites that ghost through sprite overlaps.
    pub fn overlaps(&self, sprites: &[Sprite], idx: usize) -> Vec<usize> {
        let sprite = &sprites[idx];
        self.neighbors(sprites, idx)
            .into_iter()
            .filter(|&other| {
                let o = &sprites[other];
                !o.is_destroyed()
                    && !o.flags.intersects(SpriteFlags::GHOST_THROUGH_SPRITES)
                    && sprite.overlaps_with(o)
            })
            .collect()
    }

    /// Occupancy snapshot for diagnostics.
    pub fn stats(&self) -> SpriteMapStats {
        let occupied = self.buckets.iter().filter(|b| !b.is_empty()).count();
        let candidate_pairs = self
            .buckets
            .iter()
            .map(|b| b.len() * b.len().saturating_sub(1) / 2)
            .sum();
        SpriteMapStats {
            cell_width: self.cell_width,
            cell_height: self.cell_height,
            buckets: self.buckets.len(),
            occupied_buckets: occupied,
            candidate_pairs,
        }
    }
}

/// Grid occupancy counters reported by [`SpriteMap::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteMapStats {
    pub cell_width: i32,
    pub cell_height: i32,
    pub buckets: usize,
    pub occupied_buckets: usize,
    pub candidate_pairs: usize,
}
