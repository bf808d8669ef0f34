//! Hitboxes
//!
//! A hitbox is the minimal axis-aligned box around a sprite's opaque pixels,
//! scaled by the sprite's scale factors and stored as an offset + size in
//! sub-pixel units. It caches a content hash of whatever it was computed
//! from; owners compare hashes to recompute lazily instead of rescanning the
//! image every frame.
//!
//! Absolute edges are never cached — they derive from the owner's current
//! position at call time via [`Hitbox::bounds_at`].

use crate::fx::Fx8;
use crate::image::Image;

/// Sprite-relative collision box in sub-pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hitbox {
    /// Offset of the box from the sprite's top-left corner.
    pub ox: Fx8,
    pub oy: Fx8,
    pub width: Fx8,
    pub height: Fx8,
    hash: u32,
}

impl Hitbox {
    /// Derive from an image's opaque extents and scale. A fully transparent
    /// image yields a zero-area box, which never overlaps anything.
    pub fn compute(image: &Image, sx: f32, sy: f32, hash: u32) -> Self {
        match image.opaque_bounds() {
            Some((x, y, w, h)) => Self {
                ox: Fx8::from_float(x as f32 * sx),
                oy: Fx8::from_float(y as f32 * sy),
                width: Fx8::from_float(w as f32 * sx),
                height: Fx8::from_float(h as f32 * sy),
                hash,
            },
            None => Self {
                ox: Fx8::ZERO,
                oy: Fx8::ZERO,
                width: Fx8::ZERO,
                height: Fx8::ZERO,
                hash,
            },
        }
    }

    /// Content hash this box was computed from.
    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// Cheap staleness check against the owner's current content hash.
    pub fn is_valid_for(&self, hash: u32) -> bool {
        self.hash == hash
    }

    /// Absolute edges given the owning sprite's top-left position.
    #[inline]
    pub fn bounds_at(&self, x: Fx8, y: Fx8) -> Bounds {
        let left = x + self.ox;
        let top = y + self.oy;
        Bounds {
            left,
            top,
            right: left + self.width,
            bottom: top + self.height,
        }
    }
}

/// Absolute axis-aligned interval pair in sub-pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub left: Fx8,
    pub top: Fx8,
    pub right: Fx8,
    pub bottom: Fx8,
}

impl Bounds {
    /// Strict interval intersection: touching edges do not overlap, and a
    /// zero-area box overlaps nothing (including itself).
    #[inline]
    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    /// Point membership, inclusive of the left/top edge.
    #[inline]
    pub fn contains(&self, x: Fx8, y: Fx8) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    pub fn width(&self) -> Fx8 {
        self.right - self.left
    }

    pub fn height(&self) -> Fx8 {
        self.bottom - self.top
    }
}
