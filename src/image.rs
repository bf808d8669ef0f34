//! Opacity masks
//!
//! Physics never looks at colors — only at which pixels exist. `Image` is a
//! packed 1-bit opacity mask: it sizes hitboxes (opaque-extent bounding box)
//! and backs the pixel-perfect overlap confirm step.

use serde::{Deserialize, Serialize};

/// Row-major 1-bit opacity mask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    width: i32,
    height: i32,
    bits: Vec<u8>,
}

impl Image {
    /// Fully transparent image.
    pub fn new(width: i32, height: i32) -> Self {
        let (width, height) = (width.max(0), height.max(0));
        let len = ((width * height) as usize).div_ceil(8);
        Self {
            width,
            height,
            bits: vec![0; len],
        }
    }

    /// Fully opaque image.
    pub fn solid(width: i32, height: i32) -> Self {
        let mut img = Self::new(width, height);
        for b in &mut img.bits {
            *b = 0xff;
        }
        img
    }

    /// Build from rows of ascii art: `.` and ` ` are transparent, anything
    /// else is opaque. Rows may be ragged; short rows pad with transparent.
    pub fn from_ascii(rows: &[&str]) -> Self {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0) as i32;
        let mut img = Self::new(width, rows.len() as i32);
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                if ch != '.' && ch != ' ' {
                    img.set_pixel(x as i32, y as i32, true);
                }
            }
        }
        img
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Opacity at (x, y); out-of-range reads are transparent.
    #[inline]
    pub fn pixel(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return false;
        }
        let idx = (y * self.width + x) as usize;
        self.bits[idx / 8] & (1 << (idx % 8)) != 0
    }

    #[inline]
    pub fn set_pixel(&mut self, x: i32, y: i32, on: bool) {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return;
        }
        let idx = (y * self.width + x) as usize;
        if on {
            self.bits[idx / 8] |= 1 << (idx % 8);
        } else {
            self.bits[idx / 8] &= !(1 << (idx % 8));
        }
    }

    /// Minimal bounding box of opaque pixels as `(x, y, width, height)`,
    /// or `None` when every pixel is transparent.
    pub fn opaque_bounds(&self) -> Option<(i32, i32, i32, i32)> {
        let (mut min_x, mut min_y) = (self.width, self.height);
        let (mut max_x, mut max_y) = (-1, -1);
        for y in 0..self.height {
            for x in 0..self.width {
                if self.pixel(x, y) {
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }
        if max_x < 0 {
            None
        } else {
            Some((min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
        }
    }
}

/// Pixel-perfect overlap between two placed, scaled masks.
///
/// `*_left`/`*_top` are screen-space pixel positions of each image's origin;
/// `*_sx`/`*_sy` scale image pixels up to screen pixels. Screen pixels in the
/// intersection are sampled back through the inverse scale; one pixel opaque
/// in both masks is enough.
#[allow(clippy::too_many_arguments)]
pub fn pixels_overlap(
    a: &Image,
    a_left: i32,
    a_top: i32,
    a_sx: f32,
    a_sy: f32,
    b: &Image,
    b_left: i32,
    b_top: i32,
    b_sx: f32,
    b_sy: f32,
) -> bool {
    let a_w = (a.width() as f32 * a_sx).ceil() as i32;
    let a_h = (a.height() as f32 * a_sy).ceil() as i32;
    let b_w = (b.width() as f32 * b_sx).ceil() as i32;
    let b_h = (b.height() as f32 * b_sy).ceil() as i32;

    let left = a_left.max(b_left);
    let top = a_top.max(b_top);
    let right = (a_left + a_w).min(b_left + b_w);
    let bottom = (a_top + a_h).min(b_top + b_h);
    if left >= right || top >= bottom {
        return false;
    }

    for y in top..bottom {
        for x in left..right {
            let ax = ((x - a_left) as f32 / a_sx) as i32;
            let ay = ((y - a_top) as f32 / a_sy) as i32;
            if !a.pixel(ax, ay) {
                continue;
            }
            let bx = ((x - b_left) as f32 / b_sx) as i32;
            let by = ((y - b_top) as f32 / b_sy) as i32;
            if b.pixel(bx, by) {
                return true;
            }
        }
    }
    false
}
