//! Camera viewport
//!
//! The physics engine reads the camera rectangle for screen-edge clamping,
//! bouncing and off-screen auto-destroy. Physics never moves the camera;
//! the scene driver owns it.

use serde::{Deserialize, Serialize};

use crate::consts::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// World-space viewport rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// World x of the left edge.
    pub offset_x: f32,
    /// World y of the top edge.
    pub offset_y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            width: SCREEN_WIDTH as f32,
            height: SCREEN_HEIGHT as f32,
        }
    }
}

impl Camera {
    pub fn left(&self) -> f32 {
        self.offset_x
    }

    pub fn top(&self) -> f32 {
        self.offset_y
    }

    pub fn right(&self) -> f32 {
        self.offset_x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.offset_y + self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_follow_offset() {
        let cam = Camera {
            offset_x: 10.0,
            offset_y: -5.0,
            width: 160.0,
            height: 120.0,
        };
        assert_eq!(cam.left(), 10.0);
        assert_eq!(cam.right(), 170.0);
        assert_eq!(cam.top(), -5.0);
        assert_eq!(cam.bottom(), 115.0);
    }
}
