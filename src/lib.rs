//! Deterministic 2D arcade physics
//!
//! Core modules:
//! - `fx`: 8.8 fixed-point scalar underlying all positional math
//! - `sprite` / `hitbox` / `image`: entities, collision boxes, opacity masks
//! - `tilemap`: tile grid with independent wall flags
//! - `physics`: the per-tick engine and the uniform-grid spatial hash
//! - `scene`: owning context tying one simulation together
//!
//! The whole simulation is single-threaded and run-to-completion: one call
//! to [`Scene::update`] is one atomic tick, phases in a fixed order, sprites
//! visited in creation order. Identical inputs replay to identical sub-pixel
//! positions.

pub mod camera;
pub mod error;
pub mod fx;
pub mod hitbox;
pub mod image;
pub mod physics;
pub mod scene;
pub mod sprite;
pub mod tilemap;

pub use camera::Camera;
pub use error::{ConfigError, SpriteError, TileMapError};
pub use image::Image;
pub use physics::{ArcadePhysicsEngine, EngineStats, Handlers, PhysicsConfig};
pub use scene::Scene;
pub use sprite::{Sprite, SpriteFlags, SpriteId};
pub use tilemap::{Location, StaticObstacle, TileMap, TileMapData, TileScale};

/// Engine-wide constants
pub mod consts {
    /// Cap on a single tick's simulated time; a longer stall integrates as
    /// one step of this length and the rest of the frame is dropped.
    pub const MAX_TIME_STEP_MS: u32 = 100;

    /// Default camera viewport width in pixels.
    pub const SCREEN_WIDTH: i32 = 160;
    /// Default camera viewport height in pixels.
    pub const SCREEN_HEIGHT: i32 = 120;

    /// Default per-axis speed cap, px/s.
    pub const DEFAULT_MAX_SPEED: f32 = 500.0;
    /// Sub-steps are never halved below this, px.
    pub const DEFAULT_MIN_SINGLE_STEP: f32 = 2.0;
    /// No sub-step moves a sprite further than this, px.
    pub const DEFAULT_MAX_SINGLE_STEP: f32 = 4.0;
    /// Walls reflect velocity exactly by default.
    pub const DEFAULT_BOUNCE: f32 = 1.0;

    /// Extra slack outside the camera before auto-destroy reaps a sprite.
    pub const OFFSCREEN_DESTROY_MARGIN: i32 = 2;
}
