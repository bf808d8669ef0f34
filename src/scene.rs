//! Scene context
//!
//! A `Scene` owns exactly one physics engine, optional tilemap, camera,
//! handler registry and RNG — the full state of one independent simulation.
//! Nothing is ambient or global: two scenes can tick side by side (the tests
//! do exactly that), and everything a tick touches is reachable from here.

use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::camera::Camera;
use crate::error::{ConfigError, SpriteError};
use crate::image::Image;
use crate::physics::{ArcadePhysicsEngine, EngineStats, Handlers, PhysicsConfig};
use crate::sprite::{Sprite, SpriteId};
use crate::tilemap::{Location, TileMap, TileMapData};

/// One self-contained simulation: sprites, physics, tilemap, camera,
/// collision handlers and a seeded RNG.
pub struct Scene {
    pub camera: Camera,
    physics: ArcadePhysicsEngine,
    tile_map: Option<TileMap>,
    handlers: Handlers,
    rng: Pcg32,
    time_ticks: u64,
}

impl Scene {
    /// Scene with default physics tuning. The seed drives tile sampling and
    /// nothing else; two scenes with equal seeds and inputs replay equally.
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, PhysicsConfig::default())
            .expect("default physics config is valid")
    }

    pub fn with_config(seed: u64, config: PhysicsConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            camera: Camera::default(),
            physics: ArcadePhysicsEngine::new(config)?,
            tile_map: None,
            handlers: Handlers::new(),
            rng: Pcg32::seed_from_u64(seed),
            time_ticks: 0,
        })
    }

    // --- sprites ---

    /// Create a sprite and add it to this scene's sprite list.
    pub fn create_sprite(&mut self, image: Image, kind: i32) -> SpriteId {
        let id = self.physics.create_sprite(image, kind);
        log::debug!("created sprite {} (kind {kind})", id.0);
        id
    }

    /// Remove a sprite immediately (outside the tick).
    pub fn destroy_sprite(&mut self, id: SpriteId) -> Result<(), SpriteError> {
        self.physics.remove_sprite(id).map(|_| ())
    }

    pub fn sprite(&self, id: SpriteId) -> Option<&Sprite> {
        self.physics.sprite(id)
    }

    pub fn sprite_mut(&mut self, id: SpriteId) -> Option<&mut Sprite> {
        self.physics.sprite_mut(id)
    }

    /// Live sprites in creation order.
    pub fn sprites(&self) -> &[Sprite] {
        self.physics.sprites()
    }

    // --- tilemap ---

    pub fn set_tile_map(&mut self, data: TileMapData) {
        log::info!(
            "tilemap set: {}x{} tiles of {} px",
            data.columns(),
            data.rows(),
            data.scale().tile_size()
        );
        self.tile_map = Some(TileMap::new(data));
    }

    pub fn clear_tile_map(&mut self) {
        self.tile_map = None;
    }

    pub fn tile_map(&self) -> Option<&TileMap> {
        self.tile_map.as_ref()
    }

    pub fn tile_map_mut(&mut self) -> Option<&mut TileMap> {
        self.tile_map.as_mut()
    }

    /// Up to `max_count` uniformly sampled locations of a tile index, e.g.
    /// for spawn placement. Draws from the scene RNG.
    pub fn sample_tiles_by_type(&mut self, tile: u8, max_count: usize) -> Vec<Location> {
        match &self.tile_map {
            Some(tm) => tm.sample_tiles_by_type(tile, max_count, &mut self.rng),
            None => Vec::new(),
        }
    }

    // --- handlers ---

    /// Run `handler` when a sprite of `kind` overlaps one of `other_kind`.
    pub fn on_overlap<F>(&mut self, kind: i32, other_kind: i32, handler: F)
    where
        F: FnMut(&mut Sprite, &mut Sprite) + 'static,
    {
        self.handlers.on_overlap(kind, other_kind, handler);
    }

    /// Run `handler` when a sprite of `kind` collides with a wall.
    pub fn on_hit_wall<F>(&mut self, kind: i32, handler: F)
    where
        F: FnMut(&mut Sprite, Location) + 'static,
    {
        self.handlers.on_hit_wall(kind, handler);
    }

    /// Run `handler` when a sprite of `kind` overlaps the given tile index.
    pub fn on_overlap_tile<F>(&mut self, kind: i32, tile: u8, handler: F)
    where
        F: FnMut(&mut Sprite, Location) + 'static,
    {
        self.handlers.on_overlap_tile(kind, tile, handler);
    }

    // --- simulation ---

    /// Run one physics tick of `dt_ms` simulated milliseconds.
    pub fn update(&mut self, dt_ms: u32) {
        self.physics
            .move_tick(dt_ms, self.tile_map.as_ref(), &self.camera, &mut self.handlers);
        self.time_ticks += 1;
    }

    /// Scripted move that still resolves walls and screen edges.
    pub fn move_sprite(&mut self, id: SpriteId, dx: f32, dy: f32) -> Result<(), SpriteError> {
        self.physics.move_sprite(
            id,
            dx,
            dy,
            self.tile_map.as_ref(),
            &self.camera,
            &mut self.handlers,
        )
    }

    /// Sprites currently overlapping `id` (spawn-placement checks etc.).
    pub fn overlaps(&self, id: SpriteId) -> Vec<SpriteId> {
        self.physics.overlaps(id)
    }

    pub fn time_ticks(&self) -> u64 {
        self.time_ticks
    }

    pub fn debug_stats(&self) -> EngineStats {
        self.physics.debug_stats()
    }

    pub fn physics(&self) -> &ArcadePhysicsEngine {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut ArcadePhysicsEngine {
        &mut self.physics
    }
}
