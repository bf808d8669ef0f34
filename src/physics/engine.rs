//! Arcade physics engine
//!
//! Axis-aligned bounding-box physics over fixed-point sprite state. Each
//! tick runs a fixed phase order: velocity integration, sub-stepped
//! movement with tile-wall resolution, screen-edge handling, then
//! sprite-sprite overlap dispatch through the spatial hash. Large per-tick
//! deltas are decomposed into sub-steps no longer than `max_single_step`
//! so fast sprites cannot tunnel through one-tile walls.
//!
//! Handlers run mid-tick and may reposition or destroy sprites; every later
//! phase re-checks the destroyed flag before touching a sprite, and a
//! sprite's remaining movement flips when its velocity is reversed under it.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::handlers::Handlers;
use super::sprite_map::{SpriteMap, SpriteMapStats};
use crate::camera::Camera;
use crate::consts::{
    DEFAULT_BOUNCE, DEFAULT_MAX_SINGLE_STEP, DEFAULT_MAX_SPEED, DEFAULT_MIN_SINGLE_STEP,
    MAX_TIME_STEP_MS, OFFSCREEN_DESTROY_MARGIN,
};
use crate::error::{ConfigError, SpriteError};
use crate::fx::Fx8;
use crate::image::Image;
use crate::sprite::{Sprite, SpriteFlags, SpriteId};
use crate::tilemap::TileMap;

/// Engine tuning, validated once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// Speed cap on each velocity axis, px/s.
    pub max_speed: f32,
    /// Sub-steps are never halved below this length, px.
    pub min_single_step: f32,
    /// No sub-step moves a sprite further than this, px.
    pub max_single_step: f32,
    /// Fraction of speed kept when reflecting off a wall; 1.0 = exact
    /// negation.
    pub bounce: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            max_speed: DEFAULT_MAX_SPEED,
            min_single_step: DEFAULT_MIN_SINGLE_STEP,
            max_single_step: DEFAULT_MAX_SINGLE_STEP,
            bounce: DEFAULT_BOUNCE,
        }
    }
}

impl PhysicsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_speed <= 0.0 {
            return Err(ConfigError::NonPositiveSpeedLimit(self.max_speed));
        }
        if self.max_single_step < self.min_single_step {
            return Err(ConfigError::StepBoundsInverted {
                min: self.min_single_step,
                max: self.max_single_step,
            });
        }
        if !(0.0..=1.0).contains(&self.bounce) {
            return Err(ConfigError::BounceOutOfRange(self.bounce));
        }
        Ok(())
    }
}

/// Per-tick movement record: a sprite paired with its cached velocity and
/// the remaining delta / per-sub-step increment. Never outlives the tick.
struct MovingSprite {
    idx: usize,
    cached_vx: Fx8,
    cached_vy: Fx8,
    dx: Fx8,
    dy: Fx8,
    x_step: Fx8,
    y_step: Fx8,
}

/// Wall hits and tile overlaps collected during movement, deduplicated per
/// (sprite, cell) per tick, dispatched after the movement loop.
#[derive(Default)]
struct TickEvents {
    wall_hits: Vec<(usize, i32, i32)>,
    wall_seen: HashSet<(usize, i32, i32)>,
    tile_overlaps: Vec<(usize, i32, i32, u8)>,
    tile_seen: HashSet<(usize, i32, i32)>,
}

impl TickEvents {
    fn record_wall(&mut self, idx: usize, column: i32, row: i32) {
        if self.wall_seen.insert((idx, column, row)) {
            self.wall_hits.push((idx, column, row));
        }
    }

    fn record_tile(&mut self, idx: usize, column: i32, row: i32, tile: u8) {
        if self.tile_seen.insert((idx, column, row)) {
            self.tile_overlaps.push((idx, column, row, tile));
        }
    }
}

/// Diagnostic counters reported by [`ArcadePhysicsEngine::debug_stats`].
#[derive(Debug, Clone, Copy)]
pub struct EngineStats {
    pub sprites: usize,
    pub tick_errors: u64,
    pub map: SpriteMapStats,
}

/// AABB physics over a scene's sprite list.
pub struct ArcadePhysicsEngine {
    sprites: Vec<Sprite>,
    map: SpriteMap,
    max_velocity: Fx8,
    max_negative_velocity: Fx8,
    min_single_step: Fx8,
    max_single_step: Fx8,
    bounce: Fx8,
    next_id: u32,
    tick_errors: u64,
}

impl ArcadePhysicsEngine {
    pub fn new(config: PhysicsConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let max_velocity = Fx8::from_float(config.max_speed);
        Ok(Self {
            sprites: Vec::new(),
            map: SpriteMap::new(),
            max_velocity,
            max_negative_velocity: -max_velocity,
            min_single_step: Fx8::from_float(config.min_single_step),
            max_single_step: Fx8::from_float(config.max_single_step),
            bounce: Fx8::from_float(config.bounce),
            next_id: 1,
            tick_errors: 0,
        })
    }

    /// Replace the per-axis speed cap, px/s.
    pub fn set_max_speed(&mut self, speed: f32) {
        self.max_velocity = Fx8::from_float(speed.abs());
        self.max_negative_velocity = -self.max_velocity;
    }

    pub fn max_speed(&self) -> f32 {
        self.max_velocity.to_float()
    }

    // --- sprite list ---

    /// Add a sprite to the simulation, in creation order.
    pub fn create_sprite(&mut self, image: Image, kind: i32) -> SpriteId {
        let id = SpriteId(self.next_id);
        self.next_id += 1;
        let mut sprite = Sprite::new(id, image, kind);
        sprite.update_hitbox_if_invalid();
        self.sprites.push(sprite);
        id
    }

    /// Remove a sprite immediately, preserving the order of the rest.
    pub fn remove_sprite(&mut self, id: SpriteId) -> Result<Sprite, SpriteError> {
        match self.sprites.iter().position(|s| s.id() == id) {
            Some(idx) => Ok(self.sprites.remove(idx)),
            None => Err(SpriteError::Unknown(id.0)),
        }
    }

    pub fn sprite(&self, id: SpriteId) -> Option<&Sprite> {
        self.sprites.iter().find(|s| s.id() == id)
    }

    pub fn sprite_mut(&mut self, id: SpriteId) -> Option<&mut Sprite> {
        self.sprites.iter_mut().find(|s| s.id() == id)
    }

    /// Live sprites in creation order.
    pub fn sprites(&self) -> &[Sprite] {
        &self.sprites
    }

    pub fn sprites_mut(&mut self) -> &mut [Sprite] {
        &mut self.sprites
    }

    // --- per-tick simulation ---

    /// Advance the simulation by `dt_ms` (capped at
    /// [`MAX_TIME_STEP_MS`]). Runs all collision phases and invokes the
    /// registered handlers at their ordering points.
    pub fn move_tick(
        &mut self,
        dt_ms: u32,
        tile_map: Option<&TileMap>,
        camera: &Camera,
        handlers: &mut Handlers,
    ) {
        let dt_ms = dt_ms.min(MAX_TIME_STEP_MS) as i32;
        if dt_ms == 0 || self.sprites.is_empty() {
            return;
        }
        let dt2_ms = (dt_ms / 2).max(1);

        for sprite in &mut self.sprites {
            if !sprite.is_destroyed() {
                sprite.tick_lifespan(dt_ms as u32);
            }
            sprite.update_hitbox_if_invalid();
        }

        let mut movers = Vec::with_capacity(self.sprites.len());
        for idx in 0..self.sprites.len() {
            if !self.sprites[idx].is_destroyed() {
                movers.push(self.integrate(idx, dt_ms, dt2_ms));
            }
        }

        // Worst-case sub-step budget: the fastest sprite moving in minimal
        // increments for the whole tick.
        let max_step_count = (self.max_velocity / self.min_single_step)
            .imul(dt_ms)
            .idiv(1000)
            .to_int()
            .max(1);

        let mut events = TickEvents::default();
        self.run_substeps(movers, max_step_count, tile_map, camera, &mut events);

        if let Some(tm) = tile_map {
            self.dispatch_tile_events(tm, handlers, events);
        }

        self.auto_destroy_offscreen(camera);

        self.rebuild_map(tile_map, camera);
        self.sprite_collisions(handlers);

        // End-of-tick upkeep: stale hitboxes recompute lazily on next use;
        // destroyed sprites leave the simulation now.
        self.sweep_destroyed();
    }

    /// Scripted repositioning outside the velocity integration. The move
    /// still runs the identical wall and screen-edge resolution, so scripted
    /// movement cannot clip through walls.
    pub fn move_sprite(
        &mut self,
        id: SpriteId,
        dx: f32,
        dy: f32,
        tile_map: Option<&TileMap>,
        camera: &Camera,
        handlers: &mut Handlers,
    ) -> Result<(), SpriteError> {
        let idx = self
            .sprites
            .iter()
            .position(|s| s.id() == id)
            .ok_or(SpriteError::Unknown(id.0))?;
        if self.sprites[idx].is_destroyed() {
            return Err(SpriteError::Destroyed(id.0));
        }
        self.sprites[idx].update_hitbox_if_invalid();

        let dx = Fx8::from_float(dx);
        let dy = Fx8::from_float(dy);
        let (x_step, y_step) = self.split_step(dx, dy);
        let sprite = &self.sprites[idx];
        let mover = MovingSprite {
            idx,
            cached_vx: sprite.vx,
            cached_vy: sprite.vy,
            dx,
            dy,
            x_step,
            y_step,
        };
        let steps_x = if x_step == Fx8::ZERO {
            0
        } else {
            (dx.abs() / x_step.abs()).to_int()
        };
        let steps_y = if y_step == Fx8::ZERO {
            0
        } else {
            (dy.abs() / y_step.abs()).to_int()
        };
        let max_step_count = steps_x.max(steps_y).max(1) + 1;

        let mut events = TickEvents::default();
        self.run_substeps(vec![mover], max_step_count, tile_map, camera, &mut events);
        if let Some(tm) = tile_map {
            self.dispatch_tile_events(tm, handlers, events);
        }
        Ok(())
    }

    /// All sprites currently overlapping `id`, by the same confirm logic the
    /// tick's overlap phase uses. Linear scan: always sound, even for
    /// sprites created or moved since the last tick.
    pub fn overlaps(&self, id: SpriteId) -> Vec<SpriteId> {
        let Some(sprite) = self.sprite(id) else {
            return Vec::new();
        };
        if sprite.is_destroyed() || sprite.flags.intersects(SpriteFlags::GHOST_THROUGH_SPRITES) {
            return Vec::new();
        }
        self.sprites
            .iter()
            .filter(|other| {
                other.id() != id
                    && !other.is_destroyed()
                    && !other.flags.intersects(SpriteFlags::GHOST_THROUGH_SPRITES)
                    && sprite.overlaps_with(other)
            })
            .map(|other| other.id())
            .collect()
    }

    /// Stamp hitbox outlines into `target` for a debug overlay.
    pub fn draw(&self, target: &mut Image, camera: &Camera) {
        for sprite in &self.sprites {
            if sprite.is_destroyed() {
                continue;
            }
            let b = sprite.bounds();
            let left = b.left.to_int() - camera.left() as i32;
            let top = b.top.to_int() - camera.top() as i32;
            let right = b.right.to_int() - camera.left() as i32;
            let bottom = b.bottom.to_int() - camera.top() as i32;
            for x in left..right {
                target.set_pixel(x, top, true);
                target.set_pixel(x, bottom - 1, true);
            }
            for y in top..bottom {
                target.set_pixel(left, y, true);
                target.set_pixel(right - 1, y, true);
            }
        }
    }

    pub fn debug_stats(&self) -> EngineStats {
        EngineStats {
            sprites: self.sprites.len(),
            tick_errors: self.tick_errors,
            map: self.map.stats(),
        }
    }

    // --- internals ---

    /// Apply friction and acceleration to velocity (midpoint rule for the
    /// positional delta), then pre-split the delta into sub-steps.
    fn integrate(&mut self, idx: usize, dt_ms: i32, dt2_ms: i32) -> MovingSprite {
        let vmin = self.max_negative_velocity;
        let vmax = self.max_velocity;
        let sprite = &mut self.sprites[idx];

        let ovx = sprite.vx.clamp(vmin, vmax);
        let ovy = sprite.vy.clamp(vmin, vmax);
        sprite.last_x = sprite.x;
        sprite.last_y = sprite.y;

        if sprite.ax != Fx8::ZERO {
            sprite.vx = sprite.vx + sprite.ax.imul(dt_ms).idiv(1000);
        } else if sprite.fx != Fx8::ZERO {
            let f = sprite.fx.imul(dt_ms).idiv(1000);
            match sprite.vx.compare(Fx8::ZERO) {
                Ordering::Less => sprite.vx = (sprite.vx + f).min(Fx8::ZERO),
                Ordering::Greater => sprite.vx = (sprite.vx - f).max(Fx8::ZERO),
                Ordering::Equal => {}
            }
        }
        if sprite.ay != Fx8::ZERO {
            sprite.vy = sprite.vy + sprite.ay.imul(dt_ms).idiv(1000);
        } else if sprite.fy != Fx8::ZERO {
            let f = sprite.fy.imul(dt_ms).idiv(1000);
            match sprite.vy.compare(Fx8::ZERO) {
                Ordering::Less => sprite.vy = (sprite.vy + f).min(Fx8::ZERO),
                Ordering::Greater => sprite.vy = (sprite.vy - f).max(Fx8::ZERO),
                Ordering::Equal => {}
            }
        }
        sprite.vx = sprite.vx.clamp(vmin, vmax);
        sprite.vy = sprite.vy.clamp(vmin, vmax);

        let cached_vx = sprite.vx;
        let cached_vy = sprite.vy;
        let dx = (cached_vx + ovx).imul(dt2_ms).idiv(1000);
        let dy = (cached_vy + ovy).imul(dt2_ms).idiv(1000);
        let (x_step, y_step) = self.split_step(dx, dy);

        MovingSprite {
            idx,
            cached_vx,
            cached_vy,
            dx,
            dy,
            x_step,
            y_step,
        }
    }

    /// Halve a delta until each axis step is within `max_single_step`,
    /// never shrinking an axis below `min_single_step`.
    fn split_step(&self, dx: Fx8, dy: Fx8) -> (Fx8, Fx8) {
        let mut x_step = dx;
        let mut y_step = dy;
        while x_step.abs() > self.max_single_step || y_step.abs() > self.max_single_step {
            if x_step.abs() > self.min_single_step {
                x_step = x_step.idiv(2);
            }
            if y_step.abs() > self.min_single_step {
                y_step = y_step.idiv(2);
            }
        }
        (x_step, y_step)
    }

    fn run_substeps(
        &mut self,
        mut movers: Vec<MovingSprite>,
        max_step_count: i32,
        tile_map: Option<&TileMap>,
        camera: &Camera,
        events: &mut TickEvents,
    ) {
        let bounce = self.bounce;
        let mut count = 0;
        while !movers.is_empty() && count < max_step_count {
            count += 1;
            let mut remaining = Vec::with_capacity(movers.len());
            for mut ms in movers {
                let idx = ms.idx;
                if self.sprites[idx].is_destroyed() {
                    continue;
                }

                // A collision or handler may have changed the velocity under
                // us; mirror a reversal onto the remaining delta.
                {
                    let sprite = &self.sprites[idx];
                    if ms.cached_vx != sprite.vx {
                        if sprite.vx == Fx8::ZERO {
                            ms.dx = Fx8::ZERO;
                        } else if (sprite.vx < Fx8::ZERO) != (ms.cached_vx < Fx8::ZERO) {
                            ms.dx = -ms.dx;
                            ms.x_step = -ms.x_step;
                        }
                        ms.cached_vx = sprite.vx;
                    }
                    if ms.cached_vy != sprite.vy {
                        if sprite.vy == Fx8::ZERO {
                            ms.dy = Fx8::ZERO;
                        } else if (sprite.vy < Fx8::ZERO) != (ms.cached_vy < Fx8::ZERO) {
                            ms.dy = -ms.dy;
                            ms.y_step = -ms.y_step;
                        }
                        ms.cached_vy = sprite.vy;
                    }
                }

                let step_x = if ms.x_step.abs() > ms.dx.abs() {
                    ms.dx
                } else {
                    ms.x_step
                };
                let step_y = if ms.y_step.abs() > ms.dy.abs() {
                    ms.dy
                } else {
                    ms.y_step
                };
                ms.dx = ms.dx - step_x;
                ms.dy = ms.dy - step_y;
                {
                    let sprite = &mut self.sprites[idx];
                    sprite.x = sprite.x + step_x;
                    sprite.y = sprite.y + step_y;
                }

                if let Some(tm) = tile_map {
                    Self::tilemap_collisions(
                        &mut self.sprites,
                        idx,
                        step_x,
                        step_y,
                        bounce,
                        tm,
                        events,
                        &mut self.tick_errors,
                    );
                }

                let flags = self.sprites[idx].flags;
                let bounce_at_edge = flags.intersects(SpriteFlags::BOUNCE_ON_WALL)
                    && tile_map.is_none();
                if !flags.intersects(SpriteFlags::GHOST_THROUGH_WALLS)
                    && (flags.intersects(SpriteFlags::STAY_IN_SCREEN) || bounce_at_edge)
                {
                    Self::screen_edge_collisions(&mut self.sprites[idx], camera, bounce);
                }

                if !self.sprites[idx].is_destroyed()
                    && (ms.dx != Fx8::ZERO || ms.dy != Fx8::ZERO)
                {
                    remaining.push(ms);
                }
            }
            movers = remaining;
        }
    }

    /// Resolve wall contacts for one sprite after a sub-step, and collect
    /// non-wall tile overlaps for end-of-movement dispatch.
    #[allow(clippy::too_many_arguments)]
    fn tilemap_collisions(
        sprites: &mut [Sprite],
        idx: usize,
        step_x: Fx8,
        step_y: Fx8,
        bounce: Fx8,
        tm: &TileMap,
        events: &mut TickEvents,
        tick_errors: &mut u64,
    ) {
        let shift = crate::fx::FRAC_BITS + tm.scale().log2();
        let sprite = &mut sprites[idx];
        let hb = sprite.hitbox();
        if hb.width == Fx8::ZERO || hb.height == Fx8::ZERO {
            return;
        }

        if !sprite.flags.intersects(SpriteFlags::GHOST_THROUGH_WALLS) {
            if sprite.clipping {
                // Embedded in a wall: pause resolution until the sprite
                // works itself free, so it can escape instead of jittering.
                if !tm.is_on_wall(sprite) {
                    sprite.clipping = false;
                }
            } else {
                // Horizontal leading edge.
                if step_x != Fx8::ZERO {
                    let b = hb.bounds_at(sprite.x, sprite.y);
                    let r0 = b.top.raw() >> shift;
                    let r1 = (b.bottom.raw() - 1) >> shift;
                    let column = if step_x > Fx8::ZERO {
                        (b.right.raw() - 1) >> shift
                    } else {
                        b.left.raw() >> shift
                    };
                    for row in r0..=r1 {
                        if !tm.is_obstacle(column, row) {
                            continue;
                        }
                        if step_x > Fx8::ZERO {
                            let tile_left = Fx8::from_raw(column << shift);
                            sprite.x = tile_left - hb.width - hb.ox;
                            if sprite.flags.intersects(SpriteFlags::BOUNCE_ON_WALL)
                                && sprite.vx > Fx8::ZERO
                            {
                                sprite.vx = -(sprite.vx * bounce);
                            }
                        } else {
                            let tile_right = Fx8::from_raw((column + 1) << shift);
                            sprite.x = tile_right - hb.ox;
                            if sprite.flags.intersects(SpriteFlags::BOUNCE_ON_WALL)
                                && sprite.vx < Fx8::ZERO
                            {
                                sprite.vx = -(sprite.vx * bounce);
                            }
                        }
                        events.record_wall(idx, column, row);
                        if sprite.flags.intersects(SpriteFlags::DESTROY_ON_WALL) {
                            sprite.destroy();
                        }
                        break;
                    }
                }

                // Vertical leading edge, at the possibly corrected x.
                if step_y != Fx8::ZERO && !sprite.is_destroyed() {
                    let b = hb.bounds_at(sprite.x, sprite.y);
                    let c0 = b.left.raw() >> shift;
                    let c1 = (b.right.raw() - 1) >> shift;
                    let row = if step_y > Fx8::ZERO {
                        (b.bottom.raw() - 1) >> shift
                    } else {
                        b.top.raw() >> shift
                    };
                    for column in c0..=c1 {
                        if !tm.is_obstacle(column, row) {
                            continue;
                        }
                        if step_y > Fx8::ZERO {
                            let tile_top = Fx8::from_raw(row << shift);
                            sprite.y = tile_top - hb.height - hb.oy;
                            if sprite.flags.intersects(SpriteFlags::BOUNCE_ON_WALL)
                                && sprite.vy > Fx8::ZERO
                            {
                                sprite.vy = -(sprite.vy * bounce);
                            }
                        } else {
                            let tile_bottom = Fx8::from_raw((row + 1) << shift);
                            sprite.y = tile_bottom - hb.oy;
                            if sprite.flags.intersects(SpriteFlags::BOUNCE_ON_WALL)
                                && sprite.vy < Fx8::ZERO
                            {
                                sprite.vy = -(sprite.vy * bounce);
                            }
                        }
                        events.record_wall(idx, column, row);
                        if sprite.flags.intersects(SpriteFlags::DESTROY_ON_WALL) {
                            sprite.destroy();
                        }
                        break;
                    }
                }

                // Still intersecting a wall after resolution (spawned inside
                // one, or squeezed by a corner): flag and let it escape.
                if !sprite.is_destroyed() && tm.is_on_wall(sprite) {
                    sprite.clipping = true;
                }
            }
        }

        // Non-wall tile overlaps, collected once per (sprite, cell) per tick.
        if !sprite.is_destroyed() && !sprite.flags.intersects(SpriteFlags::GHOST_THROUGH_TILES) {
            let b = hb.bounds_at(sprite.x, sprite.y);
            let c0 = b.left.raw() >> shift;
            let c1 = (b.right.raw() - 1) >> shift;
            let r0 = b.top.raw() >> shift;
            let r1 = (b.bottom.raw() - 1) >> shift;
            for row in r0..=r1 {
                for column in c0..=c1 {
                    if tm.data().is_outside(column, row) || tm.is_obstacle(column, row) {
                        continue;
                    }
                    match tm.data().get_tile(column, row) {
                        Ok(0) => {}
                        Ok(tile) => events.record_tile(idx, column, row, tile),
                        Err(err) => {
                            // Unreachable after the is_outside guard; count
                            // and keep the tick alive if it ever happens.
                            *tick_errors += 1;
                            log::warn!("tile lookup failed mid-tick: {err}");
                        }
                    }
                }
            }
        }
    }

    /// Clamp (and optionally reflect) a sprite at the camera rectangle.
    fn screen_edge_collisions(sprite: &mut Sprite, camera: &Camera, bounce: Fx8) {
        let hb = sprite.hitbox();
        if hb.width == Fx8::ZERO || hb.height == Fx8::ZERO {
            return;
        }
        let (left, top) = if sprite.flags.intersects(SpriteFlags::RELATIVE_TO_CAMERA) {
            (0.0, 0.0)
        } else {
            (camera.left(), camera.top())
        };
        let cam_left = Fx8::from_float(left);
        let cam_top = Fx8::from_float(top);
        let cam_right = Fx8::from_float(left + camera.width);
        let cam_bottom = Fx8::from_float(top + camera.height);
        let do_bounce = sprite.flags.intersects(SpriteFlags::BOUNCE_ON_WALL);

        let b = hb.bounds_at(sprite.x, sprite.y);
        if b.left < cam_left {
            sprite.x = cam_left - hb.ox;
            if do_bounce && sprite.vx < Fx8::ZERO {
                sprite.vx = -(sprite.vx * bounce);
            }
        } else if b.right > cam_right {
            sprite.x = cam_right - hb.width - hb.ox;
            if do_bounce && sprite.vx > Fx8::ZERO {
                sprite.vx = -(sprite.vx * bounce);
            }
        }
        let b = hb.bounds_at(sprite.x, sprite.y);
        if b.top < cam_top {
            sprite.y = cam_top - hb.oy;
            if do_bounce && sprite.vy < Fx8::ZERO {
                sprite.vy = -(sprite.vy * bounce);
            }
        } else if b.bottom > cam_bottom {
            sprite.y = cam_bottom - hb.height - hb.oy;
            if do_bounce && sprite.vy > Fx8::ZERO {
                sprite.vy = -(sprite.vy * bounce);
            }
        }
    }

    /// Wall-hit and tile-overlap handler dispatch, in event order. Wall
    /// handlers still see a sprite the wall itself destroyed this tick;
    /// tile-overlap handlers skip destroyed sprites.
    fn dispatch_tile_events(&mut self, tm: &TileMap, handlers: &mut Handlers, events: TickEvents) {
        for (idx, column, row) in events.wall_hits {
            let kind = self.sprites[idx].kind();
            let location = tm.location(column, row);
            for h in handlers.wall.iter_mut().filter(|h| h.kind == kind) {
                (h.handler)(&mut self.sprites[idx], location);
            }
        }
        for (idx, column, row, tile) in events.tile_overlaps {
            if self.sprites[idx].is_destroyed() {
                continue;
            }
            let kind = self.sprites[idx].kind();
            let location = tm.location(column, row);
            for h in handlers
                .tile
                .iter_mut()
                .filter(|h| h.kind == kind && h.tile == tile)
            {
                if self.sprites[idx].is_destroyed() {
                    break;
                }
                (h.handler)(&mut self.sprites[idx], location);
            }
        }
    }

    /// Destroy auto-destroy sprites once fully outside the camera grown by
    /// a hysteresis margin, so partially visible sprites survive.
    fn auto_destroy_offscreen(&mut self, camera: &Camera) {
        let margin = OFFSCREEN_DESTROY_MARGIN as f32;
        let left = Fx8::from_float(camera.left() - margin);
        let top = Fx8::from_float(camera.top() - margin);
        let right = Fx8::from_float(camera.right() + margin);
        let bottom = Fx8::from_float(camera.bottom() + margin);
        for sprite in &mut self.sprites {
            if sprite.is_destroyed() || !sprite.flags.intersects(SpriteFlags::AUTO_DESTROY) {
                continue;
            }
            let b = sprite.bounds();
            if b.right < left || b.left > right || b.bottom < top || b.top > bottom {
                log::debug!("sprite {} auto-destroyed off screen", sprite.id().0);
                sprite.destroy();
            }
        }
    }

    fn rebuild_map(&mut self, tile_map: Option<&TileMap>, camera: &Camera) {
        let (area_w, area_h) = match tile_map {
            Some(tm) => (tm.area_width(), tm.area_height()),
            None => (camera.width as i32, camera.height as i32),
        };
        for sprite in &mut self.sprites {
            sprite.update_hitbox_if_invalid();
        }
        self.map
            .resize_buckets(&self.sprites, area_w.max(1), area_h.max(1));
        for idx in 0..self.sprites.len() {
            if !self.sprites[idx].is_destroyed() {
                self.map.insert_aabb(&self.sprites, idx);
            }
        }
    }

    /// Confirmed overlap pairs through the spatial map; registered handlers
    /// fire once per pair per tick, in registration order.
    fn sprite_collisions(&mut self, handlers: &mut Handlers) {
        if handlers.overlap.is_empty() {
            return;
        }
        let mut fired: HashSet<(u32, u32, usize)> = HashSet::new();
        for i in 0..self.sprites.len() {
            if self.sprites[i].is_destroyed()
                || self.sprites[i]
                    .flags
                    .intersects(SpriteFlags::GHOST_THROUGH_SPRITES)
            {
                continue;
            }
            let candidates = self.map.overlaps(&self.sprites, i);
            for j in candidates {
                if self.sprites[i].is_destroyed() {
                    break;
                }
                if self.sprites[j].is_destroyed() {
                    continue;
                }
                let kind_a = self.sprites[i].kind();
                let kind_b = self.sprites[j].kind();
                let id_a = self.sprites[i].id().0;
                let id_b = self.sprites[j].id().0;
                let pair = (id_a.min(id_b), id_a.max(id_b));
                for slot in 0..handlers.overlap.len() {
                    let (h_kind, h_other) = {
                        let h = &handlers.overlap[slot];
                        (h.kind, h.other_kind)
                    };
                    let forward = h_kind == kind_a && h_other == kind_b;
                    let backward = h_kind == kind_b && h_other == kind_a;
                    if !forward && !backward {
                        continue;
                    }
                    if !fired.insert((pair.0, pair.1, slot)) {
                        continue;
                    }
                    if self.sprites[i].is_destroyed() || self.sprites[j].is_destroyed() {
                        continue;
                    }
                    let (first, second) = if forward { (i, j) } else { (j, i) };
                    let (a, b) = split_two_mut(&mut self.sprites, first, second);
                    (handlers.overlap[slot].handler)(a, b);
                }
            }
        }
    }

    fn sweep_destroyed(&mut self) {
        let before = self.sprites.len();
        self.sprites.retain(|s| !s.is_destroyed());
        let removed = before - self.sprites.len();
        if removed > 0 {
            log::debug!("swept {removed} destroyed sprite(s)");
        }
    }
}

/// Two distinct mutable references into the sprite list.
fn split_two_mut(sprites: &mut [Sprite], a: usize, b: usize) -> (&mut Sprite, &mut Sprite) {
    debug_assert_ne!(a, b);
    if a < b {
        let (lo, hi) = sprites.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = sprites.split_at_mut(a);
        (&mut hi[0], &mut lo[b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tilemap::{TileMapData, TileScale};
    use glam::Vec2;
    use std::cell::Cell;
    use std::rc::Rc;

    const TICK: u32 = 16;

    fn engine() -> ArcadePhysicsEngine {
        ArcadePhysicsEngine::new(PhysicsConfig::default()).unwrap()
    }

    /// 20x15 map of 8px tiles (160x120 playfield) with a solid column at
    /// column 10 (pixels 80..88).
    fn wall_column_map() -> TileMap {
        let tileset = vec![Image::new(8, 8), Image::solid(8, 8), Image::solid(8, 8)];
        let mut data = TileMapData::new(20, 15, tileset, TileScale::Eight).unwrap();
        for row in 0..15 {
            data.set_wall(10, row, true).unwrap();
        }
        TileMap::new(data)
    }

    fn spawn(engine: &mut ArcadePhysicsEngine, kind: i32, left: f32, top: f32) -> SpriteId {
        let id = engine.create_sprite(Image::solid(8, 8), kind);
        let s = engine.sprite_mut(id).unwrap();
        s.set_left(left);
        s.set_top(top);
        id
    }

    #[test]
    fn config_validation_fails_fast() {
        let bad_steps = PhysicsConfig {
            min_single_step: 4.0,
            max_single_step: 2.0,
            ..PhysicsConfig::default()
        };
        assert!(matches!(
            ArcadePhysicsEngine::new(bad_steps),
            Err(ConfigError::StepBoundsInverted { .. })
        ));
        let bad_speed = PhysicsConfig {
            max_speed: 0.0,
            ..PhysicsConfig::default()
        };
        assert!(matches!(
            ArcadePhysicsEngine::new(bad_speed),
            Err(ConfigError::NonPositiveSpeedLimit(_))
        ));
        let bad_bounce = PhysicsConfig {
            bounce: 1.5,
            ..PhysicsConfig::default()
        };
        assert!(matches!(
            ArcadePhysicsEngine::new(bad_bounce),
            Err(ConfigError::BounceOutOfRange(_))
        ));
    }

    #[test]
    fn bounce_reflects_velocity_without_penetrating() {
        let mut eng = engine();
        let tm = wall_column_map();
        let cam = Camera::default();
        let mut handlers = Handlers::new();

        // Right edge one pixel short of the wall at x=80, moving right.
        let id = spawn(&mut eng, 0, 71.0, 40.0);
        {
            let s = eng.sprite_mut(id).unwrap();
            s.set_velocity(Vec2::new(100.0, 0.0));
            s.set_bounce_on_wall(true);
        }

        eng.move_tick(TICK, Some(&tm), &cam, &mut handlers);

        let s = eng.sprite(id).unwrap();
        assert_eq!(s.velocity().x, -100.0);
        assert!(s.right() <= 80.0, "right edge {} penetrates wall", s.right());
    }

    #[test]
    fn destroy_on_wall_removes_sprite_from_engine() {
        let mut eng = engine();
        let tm = wall_column_map();
        let cam = Camera::default();
        let mut handlers = Handlers::new();

        let id = spawn(&mut eng, 0, 71.0, 40.0);
        let other = spawn(&mut eng, 0, 71.0, 40.0);
        {
            let s = eng.sprite_mut(id).unwrap();
            s.set_velocity(Vec2::new(100.0, 0.0));
            s.set_flag(SpriteFlags::DESTROY_ON_WALL, true);
        }

        eng.move_tick(TICK, Some(&tm), &cam, &mut handlers);

        assert!(eng.sprite(id).is_none());
        assert!(eng.overlaps(other).is_empty());
    }

    #[test]
    fn wall_hit_handler_fires_for_sprite_the_wall_destroyed() {
        let mut eng = engine();
        let tm = wall_column_map();
        let cam = Camera::default();
        let mut handlers = Handlers::new();

        let hits = Rc::new(Cell::new(0u32));
        let hits_in = hits.clone();
        handlers.on_hit_wall(3, move |sprite, location| {
            assert!(sprite.is_destroyed());
            assert_eq!(location.column, 10);
            hits_in.set(hits_in.get() + 1);
        });

        let id = spawn(&mut eng, 3, 71.0, 40.0);
        {
            let s = eng.sprite_mut(id).unwrap();
            s.set_velocity(Vec2::new(100.0, 0.0));
            s.set_flag(SpriteFlags::DESTROY_ON_WALL, true);
        }
        eng.move_tick(TICK, Some(&tm), &cam, &mut handlers);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn no_tunneling_through_one_tile_wall() {
        let mut eng = engine();
        let tm = wall_column_map();
        let cam = Camera::default();
        let mut handlers = Handlers::new();

        let hits = Rc::new(Cell::new(0u32));
        let hits_in = hits.clone();
        handlers.on_hit_wall(0, move |_, _| hits_in.set(hits_in.get() + 1));

        // Full speed into the wall with the longest permitted timestep:
        // 50 px of travel against an 8 px wall face at x=80.
        let id = spawn(&mut eng, 0, 40.0, 40.0);
        eng.sprite_mut(id)
            .unwrap()
            .set_velocity(Vec2::new(500.0, 0.0));

        eng.move_tick(100, Some(&tm), &cam, &mut handlers);

        let s = eng.sprite(id).unwrap();
        assert!(
            s.right() <= 80.0,
            "sprite ended at right={} beyond the wall face",
            s.right()
        );
        assert!(hits.get() >= 1, "no collision event fired");
    }

    #[test]
    fn wall_hits_deduplicate_per_tick() {
        let mut eng = engine();
        let tm = wall_column_map();
        let cam = Camera::default();
        let mut handlers = Handlers::new();

        let hits = Rc::new(Cell::new(0u32));
        let hits_in = hits.clone();
        handlers.on_hit_wall(0, move |_, _| hits_in.set(hits_in.get() + 1));

        // Pressed against the wall: several sub-steps re-touch the same cell.
        let id = spawn(&mut eng, 0, 71.0, 40.0);
        eng.sprite_mut(id)
            .unwrap()
            .set_velocity(Vec2::new(400.0, 0.0));

        eng.move_tick(100, Some(&tm), &cam, &mut handlers);
        assert_eq!(hits.get(), 1);

        eng.move_tick(100, Some(&tm), &cam, &mut handlers);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn overlap_handler_fires_once_per_pair_per_tick() {
        let mut eng = engine();
        let cam = Camera::default();
        let mut handlers = Handlers::new();

        let count = Rc::new(Cell::new(0u32));
        let count_in = count.clone();
        handlers.on_overlap(1, 2, move |a, b| {
            // First argument always carries the registered kind.
            assert_eq!(a.kind(), 1);
            assert_eq!(b.kind(), 2);
            count_in.set(count_in.get() + 1);
        });

        // Kind 2 created first so dispatch exercises the swapped ordering.
        let _b = spawn(&mut eng, 2, 40.0, 40.0);
        let _a = spawn(&mut eng, 1, 40.0, 40.0);

        eng.move_tick(TICK, None, &cam, &mut handlers);
        assert_eq!(count.get(), 1, "symmetric pair fired more than once");

        eng.move_tick(TICK, None, &cam, &mut handlers);
        assert_eq!(count.get(), 2, "still-overlapping pair should fire next tick");
    }

    #[test]
    fn handler_destruction_is_seen_by_later_dispatch() {
        let mut eng = engine();
        let cam = Camera::default();
        let mut handlers = Handlers::new();

        let b_id = Rc::new(Cell::new(0u32));
        let second_fires = Rc::new(Cell::new(0u32));

        let _a = spawn(&mut eng, 1, 40.0, 40.0);
        let b = spawn(&mut eng, 2, 40.0, 40.0);
        let _c = spawn(&mut eng, 2, 42.0, 42.0);
        b_id.set(b.0);

        let b_id_in = b_id.clone();
        handlers.on_overlap(1, 2, move |_, other| {
            if other.id().0 == b_id_in.get() {
                other.destroy();
            }
        });
        let second_in = second_fires.clone();
        handlers.on_overlap(1, 2, move |_, _| second_in.set(second_in.get() + 1));

        eng.move_tick(TICK, None, &cam, &mut handlers);

        // The second handler must skip the pair whose partner the first
        // handler destroyed, and still fire for the surviving pair.
        assert_eq!(second_fires.get(), 1);
        assert!(eng.sprite(b).is_none());
    }

    #[test]
    fn speed_is_clamped_to_configured_max() {
        let mut eng = engine();
        let cam = Camera::default();
        let mut handlers = Handlers::new();
        let id = spawn(&mut eng, 0, 10.0, 10.0);
        eng.sprite_mut(id)
            .unwrap()
            .set_velocity(Vec2::new(900.0, -900.0));
        eng.move_tick(TICK, None, &cam, &mut handlers);
        let v = eng.sprite(id).unwrap().velocity();
        assert_eq!(v.x, 500.0);
        assert_eq!(v.y, -500.0);
    }

    #[test]
    fn friction_decays_velocity_to_zero_without_reversal() {
        let mut eng = engine();
        let cam = Camera::default();
        let mut handlers = Handlers::new();
        let id = spawn(&mut eng, 0, 10.0, 10.0);
        {
            let s = eng.sprite_mut(id).unwrap();
            s.set_velocity(Vec2::new(60.0, 0.0));
            s.set_friction(Vec2::new(200.0, 0.0));
        }
        let mut last = 60.0f32;
        for _ in 0..40 {
            eng.move_tick(TICK, None, &cam, &mut handlers);
            let vx = eng.sprite(id).unwrap().velocity().x;
            assert!(vx >= 0.0, "friction overshot below zero: {vx}");
            assert!(vx <= last);
            last = vx;
        }
        assert_eq!(last, 0.0);
    }

    #[test]
    fn acceleration_integrates_into_velocity_and_position() {
        let mut eng = engine();
        let cam = Camera::default();
        let mut handlers = Handlers::new();
        let id = spawn(&mut eng, 0, 10.0, 10.0);
        eng.sprite_mut(id)
            .unwrap()
            .set_acceleration(Vec2::new(0.0, 100.0));
        let top_before = eng.sprite(id).unwrap().top();
        eng.move_tick(TICK, None, &cam, &mut handlers);
        let s = eng.sprite(id).unwrap();
        assert!(s.velocity().y > 0.0);
        assert!(s.top() > top_before);
    }

    #[test]
    fn stay_in_screen_clamps_at_camera_edge() {
        let mut eng = engine();
        let cam = Camera::default();
        let mut handlers = Handlers::new();
        let id = spawn(&mut eng, 0, 2.0, 40.0);
        {
            let s = eng.sprite_mut(id).unwrap();
            s.set_velocity(Vec2::new(-100.0, 0.0));
            s.set_stay_in_screen(true);
        }
        for _ in 0..5 {
            eng.move_tick(TICK, None, &cam, &mut handlers);
        }
        let s = eng.sprite(id).unwrap();
        assert_eq!(s.left(), 0.0);
        // Clamping alone does not touch velocity.
        assert_eq!(s.velocity().x, -100.0);
    }

    #[test]
    fn bounce_at_screen_edge_without_tilemap() {
        let mut eng = engine();
        let cam = Camera::default();
        let mut handlers = Handlers::new();
        let id = spawn(&mut eng, 0, 1.0, 40.0);
        {
            let s = eng.sprite_mut(id).unwrap();
            s.set_velocity(Vec2::new(-100.0, 0.0));
            s.set_bounce_on_wall(true);
        }
        eng.move_tick(TICK, None, &cam, &mut handlers);
        let s = eng.sprite(id).unwrap();
        assert_eq!(s.velocity().x, 100.0);
        assert!(s.left() >= 0.0);
    }

    #[test]
    fn auto_destroy_waits_for_hysteresis_margin() {
        let mut eng = engine();
        let cam = Camera::default();
        let mut handlers = Handlers::new();

        let gone = spawn(&mut eng, 0, -20.0, 40.0);
        let edge = spawn(&mut eng, 0, -4.0, 40.0);
        eng.sprite_mut(gone)
            .unwrap()
            .set_flag(SpriteFlags::AUTO_DESTROY, true);
        eng.sprite_mut(edge)
            .unwrap()
            .set_flag(SpriteFlags::AUTO_DESTROY, true);

        eng.move_tick(TICK, None, &cam, &mut handlers);

        assert!(eng.sprite(gone).is_none());
        assert!(eng.sprite(edge).is_some(), "partially visible sprite reaped");
    }

    #[test]
    fn ghost_through_walls_passes_freely() {
        let mut eng = engine();
        let tm = wall_column_map();
        let cam = Camera::default();
        let mut handlers = Handlers::new();
        let id = spawn(&mut eng, 0, 71.0, 40.0);
        {
            let s = eng.sprite_mut(id).unwrap();
            s.set_velocity(Vec2::new(200.0, 0.0));
            s.set_flag(SpriteFlags::GHOST_THROUGH_WALLS, true);
        }
        for _ in 0..20 {
            eng.move_tick(TICK, Some(&tm), &cam, &mut handlers);
        }
        assert!(eng.sprite(id).unwrap().left() > 88.0);
    }

    #[test]
    fn move_sprite_respects_walls_like_the_tick() {
        let mut eng = engine();
        let tm = wall_column_map();
        let cam = Camera::default();
        let mut handlers = Handlers::new();

        let id = spawn(&mut eng, 0, 64.0, 40.0);
        eng.move_sprite(id, 20.0, 0.0, Some(&tm), &cam, &mut handlers)
            .unwrap();
        let s = eng.sprite(id).unwrap();
        assert_eq!(s.right(), 80.0);

        assert!(matches!(
            eng.move_sprite(SpriteId(999), 1.0, 0.0, Some(&tm), &cam, &mut handlers),
            Err(SpriteError::Unknown(999))
        ));

        eng.sprite_mut(id).unwrap().destroy();
        assert!(matches!(
            eng.move_sprite(id, 1.0, 0.0, Some(&tm), &cam, &mut handlers),
            Err(SpriteError::Destroyed(_))
        ));
    }

    #[test]
    fn overlaps_query_matches_confirm_logic() {
        let mut eng = engine();
        let a = spawn(&mut eng, 0, 40.0, 40.0);
        let b = spawn(&mut eng, 0, 44.0, 44.0);
        let far = spawn(&mut eng, 0, 100.0, 100.0);

        assert_eq!(eng.overlaps(a), vec![b]);
        assert_eq!(eng.overlaps(b), vec![a]);
        assert!(eng.overlaps(far).is_empty());

        eng.sprite_mut(b).unwrap().destroy();
        assert!(eng.overlaps(a).is_empty());
    }

    #[test]
    fn replay_is_deterministic() {
        let run = || {
            let mut eng = engine();
            let tm = wall_column_map();
            let cam = Camera::default();
            let mut handlers = Handlers::new();
            for i in 0..5i32 {
                let id = spawn(&mut eng, i % 2, 8.0 + i as f32 * 13.0, 8.0 + i as f32 * 9.0);
                let s = eng.sprite_mut(id).unwrap();
                s.set_velocity(Vec2::new(50.0 + i as f32 * 30.0, -40.0 + i as f32 * 25.0));
                s.set_bounce_on_wall(true);
                s.set_stay_in_screen(true);
            }
            for _ in 0..120 {
                eng.move_tick(TICK, Some(&tm), &cam, &mut handlers);
            }
            eng.sprites()
                .iter()
                .map(|s| (s.left(), s.top(), s.velocity().x, s.velocity().y))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn dropped_frame_is_capped_at_max_time_step() {
        let mut eng = engine();
        let cam = Camera::default();
        let mut handlers = Handlers::new();
        let id = spawn(&mut eng, 0, 10.0, 40.0);
        eng.sprite_mut(id)
            .unwrap()
            .set_velocity(Vec2::new(100.0, 0.0));
        // A 5-second stall integrates as a single 100 ms step.
        eng.move_tick(5000, None, &cam, &mut handlers);
        let s = eng.sprite(id).unwrap();
        assert!((s.left() - 20.0).abs() < 0.5, "left = {}", s.left());
    }

    #[test]
    fn half_bounce_coefficient_halves_reflected_speed() {
        let config = PhysicsConfig {
            bounce: 0.5,
            ..PhysicsConfig::default()
        };
        let mut eng = ArcadePhysicsEngine::new(config).unwrap();
        let tm = wall_column_map();
        let cam = Camera::default();
        let mut handlers = Handlers::new();
        let id = spawn(&mut eng, 0, 71.0, 40.0);
        {
            let s = eng.sprite_mut(id).unwrap();
            s.set_velocity(Vec2::new(100.0, 0.0));
            s.set_bounce_on_wall(true);
        }
        eng.move_tick(TICK, Some(&tm), &cam, &mut handlers);
        assert_eq!(eng.sprite(id).unwrap().velocity().x, -50.0);
    }
}
