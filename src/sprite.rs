//! Sprite entities
//!
//! A sprite owns its kinematic state in sub-pixel `Fx8` units, a packed
//! behavior flag set, an opacity mask, and a lazily revalidated hitbox. The
//! public accessors speak ordinary floats (`glam::Vec2` for pairs); the
//! fixed-point representation never leaks out of the crate.

use glam::Vec2;

use crate::fx::Fx8;
use crate::hitbox::{Bounds, Hitbox};
use crate::image::Image;

/// Stable handle for a sprite within its scene, allocated in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpriteId(pub u32);

/// Packed per-sprite behavior toggles.
///
/// The representation stays a single `u32` for compactness; the named
/// constants and accessors below are the only way flags are read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpriteFlags(u32);

impl SpriteFlags {
    pub const NONE: SpriteFlags = SpriteFlags(0);
    /// Sprite has been destroyed; it is swept from the engine at tick end.
    pub const DESTROYED: SpriteFlags = SpriteFlags(1 << 0);
    /// Destroy automatically once fully outside the camera.
    pub const AUTO_DESTROY: SpriteFlags = SpriteFlags(1 << 1);
    /// Clamp to the camera rectangle instead of leaving the screen.
    pub const STAY_IN_SCREEN: SpriteFlags = SpriteFlags(1 << 2);
    /// Destroy on contact with a wall tile or, with `STAY_IN_SCREEN`, an edge.
    pub const DESTROY_ON_WALL: SpriteFlags = SpriteFlags(1 << 3);
    /// Reflect velocity off walls and screen edges.
    pub const BOUNCE_ON_WALL: SpriteFlags = SpriteFlags(1 << 4);
    /// Skip tile-overlap events.
    pub const GHOST_THROUGH_TILES: SpriteFlags = SpriteFlags(1 << 5);
    /// Skip wall collision resolution.
    pub const GHOST_THROUGH_WALLS: SpriteFlags = SpriteFlags(1 << 6);
    /// Skip sprite-sprite overlap events.
    pub const GHOST_THROUGH_SPRITES: SpriteFlags = SpriteFlags(1 << 7);
    /// Confirm overlaps by hitbox only, skipping the pixel-perfect test.
    pub const HITBOX_OVERLAPS: SpriteFlags = SpriteFlags(1 << 8);
    /// Position is interpreted relative to the camera, not the world.
    pub const RELATIVE_TO_CAMERA: SpriteFlags = SpriteFlags(1 << 9);
    /// All three ghost opt-outs at once.
    pub const GHOST: SpriteFlags = SpriteFlags(
        Self::GHOST_THROUGH_TILES.0 | Self::GHOST_THROUGH_WALLS.0 | Self::GHOST_THROUGH_SPRITES.0,
    );

    /// True when every flag in `other` is set.
    #[inline]
    pub const fn contains(self, other: SpriteFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when any flag in `other` is set.
    #[inline]
    pub const fn intersects(self, other: SpriteFlags) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn insert(&mut self, other: SpriteFlags) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: SpriteFlags) {
        self.0 &= !other.0;
    }

    #[inline]
    pub fn set(&mut self, other: SpriteFlags, on: bool) {
        if on {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }
}

/// A simulated sprite. Created through [`crate::scene::Scene::create_sprite`].
#[derive(Debug, Clone)]
pub struct Sprite {
    id: SpriteId,
    kind: i32,
    /// Top-left corner of the (scaled) image, sub-pixel.
    pub(crate) x: Fx8,
    pub(crate) y: Fx8,
    pub(crate) vx: Fx8,
    pub(crate) vy: Fx8,
    pub(crate) ax: Fx8,
    pub(crate) ay: Fx8,
    pub(crate) fx: Fx8,
    pub(crate) fy: Fx8,
    pub(crate) last_x: Fx8,
    pub(crate) last_y: Fx8,
    sx: f32,
    sy: f32,
    image: Image,
    image_rev: u32,
    /// Remaining time to live in ms; `None` lives forever.
    lifespan: Option<u32>,
    pub(crate) flags: SpriteFlags,
    hitbox: Hitbox,
    /// Currently embedded in a wall; wall resolution pauses until free.
    pub(crate) clipping: bool,
}

impl Sprite {
    pub(crate) fn new(id: SpriteId, image: Image, kind: i32) -> Self {
        let hitbox = Hitbox::compute(&image, 1.0, 1.0, dimensional_hash(&image, 0, 1.0, 1.0));
        Self {
            id,
            kind,
            x: Fx8::ZERO,
            y: Fx8::ZERO,
            vx: Fx8::ZERO,
            vy: Fx8::ZERO,
            ax: Fx8::ZERO,
            ay: Fx8::ZERO,
            fx: Fx8::ZERO,
            fy: Fx8::ZERO,
            last_x: Fx8::ZERO,
            last_y: Fx8::ZERO,
            sx: 1.0,
            sy: 1.0,
            image,
            image_rev: 0,
            lifespan: None,
            flags: SpriteFlags::NONE,
            hitbox,
            clipping: false,
        }
    }

    pub fn id(&self) -> SpriteId {
        self.id
    }

    pub fn kind(&self) -> i32 {
        self.kind
    }

    pub fn set_kind(&mut self, kind: i32) {
        self.kind = kind;
    }

    // --- position / kinematics (float boundary, center-based) ---

    /// Width in screen pixels (image width x horizontal scale).
    pub fn width(&self) -> f32 {
        self.image.width() as f32 * self.sx
    }

    pub fn height(&self) -> f32 {
        self.image.height() as f32 * self.sy
    }

    /// Horizontal center.
    pub fn x(&self) -> f32 {
        self.x.to_float() + self.width() / 2.0
    }

    pub fn set_x(&mut self, v: f32) {
        self.x = Fx8::from_float(v - self.width() / 2.0);
    }

    /// Vertical center.
    pub fn y(&self) -> f32 {
        self.y.to_float() + self.height() / 2.0
    }

    pub fn set_y(&mut self, v: f32) {
        self.y = Fx8::from_float(v - self.height() / 2.0);
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x(), self.y())
    }

    pub fn set_position(&mut self, pos: Vec2) {
        self.set_x(pos.x);
        self.set_y(pos.y);
    }

    pub fn left(&self) -> f32 {
        self.x.to_float()
    }

    pub fn set_left(&mut self, v: f32) {
        self.x = Fx8::from_float(v);
    }

    pub fn top(&self) -> f32 {
        self.y.to_float()
    }

    pub fn set_top(&mut self, v: f32) {
        self.y = Fx8::from_float(v);
    }

    pub fn right(&self) -> f32 {
        self.left() + self.width()
    }

    pub fn set_right(&mut self, v: f32) {
        self.set_left(v - self.width());
    }

    pub fn bottom(&self) -> f32 {
        self.top() + self.height()
    }

    pub fn set_bottom(&mut self, v: f32) {
        self.set_top(v - self.height());
    }

    /// Velocity in pixels per second.
    pub fn velocity(&self) -> Vec2 {
        Vec2::new(self.vx.to_float(), self.vy.to_float())
    }

    pub fn set_velocity(&mut self, v: Vec2) {
        self.vx = Fx8::from_float(v.x);
        self.vy = Fx8::from_float(v.y);
    }

    /// Acceleration in pixels per second squared.
    pub fn acceleration(&self) -> Vec2 {
        Vec2::new(self.ax.to_float(), self.ay.to_float())
    }

    pub fn set_acceleration(&mut self, a: Vec2) {
        self.ax = Fx8::from_float(a.x);
        self.ay = Fx8::from_float(a.y);
    }

    /// Friction: deceleration toward zero, applied only on axes with no
    /// acceleration.
    pub fn friction(&self) -> Vec2 {
        Vec2::new(self.fx.to_float(), self.fy.to_float())
    }

    pub fn set_friction(&mut self, f: Vec2) {
        self.fx = Fx8::from_float(f.x.abs());
        self.fy = Fx8::from_float(f.y.abs());
    }

    // --- image / scale / hitbox ---

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn set_image(&mut self, image: Image) {
        self.image = image;
        self.image_rev = self.image_rev.wrapping_add(1);
    }

    pub fn scale(&self) -> Vec2 {
        Vec2::new(self.sx, self.sy)
    }

    pub fn set_scale(&mut self, sx: f32, sy: f32) {
        self.sx = sx.max(0.0);
        self.sy = sy.max(0.0);
    }

    /// Position at the start of the current tick's integration.
    pub fn last_position(&self) -> Vec2 {
        Vec2::new(
            self.last_x.to_float() + self.width() / 2.0,
            self.last_y.to_float() + self.height() / 2.0,
        )
    }

    fn content_hash(&self) -> u32 {
        dimensional_hash(&self.image, self.image_rev, self.sx, self.sy)
    }

    /// Recompute the hitbox if the image or scale changed since the last
    /// computation. O(1) when already valid.
    pub fn update_hitbox_if_invalid(&mut self) {
        let hash = self.content_hash();
        if !self.hitbox.is_valid_for(hash) {
            self.hitbox = Hitbox::compute(&self.image, self.sx, self.sy, hash);
        }
    }

    /// Cached hitbox; may be stale until [`Self::update_hitbox_if_invalid`].
    pub fn hitbox(&self) -> Hitbox {
        self.hitbox
    }

    /// Absolute hitbox edges at the current position, computed from a
    /// guaranteed-fresh hitbox (recomputed on the fly when stale).
    pub fn bounds(&self) -> Bounds {
        let hash = self.content_hash();
        let hb = if self.hitbox.is_valid_for(hash) {
            self.hitbox
        } else {
            Hitbox::compute(&self.image, self.sx, self.sy, hash)
        };
        hb.bounds_at(self.x, self.y)
    }

    /// Geometric overlap test: hitbox intersection, then a pixel-perfect
    /// confirm unless either sprite opts out with `HITBOX_OVERLAPS`.
    pub fn overlaps_with(&self, other: &Sprite) -> bool {
        if std::ptr::eq(self, other) {
            return false;
        }
        if !self.bounds().overlaps(&other.bounds()) {
            return false;
        }
        if self.flags.intersects(SpriteFlags::HITBOX_OVERLAPS)
            || other.flags.intersects(SpriteFlags::HITBOX_OVERLAPS)
        {
            return true;
        }
        crate::image::pixels_overlap(
            &self.image,
            self.x.to_int(),
            self.y.to_int(),
            self.sx,
            self.sy,
            &other.image,
            other.x.to_int(),
            other.y.to_int(),
            other.sx,
            other.sy,
        )
    }

    // --- flags / lifecycle ---

    pub fn flags(&self) -> SpriteFlags {
        self.flags
    }

    pub fn set_flag(&mut self, flag: SpriteFlags, on: bool) {
        self.flags.set(flag, on);
    }

    pub fn set_stay_in_screen(&mut self, on: bool) {
        self.set_flag(SpriteFlags::STAY_IN_SCREEN, on);
    }

    pub fn set_bounce_on_wall(&mut self, on: bool) {
        self.set_flag(SpriteFlags::BOUNCE_ON_WALL, on);
    }

    /// Remaining time to live in ms, if limited.
    pub fn lifespan(&self) -> Option<u32> {
        self.lifespan
    }

    pub fn set_lifespan(&mut self, ms: Option<u32>) {
        self.lifespan = ms;
    }

    pub(crate) fn tick_lifespan(&mut self, dt_ms: u32) {
        if let Some(ms) = self.lifespan {
            if ms <= dt_ms {
                self.lifespan = Some(0);
                self.destroy();
            } else {
                self.lifespan = Some(ms - dt_ms);
            }
        }
    }

    /// Mark destroyed. The sprite stops participating in every subsequent
    /// physics phase and is removed from the engine at the end of the tick.
    pub fn destroy(&mut self) {
        self.flags.insert(SpriteFlags::DESTROYED);
    }

    pub fn is_destroyed(&self) -> bool {
        self.flags.intersects(SpriteFlags::DESTROYED)
    }
}

/// Mix image identity, image revision and scale into a cache token.
fn dimensional_hash(image: &Image, rev: u32, sx: f32, sy: f32) -> u32 {
    let mut h = 0x811c_9dc5u32;
    for v in [
        image.width() as u32,
        image.height() as u32,
        rev,
        sx.to_bits(),
        sy.to_bits(),
    ] {
        h = (h ^ v).wrapping_mul(0x0100_0193);
    }
    h
}
