//! Collision callback registry
//!
//! Game logic subscribes to overlap and wall events by sprite kind. Each
//! table is an ordered list of typed records built at registration time;
//! dispatch walks the list in registration order, so outcomes are
//! reproducible run to run.

use crate::sprite::Sprite;
use crate::tilemap::Location;

/// Sprite-sprite overlap callback: `(sprite, other)` where `sprite` has the
/// kind the handler was registered for.
pub type OverlapFn = Box<dyn FnMut(&mut Sprite, &mut Sprite)>;

/// Wall-hit / tile-overlap callback.
pub type TileFn = Box<dyn FnMut(&mut Sprite, Location)>;

pub(crate) struct OverlapHandler {
    pub kind: i32,
    pub other_kind: i32,
    pub handler: OverlapFn,
}

pub(crate) struct WallHandler {
    pub kind: i32,
    pub handler: TileFn,
}

pub(crate) struct TileOverlapHandler {
    pub kind: i32,
    pub tile: u8,
    pub handler: TileFn,
}

/// Handler tables owned by the scene and consumed by the physics tick.
#[derive(Default)]
pub struct Handlers {
    pub(crate) overlap: Vec<OverlapHandler>,
    pub(crate) wall: Vec<WallHandler>,
    pub(crate) tile: Vec<TileOverlapHandler>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `handler` when a sprite of `kind` overlaps a sprite of
    /// `other_kind`. Fires once per pair per tick, first argument always of
    /// `kind`.
    pub fn on_overlap<F>(&mut self, kind: i32, other_kind: i32, handler: F)
    where
        F: FnMut(&mut Sprite, &mut Sprite) + 'static,
    {
        self.overlap.push(OverlapHandler {
            kind,
            other_kind,
            handler: Box::new(handler),
        });
    }

    /// Run `handler` when a sprite of `kind` collides with a wall tile.
    pub fn on_hit_wall<F>(&mut self, kind: i32, handler: F)
    where
        F: FnMut(&mut Sprite, Location) + 'static,
    {
        self.wall.push(WallHandler {
            kind,
            handler: Box::new(handler),
        });
    }

    /// Run `handler` when a sprite of `kind` overlaps a non-wall cell
    /// holding tile index `tile`.
    pub fn on_overlap_tile<F>(&mut self, kind: i32, tile: u8, handler: F)
    where
        F: FnMut(&mut Sprite, Location) + 'static,
    {
        self.tile.push(TileOverlapHandler {
            kind,
            tile,
            handler: Box::new(handler),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.overlap.is_empty() && self.wall.is_empty() && self.tile.is_empty()
    }
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handlers")
            .field("overlap", &self.overlap.len())
            .field("wall", &self.wall.len())
            .field("tile", &self.tile.len())
            .finish()
    }
}
