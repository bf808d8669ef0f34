//! Error taxonomy
//!
//! Setup problems surface immediately at construction time; per-entity
//! problems during a tick are logged and counted instead of raised, so a
//! single bad sprite or callback can never halt the simulation.

use thiserror::Error;

/// Degenerate physics or map configuration, rejected at setup.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    #[error("max_single_step ({max}) must be >= min_single_step ({min})")]
    StepBoundsInverted { min: f32, max: f32 },
    #[error("speed limit must be positive, got {0}")]
    NonPositiveSpeedLimit(f32),
    #[error("bounce coefficient must be within [0, 1], got {0}")]
    BounceOutOfRange(f32),
    #[error("tile map must have non-zero dimensions, got {columns}x{rows}")]
    EmptyTileMap { columns: i32, rows: i32 },
}

/// Tile coordinate or index outside the valid range.
///
/// Tile-level accessors fail rather than clamp; callers with tick-level
/// context clamp before asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TileMapError {
    #[error("tile ({column}, {row}) outside {columns}x{rows} map")]
    OutOfBounds {
        column: i32,
        row: i32,
        columns: i32,
        rows: i32,
    },
    #[error("tile index {0} not present in the tileset")]
    UnknownTileIndex(u8),
}

/// Operating on a sprite that no longer participates in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SpriteError {
    #[error("sprite {0} was destroyed")]
    Destroyed(u32),
    #[error("no sprite with id {0}")]
    Unknown(u32),
}
