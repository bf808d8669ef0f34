//! Tile maps
//!
//! [`TileMapData`] owns the raw tile-index buffer, the wall bitset and the
//! tileset images; [`TileMap`] wraps it with pixel-space queries the physics
//! engine consumes. Wall-ness is an explicit per-cell flag, never inferred
//! from the tile image, so the same artwork can be solid in one map and
//! decorative in another.
//!
//! Indexed accessors are strict: out-of-range coordinates return
//! [`TileMapError::OutOfBounds`] instead of clamping. Boolean queries such as
//! [`TileMapData::is_wall`] treat the outside world as empty, which is what
//! the collision pass wants at map borders.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, TileMapError};
use crate::image::Image;
use crate::sprite::Sprite;

/// Tile edge length, stored as the log2 of the pixel size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileScale {
    Four = 2,
    Eight = 3,
    Sixteen = 4,
    ThirtyTwo = 5,
}

impl TileScale {
    /// log2 of the tile size in pixels.
    #[inline]
    pub const fn log2(self) -> u32 {
        self as u32
    }

    /// Tile edge length in pixels.
    #[inline]
    pub const fn tile_size(self) -> i32 {
        1 << (self as i32)
    }
}

/// Lightweight (column, row) handle into a tilemap. Derived on demand and
/// never stored by the map itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub column: i32,
    pub row: i32,
    scale: TileScale,
}

impl Location {
    pub(crate) fn new(column: i32, row: i32, scale: TileScale) -> Self {
        Self { column, row, scale }
    }

    pub fn left(&self) -> f32 {
        (self.column << self.scale.log2()) as f32
    }

    pub fn top(&self) -> f32 {
        (self.row << self.scale.log2()) as f32
    }

    pub fn right(&self) -> f32 {
        self.left() + self.scale.tile_size() as f32
    }

    pub fn bottom(&self) -> f32 {
        self.top() + self.scale.tile_size() as f32
    }

    /// Center x in pixels.
    pub fn x(&self) -> f32 {
        self.left() + self.scale.tile_size() as f32 / 2.0
    }

    /// Center y in pixels.
    pub fn y(&self) -> f32 {
        self.top() + self.scale.tile_size() as f32 / 2.0
    }

    /// Center the given sprite on this tile.
    pub fn place(&self, sprite: &mut Sprite) {
        sprite.set_position(glam::Vec2::new(self.x(), self.y()));
    }
}

/// Raw tile grid: indices, wall flags and the tileset they refer to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileMapData {
    columns: i32,
    rows: i32,
    tiles: Vec<u8>,
    walls: Vec<u8>,
    tileset: Vec<Image>,
    scale: TileScale,
}

impl TileMapData {
    /// An all-empty map. Fails fast on zero-sized dimensions.
    pub fn new(
        columns: i32,
        rows: i32,
        tileset: Vec<Image>,
        scale: TileScale,
    ) -> Result<Self, ConfigError> {
        if columns <= 0 || rows <= 0 {
            return Err(ConfigError::EmptyTileMap { columns, rows });
        }
        let cells = (columns * rows) as usize;
        Ok(Self {
            columns,
            rows,
            tiles: vec![0; cells],
            walls: vec![0; cells.div_ceil(8)],
            tileset,
            scale,
        })
    }

    pub fn columns(&self) -> i32 {
        self.columns
    }

    pub fn rows(&self) -> i32 {
        self.rows
    }

    pub fn scale(&self) -> TileScale {
        self.scale
    }

    pub fn is_outside(&self, column: i32, row: i32) -> bool {
        column < 0 || row < 0 || column >= self.columns || row >= self.rows
    }

    fn index_of(&self, column: i32, row: i32) -> Result<usize, TileMapError> {
        if self.is_outside(column, row) {
            Err(TileMapError::OutOfBounds {
                column,
                row,
                columns: self.columns,
                rows: self.rows,
            })
        } else {
            Ok((row * self.columns + column) as usize)
        }
    }

    /// Tile index at (column, row).
    pub fn get_tile(&self, column: i32, row: i32) -> Result<u8, TileMapError> {
        Ok(self.tiles[self.index_of(column, row)?])
    }

    /// Write a tile index; the index must name a tileset entry.
    pub fn set_tile(&mut self, column: i32, row: i32, tile: u8) -> Result<(), TileMapError> {
        if tile as usize >= self.tileset.len().max(1) {
            return Err(TileMapError::UnknownTileIndex(tile));
        }
        let idx = self.index_of(column, row)?;
        self.tiles[idx] = tile;
        Ok(())
    }

    pub fn set_wall(&mut self, column: i32, row: i32, on: bool) -> Result<(), TileMapError> {
        let idx = self.index_of(column, row)?;
        if on {
            self.walls[idx / 8] |= 1 << (idx % 8);
        } else {
            self.walls[idx / 8] &= !(1 << (idx % 8));
        }
        Ok(())
    }

    /// O(1) wall flag; cells outside the map are not walls.
    #[inline]
    pub fn is_wall(&self, column: i32, row: i32) -> bool {
        match self.index_of(column, row) {
            Ok(idx) => self.walls[idx / 8] & (1 << (idx % 8)) != 0,
            Err(_) => false,
        }
    }

    pub fn tileset(&self) -> &[Image] {
        &self.tileset
    }

    pub fn tile_image(&self, index: u8) -> Option<&Image> {
        self.tileset.get(index as usize)
    }
}

/// Descriptor of a solid tile reported to wall-collision handlers. Borrowed
/// from the map state of the moment, never retained across ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticObstacle {
    pub tile_index: u8,
    pub location: Location,
}

/// Live tilemap: the data plus the pixel-space queries used per tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileMap {
    data: TileMapData,
}

impl TileMap {
    pub fn new(data: TileMapData) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &TileMapData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut TileMapData {
        &mut self.data
    }

    pub fn scale(&self) -> TileScale {
        self.data.scale
    }

    /// Playfield width in pixels.
    pub fn area_width(&self) -> i32 {
        self.data.columns << self.scale().log2()
    }

    pub fn area_height(&self) -> i32 {
        self.data.rows << self.scale().log2()
    }

    /// Handle for (column, row); valid to construct even off-map.
    pub fn location(&self, column: i32, row: i32) -> Location {
        Location::new(column, row, self.scale())
    }

    /// Column containing pixel x.
    pub fn column_at(&self, x: i32) -> i32 {
        x >> self.scale().log2()
    }

    /// Row containing pixel y.
    pub fn row_at(&self, y: i32) -> i32 {
        y >> self.scale().log2()
    }

    /// Whether the cell blocks movement.
    pub fn is_obstacle(&self, column: i32, row: i32) -> bool {
        self.data.is_wall(column, row)
    }

    /// Descriptor of the wall at (column, row), for handler reporting.
    pub fn get_obstacle(&self, column: i32, row: i32) -> Result<StaticObstacle, TileMapError> {
        let tile_index = self.data.get_tile(column, row)?;
        Ok(StaticObstacle {
            tile_index,
            location: self.location(column, row),
        })
    }

    /// Whether the sprite's hitbox currently intersects any wall cell.
    pub fn is_on_wall(&self, sprite: &Sprite) -> bool {
        let b = sprite.bounds();
        if b.width() == crate::fx::Fx8::ZERO || b.height() == crate::fx::Fx8::ZERO {
            return false;
        }
        let log2 = self.scale().log2();
        let c0 = b.left.to_int() >> log2;
        let c1 = (b.right.to_int() - 1) >> log2;
        let r0 = b.top.to_int() >> log2;
        let r1 = (b.bottom.to_int() - 1) >> log2;
        for row in r0..=r1 {
            for column in c0..=c1 {
                if self.data.is_wall(column, row) {
                    return true;
                }
            }
        }
        false
    }

    /// Every location holding the given tile index, in row-major order.
    pub fn get_tiles_by_type(&self, index: u8) -> Vec<Location> {
        let mut out = Vec::new();
        for row in 0..self.data.rows {
            for column in 0..self.data.columns {
                if self.data.tiles[(row * self.data.columns + column) as usize] == index {
                    out.push(self.location(column, row));
                }
            }
        }
        out
    }

    /// Up to `max_count` distinct locations of the given tile index, chosen
    /// uniformly by single-pass reservoir sampling. Never scans the map more
    /// than once and never allocates beyond the reservoir.
    pub fn sample_tiles_by_type<R: Rng>(
        &self,
        index: u8,
        max_count: usize,
        rng: &mut R,
    ) -> Vec<Location> {
        let mut reservoir: Vec<Location> = Vec::with_capacity(max_count);
        if max_count == 0 {
            return reservoir;
        }
        let mut seen = 0usize;
        for row in 0..self.data.rows {
            for column in 0..self.data.columns {
                if self.data.tiles[(row * self.data.columns + column) as usize] != index {
                    continue;
                }
                let loc = self.location(column, row);
                if reservoir.len() < max_count {
                    reservoir.push(loc);
                } else {
                    let j = rng.random_range(0..=seen);
                    if j < max_count {
                        reservoir[j] = loc;
                    }
                }
                seen += 1;
            }
        }
        reservoir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn tileset() -> Vec<Image> {
        vec![Image::new(8, 8), Image::solid(8, 8), Image::solid(8, 8)]
    }

    fn map(columns: i32, rows: i32) -> TileMap {
        TileMap::new(TileMapData::new(columns, rows, tileset(), TileScale::Eight).unwrap())
    }

    #[test]
    fn zero_sized_map_is_a_config_error() {
        let err = TileMapData::new(0, 10, tileset(), TileScale::Eight).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyTileMap { .. }));
    }

    #[test]
    fn out_of_range_access_fails_explicitly() {
        let mut m = map(4, 3);
        assert!(matches!(
            m.data().get_tile(4, 0),
            Err(TileMapError::OutOfBounds { column: 4, .. })
        ));
        assert!(m.data_mut().set_tile(-1, 0, 1).is_err());
        assert!(m.data_mut().set_wall(0, 3, true).is_err());
        // Boolean queries treat the outside as empty instead.
        assert!(!m.data().is_wall(-1, -1));
        assert!(!m.is_obstacle(100, 100));
    }

    #[test]
    fn wall_flag_is_independent_of_tile_image() {
        let mut m = map(4, 4);
        m.data_mut().set_tile(1, 1, 2).unwrap();
        assert!(!m.is_obstacle(1, 1));
        m.data_mut().set_wall(2, 2, true).unwrap();
        assert_eq!(m.data().get_tile(2, 2).unwrap(), 0);
        assert!(m.is_obstacle(2, 2));
        m.data_mut().set_wall(2, 2, false).unwrap();
        assert!(!m.is_obstacle(2, 2));
    }

    #[test]
    fn unknown_tile_index_rejected() {
        let mut m = map(2, 2);
        assert!(matches!(
            m.data_mut().set_tile(0, 0, 9),
            Err(TileMapError::UnknownTileIndex(9))
        ));
    }

    #[test]
    fn location_pixel_math() {
        let m = map(8, 8);
        let loc = m.location(2, 3);
        assert_eq!(loc.left(), 16.0);
        assert_eq!(loc.top(), 24.0);
        assert_eq!(loc.x(), 20.0);
        assert_eq!(loc.bottom(), 32.0);
        assert_eq!(m.column_at(17), 2);
        assert_eq!(m.row_at(31), 3);
    }

    #[test]
    fn obstacle_reports_tile_index() {
        let mut m = map(4, 4);
        m.data_mut().set_tile(1, 2, 1).unwrap();
        m.data_mut().set_wall(1, 2, true).unwrap();
        let ob = m.get_obstacle(1, 2).unwrap();
        assert_eq!(ob.tile_index, 1);
        assert_eq!((ob.location.column, ob.location.row), (1, 2));
        assert!(m.get_obstacle(9, 9).is_err());
    }

    #[test]
    fn sampling_returns_exactly_requested_distinct_matches() {
        let mut m = map(10, 10);
        for row in 0..10 {
            for column in 0..10 {
                m.data_mut().set_tile(column, row, 1).unwrap();
            }
        }
        let mut rng = Pcg32::seed_from_u64(7);
        let sample = m.sample_tiles_by_type(1, 5, &mut rng);
        assert_eq!(sample.len(), 5);
        let mut unique: Vec<(i32, i32)> =
            sample.iter().map(|l| (l.column, l.row)).collect();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 5);
        for loc in &sample {
            assert_eq!(m.data().get_tile(loc.column, loc.row).unwrap(), 1);
        }
    }

    #[test]
    fn sampling_fewer_matches_than_requested_returns_all() {
        let mut m = map(6, 6);
        m.data_mut().set_tile(1, 1, 2).unwrap();
        m.data_mut().set_tile(4, 4, 2).unwrap();
        let mut rng = Pcg32::seed_from_u64(1);
        let sample = m.sample_tiles_by_type(2, 5, &mut rng);
        assert_eq!(sample.len(), 2);
    }

    #[test]
    fn sampling_is_deterministic_per_seed() {
        let mut m = map(12, 12);
        for row in 0..12 {
            for column in 0..12 {
                if (row + column) % 3 == 0 {
                    m.data_mut().set_tile(column, row, 1).unwrap();
                }
            }
        }
        let a = m.sample_tiles_by_type(1, 4, &mut Pcg32::seed_from_u64(99));
        let b = m.sample_tiles_by_type(1, 4, &mut Pcg32::seed_from_u64(99));
        assert_eq!(a, b);
    }
}
