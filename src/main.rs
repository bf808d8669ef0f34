//! Headless arena demo
//!
//! Spawns a handful of bouncing balls in a walled tile arena, runs the
//! simulation for a fixed number of ticks and prints a JSON run summary.
//!
//! ```text
//! arcade-physics [seed] [ticks]
//! ```

use std::cell::Cell;
use std::rc::Rc;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::Serialize;

use arcade_physics::{Image, Scene, TileMapData, TileScale};

/// Sprite kind for the bouncing balls.
const BALL: i32 = 1;

/// Tile index for coins scattered on the floor.
const COIN_TILE: u8 = 1;
/// Tile index for brick walls.
const BRICK_TILE: u8 = 2;

const TICK_MS: u32 = 16;

#[derive(Serialize)]
struct RunSummary {
    seed: u64,
    ticks: u32,
    balls: usize,
    wall_hits: u64,
    coin_touches: u64,
    ball_meetings: u64,
    positions: Vec<(f32, f32)>,
}

fn ball_image() -> Image {
    Image::from_ascii(&[
        "..xxxx..",
        ".xxxxxx.",
        "xxxxxxxx",
        "xxxxxxxx",
        "xxxxxxxx",
        "xxxxxxxx",
        ".xxxxxx.",
        "..xxxx..",
    ])
}

/// 20x15 arena of 8 px tiles: brick border, a few interior pillars, coins
/// sprinkled on the floor. Bricks carry both the tile image and the wall
/// flag; coins are walkable.
fn build_arena() -> TileMapData {
    let tileset = vec![Image::new(8, 8), Image::solid(8, 8), Image::solid(8, 8)];
    let mut data = TileMapData::new(20, 15, tileset, TileScale::Eight).expect("non-empty arena");

    let set_brick = |data: &mut TileMapData, column: i32, row: i32| {
        data.set_tile(column, row, BRICK_TILE).expect("in range");
        data.set_wall(column, row, true).expect("in range");
    };

    for column in 0..20 {
        set_brick(&mut data, column, 0);
        set_brick(&mut data, column, 14);
    }
    for row in 0..15 {
        set_brick(&mut data, 0, row);
        set_brick(&mut data, 19, row);
    }
    for &(column, row) in &[(6, 5), (6, 9), (13, 5), (13, 9), (10, 7)] {
        set_brick(&mut data, column, row);
    }
    for &(column, row) in &[(3, 3), (16, 3), (3, 11), (16, 11), (9, 4), (10, 10)] {
        data.set_tile(column, row, COIN_TILE).expect("in range");
    }
    data
}

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let seed: u64 = args.next().and_then(|a| a.parse().ok()).unwrap_or(7);
    let ticks: u32 = args.next().and_then(|a| a.parse().ok()).unwrap_or(600);
    log::info!("arena demo starting: seed {seed}, {ticks} ticks");

    let mut scene = Scene::new(seed);
    scene.set_tile_map(build_arena());

    let wall_hits = Rc::new(Cell::new(0u64));
    let coin_touches = Rc::new(Cell::new(0u64));
    let ball_meetings = Rc::new(Cell::new(0u64));

    let hits = wall_hits.clone();
    scene.on_hit_wall(BALL, move |sprite, location| {
        log::debug!(
            "ball {} hit wall at ({}, {})",
            sprite.id().0,
            location.column,
            location.row
        );
        hits.set(hits.get() + 1);
    });
    let coins = coin_touches.clone();
    scene.on_overlap_tile(BALL, COIN_TILE, move |_, _| coins.set(coins.get() + 1));
    let meetings = ball_meetings.clone();
    scene.on_overlap(BALL, BALL, move |_, _| meetings.set(meetings.get() + 1));

    // Spawn balls on open floor tiles, with velocities from a demo-local RNG.
    let mut rng = Pcg32::seed_from_u64(seed ^ 0x9e37_79b9);
    let spawn_spots = scene.sample_tiles_by_type(0, 6);
    let mut balls = Vec::new();
    for spot in spawn_spots {
        let id = scene.create_sprite(ball_image(), BALL);
        let sprite = scene.sprite_mut(id).expect("just created");
        spot.place(sprite);
        sprite.set_velocity(Vec2::new(
            rng.random_range(-120.0..120.0),
            rng.random_range(-120.0..120.0),
        ));
        sprite.set_bounce_on_wall(true);
        if !scene.overlaps(id).is_empty() {
            log::debug!("ball {} spawned overlapping a neighbor", id.0);
        }
        balls.push(id);
    }
    log::info!("spawned {} balls", balls.len());

    for tick in 0..ticks {
        scene.update(TICK_MS);
        if tick % 125 == 0 {
            let stats = scene.debug_stats();
            log::info!(
                "tick {tick}: {} sprites, {} occupied buckets, {} candidate pairs",
                stats.sprites,
                stats.map.occupied_buckets,
                stats.map.candidate_pairs
            );
        }
    }

    let summary = RunSummary {
        seed,
        ticks,
        balls: balls.len(),
        wall_hits: wall_hits.get(),
        coin_touches: coin_touches.get(),
        ball_meetings: ball_meetings.get(),
        positions: scene
            .sprites()
            .iter()
            .map(|s| (s.x(), s.y()))
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).expect("summary serializes")
    );
}
