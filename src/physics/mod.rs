//! Physics simulation core
//!
//! Everything here is deterministic: fixed-point state, stable creation-order
//! iteration, handlers dispatched in registration order. Identical inputs
//! replay to identical positions, which is what the tests lean on.

pub mod engine;
pub mod handlers;
pub mod sprite_map;

pub use engine::{ArcadePhysicsEngine, EngineStats, PhysicsConfig};
pub use handlers::Handlers;
pub use sprite_map::{SpriteMap, SpriteMapStats};
