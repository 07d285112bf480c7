//! Tile-world simulation: layered tile maps fitted into a viewport, axis-separated player
//! movement against layered collision flags, and proximity dialogue bubbles for interactive
//! tiles.
//!
//! The algorithms are plain functions over plain data (`WorldMap::load`, `viewport::fit`,
//! `collision::query`, `movement::advance_player`, `InteractionController::update`); the Bevy
//! plugins only schedule them once per frame and mirror their results on screen.

pub mod app;
pub mod camera;
pub mod collision;
pub mod interaction;
pub mod level;
pub mod map;
pub mod movement;
pub mod player;
pub mod state;
pub mod tile;
pub mod ui;
pub mod viewport;

pub use app::{SimulationPlugin, TileWorldPlugin};
pub use collision::{Blocker, BoundingBox, TileHit};
pub use interaction::{DialogueBubble, InteractionController};
pub use map::{MapLoadError, RawMapData, WorldMap};
pub use movement::{DirectionalInput, Facing};
pub use player::Player;
pub use tile::{Tile, TileGrid};
pub use viewport::{ConfigurationError, ViewportFit};
