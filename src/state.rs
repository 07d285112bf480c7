//! Session state and the per-frame stage ordering. A session is one pass through `Playing`:
//! entering it spawns the player on the freshly loaded map, leaving it removes the player, closes
//! any open dialogue and drops the map. Switching back to `Loading` starts a new session.

use bevy::prelude::*;

/// `Loading` resolves the map (or its fallback); `Playing` is a live session. Leaving `Playing`
/// tears the session down.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, States)]
pub enum GameState {
    #[default]
    Loading,
    Playing,
}

/// Stages of one simulation tick, run in this order.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum GameSet {
    Input,
    Movement,
    Interaction,
}
