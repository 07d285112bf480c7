//! Plugin composition.
//!
//! `SimulationPlugin` carries the per-frame core (collision, movement, player, dialogue) and
//! needs nothing beyond time and states, so it also runs headless. `TileWorldPlugin` adds map
//! loading, the camera and the on-screen views on top of it.

use bevy::prelude::*;

use crate::camera::{CameraPlugin, MapCamera};
use crate::collision::{CollisionPlugin, CollisionSystems};
use crate::interaction::InteractionPlugin;
use crate::level::LevelPlugin;
use crate::movement::MovementPlugin;
use crate::player::PlayerPlugin;
use crate::state::{GameSet, GameState};
use crate::ui::UiPlugin;

/// Headless core: states, movement, collision bookkeeping and dialogue. Expects the host (or
/// `LevelPlugin`) to provide a `WorldMap` before entering `Playing`.
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<GameState>()
            .add_plugins((
                CollisionPlugin,   // Debug state for collision queries.
                MovementPlugin,    // Input + axis-separated movement.
                PlayerPlugin,      // Player spawn/despawn.
                InteractionPlugin, // Dialogue bubble state machine.
            ))
            // Input → Movement → Interaction, so dialogue always sees this frame's position.
            .configure_sets(
                Update,
                (GameSet::Input, GameSet::Movement, GameSet::Interaction)
                    .chain()
                    .run_if(in_state(GameState::Playing)),
            )
            .configure_sets(Update, CollisionSystems.after(GameSet::Interaction));
    }
}

/// Everything needed to run the tile world in a window.
pub struct TileWorldPlugin;

impl Plugin for TileWorldPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            SimulationPlugin,
            LevelPlugin,  // Map asset loading + fallback.
            CameraPlugin, // Viewport fitting.
            UiPlugin,     // Player sprite, dialogue bubble, debug overlay.
        ))
        .add_systems(Startup, setup_camera);
    }
}

fn setup_camera(mut commands: Commands) {
    commands.spawn((Name::new("MainCamera"), Camera2dBundle::default(), MapCamera));
}
