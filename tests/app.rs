//! Headless runs of the simulation plugins: no window, no renderer, fixed 16 ms frames.

use std::collections::HashSet;
use std::time::Duration;

use bevy::prelude::*;
use bevy::state::app::StatesPlugin;
use bevy::time::TimeUpdateStrategy;
use tile_world::interaction::{InteractionController, InteractionState};
use tile_world::map::{MapLoadOptions, WorldMap};
use tile_world::movement::{DirectionalInput, MovementSettings};
use tile_world::state::GameState;
use tile_world::{Player, SimulationPlugin};

fn headless_app(map: WorldMap) -> App {
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, StatesPlugin))
        .add_plugins(SimulationPlugin)
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(16)))
        .insert_resource(map);
    app.world_mut()
        .resource_mut::<NextState<GameState>>()
        .set(GameState::Playing);
    app.update();
    app.update();
    app
}

fn fallback_map() -> WorldMap {
    let interactive: HashSet<u32> = [125, 126, 127, 128].into_iter().collect();
    WorldMap::fallback(MapLoadOptions {
        required_layers: &[],
        interactive: &interactive,
        spawn_half_extents: MovementSettings::default().half_extents(),
    })
}

fn player(app: &mut App) -> Player {
    let mut query = app.world_mut().query::<&Player>();
    query.single(app.world()).clone()
}

#[test]
fn player_spawns_once_on_the_spawn_point() {
    let mut app = headless_app(fallback_map());
    let mut query = app.world_mut().query::<&Player>();
    assert_eq!(query.iter(app.world()).count(), 1);
    assert_eq!(player(&mut app).position, Vec2::new(320.0, 240.0));
}

#[test]
fn host_input_moves_the_player() {
    let mut app = headless_app(fallback_map());
    let start = player(&mut app).position;

    *app.world_mut().resource_mut::<DirectionalInput>() = DirectionalInput {
        right: true,
        ..default()
    };
    for _ in 0..5 {
        app.update();
    }

    let moved = player(&mut app);
    assert!(moved.position.x > start.x);
    assert_eq!(moved.position.y, start.y);
    assert_eq!(moved.facing, tile_world::Facing::Right);
}

#[test]
fn leaving_gameplay_tears_the_session_down() {
    let mut app = headless_app(fallback_map());
    app.world_mut()
        .resource_mut::<NextState<GameState>>()
        .set(GameState::Loading);
    app.update();

    let mut query = app.world_mut().query::<&Player>();
    assert_eq!(query.iter(app.world()).count(), 0);
    assert_eq!(
        app.world().resource::<InteractionController>().state(),
        InteractionState::Idle
    );
}
