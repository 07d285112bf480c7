//! Player lifecycle: one player per session, created on the map's spawn point when gameplay
//! starts and removed when it ends. The simulation position lives in map pixels on the `Player`
//! component; the entity's `Transform` is only a mirror of it for rendering.

use bevy::prelude::*;
use serde::Deserialize;

use crate::map::WorldMap;
use crate::movement::Facing;
use crate::state::{GameSet, GameState};

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SessionProfile>()
            .add_systems(OnEnter(GameState::Playing), spawn_player)
            .add_systems(OnExit(GameState::Playing), despawn_player)
            .add_systems(
                Update,
                sync_player_transform
                    .after(GameSet::Movement)
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

/// Who is visiting, supplied by the host at session start. Only used for display.
#[derive(Resource, Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionProfile {
    pub display_name: String,
    pub avatar_id: String,
}

impl Default for SessionProfile {
    fn default() -> Self {
        Self {
            display_name: "Visitor".to_owned(),
            avatar_id: "jelly".to_owned(),
        }
    }
}

#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct Player {
    /// Centre of the body in map pixels.
    pub position: Vec2,
    pub velocity: Vec2,
    pub facing: Facing,
}

impl Player {
    pub fn spawn_on(map: &WorldMap) -> Self {
        Self {
            position: map.spawn_point(),
            ..default()
        }
    }
}

/// Map pixels (y down) to Bevy world units (y up).
pub fn map_to_world(position: Vec2) -> Vec2 {
    Vec2::new(position.x, -position.y)
}

/// Depth the player sprite is drawn at.
pub const PLAYER_Z: f32 = 10.0;

fn spawn_player(
    mut commands: Commands,
    map: Option<Res<WorldMap>>,
    profile: Res<SessionProfile>,
    existing: Query<Entity, With<Player>>,
) {
    let Some(map) = map else {
        warn!("Entered gameplay without a world map; no player spawned.");
        return;
    };
    if !existing.is_empty() {
        return;
    }

    let player = Player::spawn_on(&map);
    info!(
        "Spawning '{}' ({}) at {:?}",
        profile.display_name, profile.avatar_id, player.position
    );

    commands.spawn((
        Name::new("Player"),
        SpatialBundle::from_transform(Transform::from_translation(
            map_to_world(player.position).extend(PLAYER_Z),
        )),
        player,
    ));
}

fn despawn_player(mut commands: Commands, query: Query<Entity, With<Player>>) {
    for entity in &query {
        commands.entity(entity).despawn_recursive();
    }
}

fn sync_player_transform(mut query: Query<(&Player, &mut Transform), Changed<Player>>) {
    for (player, mut transform) in &mut query {
        let world = map_to_world(player.position);
        transform.translation.x = world.x;
        transform.translation.y = world.y;
    }
}
