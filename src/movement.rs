//! Top-down player movement. Input becomes a per-axis velocity, and each frame's step is
//! resolved one axis at a time against the map's collidable tiles and its outer edge, so a body
//! pressed into a wall keeps sliding along it.

use bevy::input::keyboard::KeyCode;
use bevy::prelude::*;
use serde::Deserialize;

use crate::collision::{self, Blocker, BoundingBox, CollisionDebug};
use crate::map::WorldMap;
use crate::player::Player;
use crate::state::{GameSet, GameState};
use crate::tile::TileGrid;

/// Turns the four directional signals into player motion once per frame. The keyboard reader is
/// optional: it only runs when the host registered keyboard input, so headless hosts write
/// [`DirectionalInput`] themselves.
pub struct MovementPlugin;

impl Plugin for MovementPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MovementSettings>()
            .init_resource::<DirectionalInput>()
            .add_systems(
                Update,
                (
                    read_keyboard_input
                        .run_if(resource_exists::<ButtonInput<KeyCode>>)
                        .in_set(GameSet::Input),
                    apply_movement.in_set(GameSet::Movement),
                )
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

/// Frames longer than this are integrated as if they took this long, so a stalled frame cannot
/// carry the player through a tile.
pub const MAX_FRAME_SECONDS: f32 = 0.1;

#[derive(Resource, Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MovementSettings {
    /// Pixels per second along each active axis.
    pub speed: f32,
    pub half_width: f32,
    pub half_height: f32,
}

impl Default for MovementSettings {
    fn default() -> Self {
        Self {
            speed: 200.0,
            half_width: 14.0,
            half_height: 14.0,
        }
    }
}

impl MovementSettings {
    pub fn half_extents(&self) -> Vec2 {
        Vec2::new(self.half_width, self.half_height)
    }
}

/// Four independent directional signals for the current tick. Hosts write this resource from
/// whatever input source they own; the bundled keyboard reader is only one option.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionalInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl DirectionalInput {
    /// Unit step per axis in map space (y grows down). Opposite presses cancel out.
    pub fn axis(&self) -> Vec2 {
        let x = f32::from(self.right as u8) - f32::from(self.left as u8);
        let y = f32::from(self.down as u8) - f32::from(self.up as u8);
        Vec2::new(x, y)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Facing {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Facing {
    /// Facing implied by `velocity`, or `previous` when standing still. Vertical movement wins
    /// when both axes are active.
    pub fn from_velocity(velocity: Vec2, previous: Facing) -> Facing {
        if velocity.y < 0.0 {
            Facing::Up
        } else if velocity.y > 0.0 {
            Facing::Down
        } else if velocity.x < 0.0 {
            Facing::Left
        } else if velocity.x > 0.0 {
            Facing::Right
        } else {
            previous
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Facing::Up => "up",
            Facing::Down => "down",
            Facing::Left => "left",
            Facing::Right => "right",
        }
    }
}

pub fn velocity_from_input(input: DirectionalInput, speed: f32) -> Vec2 {
    input.axis() * speed
}

/// What stopped each axis of the last step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovementOutcome {
    pub blocked_x: Option<Blocker>,
    pub blocked_y: Option<Blocker>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

/// Advances `player` by one tick. X and Y are resolved separately so the player slides along
/// walls; a blocked axis ends flush against the blocking tile when that spot is free and keeps
/// its previous coordinate otherwise. The body never leaves the map: an axis that would cross
/// the map edge stops on it and reports [`Blocker::MapEdge`].
pub fn advance_player(
    player: &mut Player,
    input: DirectionalInput,
    delta_seconds: f32,
    map: &WorldMap,
    settings: &MovementSettings,
) -> MovementOutcome {
    let velocity = velocity_from_input(input, settings.speed);
    player.velocity = velocity;
    player.facing = Facing::from_velocity(velocity, player.facing);

    if !delta_seconds.is_finite() || delta_seconds <= 0.0 || !player.position.is_finite() {
        return MovementOutcome::default();
    }

    let step = velocity * delta_seconds.min(MAX_FRAME_SECONDS);
    let half = settings.half_extents();
    let layers = map.layers();
    let walkable = walkable_area(map.bounds(), half);

    let blocked_x = resolve_axis(&mut player.position, Axis::X, step.x, half, walkable, layers);
    let blocked_y = resolve_axis(&mut player.position, Axis::Y, step.y, half, walkable, layers);

    if blocked_x.is_some() {
        player.velocity.x = 0.0;
    }
    if blocked_y.is_some() {
        player.velocity.y = 0.0;
    }

    MovementOutcome {
        blocked_x,
        blocked_y,
    }
}

/// Range the body centre may occupy so the whole body stays on the map. A map narrower than the
/// body collapses to its centre line.
fn walkable_area(bounds: BoundingBox, half: Vec2) -> BoundingBox {
    let shrink = |low: f32, high: f32, extent: f32| {
        if high - low >= extent * 2.0 {
            (low + extent, high - extent)
        } else {
            let middle = (low + high) * 0.5;
            (middle, middle)
        }
    };
    let (left, right) = shrink(bounds.left, bounds.right, half.x);
    let (top, bottom) = shrink(bounds.top, bounds.bottom, half.y);
    BoundingBox::new(left, top, right, bottom)
}

fn resolve_axis(
    position: &mut Vec2,
    axis: Axis,
    delta: f32,
    half: Vec2,
    walkable: BoundingBox,
    layers: &[TileGrid],
) -> Option<Blocker> {
    if delta.abs() < f32::EPSILON {
        return None;
    }

    let current = along(*position, axis);
    let (low, high) = match axis {
        Axis::X => (walkable.left, walkable.right),
        Axis::Y => (walkable.top, walkable.bottom),
    };
    // Only the leading edge is clamped, so a body placed off the map is never pulled backwards.
    let wanted = current + delta;
    let target = if delta > 0.0 {
        wanted.min(high.max(current))
    } else {
        wanted.max(low.min(current))
    };
    let at_edge = target != wanted;

    // Tiles the body already overlaps never block, so an embedded body can walk out.
    let embedded = collision::query(&BoundingBox::from_center(*position, half), layers);

    let candidate = with_axis(*position, axis, target);
    let Some(hit) = collision::first_blocking(
        &BoundingBox::from_center(candidate, half),
        layers,
        &embedded,
    ) else {
        *position = candidate;
        return at_edge.then_some(Blocker::MapEdge);
    };

    let Some(layer) = layers.get(hit.layer_index) else {
        return Some(Blocker::Tile(hit));
    };
    let tile = layer.cell_bounds(hit.cell.x, hit.cell.y);
    let flush = match (axis, delta > 0.0) {
        (Axis::X, true) => tile.left - half.x,
        (Axis::X, false) => tile.right + half.x,
        (Axis::Y, true) => tile.top - half.y,
        (Axis::Y, false) => tile.bottom + half.y,
    };

    let travelled = (flush - current) * delta.signum();
    let flushed = with_axis(*position, axis, flush);
    if travelled > 0.0
        && collision::first_blocking(&BoundingBox::from_center(flushed, half), layers, &embedded)
            .is_none()
    {
        *position = flushed;
    }

    Some(Blocker::Tile(hit))
}

fn along(position: Vec2, axis: Axis) -> f32 {
    match axis {
        Axis::X => position.x,
        Axis::Y => position.y,
    }
}

fn with_axis(position: Vec2, axis: Axis, value: f32) -> Vec2 {
    match axis {
        Axis::X => Vec2::new(value, position.y),
        Axis::Y => Vec2::new(position.x, value),
    }
}

fn read_keyboard_input(keyboard: Res<ButtonInput<KeyCode>>, mut input: ResMut<DirectionalInput>) {
    let pressed = |keys: [KeyCode; 2]| keys.iter().any(|key| keyboard.pressed(*key));

    let next = DirectionalInput {
        up: pressed([KeyCode::ArrowUp, KeyCode::KeyW]),
        down: pressed([KeyCode::ArrowDown, KeyCode::KeyS]),
        left: pressed([KeyCode::ArrowLeft, KeyCode::KeyA]),
        right: pressed([KeyCode::ArrowRight, KeyCode::KeyD]),
    };

    if *input != next {
        *input = next;
    }
}

fn apply_movement(
    time: Res<Time>,
    settings: Res<MovementSettings>,
    input: Res<DirectionalInput>,
    map: Option<Res<WorldMap>>,
    mut debug: ResMut<CollisionDebug>,
    mut query: Query<&mut Player>,
) {
    let Some(map) = map else {
        return;
    };

    for mut player in &mut query {
        let outcome = advance_player(
            &mut player,
            *input,
            time.delta_seconds(),
            &map,
            &settings,
        );

        debug.player_position = Some(player.position);
        debug.player_cell = map
            .layers()
            .first()
            .and_then(|layer| layer.cell_at(player.position));
        debug.blocked_x = outcome.blocked_x;
        debug.blocked_y = outcome.blocked_y;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::map::{MapLoadOptions, RawLayer, RawMapData};

    fn open_room() -> WorldMap {
        let interactive = HashSet::new();
        WorldMap::fallback(MapLoadOptions {
            required_layers: &[],
            interactive: &interactive,
            spawn_half_extents: Vec2::splat(14.0),
        })
    }

    fn player_at(position: Vec2) -> Player {
        Player {
            position,
            ..Player::default()
        }
    }

    #[test]
    fn opposite_presses_cancel() {
        let input = DirectionalInput {
            up: true,
            down: true,
            left: false,
            right: true,
        };
        assert_eq!(velocity_from_input(input, 200.0), Vec2::new(200.0, 0.0));
    }

    #[test]
    fn facing_is_retained_when_idle() {
        let map = open_room();
        let settings = MovementSettings::default();
        let mut player = player_at(map.center());

        let left = DirectionalInput {
            left: true,
            ..default()
        };
        advance_player(&mut player, left, 0.016, &map, &settings);
        assert_eq!(player.facing, Facing::Left);

        advance_player(&mut player, DirectionalInput::default(), 0.016, &map, &settings);
        assert_eq!(player.facing, Facing::Left);
        assert_eq!(player.velocity, Vec2::ZERO);
    }

    #[test]
    fn integrates_velocity_times_delta() {
        let map = open_room();
        let settings = MovementSettings::default();
        let start = map.center();
        let mut player = player_at(start);
        let right = DirectionalInput {
            right: true,
            ..default()
        };

        let outcome = advance_player(&mut player, right, 0.05, &map, &settings);
        assert_eq!(outcome, MovementOutcome::default());
        assert!((player.position.x - (start.x + 10.0)).abs() < 1e-4);
        assert_eq!(player.position.y, start.y);
    }

    #[test]
    fn stops_flush_against_wall_and_slides() {
        let map = open_room();
        let settings = MovementSettings::default();
        let mut player = player_at(Vec2::new(60.0, 200.0));
        let up_left = DirectionalInput {
            up: true,
            left: true,
            ..default()
        };

        let outcome = advance_player(&mut player, up_left, 0.1, &map, &settings);
        let hit = outcome.blocked_x.expect("left wall blocks x");
        assert_eq!(hit.tile().map(|hit| hit.layer.as_str()), Some("WallLeft"));
        assert!((player.position.x - (32.0 + 14.0)).abs() < 1e-4);
        assert!(outcome.blocked_y.is_none());
        assert!((player.position.y - 180.0).abs() < 1e-4);
    }

    #[test]
    fn embedded_body_can_walk_out() {
        let raw = RawMapData {
            tile_width: 32,
            tile_height: 32,
            layers: vec![RawLayer {
                name: "Obstacles".to_owned(),
                width: 3,
                height: 1,
                data: vec![vec![0, 7, 0]],
                offset: [0.0, 0.0],
                collision: Default::default(),
            }],
            objects: Vec::new(),
        };
        let interactive = HashSet::new();
        let map = WorldMap::load(
            &raw,
            MapLoadOptions {
                required_layers: &[],
                interactive: &interactive,
                spawn_half_extents: Vec2::splat(4.0),
            },
        )
        .unwrap();
        let settings = MovementSettings {
            half_width: 4.0,
            half_height: 4.0,
            ..default()
        };
        let mut player = player_at(Vec2::new(48.0, 16.0));
        let right = DirectionalInput {
            right: true,
            ..default()
        };

        advance_player(&mut player, right, 0.05, &map, &settings);
        assert!(player.position.x > 48.0);
    }

    #[test]
    fn map_edge_stops_a_player_without_walls() {
        let raw = RawMapData {
            tile_width: 32,
            tile_height: 32,
            layers: vec![RawLayer {
                name: "Ground".to_owned(),
                width: 4,
                height: 4,
                data: vec![vec![0; 4]; 4],
                offset: [0.0, 0.0],
                collision: Default::default(),
            }],
            objects: Vec::new(),
        };
        let interactive = HashSet::new();
        let map = WorldMap::load(
            &raw,
            MapLoadOptions {
                required_layers: &[],
                interactive: &interactive,
                spawn_half_extents: Vec2::splat(14.0),
            },
        )
        .unwrap();
        let settings = MovementSettings::default();
        let mut player = player_at(map.spawn_point());
        let up_left = DirectionalInput {
            up: true,
            left: true,
            ..default()
        };

        let mut last = MovementOutcome::default();
        for _ in 0..600 {
            last = advance_player(&mut player, up_left, 1.0 / 60.0, &map, &settings);
        }

        assert_eq!(player.position, Vec2::splat(14.0));
        assert_eq!(last.blocked_x, Some(Blocker::MapEdge));
        assert_eq!(last.blocked_y, Some(Blocker::MapEdge));
        assert_eq!(player.velocity, Vec2::ZERO);

        let down_right = DirectionalInput {
            down: true,
            right: true,
            ..default()
        };
        for _ in 0..600 {
            advance_player(&mut player, down_right, 1.0 / 60.0, &map, &settings);
        }
        assert_eq!(player.position, Vec2::splat(128.0 - 14.0));
    }
}
