//! On-screen views of the simulation: the player square with its name tag, the dialogue bubble
//! and an optional debug overlay. Views only read simulation state; the bubble entity is rebuilt
//! from `InteractionController` on every `DialogueEvent`, the old one despawned first, so at most
//! one bubble entity ever exists.

use std::fmt::Write as _;

use bevy::prelude::*;
use serde::Deserialize;

use crate::collision::{Blocker, CollisionDebug};
use crate::interaction::{DialogueEvent, InteractionConfig, InteractionController};
use crate::movement::MovementSettings;
use crate::player::{map_to_world, Player, SessionProfile, PLAYER_Z};
use crate::state::{GameSet, GameState};

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DebugOverlayConfig>()
            .add_systems(OnEnter(GameState::Playing), spawn_debug_overlay)
            .add_systems(OnExit(GameState::Playing), despawn_debug_overlay)
            .add_systems(
                Update,
                (
                    dress_player,
                    rebuild_bubble_view,
                    (follow_player_with_bubble, update_name_tag),
                    update_debug_overlay,
                )
                    .chain()
                    .after(GameSet::Interaction)
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

#[derive(Resource, Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DebugOverlayConfig {
    pub enabled: bool,
}

impl Default for DebugOverlayConfig {
    fn default() -> Self {
        Self {
            enabled: cfg!(debug_assertions),
        }
    }
}

#[derive(Component)]
struct BubbleView;

#[derive(Component)]
struct NameTag;

#[derive(Component)]
struct DebugOverlay;

const BUBBLE_Z: f32 = 20.0;
const NAME_TAG_OFFSET: f32 = 20.0;

fn avatar_color(avatar_id: &str) -> Color {
    match avatar_id {
        "jelly" => Color::srgb(0.0, 1.0, 0.0),
        "npc" => Color::srgb(1.0, 0.0, 0.0),
        _ => Color::srgb(0.9, 0.9, 0.9),
    }
}

/// Gives a freshly spawned player its sprite and name tag.
fn dress_player(
    mut commands: Commands,
    profile: Res<SessionProfile>,
    settings: Res<MovementSettings>,
    players: Query<(Entity, &Player), Added<Player>>,
) {
    for (entity, player) in &players {
        commands
            .entity(entity)
            .insert((
                Sprite {
                    color: avatar_color(&profile.avatar_id),
                    custom_size: Some(settings.half_extents() * 2.0),
                    ..default()
                },
                Handle::<Image>::default(),
            ))
            .with_children(|parent| {
                parent.spawn((
                    NameTag,
                    Text2dBundle {
                        text: Text::from_section(
                            format!("{} ({})", profile.display_name, player.facing.label()),
                            TextStyle {
                                font_size: 12.0,
                                color: Color::WHITE,
                                ..default()
                            },
                        ),
                        transform: Transform::from_xyz(
                            0.0,
                            settings.half_height + NAME_TAG_OFFSET,
                            1.0,
                        ),
                        ..default()
                    },
                ));
            });
    }
}

fn update_name_tag(
    profile: Res<SessionProfile>,
    players: Query<(&Player, &Children), Changed<Player>>,
    mut tags: Query<&mut Text, With<NameTag>>,
) {
    for (player, children) in &players {
        for child in children.iter() {
            if let Ok(mut text) = tags.get_mut(*child) {
                let label = format!("{} ({})", profile.display_name, player.facing.label());
                if text.sections[0].value != label {
                    text.sections[0].value = label;
                }
            }
        }
    }
}

fn rebuild_bubble_view(
    mut commands: Commands,
    mut events: EventReader<DialogueEvent>,
    controller: Res<InteractionController>,
    views: Query<Entity, With<BubbleView>>,
    players: Query<&Player>,
) {
    if events.read().count() == 0 {
        return;
    }

    for entity in &views {
        commands.entity(entity).despawn_recursive();
    }

    let Some(bubble) = controller.bubble() else {
        return;
    };
    let anchor = players
        .get_single()
        .map(|player| bubble.position(player.position))
        .unwrap_or(bubble.anchor_offset);

    commands.spawn((
        BubbleView,
        Name::new("DialogueBubble"),
        Text2dBundle {
            text: Text::from_section(
                bubble.message.clone(),
                TextStyle {
                    font_size: 14.0,
                    color: Color::BLACK,
                    ..default()
                },
            )
            .with_justify(JustifyText::Center),
            text_2d_bounds: bevy::text::Text2dBounds {
                size: Vec2::new(220.0, f32::INFINITY),
            },
            transform: Transform::from_translation(map_to_world(anchor).extend(BUBBLE_Z)),
            ..default()
        },
    ));
}

fn follow_player_with_bubble(
    controller: Res<InteractionController>,
    players: Query<&Player>,
    mut views: Query<&mut Transform, With<BubbleView>>,
) {
    let (Some(bubble), Ok(player)) = (controller.bubble(), players.get_single()) else {
        return;
    };
    let world = map_to_world(bubble.position(player.position));
    for mut transform in &mut views {
        transform.translation.x = world.x;
        transform.translation.y = world.y;
    }
}

fn spawn_debug_overlay(mut commands: Commands, config: Res<DebugOverlayConfig>) {
    if !config.enabled {
        return;
    }

    commands.spawn((
        DebugOverlay,
        Name::new("DebugOverlay"),
        TextBundle::from_section(
            "",
            TextStyle {
                font_size: 16.0,
                color: Color::WHITE,
                ..default()
            },
        )
        .with_background_color(Color::srgba(0.0, 0.0, 0.0, 0.7))
        .with_style(Style {
            position_type: PositionType::Absolute,
            top: Val::Px(10.0),
            left: Val::Px(10.0),
            ..default()
        }),
    ));
}

fn despawn_debug_overlay(mut commands: Commands, query: Query<Entity, With<DebugOverlay>>) {
    for entity in &query {
        commands.entity(entity).despawn_recursive();
    }
}

fn update_debug_overlay(
    time: Res<Time>,
    debug: Res<CollisionDebug>,
    controller: Res<InteractionController>,
    config: Res<InteractionConfig>,
    mut overlays: Query<&mut Text, With<DebugOverlay>>,
) {
    let Ok(mut text) = overlays.get_single_mut() else {
        return;
    };

    let mut report = String::new();
    if let Some(position) = debug.player_position {
        let _ = writeln!(report, "position: ({:.1}, {:.1})", position.x, position.y);
    }
    if let Some(cell) = debug.player_cell {
        let _ = writeln!(report, "cell: ({}, {})", cell.x, cell.y);
    }
    match debug.blocking() {
        Some(Blocker::Tile(hit)) => {
            let _ = writeln!(
                report,
                "blocked: tile {} at ({}, {}) on {}",
                hit.tile_index, hit.cell.x, hit.cell.y, hit.layer
            );
        }
        Some(Blocker::MapEdge) => report.push_str("blocked: map edge\n"),
        None => report.push_str("blocked: -\n"),
    }
    let _ = writeln!(report, "in reach: {}", debug.interaction_hits.len());
    match controller.bubble() {
        Some(bubble) => {
            let remaining = bubble.remaining(time.elapsed(), config.lifetime());
            let _ = write!(
                report,
                "bubble: tile {} ({} ms left)",
                bubble.trigger.tile_index,
                remaining.as_millis()
            );
        }
        None => report.push_str("bubble: -"),
    }

    text.sections[0].value = report;
}
