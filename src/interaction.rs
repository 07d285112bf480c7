//! Proximity dialogue. The `InteractionController` watches the tiles around the player for
//! interactive indices and owns the single `DialogueBubble` that may be alive at any time.
//!
//! ```text
//!   Idle ──(interactive tile in reach)──▶ Showing
//!   Showing ──(different top tile)──▶ Showing   (old bubble torn down first)
//!   Showing ──(3000 ms elapsed | trigger out of reach)──▶ Idle
//! ```
//!
//! A bubble that expired is not reopened for the same tile until the player has left it.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use bevy::math::UVec2;
use bevy::prelude::*;
use serde::Deserialize;

use crate::collision::{BoundingBox, CollisionDebug, TileHit};
use crate::map::WorldMap;
use crate::movement::MovementSettings;
use crate::player::Player;
use crate::state::{GameSet, GameState};

/// Runs the bubble state machine after movement each frame and closes the bubble when the
/// session ends.
pub struct InteractionPlugin;

impl Plugin for InteractionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<InteractionConfig>()
            .init_resource::<InteractionController>()
            .add_event::<DialogueEvent>()
            .add_systems(
                Update,
                update_interaction
                    .in_set(GameSet::Interaction)
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(OnExit(GameState::Playing), end_interaction);
    }
}

/// Tile indices that trigger dialogue out of the box.
pub const DEFAULT_INTERACTIVE_TILES: [u32; 4] = [125, 126, 127, 128];

/// Static dialogue lines keyed by tile index. Its keys are the interactive allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct DialogueCatalog {
    messages: BTreeMap<u32, String>,
}

impl Default for DialogueCatalog {
    fn default() -> Self {
        let lines = [
            "Ahoy, traveller! The tide brings strange visitors today.",
            "Mind the barrels, they hold the captain's finest rum.",
            "They say a map to the old treasure is hidden in this town.",
            "Fair winds! Come back when you have a ship of your own.",
        ];
        Self::new(
            DEFAULT_INTERACTIVE_TILES
                .into_iter()
                .zip(lines)
                .map(|(index, line)| (index, line.to_owned())),
        )
    }
}

impl DialogueCatalog {
    pub fn new(messages: impl IntoIterator<Item = (u32, String)>) -> Self {
        Self {
            messages: messages.into_iter().collect(),
        }
    }

    pub fn message(&self, tile_index: u32) -> Option<&str> {
        self.messages.get(&tile_index).map(String::as_str)
    }

    pub fn is_interactive(&self, tile_index: u32) -> bool {
        self.messages.contains_key(&tile_index)
    }

    pub fn interactive_indices(&self) -> HashSet<u32> {
        self.messages.keys().copied().collect()
    }
}

#[derive(Resource, Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    pub lifetime_ms: u64,
    /// Bubbles for tiles this many cells from a map edge are pushed away from it.
    pub edge_margin_cells: u32,
    pub bubble_offset_x: f32,
    pub bubble_offset_y: f32,
    /// How far beyond the player's body a tile still counts as in reach.
    pub reach_px: f32,
    pub catalog: DialogueCatalog,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            lifetime_ms: 3000,
            edge_margin_cells: 4,
            bubble_offset_x: 48.0,
            bubble_offset_y: 40.0,
            reach_px: 4.0,
            catalog: DialogueCatalog::default(),
        }
    }
}

impl InteractionConfig {
    pub fn lifetime(&self) -> Duration {
        Duration::from_millis(self.lifetime_ms)
    }

    /// Box whose overlaps count as "in reach" for a player body.
    pub fn probe(&self, position: Vec2, half_extents: Vec2) -> BoundingBox {
        BoundingBox::from_center(position, half_extents).inflate(self.reach_px.max(0.0))
    }
}

/// Identity of the tile a bubble belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerKey {
    pub tile_index: u32,
    pub cell: UVec2,
}

impl From<&TileHit> for TriggerKey {
    fn from(hit: &TileHit) -> Self {
        Self {
            tile_index: hit.tile_index,
            cell: hit.cell,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogueBubble {
    pub trigger: TriggerKey,
    pub message: String,
    /// Session time the bubble was created at.
    pub created_at: Duration,
    /// Displacement from the player position, in map pixels.
    pub anchor_offset: Vec2,
}

impl DialogueBubble {
    pub fn position(&self, player_position: Vec2) -> Vec2 {
        player_position + self.anchor_offset
    }

    pub fn remaining(&self, now: Duration, lifetime: Duration) -> Duration {
        lifetime.saturating_sub(now.saturating_sub(self.created_at))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    Idle,
    Showing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Expired,
    OutOfReach,
    SessionEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleTransition {
    Opened(TriggerKey),
    Replaced {
        previous: TriggerKey,
        current: TriggerKey,
    },
    Closed {
        trigger: TriggerKey,
        reason: CloseReason,
    },
}

/// Sent whenever the active bubble changes so views can rebuild what they draw.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogueEvent(pub BubbleTransition);

/// Sole owner of the active dialogue bubble.
#[derive(Resource, Debug, Default, Clone, PartialEq)]
pub struct InteractionController {
    bubble: Option<DialogueBubble>,
    dismissed: Option<TriggerKey>,
}

impl InteractionController {
    pub fn state(&self) -> InteractionState {
        if self.bubble.is_some() {
            InteractionState::Showing
        } else {
            InteractionState::Idle
        }
    }

    pub fn bubble(&self) -> Option<&DialogueBubble> {
        self.bubble.as_ref()
    }

    /// Feeds one frame of overlaps (priority ordered) into the state machine.
    pub fn update(
        &mut self,
        hits: &[TileHit],
        now: Duration,
        map: &WorldMap,
        config: &InteractionConfig,
    ) -> Option<BubbleTransition> {
        let in_reach: Vec<(&TileHit, TriggerKey)> = hits
            .iter()
            .filter(|hit| config.catalog.is_interactive(hit.tile_index))
            .map(|hit| (hit, TriggerKey::from(hit)))
            .collect();

        if let Some(dismissed) = self.dismissed {
            if !in_reach.iter().any(|(_, key)| *key == dismissed) {
                self.dismissed = None;
            }
        }

        let candidate = in_reach
            .iter()
            .find(|(_, key)| Some(*key) != self.dismissed)
            .copied();

        let Some(active) = self.bubble.as_ref().map(|bubble| bubble.trigger) else {
            let (hit, key) = candidate?;
            self.bubble = Some(self.create_bubble(hit, key, now, map, config));
            return Some(BubbleTransition::Opened(key));
        };

        if let Some((hit, key)) = candidate.filter(|(_, key)| *key != active) {
            self.teardown();
            self.bubble = Some(self.create_bubble(hit, key, now, map, config));
            return Some(BubbleTransition::Replaced {
                previous: active,
                current: key,
            });
        }

        if !in_reach.iter().any(|(_, key)| *key == active) {
            self.teardown();
            return Some(BubbleTransition::Closed {
                trigger: active,
                reason: CloseReason::OutOfReach,
            });
        }

        let expired = self
            .bubble
            .as_ref()
            .is_some_and(|bubble| bubble.remaining(now, config.lifetime()).is_zero());
        if expired {
            self.teardown();
            self.dismissed = Some(active);
            return Some(BubbleTransition::Closed {
                trigger: active,
                reason: CloseReason::Expired,
            });
        }

        None
    }

    /// Drops the bubble and any dismissal memory.
    pub fn reset(&mut self) -> Option<BubbleTransition> {
        self.dismissed = None;
        let trigger = self.teardown()?.trigger;
        Some(BubbleTransition::Closed {
            trigger,
            reason: CloseReason::SessionEnded,
        })
    }

    fn teardown(&mut self) -> Option<DialogueBubble> {
        self.bubble.take()
    }

    fn create_bubble(
        &self,
        hit: &TileHit,
        trigger: TriggerKey,
        now: Duration,
        map: &WorldMap,
        config: &InteractionConfig,
    ) -> DialogueBubble {
        let message = config
            .catalog
            .message(hit.tile_index)
            .unwrap_or_default()
            .to_owned();

        DialogueBubble {
            trigger,
            message,
            created_at: now,
            anchor_offset: bubble_offset(hit, map, config),
        }
    }
}

/// Offset from the player to the bubble: above the player unless the trigger sits near the top
/// edge of the map, and pushed inwards when the trigger sits near the left or right edge.
pub fn bubble_offset(hit: &TileHit, map: &WorldMap, config: &InteractionConfig) -> Vec2 {
    let Some(layer) = map.layers().get(hit.layer_index) else {
        return Vec2::new(0.0, -config.bubble_offset_y);
    };

    let tile = layer.cell_bounds(hit.cell.x, hit.cell.y);
    let bounds = map.bounds();
    let size = map.tile_size().as_vec2();
    let margin = config.edge_margin_cells as f32;

    let cells_from_top = ((tile.top - bounds.top) / size.y).floor();
    let cells_from_left = ((tile.left - bounds.left) / size.x).floor();
    let cells_from_right = ((bounds.right - tile.right) / size.x).floor();

    let y = if cells_from_top < margin {
        config.bubble_offset_y
    } else {
        -config.bubble_offset_y
    };
    let x = if cells_from_left < margin {
        config.bubble_offset_x
    } else if cells_from_right < margin {
        -config.bubble_offset_x
    } else {
        0.0
    };

    Vec2::new(x, y)
}

fn update_interaction(
    time: Res<Time>,
    map: Option<Res<WorldMap>>,
    config: Res<InteractionConfig>,
    settings: Res<MovementSettings>,
    mut controller: ResMut<InteractionController>,
    mut debug: ResMut<CollisionDebug>,
    mut events: EventWriter<DialogueEvent>,
    players: Query<&Player>,
) {
    let Some(map) = map else {
        return;
    };
    let Ok(player) = players.get_single() else {
        return;
    };

    let probe = config.probe(player.position, settings.half_extents());
    let hits = map.query(&probe);

    if let Some(transition) = controller.update(&hits, time.elapsed(), &map, &config) {
        debug!("Dialogue bubble: {:?}", transition);
        events.send(DialogueEvent(transition));
    }

    if debug.interaction_hits != hits {
        debug.interaction_hits = hits;
    }
}

fn end_interaction(
    mut controller: ResMut<InteractionController>,
    mut events: EventWriter<DialogueEvent>,
) {
    if let Some(transition) = controller.reset() {
        events.send(DialogueEvent(transition));
    }
}
