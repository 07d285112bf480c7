//! Map asset orchestration: loads an LDtk project through the asset server, converts the
//! selected level into raw layer data and publishes the resulting `WorldMap`. Any failure along
//! the way (no project configured, load error, missing layers) ends in the fallback map so the
//! session always starts.

use std::collections::HashSet;

use bevy::asset::LoadState;
use bevy::prelude::*;
use bevy_ecs_ldtk::ldtk::{LayerInstance, Level};
use bevy_ecs_ldtk::prelude::*;
use serde::Deserialize;

use crate::interaction::InteractionConfig;
use crate::map::{MapLoadError, MapLoadOptions, PointObject, RawLayer, RawMapData, WorldMap};
use crate::movement::MovementSettings;
use crate::state::GameState;
use crate::tile::CollisionRule;

/// Owns the map lifecycle. Entering `Loading` requests the project, the monitor turns the loaded
/// level (or the failure) into a `WorldMap` and moves on to `Playing`, and leaving `Playing`
/// releases the map so the next session starts from scratch.
pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LevelConfig>()
            .init_resource::<LevelAssets>()
            .add_plugins(LdtkPlugin)
            .add_systems(OnEnter(GameState::Loading), request_map)
            .add_systems(
                Update,
                monitor_map_loading.run_if(in_state(GameState::Loading)),
            )
            .add_systems(OnExit(GameState::Playing), release_map);
    }
}

/// Which map to load and how to interpret it.
#[derive(Resource, Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// LDtk project under `assets/`; `None` goes straight to the fallback map.
    pub project_path: Option<String>,
    /// Level identifier inside the project; the first level when unset.
    pub start_level: Option<String>,
    /// Layers a map must contain to be accepted.
    pub required_layers: Vec<String>,
    /// Layers whose tiles never block movement.
    pub walkable_layers: Vec<String>,
    pub tile_size: u32,
    pub preferred_zoom: f32,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            project_path: Some("maps/pirate_town.ldtk".to_owned()),
            start_level: Some("Town".to_owned()),
            required_layers: vec!["Obstacles".to_owned(), "Ground".to_owned()],
            walkable_layers: vec!["Ground".to_owned()],
            tile_size: 32,
            preferred_zoom: 1.0,
        }
    }
}

/// Handle of the project being loaded, kept alive until the map is built.
#[derive(Resource, Default)]
pub struct LevelAssets {
    pub project: Option<Handle<LdtkProject>>,
}

fn request_map(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    config: Res<LevelConfig>,
    interaction: Res<InteractionConfig>,
    movement: Res<MovementSettings>,
    mut assets: ResMut<LevelAssets>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let Some(path) = config.project_path.as_ref() else {
        info!("No map project configured; using the fallback map.");
        let interactive = interaction.catalog.interactive_indices();
        commands.insert_resource(WorldMap::fallback(load_options(
            &config,
            &interactive,
            &movement,
        )));
        next_state.set(GameState::Playing);
        return;
    };

    assets.project = Some(asset_server.load(path.clone()));
}

fn monitor_map_loading(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    projects: Res<Assets<LdtkProject>>,
    config: Res<LevelConfig>,
    interaction: Res<InteractionConfig>,
    movement: Res<MovementSettings>,
    mut assets: ResMut<LevelAssets>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let Some(handle) = assets.project.as_ref() else {
        return;
    };

    let raw = match asset_server.get_load_state(handle.id()) {
        Some(LoadState::Loaded) => match projects.get(handle) {
            Some(project) => select_level(project.json_data().levels.as_slice(), &config)
                .and_then(|level| raw_map_from_level(level, &config)),
            None => return,
        },
        Some(LoadState::Failed(_)) => {
            let path = config.project_path.as_deref().unwrap_or("<unknown>");
            Err(MapLoadError::AssetFailed(path.to_owned()))
        }
        _ => return,
    };

    let interactive = interaction.catalog.interactive_indices();
    let map = WorldMap::load_or_fallback(raw, load_options(&config, &interactive, &movement));
    commands.insert_resource(map);
    assets.project = None;
    next_state.set(GameState::Playing);
}

fn release_map(mut commands: Commands) {
    commands.remove_resource::<WorldMap>();
}

fn load_options<'a>(
    config: &'a LevelConfig,
    interactive: &'a HashSet<u32>,
    movement: &MovementSettings,
) -> MapLoadOptions<'a> {
    MapLoadOptions {
        required_layers: &config.required_layers,
        interactive,
        spawn_half_extents: movement.half_extents(),
    }
}

fn select_level<'a>(levels: &'a [Level], config: &LevelConfig) -> Result<&'a Level, MapLoadError> {
    match config.start_level.as_ref() {
        Some(identifier) => levels
            .iter()
            .find(|level| &level.identifier == identifier)
            .ok_or_else(|| MapLoadError::LevelNotFound(identifier.clone())),
        None => levels
            .first()
            .ok_or_else(|| MapLoadError::LevelNotFound("<first level>".to_owned())),
    }
}

/// Flattens an LDtk level into raw layers. IntGrid values are used as tile indices as-is;
/// tile layers use the LDtk tile id plus one so that zero stays "empty". Entity instances
/// become points of interest named after their identifier.
pub fn raw_map_from_level(level: &Level, config: &LevelConfig) -> Result<RawMapData, MapLoadError> {
    let Some(instances) = level.layer_instances.as_ref() else {
        return Err(MapLoadError::MissingLayer {
            name: format!("{} (layer data not embedded)", level.identifier),
        });
    };

    let mut layers = Vec::new();
    let mut objects = Vec::new();

    for instance in instances {
        let origin = [
            instance.px_total_offset_x as f32,
            instance.px_total_offset_y as f32,
        ];

        objects.extend(instance.entity_instances.iter().map(|entity| PointObject {
            name: entity.identifier.clone(),
            x: origin[0] + entity.px.x as f32,
            y: origin[1] + entity.px.y as f32,
        }));

        let Some(data) = layer_rows(instance) else {
            continue;
        };
        if instance.grid_size as u32 != config.tile_size {
            return Err(MapLoadError::TileSizeMismatch {
                layer: instance.identifier.clone(),
                expected: config.tile_size,
                actual: instance.grid_size.max(0) as u32,
            });
        }

        let collision = if config.walkable_layers.contains(&instance.identifier) {
            CollisionRule::Never
        } else {
            CollisionRule::AllNonEmpty
        };

        layers.push(RawLayer {
            name: instance.identifier.clone(),
            width: instance.c_wid.max(0) as u32,
            height: instance.c_hei.max(0) as u32,
            data,
            offset: origin,
            collision,
        });
    }

    Ok(RawMapData {
        tile_width: config.tile_size,
        tile_height: config.tile_size,
        layers,
        objects,
    })
}

/// Row-major index rows for grid-shaped layers, `None` for pure entity layers.
fn layer_rows(instance: &LayerInstance) -> Option<Vec<Vec<u32>>> {
    let width = instance.c_wid.max(0) as usize;
    let height = instance.c_hei.max(0) as usize;
    if width == 0 {
        return None;
    }

    if !instance.int_grid_csv.is_empty() {
        let values: Vec<u32> = instance
            .int_grid_csv
            .iter()
            .map(|value| (*value).max(0) as u32)
            .collect();
        return Some(values.chunks(width).map(<[u32]>::to_vec).collect());
    }

    let tiles = if instance.grid_tiles.is_empty() {
        &instance.auto_layer_tiles
    } else {
        &instance.grid_tiles
    };
    if tiles.is_empty() {
        return None;
    }

    let grid = instance.grid_size.max(1);
    let mut rows = vec![vec![0; width]; height];
    for tile in tiles {
        let x = tile.px.x / grid;
        let y = tile.px.y / grid;
        if x < 0 || y < 0 || x as usize >= width || y as usize >= height {
            continue;
        }
        rows[y as usize][x as usize] = (tile.t.max(0) + 1) as u32;
    }
    Some(rows)
}
