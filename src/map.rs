//! World map loading: validates raw layered tile data into an immutable `WorldMap`, places the
//! spawn point, and builds the rectangular fallback map used whenever map data is unusable.

use std::collections::{HashMap, HashSet};

use bevy::math::{UVec2, Vec2};
use bevy::prelude::*;
use serde::Deserialize;
use thiserror::Error;

use crate::collision::{self, BoundingBox, TileHit};
use crate::tile::{CollisionRule, TileGrid};

/// Name of the point of interest the player spawns on.
pub const SPAWN_POINT: &str = "Spawn Point";

pub const FALLBACK_WIDTH: u32 = 20;
pub const FALLBACK_HEIGHT: u32 = 15;
pub const FALLBACK_TILE_SIZE: u32 = 32;
pub const FALLBACK_GROUND_TILE: u32 = 1;
pub const FALLBACK_WALL_TILE: u32 = 2;

#[derive(Debug, Error)]
pub enum MapLoadError {
    #[error("layer '{name}' is missing from the map data")]
    MissingLayer { name: String },
    #[error("layer '{layer}' declares {width}x{height} cells but holds {actual}")]
    DimensionMismatch {
        layer: String,
        width: u32,
        height: u32,
        actual: usize,
    },
    #[error("layer '{layer}' row {row} holds {actual} cells, expected {expected}")]
    RowLengthMismatch {
        layer: String,
        row: usize,
        expected: u32,
        actual: usize,
    },
    #[error("tile size must be non-zero, got {width}x{height}")]
    InvalidTileSize { width: u32, height: u32 },
    #[error("layer '{layer}' uses {actual}px tiles, map uses {expected}px")]
    TileSizeMismatch {
        layer: String,
        expected: u32,
        actual: u32,
    },
    #[error("map data declares no layers")]
    EmptyMap,
    #[error("level '{0}' was not found in the project")]
    LevelNotFound(String),
    #[error("map asset '{0}' failed to load")]
    AssetFailed(String),
    #[error("failed to parse map data: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Layered tile data as it arrives from a map asset, before validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawMapData {
    pub tile_width: u32,
    pub tile_height: u32,
    /// Highest priority first.
    pub layers: Vec<RawLayer>,
    #[serde(default)]
    pub objects: Vec<PointObject>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawLayer {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// One inner vector per row, top row first.
    pub data: Vec<Vec<u32>>,
    #[serde(default)]
    pub offset: [f32; 2],
    #[serde(default)]
    pub collision: CollisionRule,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PointObject {
    pub name: String,
    pub x: f32,
    pub y: f32,
}

impl RawMapData {
    pub fn from_json_str(json: &str) -> Result<Self, MapLoadError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Inputs the loader needs besides the raw data itself.
#[derive(Debug, Clone, Copy)]
pub struct MapLoadOptions<'a> {
    /// Layers that must be present for the map to be accepted.
    pub required_layers: &'a [String],
    /// Tile indices that always collide because they trigger dialogue.
    pub interactive: &'a HashSet<u32>,
    /// Half extents of the entity placed on the spawn point.
    pub spawn_half_extents: Vec2,
}

/// Ordered tile layers sharing one pixel space, plus named points of interest.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct WorldMap {
    layers: Vec<TileGrid>,
    points: HashMap<String, Vec2>,
    tile_size: UVec2,
    bounds: BoundingBox,
    spawn: Vec2,
    fallback: bool,
}

impl WorldMap {
    /// Validates `raw` and builds the map. The spawn point is guaranteed not to overlap a
    /// collidable tile when a free cell exists anywhere on the map.
    pub fn load(raw: &RawMapData, options: MapLoadOptions<'_>) -> Result<Self, MapLoadError> {
        let tile_size = UVec2::new(raw.tile_width, raw.tile_height);
        if tile_size.x == 0 || tile_size.y == 0 {
            return Err(MapLoadError::InvalidTileSize {
                width: tile_size.x,
                height: tile_size.y,
            });
        }
        if raw.layers.is_empty() {
            return Err(MapLoadError::EmptyMap);
        }

        for name in options.required_layers {
            if !raw.layers.iter().any(|layer| &layer.name == name) {
                return Err(MapLoadError::MissingLayer { name: name.clone() });
            }
        }

        let layers = raw
            .layers
            .iter()
            .map(|layer| build_layer(layer, tile_size, options.interactive))
            .collect::<Result<Vec<_>, _>>()?;

        let points = raw
            .objects
            .iter()
            .map(|object| (object.name.clone(), Vec2::new(object.x, object.y)))
            .collect();

        Ok(Self::assemble(
            layers,
            points,
            tile_size,
            false,
            options.spawn_half_extents,
        ))
    }

    /// Loads `raw`, substituting the fallback map if the data is missing or malformed.
    pub fn load_or_fallback(
        raw: Result<RawMapData, MapLoadError>,
        options: MapLoadOptions<'_>,
    ) -> Self {
        match raw.and_then(|raw| Self::load(&raw, options)) {
            Ok(map) => {
                info!(
                    "Loaded world map: {} layers, {}x{} px",
                    map.layers.len(),
                    map.size().x,
                    map.size().y
                );
                map
            }
            Err(err) => {
                warn!("Map data unusable ({err}); continuing with the fallback map.");
                Self::fallback(options)
            }
        }
    }

    /// 20x15 cells of 32 px: a flat, non-colliding ground layer plus four independently
    /// positioned wall strips, one tile thick, around the border.
    pub fn fallback(options: MapLoadOptions<'_>) -> Self {
        let tile_size = UVec2::splat(FALLBACK_TILE_SIZE);
        let tile = FALLBACK_TILE_SIZE as f32;
        let width = FALLBACK_WIDTH;
        let height = FALLBACK_HEIGHT;
        let interactive = options.interactive;
        let wall_rule = CollisionRule::AllNonEmpty;

        let strips = [
            ("WallTop", UVec2::new(width, 1), Vec2::ZERO),
            (
                "WallBottom",
                UVec2::new(width, 1),
                Vec2::new(0.0, (height - 1) as f32 * tile),
            ),
            ("WallLeft", UVec2::new(1, height), Vec2::ZERO),
            (
                "WallRight",
                UVec2::new(1, height),
                Vec2::new((width - 1) as f32 * tile, 0.0),
            ),
        ];

        let mut layers: Vec<TileGrid> = strips
            .into_iter()
            .filter_map(|(name, size, origin)| {
                TileGrid::filled(
                    name,
                    size,
                    tile_size,
                    origin,
                    FALLBACK_WALL_TILE,
                    &wall_rule,
                    interactive,
                )
                .ok()
            })
            .collect();
        layers.extend(
            TileGrid::filled(
                "Ground",
                UVec2::new(width, height),
                tile_size,
                Vec2::ZERO,
                FALLBACK_GROUND_TILE,
                &CollisionRule::Never,
                interactive,
            )
            .ok(),
        );

        Self::assemble(
            layers,
            HashMap::new(),
            tile_size,
            true,
            options.spawn_half_extents,
        )
    }

    fn assemble(
        layers: Vec<TileGrid>,
        mut points: HashMap<String, Vec2>,
        tile_size: UVec2,
        fallback: bool,
        spawn_half_extents: Vec2,
    ) -> Self {
        let bounds = layers
            .iter()
            .map(TileGrid::bounds)
            .reduce(|acc, next| acc.union(&next))
            .unwrap_or(BoundingBox::new(0.0, 0.0, 0.0, 0.0));

        let requested = points
            .get(SPAWN_POINT)
            .copied()
            .unwrap_or_else(|| bounds.center());
        let spawn = free_spawn(&layers, bounds, tile_size, requested, spawn_half_extents);
        if spawn != requested {
            warn!(
                "Spawn point {:?} overlaps a collidable tile; moved to {:?}",
                requested, spawn
            );
        }
        points.insert(SPAWN_POINT.to_owned(), spawn);

        Self {
            layers,
            points,
            tile_size,
            bounds,
            spawn,
            fallback,
        }
    }

    /// Layers in priority order, highest first.
    pub fn layers(&self) -> &[TileGrid] {
        &self.layers
    }

    pub fn layer(&self, name: &str) -> Option<&TileGrid> {
        self.layers.iter().find(|layer| layer.name() == name)
    }

    pub fn point(&self, name: &str) -> Option<Vec2> {
        self.points.get(name).copied()
    }

    pub fn spawn_point(&self) -> Vec2 {
        self.spawn
    }

    pub fn tile_size(&self) -> UVec2 {
        self.tile_size
    }

    /// Pixel rectangle covered by the union of every layer.
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn size(&self) -> Vec2 {
        self.bounds.size()
    }

    pub fn center(&self) -> Vec2 {
        self.bounds.center()
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn query(&self, bounds: &BoundingBox) -> Vec<TileHit> {
        collision::query(bounds, &self.layers)
    }
}

fn build_layer(
    raw: &RawLayer,
    tile_size: UVec2,
    interactive: &HashSet<u32>,
) -> Result<TileGrid, MapLoadError> {
    if raw.data.len() != raw.height as usize {
        return Err(MapLoadError::DimensionMismatch {
            layer: raw.name.clone(),
            width: raw.width,
            height: raw.height,
            actual: raw.data.iter().map(Vec::len).sum(),
        });
    }
    if let Some((row, cells)) = raw
        .data
        .iter()
        .enumerate()
        .find(|(_, cells)| cells.len() != raw.width as usize)
    {
        return Err(MapLoadError::RowLengthMismatch {
            layer: raw.name.clone(),
            row,
            expected: raw.width,
            actual: cells.len(),
        });
    }

    let indices: Vec<u32> = raw.data.iter().flatten().copied().collect();
    TileGrid::from_indices(
        raw.name.clone(),
        UVec2::new(raw.width, raw.height),
        tile_size,
        Vec2::from(raw.offset),
        &indices,
        &raw.collision,
        interactive,
    )
}

/// `requested` when an entity there overlaps nothing; otherwise the closest free cell centre,
/// searched in growing rings of cells around the requested spot.
fn free_spawn(
    layers: &[TileGrid],
    bounds: BoundingBox,
    tile_size: UVec2,
    requested: Vec2,
    half_extents: Vec2,
) -> Vec2 {
    let is_free = |point: Vec2| {
        let body = BoundingBox::from_center(point, half_extents);
        bounds.contains_box(&body) && collision::first_blocking(&body, layers, &[]).is_none()
    };

    if !requested.is_finite() || layers.is_empty() {
        return bounds.center();
    }
    if is_free(requested) {
        return requested;
    }

    let tile = tile_size.as_vec2();
    let columns = (bounds.width() / tile.x).ceil().max(1.0) as i64;
    let rows = (bounds.height() / tile.y).ceil().max(1.0) as i64;
    let start_x = (((requested.x - bounds.left) / tile.x).floor() as i64).clamp(0, columns - 1);
    let start_y = (((requested.y - bounds.top) / tile.y).floor() as i64).clamp(0, rows - 1);

    for ring in 0..=columns.max(rows) {
        let mut best: Option<(f32, Vec2)> = None;
        for (x, y) in ring_cells(start_x, start_y, ring) {
            if x < 0 || y < 0 || x >= columns || y >= rows {
                continue;
            }
            let candidate = bounds.min() + (Vec2::new(x as f32, y as f32) + 0.5) * tile;
            if !is_free(candidate) {
                continue;
            }
            let distance = candidate.distance_squared(requested);
            if best.map_or(true, |(closest, _)| distance < closest) {
                best = Some((distance, candidate));
            }
        }
        if let Some((_, candidate)) = best {
            return candidate;
        }
    }

    requested
}

/// Cells on the square ring `ring` cells away from `(x, y)`, each visited once.
fn ring_cells(x: i64, y: i64, ring: i64) -> impl Iterator<Item = (i64, i64)> {
    let (left, right, top, bottom) = (x - ring, x + ring, y - ring, y + ring);
    let rows = (left..=right).flat_map(move |cx| {
        let bottom_row = (ring > 0).then_some((cx, bottom));
        std::iter::once((cx, top)).chain(bottom_row)
    });
    let columns = (top + 1..bottom).flat_map(move |cy| [(left, cy), (right, cy)]);
    rows.chain(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interactive() -> HashSet<u32> {
        [125, 126, 127, 128].into_iter().collect()
    }

    fn options<'a>(required: &'a [String], interactive: &'a HashSet<u32>) -> MapLoadOptions<'a> {
        MapLoadOptions {
            required_layers: required,
            interactive,
            spawn_half_extents: Vec2::splat(14.0),
        }
    }

    const PIRATE_MAP: &str = r#"{
        "tile_width": 32,
        "tile_height": 32,
        "layers": [
            {
                "name": "Obstacles",
                "width": 4,
                "height": 3,
                "data": [[0, 0, 0, 0], [0, 5, 0, 0], [0, 0, 0, 0]]
            },
            {
                "name": "Ground",
                "width": 4,
                "height": 3,
                "data": [[1, 1, 1, 1], [1, 1, 1, 1], [1, 1, 1, 1]],
                "collision": { "kind": "only", "indices": [] }
            }
        ],
        "objects": [{ "name": "Spawn Point", "x": 48.0, "y": 48.0 }]
    }"#;

    #[test]
    fn loads_layers_in_declared_order() {
        let required = vec!["Ground".to_owned(), "Obstacles".to_owned()];
        let interactive = interactive();
        let raw = RawMapData::from_json_str(PIRATE_MAP).unwrap();
        let map = WorldMap::load(&raw, options(&required, &interactive)).unwrap();

        let names: Vec<_> = map.layers().iter().map(TileGrid::name).collect();
        assert_eq!(names, ["Obstacles", "Ground"]);
        assert_eq!(map.size(), Vec2::new(128.0, 96.0));
        assert!(!map.is_fallback());
        assert!(!map.layer("Ground").unwrap().has_collidable_tiles());
    }

    #[test]
    fn blocked_spawn_moves_to_nearest_free_cell() {
        let required = Vec::new();
        let interactive = interactive();
        let raw = RawMapData::from_json_str(PIRATE_MAP).unwrap();
        let map = WorldMap::load(&raw, options(&required, &interactive)).unwrap();

        let spawn = map.spawn_point();
        assert_ne!(spawn, Vec2::new(48.0, 48.0));
        let body = BoundingBox::from_center(spawn, Vec2::splat(14.0));
        assert!(map.query(&body).is_empty());
        assert_eq!(map.point(SPAWN_POINT), Some(spawn));
    }

    #[test]
    fn missing_required_layer_is_an_error() {
        let required = vec!["Decorations".to_owned()];
        let interactive = interactive();
        let raw = RawMapData::from_json_str(PIRATE_MAP).unwrap();
        let result = WorldMap::load(&raw, options(&required, &interactive));
        assert!(matches!(
            result,
            Err(MapLoadError::MissingLayer { name }) if name == "Decorations"
        ));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let mut raw = RawMapData::from_json_str(PIRATE_MAP).unwrap();
        raw.layers[0].data[2].pop();
        let interactive = interactive();
        let result = WorldMap::load(&raw, options(&[], &interactive));
        assert!(matches!(
            result,
            Err(MapLoadError::RowLengthMismatch { row: 2, actual: 3, .. })
        ));
    }

    #[test]
    fn malformed_json_falls_back() {
        let interactive = interactive();
        let map = WorldMap::load_or_fallback(
            RawMapData::from_json_str("{ not json"),
            options(&[], &interactive),
        );
        assert!(map.is_fallback());
    }

    #[test]
    fn fallback_map_has_border_walls_and_free_center() {
        let interactive = interactive();
        let map = WorldMap::fallback(options(&[], &interactive));

        assert_eq!(map.size(), Vec2::new(640.0, 480.0));
        assert_eq!(map.layers().len(), 5);
        assert_eq!(map.spawn_point(), Vec2::new(320.0, 240.0));

        let corner = BoundingBox::new(4.0, 4.0, 8.0, 8.0);
        let hits = map.query(&corner);
        assert_eq!(hits[0].layer, "WallTop");
        assert_eq!(hits[1].layer, "WallLeft");

        let center = BoundingBox::from_center(map.center(), Vec2::splat(14.0));
        assert!(map.query(&center).is_empty());
    }

    #[test]
    fn spawn_rings_visit_each_perimeter_cell_once() {
        assert_eq!(ring_cells(3, 3, 0).collect::<Vec<_>>(), vec![(3, 3)]);

        for ring in 1..5 {
            let cells: Vec<_> = ring_cells(0, 0, ring).collect();
            let unique: HashSet<_> = cells.iter().copied().collect();
            assert_eq!(cells.len(), (8 * ring) as usize);
            assert_eq!(unique.len(), cells.len());
            assert!(cells
                .iter()
                .all(|(x, y)| x.abs().max(y.abs()) == ring));
        }
    }

    #[test]
    fn fully_blocked_map_keeps_the_requested_spawn() {
        let raw = RawMapData {
            tile_width: 32,
            tile_height: 32,
            layers: vec![RawLayer {
                name: "Rock".to_owned(),
                width: 6,
                height: 6,
                data: vec![vec![3; 6]; 6],
                offset: [0.0, 0.0],
                collision: CollisionRule::AllNonEmpty,
            }],
            objects: Vec::new(),
        };
        let interactive = interactive();
        let map = WorldMap::load(&raw, options(&[], &interactive)).unwrap();
        assert_eq!(map.spawn_point(), Vec2::new(96.0, 96.0));
    }
}
