//! Tile layers. A `TileGrid` is one named grid of tiles living in the map's pixel space
//! (x grows right, y grows down, cell (0, 0) is the top-left corner).
//!
//! Collidability is decided once while the grid is built and stored on each `Tile`; nothing
//! mutates a grid after load, so the logical collision state can never drift from what was
//! loaded.

use std::collections::HashSet;

use bevy::math::{UVec2, Vec2};
use serde::Deserialize;

use crate::collision::BoundingBox;
use crate::map::MapLoadError;

/// Index reserved for "no tile".
pub const EMPTY_TILE: u32 = 0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tile {
    pub index: u32,
    pub collidable: bool,
}

impl Tile {
    pub const EMPTY: Tile = Tile {
        index: EMPTY_TILE,
        collidable: false,
    };
}

/// How a layer turns tile indices into the collidable flag.
///
/// Interactive indices always collide, whatever the rule says, because dialogue triggers are
/// solid NPC tiles the player bumps into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "indices")]
pub enum CollisionRule {
    /// Every non-empty tile blocks movement.
    #[default]
    AllNonEmpty,
    /// Only the listed indices block movement.
    Only(Vec<u32>),
    /// Decoration layer.
    Never,
}

impl CollisionRule {
    pub fn collides(&self, index: u32, interactive: &HashSet<u32>) -> bool {
        if index == EMPTY_TILE {
            return false;
        }
        if interactive.contains(&index) {
            return true;
        }
        match self {
            CollisionRule::AllNonEmpty => true,
            CollisionRule::Only(indices) => indices.contains(&index),
            CollisionRule::Never => false,
        }
    }
}

/// One named layer of tiles, stored row-major (`y * width + x`).
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    name: String,
    width: u32,
    height: u32,
    tile_size: UVec2,
    origin: Vec2,
    cells: Vec<Tile>,
}

impl TileGrid {
    /// Builds a layer from row-major tile indices, computing each tile's collidable flag.
    pub fn from_indices(
        name: impl Into<String>,
        size: UVec2,
        tile_size: UVec2,
        origin: Vec2,
        indices: &[u32],
        rule: &CollisionRule,
        interactive: &HashSet<u32>,
    ) -> Result<Self, MapLoadError> {
        let name = name.into();
        if tile_size.x == 0 || tile_size.y == 0 {
            return Err(MapLoadError::InvalidTileSize {
                width: tile_size.x,
                height: tile_size.y,
            });
        }

        let expected = size.x as usize * size.y as usize;
        if indices.len() != expected {
            return Err(MapLoadError::DimensionMismatch {
                layer: name,
                width: size.x,
                height: size.y,
                actual: indices.len(),
            });
        }

        let cells = indices
            .iter()
            .map(|&index| Tile {
                index,
                collidable: rule.collides(index, interactive),
            })
            .collect();

        Ok(Self {
            name,
            width: size.x,
            height: size.y,
            tile_size,
            origin,
            cells,
        })
    }

    /// A layer where every cell holds `index`.
    pub fn filled(
        name: impl Into<String>,
        size: UVec2,
        tile_size: UVec2,
        origin: Vec2,
        index: u32,
        rule: &CollisionRule,
        interactive: &HashSet<u32>,
    ) -> Result<Self, MapLoadError> {
        let indices = vec![index; size.x as usize * size.y as usize];
        Self::from_indices(name, size, tile_size, origin, &indices, rule, interactive)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> UVec2 {
        self.tile_size
    }

    /// Pixel position of the top-left corner of cell (0, 0).
    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    /// Tile at `(x, y)`, or `None` outside the layer.
    pub fn tile(&self, x: u32, y: u32) -> Option<Tile> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Pixel rectangle covered by cell `(x, y)`, including the layer origin.
    pub fn cell_bounds(&self, x: u32, y: u32) -> BoundingBox {
        let left = self.origin.x + (x * self.tile_size.x) as f32;
        let top = self.origin.y + (y * self.tile_size.y) as f32;
        BoundingBox::new(
            left,
            top,
            left + self.tile_size.x as f32,
            top + self.tile_size.y as f32,
        )
    }

    /// Pixel rectangle covered by the whole layer.
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(
            self.origin.x,
            self.origin.y,
            self.origin.x + (self.width * self.tile_size.x) as f32,
            self.origin.y + (self.height * self.tile_size.y) as f32,
        )
    }

    /// Cell containing pixel `point`, or `None` outside the layer.
    pub fn cell_at(&self, point: Vec2) -> Option<UVec2> {
        if !point.is_finite() {
            return None;
        }
        let local = point - self.origin;
        let x = (local.x / self.tile_size.x as f32).floor();
        let y = (local.y / self.tile_size.y as f32).floor();
        if x < 0.0 || y < 0.0 || x >= self.width as f32 || y >= self.height as f32 {
            return None;
        }
        Some(UVec2::new(x as u32, y as u32))
    }

    /// Inclusive range of cells touched by `bounds`, widened by `margin` cells on every side
    /// and clamped to the layer. `None` when the widened range misses the layer entirely.
    pub fn cell_span(&self, bounds: &BoundingBox, margin: i64) -> Option<(UVec2, UVec2)> {
        if self.width == 0 || self.height == 0 || !bounds.is_finite() {
            return None;
        }

        let tile_w = self.tile_size.x as f32;
        let tile_h = self.tile_size.y as f32;
        let min_x = ((bounds.left - self.origin.x) / tile_w).floor() as i64 - margin;
        let max_x = ((bounds.right - self.origin.x) / tile_w).floor() as i64 + margin;
        let min_y = ((bounds.top - self.origin.y) / tile_h).floor() as i64 - margin;
        let max_y = ((bounds.bottom - self.origin.y) / tile_h).floor() as i64 + margin;

        let width = i64::from(self.width);
        let height = i64::from(self.height);
        if max_x < 0 || max_y < 0 || min_x >= width || min_y >= height {
            return None;
        }

        Some((
            UVec2::new(min_x.max(0) as u32, min_y.max(0) as u32),
            UVec2::new(
                max_x.min(width - 1) as u32,
                max_y.min(height - 1) as u32,
            ),
        ))
    }

    pub fn has_collidable_tiles(&self) -> bool {
        self.cells.iter().any(|tile| tile.collidable)
    }
}
