//! Layered tile collision queries.
//!
//! Queries are pure: they read the immutable layers of a `WorldMap` and return the collidable
//! tiles a box overlaps, in layer priority order. Only the cells around the box are visited, so
//! the cost of a query does not grow with the size of the map.

use bevy::math::{UVec2, Vec2};
use bevy::prelude::*;

use crate::tile::TileGrid;

/// Publishes [`CollisionDebug`] and logs when the thing stopping the player changes. The
/// queries themselves are plain functions and need no plugin.
pub struct CollisionPlugin;

impl Plugin for CollisionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CollisionDebug>()
            .add_systems(Update, log_contact_changes.in_set(CollisionSystems));
    }
}

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollisionSystems;

/// Cells of slack examined around a box on every side.
pub const NEIGHBORHOOD_MARGIN: i64 = 1;

/// Axis-aligned rectangle in map pixel space (y grows down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_center(center: Vec2, half_extents: Vec2) -> Self {
        Self::new(
            center.x - half_extents.x,
            center.y - half_extents.y,
            center.x + half_extents.x,
            center.y + half_extents.y,
        )
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width(), self.height())
    }

    pub fn min(&self) -> Vec2 {
        Vec2::new(self.left, self.top)
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.left + self.right) * 0.5,
            (self.top + self.bottom) * 0.5,
        )
    }

    /// Grows the box by `amount` on every side.
    pub fn inflate(&self, amount: f32) -> Self {
        Self::new(
            self.left - amount,
            self.top - amount,
            self.right + amount,
            self.bottom + amount,
        )
    }

    pub fn union(&self, other: &BoundingBox) -> Self {
        Self::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    /// Strict overlap: boxes that only share an edge do not intersect.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.left < other.right
            && self.right > other.left
            && self.top < other.bottom
            && self.bottom > other.top
    }

    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        other.left >= self.left
            && other.right <= self.right
            && other.top >= self.top
            && other.bottom <= self.bottom
    }

    pub fn is_finite(&self) -> bool {
        self.left.is_finite()
            && self.top.is_finite()
            && self.right.is_finite()
            && self.bottom.is_finite()
    }
}

/// A collidable tile overlapped by a query box.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileHit {
    pub layer: String,
    /// Position of the owning layer in priority order.
    pub layer_index: usize,
    pub tile_index: u32,
    pub cell: UVec2,
}

/// What stopped one axis of a movement step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Blocker {
    Tile(TileHit),
    /// The outer edge of the map.
    MapEdge,
}

impl Blocker {
    pub fn tile(&self) -> Option<&TileHit> {
        match self {
            Blocker::Tile(hit) => Some(hit),
            Blocker::MapEdge => None,
        }
    }
}

/// Every collidable tile whose rectangle overlaps `bounds`, ordered by layer priority and then
/// row-major within a layer. Boxes outside a layer simply produce no entries for it.
pub fn query(bounds: &BoundingBox, layers: &[TileGrid]) -> Vec<TileHit> {
    let mut hits = Vec::new();
    for (layer_index, layer) in layers.iter().enumerate() {
        collect_layer_hits(bounds, layer_index, layer, &mut hits);
    }
    hits
}

/// The highest-priority collidable tile overlapped by `bounds`, ignoring any tile in `ignore`.
/// Movement is blocked by this single tile even when several layers report a hit.
pub fn first_blocking(
    bounds: &BoundingBox,
    layers: &[TileGrid],
    ignore: &[TileHit],
) -> Option<TileHit> {
    let mut hits = Vec::new();
    for (layer_index, layer) in layers.iter().enumerate() {
        hits.clear();
        collect_layer_hits(bounds, layer_index, layer, &mut hits);
        if let Some(hit) = hits.drain(..).find(|hit| !ignore.contains(hit)) {
            return Some(hit);
        }
    }
    None
}

fn collect_layer_hits(
    bounds: &BoundingBox,
    layer_index: usize,
    layer: &TileGrid,
    hits: &mut Vec<TileHit>,
) {
    let Some((min, max)) = layer.cell_span(bounds, NEIGHBORHOOD_MARGIN) else {
        return;
    };

    for y in min.y..=max.y {
        for x in min.x..=max.x {
            let Some(tile) = layer.tile(x, y) else {
                continue;
            };
            if !tile.collidable {
                continue;
            }
            if layer.cell_bounds(x, y).intersects(bounds) {
                hits.push(TileHit {
                    layer: layer.name().to_owned(),
                    layer_index,
                    tile_index: tile.index,
                    cell: UVec2::new(x, y),
                });
            }
        }
    }
}

/// Per-frame collision and interaction state published for an optional debug overlay.
#[derive(Resource, Debug, Default, Clone, PartialEq)]
pub struct CollisionDebug {
    pub player_position: Option<Vec2>,
    pub player_cell: Option<UVec2>,
    pub blocked_x: Option<Blocker>,
    pub blocked_y: Option<Blocker>,
    pub interaction_hits: Vec<TileHit>,
}

impl CollisionDebug {
    pub fn blocking(&self) -> Option<&Blocker> {
        self.blocked_x.as_ref().or(self.blocked_y.as_ref())
    }
}

fn log_contact_changes(debug: Res<CollisionDebug>, mut last: Local<Option<Blocker>>) {
    if !debug.is_changed() {
        return;
    }

    let current = debug.blocking().cloned();
    if current == *last {
        return;
    }

    match &current {
        Some(Blocker::Tile(hit)) => debug!(
            "Blocked by tile {} at {:?} on layer '{}'",
            hit.tile_index, hit.cell, hit.layer
        ),
        Some(Blocker::MapEdge) => debug!("Blocked by the map edge"),
        None => {}
    }
    *last = current;
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::tile::CollisionRule;

    fn layer(name: &str, indices: &[u32], origin: Vec2) -> TileGrid {
        TileGrid::from_indices(
            name,
            UVec2::new(4, 4),
            UVec2::splat(32),
            origin,
            indices,
            &CollisionRule::AllNonEmpty,
            &HashSet::new(),
        )
        .expect("valid layer")
    }

    fn single(name: &str, x: usize, y: usize, index: u32) -> TileGrid {
        let mut indices = vec![0; 16];
        indices[y * 4 + x] = index;
        layer(name, &indices, Vec2::ZERO)
    }

    #[test]
    fn touching_edges_do_not_intersect() {
        let a = BoundingBox::new(0.0, 0.0, 32.0, 32.0);
        let b = BoundingBox::new(32.0, 0.0, 64.0, 32.0);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&b.inflate(0.5)));
    }

    #[test]
    fn empty_space_reports_nothing() {
        let layers = [single("Obstacles", 3, 3, 5)];
        let bounds = BoundingBox::new(4.0, 4.0, 28.0, 28.0);
        assert!(query(&bounds, &layers).is_empty());
    }

    #[test]
    fn hits_follow_layer_priority() {
        let layers = [single("Top", 1, 1, 7), single("Bottom", 1, 1, 9)];
        let bounds = BoundingBox::new(40.0, 40.0, 56.0, 56.0);
        let hits = query(&bounds, &layers);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].layer, "Top");
        assert_eq!(hits[0].tile_index, 7);
        assert_eq!(hits[1].layer, "Bottom");
        assert_eq!(hits[1].layer_index, 1);
    }

    #[test]
    fn first_blocking_prefers_highest_priority_and_skips_ignored() {
        let layers = [single("Top", 1, 1, 7), single("Bottom", 1, 1, 9)];
        let bounds = BoundingBox::new(40.0, 40.0, 56.0, 56.0);
        let first = first_blocking(&bounds, &layers, &[]).expect("blocked");
        assert_eq!(first.tile_index, 7);

        let next = first_blocking(&bounds, &layers, &[first]).expect("still blocked");
        assert_eq!(next.tile_index, 9);
    }

    #[test]
    fn layer_origin_shifts_tile_rectangles() {
        let mut indices = vec![0; 16];
        indices[0] = 4;
        let shifted = layer("Shifted", &indices, Vec2::new(100.0, 0.0));
        let at_zero = BoundingBox::new(4.0, 4.0, 28.0, 28.0);
        let at_offset = BoundingBox::new(104.0, 4.0, 128.0, 28.0);
        assert!(query(&at_zero, std::slice::from_ref(&shifted)).is_empty());
        assert_eq!(query(&at_offset, std::slice::from_ref(&shifted)).len(), 1);
    }

    #[test]
    fn boxes_far_outside_layers_are_total() {
        let layers = [single("Obstacles", 0, 0, 1)];
        let far = BoundingBox::new(-5000.0, -5000.0, -4990.0, -4990.0);
        assert!(query(&far, &layers).is_empty());
        let nan = BoundingBox::new(f32::NAN, 0.0, 1.0, 1.0);
        assert!(query(&nan, &layers).is_empty());
    }
}
