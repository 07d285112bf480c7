//! Fits a map into a viewport: picks a zoom and a centring offset. Pure and deterministic.

use bevy::math::Vec2;
use thiserror::Error;

/// Share of the viewport a map may fill after it had to be scaled down.
pub const FIT_MARGIN: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("viewport size must be positive, got {width}x{height}")]
    InvalidViewport { width: f32, height: f32 },
    #[error("map size must be positive, got {width}x{height}")]
    InvalidMapSize { width: f32, height: f32 },
    #[error("zoom must be positive, got {0}")]
    InvalidZoom(f32),
}

/// Camera placement for a fitted map.
///
/// `offset` is in map pixels: a map pixel `p` lands on screen at `(p + offset) * zoom`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportFit {
    pub offset: Vec2,
    pub zoom: f32,
}

impl Default for ViewportFit {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl ViewportFit {
    /// On-screen size of a map of `map_size` pixels.
    pub fn scaled_size(&self, map_size: Vec2) -> Vec2 {
        map_size * self.zoom
    }

    /// Map pixel shown at the middle of the viewport.
    pub fn camera_center(&self, viewport: Vec2) -> Vec2 {
        viewport / self.zoom * 0.5 - self.offset
    }
}

/// Fits `map_size` into `viewport`. Keeps `preferred_zoom` when the scaled map fits, otherwise
/// shrinks it to 90% of the largest zoom that fits, then centres the map.
pub fn try_fit(
    map_size: Vec2,
    viewport: Vec2,
    preferred_zoom: f32,
) -> Result<ViewportFit, ConfigurationError> {
    if !(viewport.x > 0.0 && viewport.y > 0.0) || !viewport.is_finite() {
        return Err(ConfigurationError::InvalidViewport {
            width: viewport.x,
            height: viewport.y,
        });
    }
    if !(map_size.x > 0.0 && map_size.y > 0.0) || !map_size.is_finite() {
        return Err(ConfigurationError::InvalidMapSize {
            width: map_size.x,
            height: map_size.y,
        });
    }
    if !(preferred_zoom > 0.0) || !preferred_zoom.is_finite() {
        return Err(ConfigurationError::InvalidZoom(preferred_zoom));
    }

    let scaled = map_size * preferred_zoom;
    let zoom = if scaled.x > viewport.x || scaled.y > viewport.y {
        (viewport.x / map_size.x).min(viewport.y / map_size.y) * FIT_MARGIN
    } else {
        preferred_zoom
    };

    let offset = (viewport - map_size * zoom) / 2.0 / zoom;
    Ok(ViewportFit { offset, zoom })
}

/// Like [`try_fit`], but degenerate inputs yield zoom 1 and no offset.
pub fn fit(map_size: Vec2, viewport: Vec2, preferred_zoom: f32) -> ViewportFit {
    try_fit(map_size, viewport, preferred_zoom).unwrap_or_default()
}
