//! Keeps the main 2D camera framing the whole map: zoom and centring come from
//! [`viewport::fit`], recomputed whenever the map changes or the window is resized.

use bevy::prelude::*;
use bevy::window::{PrimaryWindow, WindowResized};

use crate::level::LevelConfig;
use crate::map::WorldMap;
use crate::player::map_to_world;
use crate::viewport::{self, ViewportFit};

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CurrentFit>()
            .add_systems(PostUpdate, fit_camera_to_map);
    }
}

/// Marker so the fit system can find the camera without relying on names.
#[derive(Component)]
pub struct MapCamera;

/// Last fit applied to the camera, for hosts that overlay their own UI.
#[derive(Resource, Debug, Default, Clone, Copy, PartialEq)]
pub struct CurrentFit(pub ViewportFit);

fn fit_camera_to_map(
    map: Option<Res<WorldMap>>,
    config: Res<LevelConfig>,
    mut resized: EventReader<WindowResized>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut cameras: Query<(&mut Transform, &mut OrthographicProjection), With<MapCamera>>,
    mut current: ResMut<CurrentFit>,
) {
    let window_changed = resized.read().count() > 0;
    let Some(map) = map else {
        return;
    };
    if !map.is_changed() && !window_changed {
        return;
    }

    let Ok(window) = windows.get_single() else {
        return;
    };
    let viewport = Vec2::new(window.resolution.width(), window.resolution.height());

    let fit = match viewport::try_fit(map.size(), viewport, config.preferred_zoom) {
        Ok(fit) => fit,
        Err(err) => {
            warn!("Cannot fit map into viewport ({err}); using zoom 1.");
            ViewportFit::default()
        }
    };

    let center = map_to_world(map.bounds().min() + fit.camera_center(viewport));
    for (mut transform, mut projection) in &mut cameras {
        projection.scale = 1.0 / fit.zoom;
        transform.translation.x = center.x;
        transform.translation.y = center.y;
    }

    current.0 = fit;
}
