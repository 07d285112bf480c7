//! Desktop/browser entry point: a resizable window hosting the tile world.
//!
//! Natively the window opens at 1280x720. In the browser it attaches to `#game-container` and
//! follows the size of its parent element; the camera refits the map on every resize. Images use
//! nearest filtering so pixel-art tiles stay crisp at any zoom.

use bevy::asset::AssetPlugin;
use bevy::prelude::*;
use bevy::window::{Window, WindowResizeConstraints, WindowResolution};
use tile_world::TileWorldPlugin;

fn main() {
    #[cfg(all(target_arch = "wasm32", feature = "web"))]
    console_error_panic_hook::set_once();

    // Bounds match the smallest and largest stage the host page lays out.
    let primary_window = Window {
        title: "Tile World".to_string(),
        resolution: WindowResolution::new(1280.0, 720.0),
        resizable: true,
        resize_constraints: WindowResizeConstraints {
            min_width: 400.0,
            min_height: 300.0,
            max_width: 2000.0,
            max_height: 1200.0,
        },
        canvas: cfg!(all(target_arch = "wasm32", feature = "web"))
            .then(|| "#game-container".to_owned()),
        fit_canvas_to_parent: true,
        ..default()
    };

    let default_plugins = DefaultPlugins
        .set(WindowPlugin {
            primary_window: Some(primary_window),
            ..default()
        })
        .set(ImagePlugin::default_nearest())
        .set(AssetPlugin {
            file_path: "assets".to_owned(),
            watch_for_changes_override: Some(cfg!(not(target_arch = "wasm32"))),
            ..default()
        });

    App::new()
        .insert_resource(ClearColor(Color::srgb(0.2, 0.2, 0.2)))
        .add_plugins(default_plugins)
        .add_plugins(TileWorldPlugin)
        .run();
}
