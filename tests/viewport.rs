use bevy::math::Vec2;
use tile_world::viewport::{fit, try_fit, ConfigurationError, ViewportFit, FIT_MARGIN};

const MAPS: [(f32, f32); 5] = [
    (640.0, 480.0),
    (3200.0, 320.0),
    (96.0, 4000.0),
    (1.0, 1.0),
    (1920.0, 1080.0),
];

const VIEWPORTS: [(f32, f32); 5] = [
    (400.0, 300.0),
    (2000.0, 1200.0),
    (1280.0, 720.0),
    (1.0, 1.0),
    (333.0, 999.0),
];

const ZOOMS: [f32; 4] = [0.5, 1.0, 2.0, 7.5];

#[test]
fn fitted_map_stays_inside_viewport_and_centered() {
    for (mw, mh) in MAPS {
        for (vw, vh) in VIEWPORTS {
            for preferred in ZOOMS {
                let map = Vec2::new(mw, mh);
                let viewport = Vec2::new(vw, vh);
                let fit = fit(map, viewport, preferred);

                assert!(fit.zoom > 0.0);
                let scaled = fit.scaled_size(map);
                assert!(scaled.x <= vw * 1.0001, "{map:?} in {viewport:?} at {preferred}");
                assert!(scaled.y <= vh * 1.0001, "{map:?} in {viewport:?} at {preferred}");

                // Equal margins on both sides of each axis.
                let left = fit.offset.x * fit.zoom;
                let right = vw - (fit.offset.x + mw) * fit.zoom;
                let top = fit.offset.y * fit.zoom;
                let bottom = vh - (fit.offset.y + mh) * fit.zoom;
                assert!((left - right).abs() < vw * 1e-4);
                assert!((top - bottom).abs() < vh * 1e-4);
            }
        }
    }
}

#[test]
fn overflowing_map_uses_ninety_percent_of_the_tight_zoom() {
    let map = Vec2::new(3200.0, 320.0);
    let viewport = Vec2::new(1280.0, 720.0);
    let fit = fit(map, viewport, 1.0);
    let tight = (1280.0f32 / 3200.0).min(720.0 / 320.0);
    assert!((fit.zoom - tight * FIT_MARGIN).abs() < 1e-6);
}

#[test]
fn fit_is_deterministic() {
    let map = Vec2::new(640.0, 480.0);
    let viewport = Vec2::new(1024.0, 768.0);
    assert_eq!(fit(map, viewport, 1.25), fit(map, viewport, 1.25));
}

#[test]
fn degenerate_inputs_fall_back_to_neutral_fit() {
    let map = Vec2::new(640.0, 480.0);
    assert_eq!(fit(map, Vec2::new(0.0, 0.0), 1.0), ViewportFit::default());
    assert_eq!(fit(Vec2::ZERO, Vec2::new(800.0, 600.0), 1.0), ViewportFit::default());
    assert_eq!(fit(map, Vec2::new(-5.0, 600.0), 1.0), ViewportFit::default());
    assert!(matches!(
        try_fit(map, Vec2::new(800.0, 600.0), 0.0),
        Err(ConfigurationError::InvalidZoom(_))
    ));
}
