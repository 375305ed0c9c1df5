//! Scenario tests for the shadow engine

use std::cell::Cell;
use std::time::Duration;

use glam::Vec2;
use serde_json::json;

use crate::{
    Beam, BlockValue, Costume, Engine, EngineConfig, Host, Lifecycle, Light, OccluderView, OcclusionMode, RGBA,
    Rgba8, Scene, Sprite, Surface, dispatch,
};

const OPAQUE: Rgba8 = Rgba8::new(0, 0, 0, 255);

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn running_engine(scene: &Scene) -> Engine {
    init_logger();
    let mut engine = Engine::new(scene, EngineConfig::default()).unwrap();
    engine.tick(scene, Duration::ZERO);
    assert_eq!(engine.lifecycle(), Lifecycle::Running);
    engine
}

/// Host whose render surface appears after a number of polls
struct CountingHost {
    polls: Cell<usize>,
    ready_after: usize,
}

impl Host for CountingHost {
    fn is_unsandboxed(&self) -> bool {
        true
    }

    fn surface_size(&self) -> Option<(usize, usize)> {
        let n = self.polls.get() + 1;
        self.polls.set(n);
        (n > self.ready_after).then_some((480, 360))
    }

    fn occluders(&self) -> Vec<&dyn OccluderView> {
        Vec::new()
    }
}

#[test]
fn test_main() {
    crate::main();
}

#[test]
fn test_octagon_scenario() {
    let scene = Scene::with_surface(480, 360);
    let mut engine = running_engine(&scene);
    engine
        .field_mut()
        .add_light("L1", Light::at(0.0, 0.0).with_radius(100.0).with_intensity(100.0).with_quality(8));

    let frame = engine.tick(&scene, Duration::from_millis(16)).unwrap();
    let polygon = &frame.polygons[0];
    assert_eq!(polygon.hits.len(), 8);

    let centre = Vec2::new(240.0, 180.0);
    for (i, hit) in polygon.hits.iter().enumerate() {
        let pixel = frame.transform.to_pixel(hit.point);
        assert!((pixel.distance(centre) - 150.0).abs() < 1e-3, "vertex {} at {:?}", i, pixel);
        // Evenly spaced, counter-clockwise in stage space
        let angle = i as f32 * std::f32::consts::FRAC_PI_4;
        let expected = centre + Vec2::new(angle.cos(), -angle.sin()) * 150.0;
        assert!(pixel.distance(expected) < 1e-3);
    }
}

#[test]
fn test_no_occluders_gives_full_circle() {
    let scene = Scene::with_surface(480, 360);
    let mut engine = running_engine(&scene);
    engine.field_mut().add_light("L1", Light::at(30.0, -20.0).with_radius(60.0).with_quality(0));

    let frame = engine.tick(&scene, Duration::from_millis(16)).unwrap();
    let hits = &frame.polygons[0].hits;
    assert_eq!(hits.len(), 360);
    for hit in hits {
        assert_eq!(hit.occluder, None);
        assert!((hit.distance - 90.0).abs() < 1e-4);
        assert!((hit.point.distance(Vec2::new(30.0, -20.0)) - 90.0).abs() < 1e-3);
    }
}

#[test]
fn test_every_vertex_within_ray_bound() {
    let scene = Scene::demo(480, 360);
    let mut engine = running_engine(&scene);
    let lights = [(-100.0, 30.0, 80.0), (90.0, -10.0, 150.0), (0.0, 0.0, 35.0)];
    for (i, &(x, y, r)) in lights.iter().enumerate() {
        engine.field_mut().add_light(&format!("L{}", i), Light::at(x, y).with_radius(r).with_quality(120));
    }

    let frame = engine.tick(&scene, Duration::from_millis(16)).unwrap();
    assert_eq!(frame.polygons.len(), 3);
    let mut blocked = 0;
    for polygon in frame.polygons {
        let light = engine_light_radius(&lights, &polygon.light_id);
        for hit in &polygon.hits {
            assert!(hit.point.distance(polygon.origin) <= 1.5 * light + 1e-3);
            blocked += usize::from(hit.occluder.is_some());
        }
    }
    assert!(blocked > 0, "the demo scene should block some rays");
}

fn engine_light_radius(lights: &[(f32, f32, f32)], id: &str) -> f32 {
    let index: usize = id.trim_start_matches('L').parse().unwrap();
    lights[index].2
}

#[test]
fn test_square_occluder_hit_distance() {
    let mut scene = Scene::with_surface(480, 360);
    scene.push(Sprite::new("box", Vec2::new(50.0, 0.0), Costume::rect(20, 20, OPAQUE)));
    let mut engine = running_engine(&scene);
    engine.field_mut().add_light("L1", Light::default().with_quality(4));

    let frame = engine.tick(&scene, Duration::from_millis(16)).unwrap();
    let hits = &frame.polygons[0].hits;
    assert!((hits[0].distance - 40.0).abs() <= 0.5, "distance {}", hits[0].distance);
    assert_eq!(hits[0].occluder, Some(0));
    for hit in &hits[1..] {
        assert_eq!(hit.occluder, None);
        assert!((hit.distance - 150.0).abs() < 1e-4);
    }
}

#[test]
fn test_scaled_square_hits_at_its_edge() {
    // 5x5 texels at 400%: 20 stage units wide, near edge at x = 40
    let mut scene = Scene::with_surface(480, 360);
    scene.push(Sprite::new("box", Vec2::new(50.0, 0.0), Costume::rect(5, 5, OPAQUE)).with_size(400.0));
    let mut engine = running_engine(&scene);
    engine.field_mut().add_light("L1", Light::default().with_quality(4));

    let frame = engine.tick(&scene, Duration::from_millis(16)).unwrap();
    let hit = frame.polygons[0].hits[0];
    assert_eq!(hit.occluder, Some(0));
    assert!((hit.distance - 40.0).abs() <= 0.5, "distance {}", hit.distance);
}

#[test]
fn test_beam_ignores_occluders() {
    let mut scene = Scene::with_surface(480, 360);
    scene.push(Sprite::new("box", Vec2::new(50.0, 0.0), Costume::rect(20, 20, OPAQUE)));
    let mut engine = running_engine(&scene);
    // Beam runs right through the box, the light sits just above it
    engine.field_mut().add_beam(
        "B1",
        Beam { position: Vec2::ZERO, angle: 0.0, length: 200.0, width: 20.0, intensity: 100.0 },
    );
    engine.field_mut().add_light("L1", Light::at(50.0, 25.0).with_radius(60.0));

    let frame = engine.tick(&scene, Duration::from_millis(16)).unwrap();
    assert!(frame.polygons[0].hits.iter().any(|h| h.occluder == Some(0)));

    // Stage (120, 0): behind the box along the beam, out of the light's reach
    let behind = frame.shadow.get(360, 180).a;
    assert!(behind < 0.5, "beam blocked, alpha {}", behind);

    // Stage (50, -15): behind the box as seen from the light
    assert!((frame.shadow.get(290, 195).a - 0.75).abs() < 1e-4);
    // Same distance above the light is lit
    let open = frame.shadow.get(290, 115).a;
    assert!(open < 0.6, "alpha {}", open);
}

#[test]
fn test_outline_mode_through_engine() {
    let mut scene = Scene::with_surface(480, 360);
    scene.push(Sprite::new("box", Vec2::new(50.0, 0.0), Costume::rect(20, 20, OPAQUE)));
    let mut engine = running_engine(&scene);
    engine.set_occlusion_mode(OcclusionMode::Outline);
    engine.field_mut().add_light("L1", Light::default().with_quality(4));

    let frame = engine.tick(&scene, Duration::from_millis(16)).unwrap();
    let hit = frame.polygons[0].hits[0];
    assert!((hit.distance - 40.0).abs() <= 0.5, "distance {}", hit.distance);
}

#[test]
fn test_unreadable_occluder_is_skipped_for_the_tick() {
    let mut scene = Scene::with_surface(480, 360);
    scene
        .push(Sprite::new("loading", Vec2::new(20.0, 0.0), Costume::Loading))
        .push(Sprite::new("box", Vec2::new(50.0, 0.0), Costume::rect(20, 20, OPAQUE)));
    let mut engine = running_engine(&scene);
    engine.field_mut().add_light("L1", Light::default().with_quality(4));

    let frame = engine.tick(&scene, Duration::from_millis(16)).unwrap();
    assert!((frame.polygons[0].hits[0].distance - 40.0).abs() <= 0.5);
}

#[test]
fn test_sprite_changes_apply_next_tick() {
    let mut scene = Scene::with_surface(480, 360);
    scene.push(Sprite::new("box", Vec2::new(50.0, 0.0), Costume::rect(20, 20, OPAQUE)));
    let mut engine = running_engine(&scene);
    engine.field_mut().add_light("L1", Light::default().with_quality(4));
    engine.tick(&scene, Duration::from_millis(16));

    scene.sprite_mut("box").unwrap().position.x = 80.0;
    let frame = engine.tick(&scene, Duration::from_millis(32)).unwrap();
    assert!((frame.polygons[0].hits[0].distance - 70.0).abs() <= 0.5);

    // Costume swap to a half-transparent one lets light through
    scene.sprite_mut("box").unwrap().costume = Costume::rect(20, 20, Rgba8::new(0, 0, 0, 5));
    let frame = engine.tick(&scene, Duration::from_millis(48)).unwrap();
    assert_eq!(frame.polygons[0].hits[0].occluder, None);
}

#[test]
fn test_resize_keeps_origin_at_centre() {
    let mut scene = Scene::with_surface(480, 360);
    let mut engine = running_engine(&scene);
    for (i, &(w, h)) in [(640, 480), (1001, 333), (200, 900)].iter().enumerate() {
        scene.surface = Some((w, h));
        let frame = engine.tick(&scene, Duration::from_millis(16 * (i as u64 + 1))).unwrap();
        let c = frame.transform.to_pixel(Vec2::ZERO);
        assert_eq!(c, Vec2::new(w as f32 / 2.0, h as f32 / 2.0));
        assert_eq!((frame.shadow.width(), frame.shadow.height()), (w, h));
        let expected = (w as f32 / 480.0).min(h as f32 / 360.0);
        assert!((frame.transform.scale() - expected).abs() < 1e-6);
    }

    // Explicit resize notification
    engine.resize(96, 72);
    assert_eq!(engine.compositor().unwrap().size(), (96, 72));
}

#[test]
fn test_surface_polled_once_per_retry_delay() {
    init_logger();
    let host = CountingHost { polls: Cell::new(0), ready_after: 2 };
    let mut engine = Engine::new(&host, EngineConfig::default()).unwrap();

    for ms in [0, 20, 50, 99] {
        assert!(engine.tick(&host, Duration::from_millis(ms)).is_none());
    }
    assert_eq!(host.polls.get(), 1);

    assert!(engine.tick(&host, Duration::from_millis(100)).is_none());
    assert!(engine.tick(&host, Duration::from_millis(150)).is_none());
    assert_eq!(host.polls.get(), 2);
    assert_eq!(engine.lifecycle(), Lifecycle::Uninitialized);

    assert!(engine.tick(&host, Duration::from_millis(200)).is_some());
    assert_eq!(engine.lifecycle(), Lifecycle::Running);
}

#[test]
fn test_block_script_drives_engine() {
    let scene = Scene::with_surface(480, 360);
    let mut engine = running_engine(&scene);

    let run = |engine: &mut Engine, opcode: &str, args: serde_json::Value| {
        let now = engine.now();
        dispatch(engine, opcode, &args, now).unwrap()
    };
    run(&mut engine, "addLight", json!({ "ID": "torch", "X": 0, "Y": 0, "SIZE": 80, "QUALITY": 12 }));
    run(&mut engine, "addLight", json!({ "ID": "torch", "X": -10, "Y": 5, "SIZE": 40, "QUALITY": 6 }));
    assert_eq!(engine.field().light_count(), 1);

    run(&mut engine, "moveLightSmooth", json!({ "ID": "torch", "X": 90, "Y": 5, "DURATION": 1 }));
    let frame = engine.tick(&scene, Duration::from_millis(500)).unwrap();
    let polygon = &frame.polygons[0];
    assert_eq!(polygon.hits.len(), 6);
    assert!((polygon.origin.x - 40.0).abs() < 1e-2, "halfway at {}", polygon.origin.x);

    engine.tick(&scene, Duration::from_secs(2));
    assert_eq!(run(&mut engine, "getLightX", json!({ "ID": "torch" })), BlockValue::Number(90.0));

    run(&mut engine, "removeLight", json!({ "ID": "torch" }));
    run(&mut engine, "removeLight", json!({ "ID": "torch" }));
    assert_eq!(run(&mut engine, "isLightExists", json!({ "ID": "torch" })), BlockValue::Bool(false));
    let frame = engine.tick(&scene, Duration::from_secs(3)).unwrap();
    assert!(frame.polygons.is_empty());
}

#[test]
fn test_composited_frame_lights_only_near_the_light() {
    let scene = Scene::with_surface(480, 360);
    let mut engine = running_engine(&scene);
    engine.field_mut().add_light("L1", Light::default().with_radius(100.0));
    let frame = engine.tick(&scene, Duration::from_millis(16)).unwrap();

    let mut canvas = Surface::new(480, 360);
    canvas.fill(RGBA::white());
    scene.draw(&mut canvas, frame.transform);
    frame.composite_over(&mut canvas);

    assert!(canvas.get(240, 180).r > 0.95);
    assert!((canvas.get(5, 5).r - 0.25).abs() < 1e-4);
}

#[test]
fn test_shutdown_consumes_engine() {
    let scene = Scene::with_surface(480, 360);
    let mut engine = running_engine(&scene);
    engine.field_mut().add_light("L1", Light::default());
    engine.shutdown();
}
