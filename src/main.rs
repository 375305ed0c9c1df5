mod animation;
mod blocks;
mod color;
mod composite;
mod engine;
mod error;
mod interactive;
mod light;
mod raymarch;
mod render;
mod scene;
mod shape;
mod silhouette;
mod transform;

#[cfg(test)]
mod tests;

use std::time::Duration;

use glam::Vec2;

// Re-export public API
pub use blocks::{BlockValue, dispatch};
pub use color::{RGBA, Rgba8};
pub use composite::{Compositor, CompositorConfig, Darkness, Surface};
pub use engine::{Engine, EngineConfig, Frame, Lifecycle};
pub use error::{EngineError, OccluderError, Result};
pub use interactive::{InteractiveViewer, ViewerConfig};
pub use light::{Beam, Light, LightField, LightUpdate, ShadowPolygon};
pub use raymarch::{MarchConfig, OcclusionMode, RayMarcher};
pub use render::{save_ppm, save_rgba};
pub use scene::{Costume, Host, OccluderView, Scene, Sprite};
pub use shape::{ShapeConfig, ShapeExtractor};
pub use transform::StageTransform;

fn main() {
    let _ = env_logger::try_init();

    // Check for command line arguments
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("--interactive") => run_interactive(),
        Some("--benchmark") => run_benchmark(),
        Some("--render") => {
            let path = args.get(2).map_or("shadows.ppm", String::as_str);
            if let Err(e) = run_render(path) {
                eprintln!("Render failed: {}", e);
                std::process::exit(1);
            }
        }
        _ => {
            println!("Shadowcast");
            println!("Run with --interactive for minifb viewer");
            println!("Run with --benchmark to test performance");
            println!("Run with --render <file.ppm|file.rgba> to render the demo scene");
        }
    }
}

fn run_benchmark() {
    use std::time::Instant;

    println!("=== Ray Fan Benchmark ===\n");

    let scene = Scene::demo(480, 360);
    let views = scene.occluders();
    let extractor = ShapeExtractor::default();
    let iterations = 20;
    let origin = Vec2::new(-20.0, 10.0);
    let radius = 200.0;

    for mode in [OcclusionMode::PixelMarch, OcclusionMode::Outline] {
        println!("Occlusion mode: {:?}", mode);
        println!("-----------------------");

        let start = Instant::now();
        for _ in 0..iterations {
            let _ = raymarch::resolve_occluders(&views, mode, &extractor);
        }
        let resolve_ms = start.elapsed().as_secs_f64() * 1000.0 / iterations as f64;
        println!("  Resolve occluders: {:.3} ms/iter", resolve_ms);

        let occluders = raymarch::resolve_occluders(&views, mode, &extractor);
        for quality in [90usize, 360, 1440] {
            let config = MarchConfig::default().with_mode(mode);
            let sequential = RayMarcher::new(config);
            let parallel = RayMarcher::new(config.with_parallel(true));
            let max_distance = radius * config.range_multiplier;

            let start = Instant::now();
            for _ in 0..iterations {
                let _ = sequential.fan(origin, quality, max_distance, &occluders);
            }
            let seq_ms = start.elapsed().as_secs_f64() * 1000.0 / iterations as f64;

            let start = Instant::now();
            for _ in 0..iterations {
                let _ = parallel.fan(origin, quality, max_distance, &occluders);
            }
            let par_ms = start.elapsed().as_secs_f64() * 1000.0 / iterations as f64;

            println!("  Quality {:>4}: sequential {:.3} ms, parallel {:.3} ms, speedup {:.2}x", quality, seq_ms, par_ms, seq_ms / par_ms);
        }
        println!();
    }

    // Full frames through the engine (the real use case)
    println!("=== Full Frame ===");
    let Ok(mut engine) = Engine::new(&scene, EngineConfig::default()) else {
        eprintln!("Demo scene refused the engine");
        return;
    };
    engine.field_mut().add_light("L1", Light::at(-20.0, 10.0).with_radius(radius).with_rays(true));
    engine.field_mut().add_light("L2", Light::at(150.0, 100.0).with_radius(120.0));

    for parallel in [false, true] {
        engine.set_parallel(parallel);
        let start = Instant::now();
        for i in 0..iterations {
            let _ = engine.tick(&scene, Duration::from_millis(16 * i as u64));
        }
        let frame_ms = start.elapsed().as_secs_f64() * 1000.0 / iterations as f64;
        println!("  {}: {:.3} ms/frame ({:.1} FPS)", if parallel { "Parallel" } else { "Sequential" }, frame_ms, 1000.0 / frame_ms);
    }
    engine.shutdown();
}

fn run_render(path: &str) -> Result<()> {
    let (width, height) = (960, 720);
    let scene = Scene::demo(width, height);
    let mut engine = Engine::new(&scene, EngineConfig::default())?;
    engine.field_mut().add_light("L1", Light::at(-40.0, 20.0).with_radius(180.0).with_rays(true));
    engine.field_mut().add_light(
        "L2",
        Light { color: RGBA::new(1.0, 0.7, 0.3, 1.0), ..Light::at(170.0, 120.0).with_radius(90.0).with_intensity(70.0) },
    );
    engine.field_mut().add_beam(
        "B1",
        Beam { position: Vec2::new(-220.0, 160.0), angle: 35.0, length: 220.0, width: 70.0, intensity: 90.0 },
    );

    let mut canvas = Surface::new(width, height);
    canvas.fill(RGBA::new(0.55, 0.6, 0.5, 1.0));
    let Some(frame) = engine.tick(&scene, Duration::ZERO) else {
        log::warn!("Render surface was not ready, nothing written");
        return Ok(());
    };
    scene.draw(&mut canvas, frame.transform);
    frame.composite_over(&mut canvas);
    if path.ends_with(".rgba") {
        save_rgba(&canvas, path)?;
    } else {
        save_ppm(&canvas, path, 1)?;
    }
    println!("Wrote {}", path);
    engine.shutdown();
    Ok(())
}

fn run_interactive() {
    let config = ViewerConfig::default();

    match InteractiveViewer::new(config) {
        Ok(mut viewer) => {
            if let Err(e) = viewer.run() {
                eprintln!("Error: {}", e);
            }
        }
        Err(e) => {
            eprintln!("Failed to create viewer: {}", e);
        }
    }
}
