//! Interactive shadow viewer - mouse controls light `L1` in real-time

use std::time::{Duration, Instant};

use glam::Vec2;
use minifb::{Key, KeyRepeat, MouseMode, Window, WindowOptions};

use crate::color::RGBA;
use crate::composite::Surface;
use crate::engine::{Engine, EngineConfig};
use crate::light::{Beam, Light, LightUpdate};
use crate::raymarch::OcclusionMode;
use crate::scene::Scene;
use crate::transform::StageTransform;

/// Configuration for the interactive viewer
#[derive(Clone)]
pub struct ViewerConfig {
    /// Initial window size in pixels
    pub window_size: (usize, usize),
    pub engine: EngineConfig,
    /// Backdrop colour behind the sprites
    pub background: RGBA,
    /// Radius of the mouse-driven light in stage units
    pub light_radius: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window_size: (960, 720),
            engine: EngineConfig::default(),
            background: RGBA::new(0.55, 0.6, 0.5, 1.0),
            light_radius: 140.0,
        }
    }
}

/// Interactive viewer for the shadow engine
pub struct InteractiveViewer {
    config: ViewerConfig,
    scene: Scene,
    engine: Engine,
    canvas: Surface,
    window: Window,
    buffer: Vec<u32>,
}

impl InteractiveViewer {
    /// Create a new interactive viewer with the given configuration
    pub fn new(config: ViewerConfig) -> Result<Self, String> {
        let (window_w, window_h) = config.window_size;

        let window = Window::new(
            "Shadowcast - Interactive Viewer (ESC to exit)",
            window_w,
            window_h,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| e.to_string())?;

        let scene = Scene::demo(window_w, window_h);
        let mut engine = Engine::new(&scene, config.engine).map_err(|e| e.to_string())?;
        engine.field_mut().add_light("L1", Light::default().with_radius(config.light_radius));
        engine.field_mut().add_light(
            "L2",
            Light {
                color: RGBA::new(1.0, 0.7, 0.3, 1.0),
                ..Light::at(170.0, 120.0).with_radius(90.0).with_intensity(70.0).with_quality(180)
            },
        );

        Ok(Self {
            config,
            scene,
            engine,
            canvas: Surface::new(window_w, window_h),
            window,
            buffer: vec![0u32; window_w * window_h],
        })
    }

    /// Run the interactive viewer loop
    pub fn run(&mut self) -> Result<(), String> {
        // Limit to ~60fps
        self.window.set_target_fps(60);

        println!("=== Interactive Shadow Viewer ===");
        println!("Controls:");
        println!("  Mouse      - Move light L1");
        println!("  R          - Toggle ray lines on L1");
        println!("  O          - Toggle occlusion: pixel march / outline");
        println!("  P          - Toggle parallel ray casting");
        println!("  +/-        - Double/halve L1 quality");
        println!("  B          - Add/remove a beam");
        println!("  M          - Smoothly move L1 back to the centre");
        println!("  ESC        - Exit");
        println!();

        let start = Instant::now();
        let mut last_mouse: Option<(f32, f32)> = None;
        let mut frames = 0u32;
        let mut fps_timer = Instant::now();

        while self.window.is_open() && !self.window.is_key_down(Key::Escape) {
            let now = start.elapsed();
            self.handle_keys(now);

            let (w, h) = self.window.get_size();
            self.scene.surface = Some((w, h));

            // Only a real mouse move overrides a running smooth move
            if let Some(pos) = self.window.get_mouse_pos(MouseMode::Discard) {
                if last_mouse != Some(pos) {
                    let stage = StageTransform::new(w, h).to_stage(Vec2::new(pos.0, pos.1));
                    self.engine.field_mut().move_light("L1", stage.x, stage.y);
                    last_mouse = Some(pos);
                }
            }

            let Some(frame) = self.engine.tick(&self.scene, now) else {
                self.window.update();
                continue;
            };

            if self.canvas.width() != w || self.canvas.height() != h {
                self.canvas.resize(w, h);
            }
            self.canvas.fill(self.config.background);
            self.scene.draw(&mut self.canvas, frame.transform);
            frame.composite_over(&mut self.canvas);
            self.buffer = self.canvas.to_argb_buffer();

            // Update window
            self.window
                .update_with_buffer(&self.buffer, w, h)
                .map_err(|e| e.to_string())?;

            frames += 1;
            if fps_timer.elapsed() >= Duration::from_secs(2) {
                log::info!("{:.1} FPS", frames as f64 / fps_timer.elapsed().as_secs_f64());
                frames = 0;
                fps_timer = Instant::now();
            }
        }

        Ok(())
    }

    fn handle_keys(&mut self, now: Duration) {
        let pressed = |window: &Window, key| window.is_key_pressed(key, KeyRepeat::No);

        if pressed(&self.window, Key::R) {
            let show = self.engine.field().light("L1").is_some_and(|l| !l.show_rays);
            self.engine
                .field_mut()
                .update_light("L1", LightUpdate { show_rays: show, ..LightUpdate::default() });
            println!("Rays: {}", if show { "ON" } else { "OFF" });
        }

        if pressed(&self.window, Key::O) {
            let mode = match self.engine.occlusion_mode() {
                OcclusionMode::PixelMarch => OcclusionMode::Outline,
                OcclusionMode::Outline => OcclusionMode::PixelMarch,
            };
            self.engine.set_occlusion_mode(mode);
            println!("Occlusion: {:?}", mode);
        }

        if pressed(&self.window, Key::P) {
            let parallel = !self.engine.is_parallel();
            self.engine.set_parallel(parallel);
            println!("Parallel casting: {}", if parallel { "ON" } else { "OFF" });
        }

        let quality = self.engine.field().light("L1").map_or(360, |l| l.ray_count() as i32);
        if self.window.is_key_pressed(Key::Equal, KeyRepeat::Yes)
            || self.window.is_key_pressed(Key::NumPadPlus, KeyRepeat::Yes)
        {
            self.set_quality((quality * 2).min(1440));
        }
        if self.window.is_key_pressed(Key::Minus, KeyRepeat::Yes)
            || self.window.is_key_pressed(Key::NumPadMinus, KeyRepeat::Yes)
        {
            self.set_quality((quality / 2).max(4));
        }

        if pressed(&self.window, Key::B) {
            let field = self.engine.field_mut();
            if field.beam("B1").is_some() {
                field.remove_beam("B1");
                println!("Beam removed");
            } else {
                field.add_beam(
                    "B1",
                    Beam { position: Vec2::new(-220.0, 160.0), angle: 35.0, length: 220.0, width: 70.0, intensity: 90.0 },
                );
                println!("Beam added");
            }
        }

        if pressed(&self.window, Key::M) {
            self.engine.field_mut().move_light_smooth("L1", 0.0, 0.0, 1.5, now);
            println!("Moving L1 to the centre");
        }
    }

    fn set_quality(&mut self, quality: i32) {
        let show_rays = self.engine.field().light("L1").is_some_and(|l| l.show_rays);
        self.engine
            .field_mut()
            .update_light("L1", LightUpdate { quality, show_rays, ..LightUpdate::default() });
        println!("Quality: {}", quality);
    }
}
