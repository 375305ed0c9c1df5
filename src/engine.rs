//! Engine lifecycle and the per-tick render loop
//!
//! The engine waits in `Uninitialized` until the host reports a render
//! surface, polling no more than once per retry delay. From then on every
//! tick advances animations, re-reads the occluders, traces each light and
//! repaints both overlays. Teardown consumes the engine.

use std::time::Duration;

use crate::composite::{Compositor, CompositorConfig, Surface};
use crate::error::{EngineError, Result};
use crate::light::{LightField, ShadowPolygon};
use crate::raymarch::{MarchConfig, OcclusionMode, RayMarcher, resolve_occluders};
use crate::scene::Host;
use crate::shape::{ShapeConfig, ShapeExtractor};
use crate::transform::StageTransform;

/// Configuration for the engine
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub march: MarchConfig,
    pub shape: ShapeConfig,
    pub compositor: CompositorConfig,
    /// Delay between render surface polls while uninitialized
    pub retry_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            march: MarchConfig::default(),
            shape: ShapeConfig::default(),
            compositor: CompositorConfig::default(),
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl EngineConfig {
    pub fn with_march(mut self, march: MarchConfig) -> Self {
        self.march = march;
        self
    }

    pub fn with_compositor(mut self, compositor: CompositorConfig) -> Self {
        self.compositor = compositor;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// Observable lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Running,
}

#[derive(Debug)]
enum State {
    Uninitialized { next_poll: Duration },
    Running(Compositor),
}

/// Overlays produced by one tick
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub shadow: &'a Surface,
    pub rays: &'a Surface,
    pub polygons: &'a [ShadowPolygon],
    pub transform: &'a StageTransform,
}

impl Frame<'_> {
    /// Darken `scene` and lay the rays over it.
    pub fn composite_over(&self, scene: &mut Surface) {
        crate::composite::composite_layers(scene, self.shadow, self.rays);
    }
}

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    field: LightField,
    marcher: RayMarcher,
    extractor: ShapeExtractor,
    state: State,
    polygons: Vec<ShadowPolygon>,
    now: Duration,
}

impl Engine {
    /// Create the engine for `host`.
    ///
    /// Fails when the host runs sandboxed; nothing is registered in that case.
    pub fn new(host: &dyn Host, config: EngineConfig) -> Result<Self> {
        if !host.is_unsandboxed() {
            log::error!("Shadow casting needs an unsandboxed host");
            return Err(EngineError::Sandboxed);
        }
        log::info!("Shadow engine created, waiting for render surface");
        Ok(Engine {
            config,
            field: LightField::new(),
            marcher: RayMarcher::new(config.march),
            extractor: ShapeExtractor::new(config.shape),
            state: State::Uninitialized { next_poll: Duration::ZERO },
            polygons: Vec::new(),
            now: Duration::ZERO,
        })
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match self.state {
            State::Uninitialized { .. } => Lifecycle::Uninitialized,
            State::Running(_) => Lifecycle::Running,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn field(&self) -> &LightField {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut LightField {
        &mut self.field
    }

    /// Time of the last tick
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Polygons traced on the last rendered tick
    pub fn polygons(&self) -> &[ShadowPolygon] {
        &self.polygons
    }

    pub fn compositor(&self) -> Option<&Compositor> {
        match &self.state {
            State::Running(compositor) => Some(compositor),
            State::Uninitialized { .. } => None,
        }
    }

    pub fn occlusion_mode(&self) -> OcclusionMode {
        self.marcher.config.mode
    }

    pub fn set_occlusion_mode(&mut self, mode: OcclusionMode) {
        log::info!("Occlusion mode: {:?}", mode);
        self.marcher.config.mode = mode;
    }

    pub fn is_parallel(&self) -> bool {
        self.marcher.config.parallel
    }

    pub fn set_parallel(&mut self, parallel: bool) {
        self.marcher.config.parallel = parallel;
    }

    /// Resize or fullscreen notification from the host.
    pub fn resize(&mut self, width: usize, height: usize) {
        if let State::Running(compositor) = &mut self.state {
            compositor.resize(width, height);
        }
    }

    /// Advance one host frame.
    ///
    /// Returns `None` while waiting for the render surface.
    pub fn tick(&mut self, host: &dyn Host, now: Duration) -> Option<Frame<'_>> {
        self.now = now;

        if let State::Uninitialized { next_poll } = self.state {
            if now < next_poll {
                return None;
            }
            match host.surface_size() {
                Some((width, height)) if width > 0 && height > 0 => {
                    log::info!("Render surface ready ({}x{}), shadow engine running", width, height);
                    self.state = State::Running(Compositor::new(width, height, self.config.compositor));
                }
                _ => {
                    log::debug!("Render surface not ready, retrying in {:?}", self.config.retry_delay);
                    self.state = State::Uninitialized { next_poll: now + self.config.retry_delay };
                    return None;
                }
            }
        }

        let State::Running(compositor) = &mut self.state else {
            return None;
        };
        if let Some((width, height)) = host.surface_size() {
            compositor.resize(width, height);
        }
        if compositor.size().0 == 0 || compositor.size().1 == 0 {
            return None;
        }

        self.field.advance_animations(now);
        let views = host.occluders();
        let occluders = resolve_occluders(&views, self.marcher.config.mode, &self.extractor);
        self.polygons = self.field.trace(&self.marcher, &occluders);
        compositor.render(&self.field, &self.polygons);

        Some(Frame {
            shadow: compositor.shadow(),
            rays: compositor.rays(),
            polygons: &self.polygons,
            transform: compositor.transform(),
        })
    }

    /// Stop rendering and release the overlays.
    pub fn shutdown(self) {
        log::info!(
            "Shadow engine stopped with {} lights, {} beams",
            self.field.light_count(),
            self.field.beams().count()
        );
    }
}
