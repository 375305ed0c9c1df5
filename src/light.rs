//! Lights, beams and the per-frame shadow polygons they produce
//!
//! [`LightField`] owns every light and beam keyed by id. Once per tick it
//! casts a fan of rays from each light and returns one [`ShadowPolygon`] per
//! light. Beams are drawn as-is by the compositor and never cast shadows.

use std::collections::BTreeMap;
use std::time::Duration;

use glam::Vec2;

use crate::animation::{self, Animations, Pose, Target, Tween};
use crate::color::RGBA;
use crate::raymarch::{RayHit, RayMarcher, ResolvedOccluder};

/// Ray count used when a light's quality is zero or negative
pub const DEFAULT_QUALITY: usize = 360;

/// Ambient level reported before any is set
pub const DEFAULT_AMBIENT: f32 = 100.0;

/// A point light in stage coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub position: Vec2,
    pub radius: f32,
    /// 0-100
    pub intensity: f32,
    pub color: RGBA,
    /// Angular sample count; values <= 0 mean [`DEFAULT_QUALITY`]
    pub quality: i32,
    pub show_rays: bool,
}

impl Default for Light {
    fn default() -> Self {
        Light {
            position: Vec2::ZERO,
            radius: 100.0,
            intensity: 100.0,
            color: RGBA::white(),
            quality: DEFAULT_QUALITY as i32,
            show_rays: false,
        }
    }
}

impl Light {
    pub fn at(x: f32, y: f32) -> Self {
        Light { position: Vec2::new(x, y), ..Light::default() }
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    pub fn with_quality(mut self, quality: i32) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_rays(mut self, show_rays: bool) -> Self {
        self.show_rays = show_rays;
        self
    }

    /// Number of rays cast per frame
    pub fn ray_count(&self) -> usize {
        if self.quality <= 0 { DEFAULT_QUALITY } else { self.quality as usize }
    }
}

/// Partial light update. Zero or NaN numbers and a missing colour keep the
/// stored value; `show_rays` always overwrites.
#[derive(Debug, Clone, Default)]
pub struct LightUpdate {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub intensity: f32,
    pub color: Option<RGBA>,
    pub quality: i32,
    pub show_rays: bool,
}

#[inline]
fn or_prior(value: f32, prior: f32) -> f32 {
    if value == 0.0 || value.is_nan() { prior } else { value }
}

/// A directional light cone. Always drawn in full, never occluded.
#[derive(Debug, Clone, PartialEq)]
pub struct Beam {
    pub position: Vec2,
    /// Degrees, clockwise on screen from the +x axis
    pub angle: f32,
    pub length: f32,
    pub width: f32,
    /// 0-100
    pub intensity: f32,
}

impl Default for Beam {
    fn default() -> Self {
        Beam { position: Vec2::ZERO, angle: 0.0, length: 100.0, width: 20.0, intensity: 100.0 }
    }
}

/// Nearest-occluder boundary around one light for the current frame.
#[derive(Debug, Clone)]
pub struct ShadowPolygon {
    pub light_id: String,
    pub origin: Vec2,
    /// One hit per angular sample, in angle order
    pub hits: Vec<RayHit>,
}

impl ShadowPolygon {
    /// Raw vertices in stage coordinates
    pub fn points(&self) -> Vec<Vec2> {
        self.hits.iter().map(|h| h.point).collect()
    }

    /// Vertices joined by midpoint-controlled cubic curves, flattened into
    /// `segments` points per curve.
    pub fn smoothed(&self, segments: usize) -> Vec<Vec2> {
        smooth_closed(&self.points(), segments)
    }
}

/// Flatten a closed curve through `points`, using the midpoints of
/// consecutive pairs as Bezier control points.
pub fn smooth_closed(points: &[Vec2], segments: usize) -> Vec<Vec2> {
    let n = points.len();
    if n < 3 || segments == 0 {
        return points.to_vec();
    }
    let mut out = Vec::with_capacity(n * segments);
    for i in 0..n {
        let start = points[i];
        let end = points[(i + 1) % n];
        let after = points[(i + 2) % n];
        let c1 = start.lerp(end, 0.5);
        let c2 = end.lerp(after, 0.5);
        for s in 0..segments {
            let t = s as f32 / segments as f32;
            out.push(cubic(start, c1, c2, end, t));
        }
    }
    out
}

#[inline]
fn cubic(p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2, t: f32) -> Vec2 {
    let u = 1.0 - t;
    p0 * (u * u * u) + p1 * (3.0 * u * u * t) + p2 * (3.0 * u * t * t) + p3 * (t * t * t)
}

/// Owned light and beam collections plus their running animations.
#[derive(Debug, Clone)]
pub struct LightField {
    lights: BTreeMap<String, Light>,
    beams: BTreeMap<String, Beam>,
    ambient: f32,
    animations: Animations,
}

impl Default for LightField {
    fn default() -> Self {
        LightField {
            lights: BTreeMap::new(),
            beams: BTreeMap::new(),
            ambient: DEFAULT_AMBIENT,
            animations: Animations::default(),
        }
    }
}

impl LightField {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Lights
    // ------------------------------------------------------------------

    /// Insert or replace the light with this id.
    pub fn add_light(&mut self, id: &str, light: Light) {
        log::debug!("Light {} set: {:?}", id, light);
        self.lights.insert(id.to_string(), light);
    }

    /// Merge `update` into an existing light; unknown ids are ignored.
    pub fn update_light(&mut self, id: &str, update: LightUpdate) {
        let Some(light) = self.lights.get_mut(id) else {
            return;
        };
        light.position.x = or_prior(update.x, light.position.x);
        light.position.y = or_prior(update.y, light.position.y);
        light.radius = or_prior(update.radius, light.radius);
        light.intensity = or_prior(update.intensity, light.intensity);
        if let Some(color) = update.color {
            light.color = color;
        }
        if update.quality != 0 {
            light.quality = update.quality;
        }
        light.show_rays = update.show_rays;
    }

    pub fn remove_light(&mut self, id: &str) {
        if self.lights.remove(id).is_some() {
            self.animations.cancel(&Target::Light(id.to_string()));
        }
    }

    pub fn light(&self, id: &str) -> Option<&Light> {
        self.lights.get(id)
    }

    pub fn lights(&self) -> impl Iterator<Item = (&str, &Light)> {
        self.lights.iter().map(|(id, l)| (id.as_str(), l))
    }

    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    pub fn has_light(&self, id: &str) -> bool {
        self.lights.contains_key(id)
    }

    /// X of the light, 0 when absent
    pub fn light_x(&self, id: &str) -> f32 {
        self.lights.get(id).map_or(0.0, |l| l.position.x)
    }

    /// Y of the light, 0 when absent
    pub fn light_y(&self, id: &str) -> f32 {
        self.lights.get(id).map_or(0.0, |l| l.position.y)
    }

    /// Intensity of the light, 0 when absent
    pub fn light_intensity(&self, id: &str) -> f32 {
        self.lights.get(id).map_or(0.0, |l| l.intensity)
    }

    /// Jump a light to a position, cancelling any smooth move.
    pub fn move_light(&mut self, id: &str, x: f32, y: f32) {
        if let Some(light) = self.lights.get_mut(id) {
            light.position = Vec2::new(x, y);
            self.animations.cancel(&Target::Light(id.to_string()));
        }
    }

    /// Move an existing light, or create a default one at the position.
    pub fn set_light_to_position(&mut self, id: &str, position: Vec2) {
        if self.lights.contains_key(id) {
            self.move_light(id, position.x, position.y);
        } else {
            self.add_light(id, Light { position, radius: 50.0, ..Light::default() });
        }
    }

    pub fn change_light_intensity(&mut self, id: &str, delta: f32) {
        if let Some(light) = self.lights.get_mut(id) {
            light.intensity = (light.intensity + delta).clamp(0.0, 100.0);
        }
    }

    pub fn change_light_size(&mut self, id: &str, delta: f32) {
        if let Some(light) = self.lights.get_mut(id) {
            light.radius = (light.radius + delta).max(1.0);
        }
    }

    /// Ease a light to `(x, y)` over `secs` seconds starting at `now`.
    pub fn move_light_smooth(&mut self, id: &str, x: f32, y: f32, secs: f32, now: Duration) {
        let Some(light) = self.lights.get_mut(id) else {
            return;
        };
        let from = Pose { position: light.position, angle: 0.0 };
        let to = Pose { position: Vec2::new(x, y), angle: 0.0 };
        let tween = Tween { from, to, start: now, duration: animation::seconds(secs) };
        let target = Target::Light(id.to_string());
        if tween.duration.is_zero() {
            light.position = to.position;
            self.animations.cancel(&target);
        } else {
            self.animations.start(target, tween);
        }
    }

    // ------------------------------------------------------------------
    // Beams
    // ------------------------------------------------------------------

    pub fn add_beam(&mut self, id: &str, beam: Beam) {
        log::debug!("Beam {} set: {:?}", id, beam);
        self.beams.insert(id.to_string(), beam);
    }

    pub fn remove_beam(&mut self, id: &str) {
        if self.beams.remove(id).is_some() {
            self.animations.cancel(&Target::Beam(id.to_string()));
        }
    }

    pub fn beam(&self, id: &str) -> Option<&Beam> {
        self.beams.get(id)
    }

    pub fn beams(&self) -> impl Iterator<Item = (&str, &Beam)> {
        self.beams.iter().map(|(id, b)| (id.as_str(), b))
    }

    pub fn move_beam(&mut self, id: &str, x: f32, y: f32, angle: f32) {
        if let Some(beam) = self.beams.get_mut(id) {
            beam.position = Vec2::new(x, y);
            beam.angle = angle;
            self.animations.cancel(&Target::Beam(id.to_string()));
        }
    }

    pub fn move_beam_smooth(&mut self, id: &str, x: f32, y: f32, angle: f32, secs: f32, now: Duration) {
        let Some(beam) = self.beams.get_mut(id) else {
            return;
        };
        let from = Pose { position: beam.position, angle: beam.angle };
        let to = Pose { position: Vec2::new(x, y), angle };
        let tween = Tween { from, to, start: now, duration: animation::seconds(secs) };
        let target = Target::Beam(id.to_string());
        if tween.duration.is_zero() {
            beam.position = to.position;
            beam.angle = to.angle;
            self.animations.cancel(&target);
        } else {
            self.animations.start(target, tween);
        }
    }

    // ------------------------------------------------------------------
    // Ambient and bulk operations
    // ------------------------------------------------------------------

    pub fn set_ambient(&mut self, ambient: f32) {
        self.ambient = ambient;
    }

    /// Stored ambient level; 0 reads back as 0, not as the default.
    pub fn ambient(&self) -> f32 {
        self.ambient
    }

    /// Drop every light and beam and reset the ambient level.
    pub fn remove_all_effects(&mut self) {
        self.lights.clear();
        self.beams.clear();
        self.animations.clear();
        self.ambient = DEFAULT_AMBIENT;
    }

    pub fn animations(&self) -> &Animations {
        &self.animations
    }

    /// Apply every running tween at `now`.
    pub fn advance_animations(&mut self, now: Duration) {
        if self.animations.is_empty() {
            return;
        }
        for (target, pose) in self.animations.step(now) {
            match target {
                Target::Light(id) => {
                    if let Some(light) = self.lights.get_mut(&id) {
                        light.position = pose.position;
                    }
                }
                Target::Beam(id) => {
                    if let Some(beam) = self.beams.get_mut(&id) {
                        beam.position = pose.position;
                        beam.angle = pose.angle;
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Tracing
    // ------------------------------------------------------------------

    /// Cast every light's ray fan against this tick's occluders.
    pub fn trace(&self, marcher: &RayMarcher, occluders: &[ResolvedOccluder<'_>]) -> Vec<ShadowPolygon> {
        let range = marcher.config.range_multiplier;
        self.lights()
            .map(|(id, light)| ShadowPolygon {
                light_id: id.to_string(),
                origin: light.position,
                hits: marcher.fan(light.position, light.ray_count(), light.radius * range, occluders),
            })
            .collect()
    }
}
