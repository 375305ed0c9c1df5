//! Ray marching against sprite silhouettes
//!
//! A ray advances from its origin in fixed stage-space steps. At each step
//! the sample point is mapped into every candidate occluder's texture space
//! and tested for opacity. The nearest hit wins; equal distances go to the
//! occluder the host enumerated first.

use glam::Vec2;
use rayon::prelude::*;

use crate::scene::{LocalFrame, OccluderView};
use crate::shape::ShapeExtractor;
use crate::silhouette::{SilhouetteSampler, Texture};

/// How rays decide what blocks them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OcclusionMode {
    /// Sample the costume alpha at every march step
    #[default]
    PixelMarch,
    /// Intersect the ray with each sprite's extracted outline
    Outline,
}

/// Configuration for ray casting
#[derive(Debug, Clone, Copy)]
pub struct MarchConfig {
    /// Distance between samples along a ray, in stage units
    pub step: f32,
    /// Ray length as a multiple of the light radius
    pub range_multiplier: f32,
    pub mode: OcclusionMode,
    /// Alpha (0-255) strictly above which a texel blocks light
    pub alpha_threshold: f32,
    /// Cast each light's rays on the rayon pool
    pub parallel: bool,
}

impl Default for MarchConfig {
    fn default() -> Self {
        Self {
            step: 0.5,
            range_multiplier: 1.5,
            mode: OcclusionMode::PixelMarch,
            alpha_threshold: crate::silhouette::DEFAULT_ALPHA_THRESHOLD,
            parallel: false,
        }
    }
}

impl MarchConfig {
    pub fn with_mode(mut self, mode: OcclusionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// One sprite, read once for the current tick.
#[derive(Debug, Clone)]
pub struct ResolvedOccluder<'a> {
    pub frame: LocalFrame,
    pub texture: Texture<'a>,
    /// Stage-space radius beyond which no sample can be opaque
    pub reach: f32,
    /// Stage-space outline, filled only in [`OcclusionMode::Outline`]
    pub outline: Vec<Vec2>,
}

/// Read every occluder's costume for this tick.
///
/// Sprites whose pixels cannot be read are logged and skipped; the rest of
/// the scene still casts shadows. Zero or negative scale hides a sprite.
pub fn resolve_occluders<'a>(
    views: &[&'a dyn OccluderView],
    mode: OcclusionMode,
    extractor: &ShapeExtractor,
) -> Vec<ResolvedOccluder<'a>> {
    views
        .iter()
        .filter_map(|&view| {
            let texture = match view.texture() {
                Ok(texture) => texture,
                Err(e) => {
                    log::warn!("Skipping occluder: {}", e);
                    return None;
                }
            };
            let frame = LocalFrame::of(view, &texture);
            if !(frame.scale > 0.0) {
                return None;
            }
            // Bilinear filtering bleeds half a texel past the costume edge
            let reach = (texture.bounding_radius() + 1.0) * frame.scale;
            let outline = match mode {
                OcclusionMode::Outline => extractor.extract_texture(&frame, &texture),
                OcclusionMode::PixelMarch => Vec::new(),
            };
            Some(ResolvedOccluder { frame, texture, reach, outline })
        })
        .collect()
}

/// Result of casting one ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Hit point, or the ray end when nothing was hit
    pub point: Vec2,
    pub distance: f32,
    /// Index into the resolved occluder list
    pub occluder: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct RayMarcher {
    pub config: MarchConfig,
    sampler: SilhouetteSampler,
}

impl RayMarcher {
    pub fn new(config: MarchConfig) -> Self {
        RayMarcher {
            config,
            sampler: SilhouetteSampler::with_threshold(config.alpha_threshold),
        }
    }

    /// Cast one ray from `origin` at `angle` (radians, counter-clockwise from +x).
    pub fn cast(&self, origin: Vec2, angle: f32, max_distance: f32, occluders: &[ResolvedOccluder<'_>]) -> RayHit {
        let max_distance = max_distance.max(0.0);
        let dir = Vec2::new(angle.cos(), angle.sin());
        let miss = RayHit { point: origin + dir * max_distance, distance: max_distance, occluder: None };

        match self.config.mode {
            OcclusionMode::PixelMarch => self.march(origin, dir, max_distance, occluders).unwrap_or(miss),
            OcclusionMode::Outline => self.intersect_outlines(origin, dir, max_distance, occluders).unwrap_or(miss),
        }
    }

    /// `count` rays evenly spread over a full turn, starting at angle 0.
    pub fn fan(&self, origin: Vec2, count: usize, max_distance: f32, occluders: &[ResolvedOccluder<'_>]) -> Vec<RayHit> {
        let angle = |i: usize| i as f32 / count as f32 * std::f32::consts::TAU;
        if self.config.parallel {
            (0..count)
                .into_par_iter()
                .map(|i| self.cast(origin, angle(i), max_distance, occluders))
                .collect()
        } else {
            (0..count)
                .map(|i| self.cast(origin, angle(i), max_distance, occluders))
                .collect()
        }
    }

    fn march(&self, origin: Vec2, dir: Vec2, max_distance: f32, occluders: &[ResolvedOccluder<'_>]) -> Option<RayHit> {
        let step = self.config.step.max(1e-3);
        let max_steps = (max_distance / step).ceil() as usize;
        if max_steps == 0 {
            return None;
        }

        // Step index of the best hit so far and who made it
        let mut best: Option<(usize, usize)> = None;

        for (index, occ) in occluders.iter().enumerate() {
            let Some((first, last)) = step_window(origin, dir, occ, step, max_steps) else {
                continue;
            };
            // Only strictly nearer hits can beat an earlier occluder
            let last = match best {
                Some((best_step, _)) if best_step == 0 => break,
                Some((best_step, _)) => last.min(best_step - 1),
                None => last,
            };

            for i in first..=last {
                let sample = origin + dir * (i as f32 * step);
                let t = occ.frame.to_texture(sample);
                if self.sampler.is_opaque(&occ.texture, t.x, t.y) {
                    best = Some((i, index));
                    break;
                }
            }
        }

        best.map(|(i, index)| {
            let distance = i as f32 * step;
            RayHit { point: origin + dir * distance, distance, occluder: Some(index) }
        })
    }

    fn intersect_outlines(
        &self,
        origin: Vec2,
        dir: Vec2,
        max_distance: f32,
        occluders: &[ResolvedOccluder<'_>],
    ) -> Option<RayHit> {
        let mut best: Option<(f32, usize)> = None;
        for (index, occ) in occluders.iter().enumerate() {
            let n = occ.outline.len();
            if n < 2 {
                continue;
            }
            for i in 0..n {
                let a = occ.outline[i];
                let b = occ.outline[(i + 1) % n];
                let Some(t) = ray_segment_intersection(origin, dir, a, b) else {
                    continue;
                };
                if t >= max_distance {
                    continue;
                }
                if best.is_none_or(|(d, _)| t < d) {
                    best = Some((t, index));
                }
            }
        }
        best.map(|(distance, index)| RayHit { point: origin + dir * distance, distance, occluder: Some(index) })
    }
}

/// Range of step indices whose samples fall inside an occluder's reach circle.
fn step_window(origin: Vec2, dir: Vec2, occ: &ResolvedOccluder<'_>, step: f32, max_steps: usize) -> Option<(usize, usize)> {
    let to_centre = occ.frame.position - origin;
    let along = to_centre.dot(dir);
    let perp_sq = to_centre.length_squared() - along * along;
    let reach_sq = occ.reach * occ.reach;
    if perp_sq > reach_sq {
        return None;
    }
    let half_chord = (reach_sq - perp_sq).max(0.0).sqrt();
    let near = along - half_chord;
    let far = along + half_chord;
    if far < 0.0 {
        return None;
    }
    let first = (near.max(0.0) / step).floor() as usize;
    let last = ((far / step).ceil() as usize).min(max_steps - 1);
    (first <= last).then_some((first, last))
}

/// Distance along a ray (unit `dir`) to segment `a`-`b`, if they cross.
pub fn ray_segment_intersection(origin: Vec2, dir: Vec2, a: Vec2, b: Vec2) -> Option<f32> {
    let edge = b - a;
    let denom = dir.perp_dot(edge);
    if denom.abs() < 1e-6 {
        return None;
    }
    let to_a = a - origin;
    let t = to_a.perp_dot(edge) / denom;
    let u = to_a.perp_dot(dir) / denom;
    (t >= 0.0 && (0.0..=1.0).contains(&u)).then_some(t)
}
