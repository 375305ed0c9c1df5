//! Overlay compositing: darkness, light reveals, beams and ray lines
//!
//! Two premultiplied RGBA surfaces are rebuilt from scratch every frame. The
//! shadow surface starts as uniform darkness and has each light's visible
//! region erased with a radial falloff. The ray surface collects faint
//! lines from each light to its raw hit points and is blurred once per frame.

use glam::Vec2;
use rayon::prelude::*;

use crate::color::{Gradient, RGBA, Rgba8};
use crate::light::{Beam, Light, LightField, ShadowPolygon};
use crate::transform::StageTransform;

/// Premultiplied RGBA pixel buffer (row-major)
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    width: usize,
    height: usize,
    pixels: Vec<RGBA>,
}

impl Surface {
    pub fn new(width: usize, height: usize) -> Self {
        Surface { width, height, pixels: vec![RGBA::transparent(); width * height] }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[RGBA] {
        &self.pixels
    }

    /// Pixel at (x, y); transparent outside the surface
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> RGBA {
        if x >= self.width || y >= self.height {
            return RGBA::transparent();
        }
        self.pixels[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, color: RGBA) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = color;
        }
    }

    /// Fill with a straight-alpha colour
    pub fn fill(&mut self, color: RGBA) {
        self.pixels.fill(color.premultiplied());
    }

    pub fn clear(&mut self) {
        self.pixels.fill(RGBA::transparent());
    }

    /// Reallocate at a new size; contents are cleared.
    pub fn resize(&mut self, width: usize, height: usize) {
        *self = Surface::new(width, height);
    }

    /// Source-over with a premultiplied source
    #[inline]
    pub fn blend_over(&mut self, x: usize, y: usize, src: RGBA) {
        if x >= self.width || y >= self.height {
            return;
        }
        let dst = &mut self.pixels[y * self.width + x];
        let k = 1.0 - src.a;
        *dst = RGBA::new(src.r + dst.r * k, src.g + dst.g * k, src.b + dst.b * k, src.a + dst.a * k);
    }

    /// Destination-out: remove `amount` (0-1) of the existing coverage
    #[inline]
    pub fn erase(&mut self, x: usize, y: usize, amount: f32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let k = 1.0 - amount.clamp(0.0, 1.0);
        let dst = &mut self.pixels[y * self.width + x];
        *dst = RGBA::new(dst.r * k, dst.g * k, dst.b * k, dst.a * k);
    }

    /// Separable box blur; pixels beyond the edge count as transparent.
    pub fn box_blur(&mut self, radius: usize) {
        if radius == 0 || self.width == 0 || self.height == 0 {
            return;
        }
        let (w, h) = (self.width, self.height);
        let norm = 1.0 / (2 * radius + 1) as f32;

        // Horizontal pass, one row per task
        let src = self.pixels.clone();
        self.pixels.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
            let line = &src[y * w..(y + 1) * w];
            for (x, out) in row.iter_mut().enumerate() {
                let lo = x.saturating_sub(radius);
                let hi = (x + radius).min(w - 1);
                *out = scaled_sum(line[lo..=hi].iter(), norm);
            }
        });

        // Vertical pass reads columns of the horizontal result
        let src = self.pixels.clone();
        self.pixels.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
            let lo = y.saturating_sub(radius);
            let hi = (y + radius).min(h - 1);
            for (x, out) in row.iter_mut().enumerate() {
                *out = scaled_sum((lo..=hi).map(|yy| &src[yy * w + x]), norm);
            }
        });
    }

    /// Colour channels packed as `0RGB` for minifb, composited over black.
    pub fn to_argb_buffer(&self) -> Vec<u32> {
        self.pixels
            .iter()
            .map(|p| {
                let r = crate::render::to_byte(p.r) as u32;
                let g = crate::render::to_byte(p.g) as u32;
                let b = crate::render::to_byte(p.b) as u32;
                (r << 16) | (g << 8) | b
            })
            .collect()
    }

    /// Straight-alpha bytes, canvas `ImageData` layout
    pub fn to_rgba8(&self) -> Vec<Rgba8> {
        self.pixels
            .iter()
            .map(|p| {
                if p.a <= 0.0 {
                    Rgba8::TRANSPARENT
                } else {
                    Rgba8::from(RGBA::new(p.r / p.a, p.g / p.a, p.b / p.a, p.a))
                }
            })
            .collect()
    }
}

#[inline]
fn scaled_sum<'a>(pixels: impl Iterator<Item = &'a RGBA>, norm: f32) -> RGBA {
    let mut acc = RGBA::transparent();
    for p in pixels {
        acc.r += p.r;
        acc.g += p.g;
        acc.b += p.b;
        acc.a += p.a;
    }
    RGBA::new(acc.r * norm, acc.g * norm, acc.b * norm, acc.a * norm)
}

/// Nonzero-winding scanline fill of a closed polygon in pixel space.
///
/// Calls `paint(x, y)` for every pixel whose centre lies inside.
pub fn fill_polygon(points: &[Vec2], width: usize, height: usize, mut paint: impl FnMut(usize, usize)) {
    let n = points.len();
    if n < 3 || width == 0 || height == 0 {
        return;
    }
    let (min_y, max_y) = points
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
    if !min_y.is_finite() || !max_y.is_finite() {
        return;
    }
    let last_row = (max_y - 0.5).floor().min(height as f32 - 1.0);
    if last_row < 0.0 {
        return;
    }
    let first_row = (min_y - 0.5).ceil().max(0.0) as usize;
    let last_row = last_row as usize;

    let mut crossings: Vec<(f32, i32)> = Vec::with_capacity(n);
    for py in first_row..=last_row {
        let sy = py as f32 + 0.5;
        crossings.clear();
        for i in 0..n {
            let a = points[i];
            let b = points[(i + 1) % n];
            if (a.y <= sy) != (b.y <= sy) {
                let x = a.x + (b.x - a.x) * (sy - a.y) / (b.y - a.y);
                if x.is_finite() {
                    crossings.push((x, if b.y > a.y { 1 } else { -1 }));
                }
            }
        }
        crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut winding = 0;
        for k in 0..crossings.len().saturating_sub(1) {
            winding += crossings[k].1;
            if winding == 0 {
                continue;
            }
            let x0 = (crossings[k].0 - 0.5).ceil().max(0.0) as usize;
            let x1 = ((crossings[k + 1].0 - 0.5).ceil().max(0.0) as usize).min(width);
            for px in x0..x1 {
                paint(px, py);
            }
        }
    }
}

/// Where the darkness level comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Darkness {
    /// Constant alpha, ignoring the ambient setting
    Fixed(f32),
    /// `(100 - ambient) / 100`
    FromAmbient,
}

impl Darkness {
    pub fn alpha(&self, ambient: f32) -> f32 {
        match *self {
            Darkness::Fixed(alpha) => alpha.clamp(0.0, 1.0),
            Darkness::FromAmbient => ((100.0 - ambient) / 100.0).clamp(0.0, 1.0),
        }
    }
}

/// Configuration for the overlay compositor
#[derive(Debug, Clone, Copy)]
pub struct CompositorConfig {
    pub darkness: Darkness,
    /// Points per smoothed polygon edge
    pub curve_segments: usize,
    /// Global alpha applied to ray lines
    pub ray_alpha: f32,
    /// Ray line width in pixels
    pub ray_width: f32,
    /// Box blur radius in pixels for the ray surface
    pub ray_blur: usize,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            darkness: Darkness::Fixed(0.75),
            curve_segments: 6,
            ray_alpha: 0.3,
            ray_width: 2.0,
            ray_blur: 4,
        }
    }
}

impl CompositorConfig {
    pub fn with_darkness(mut self, darkness: Darkness) -> Self {
        self.darkness = darkness;
        self
    }

    pub fn with_curve_segments(mut self, segments: usize) -> Self {
        self.curve_segments = segments;
        self
    }
}

/// Paints the shadow and ray overlays for one frame.
#[derive(Debug, Clone)]
pub struct Compositor {
    pub config: CompositorConfig,
    transform: StageTransform,
    shadow: Surface,
    rays: Surface,
}

impl Compositor {
    pub fn new(width: usize, height: usize, config: CompositorConfig) -> Self {
        Compositor {
            config,
            transform: StageTransform::new(width, height),
            shadow: Surface::new(width, height),
            rays: Surface::new(width, height),
        }
    }

    /// Reallocate both overlays; no-op when the size is unchanged.
    pub fn resize(&mut self, width: usize, height: usize) {
        if self.transform.size() == (width, height) {
            return;
        }
        log::debug!("Overlay resized to {}x{}", width, height);
        self.transform.resize(width, height);
        self.shadow.resize(width, height);
        self.rays.resize(width, height);
    }

    pub fn transform(&self) -> &StageTransform {
        &self.transform
    }

    pub fn size(&self) -> (usize, usize) {
        self.transform.size()
    }

    pub fn shadow(&self) -> &Surface {
        &self.shadow
    }

    pub fn rays(&self) -> &Surface {
        &self.rays
    }

    /// Redraw both overlays from the traced polygons.
    pub fn render(&mut self, field: &LightField, polygons: &[ShadowPolygon]) {
        let darkness = self.config.darkness.alpha(field.ambient());
        self.shadow.fill(RGBA::black().with_alpha(darkness));
        self.rays.clear();

        let mut any_rays = false;
        for polygon in polygons {
            let Some(light) = field.light(&polygon.light_id) else {
                continue;
            };
            self.reveal_light(light, polygon);
            if light.show_rays {
                self.draw_rays(light, polygon);
                any_rays = true;
            }
        }
        if any_rays {
            self.rays.box_blur(self.config.ray_blur);
        }

        for (_, beam) in field.beams() {
            self.reveal_beam(beam);
        }
    }

    /// Erase darkness inside the smoothed polygon with a radial falloff.
    fn reveal_light(&mut self, light: &Light, polygon: &ShadowPolygon) {
        let radius = self.transform.length_to_pixels(light.radius);
        if !(radius > 0.0) {
            return;
        }
        let a = light.intensity / 100.0;
        let falloff = Gradient::new(vec![
            (0.0, RGBA::white().with_alpha(a)),
            (0.3, RGBA::white().with_alpha(a * 0.7)),
            (0.7, RGBA::white().with_alpha(a * 0.3)),
            (1.0, RGBA::white().with_alpha(0.0)),
        ]);
        let centre = self.transform.to_pixel(polygon.origin);
        let outline: Vec<Vec2> = polygon
            .smoothed(self.config.curve_segments)
            .into_iter()
            .map(|p| self.transform.to_pixel(p))
            .collect();

        let shadow = &mut self.shadow;
        fill_polygon(&outline, shadow.width(), shadow.height(), |x, y| {
            let d = Vec2::new(x as f32 + 0.5, y as f32 + 0.5).distance(centre) / radius;
            if d < 1.0 {
                shadow.erase(x, y, falloff.sample(d).a);
            }
        });
    }

    /// Lines from the light to each raw hit, fading from the light colour.
    fn draw_rays(&mut self, light: &Light, polygon: &ShadowPolygon) {
        let fade = Gradient::new(vec![
            (0.0, light.color.with_alpha(light.intensity / 100.0)),
            (1.0, RGBA::white().with_alpha(0.0)),
        ]);
        let transform = self.transform;
        let start = transform.to_pixel(polygon.origin);
        let half_width = self.config.ray_width / 2.0;
        let global_alpha = self.config.ray_alpha;

        for end in polygon.points().into_iter().map(|p| transform.to_pixel(p)) {
            let along = end - start;
            let len_sq = along.length_squared();
            if len_sq <= f32::EPSILON {
                continue;
            }
            let normal = along.normalize().perp() * half_width;
            let quad = [start + normal, end + normal, end - normal, start - normal];
            let rays = &mut self.rays;
            fill_polygon(&quad, rays.width(), rays.height(), |x, y| {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let t = ((p - start).dot(along) / len_sq).clamp(0.0, 1.0);
                let c = fade.sample(t);
                rays.blend_over(x, y, c.with_alpha(c.a * global_alpha).premultiplied());
            });
        }
    }

    /// Erase a trapezoid fanning out from the beam origin, fading with length.
    fn reveal_beam(&mut self, beam: &Beam) {
        let length = self.transform.length_to_pixels(beam.length);
        let width = self.transform.length_to_pixels(beam.width);
        if !(length > 0.0) {
            return;
        }
        let origin = self.transform.to_pixel(beam.position);
        // Pixel y points down, so a positive angle turns clockwise on screen
        let rot = Vec2::from_angle(beam.angle.to_radians());
        let local = [
            Vec2::new(0.0, -width / 2.0),
            Vec2::new(length, -width / 4.0),
            Vec2::new(length, width / 4.0),
            Vec2::new(0.0, width / 2.0),
        ];
        let quad: Vec<Vec2> = local.iter().map(|&p| origin + rot.rotate(p)).collect();
        let a = beam.intensity / 100.0;

        let shadow = &mut self.shadow;
        fill_polygon(&quad, shadow.width(), shadow.height(), |x, y| {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - origin;
            let t = (p.dot(rot) / length).clamp(0.0, 1.0);
            shadow.erase(x, y, a * (1.0 - t));
        });
    }

    /// Darken `scene` with the shadow overlay, then lay the rays on top.
    pub fn composite_over(&self, scene: &mut Surface) {
        composite_layers(scene, &self.shadow, &self.rays);
    }
}

/// Multiply `shadow` into `scene`, then source-over `rays`.
///
/// All three surfaces must share one size; mismatched layers are ignored.
pub fn composite_layers(scene: &mut Surface, shadow: &Surface, rays: &Surface) {
    let same = |s: &Surface| s.width == scene.width && s.height == scene.height;
    if !same(shadow) || !same(rays) {
        log::warn!("Overlay size does not match the scene, skipping composite");
        return;
    }
    scene
        .pixels
        .par_iter_mut()
        .zip(shadow.pixels.par_iter().zip(rays.pixels.par_iter()))
        .for_each(|(dst, (s, r))| {
            // Premultiplied multiply: s*(1-da) + d*(1-sa) + s*d
            let mul = |sc: f32, dc: f32| sc * (1.0 - dst.a) + dc * (1.0 - s.a) + sc * dc;
            let d = RGBA::new(mul(s.r, dst.r), mul(s.g, dst.g), mul(s.b, dst.b), s.a + dst.a * (1.0 - s.a));
            let k = 1.0 - r.a;
            *dst = RGBA::new(r.r + d.r * k, r.g + d.g * k, r.b + d.b * k, r.a + d.a * k);
        });
}
