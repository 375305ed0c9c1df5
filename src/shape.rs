//! Outline extraction: turns a costume's opacity into a closed polygon
//!
//! Scans outward from the costume centre at a fine angular step, records the
//! radius where alpha first jumps sharply, smooths the radii with a circular
//! moving average, and maps the result back into stage space. Costumes with
//! no detectable edge fall back to their rotated bounding rectangle.

use glam::Vec2;

use crate::scene::{LocalFrame, OccluderView};
use crate::silhouette::Texture;

/// Configuration for outline extraction
#[derive(Debug, Clone, Copy)]
pub struct ShapeConfig {
    /// Angular step between scan rays in radians (default: 0.5 degrees)
    pub angle_step: f32,
    /// Radial step along each scan ray in texels
    pub radial_step: f32,
    /// Alpha change (0-255) between consecutive samples that marks an edge
    pub edge_jump: f32,
    /// Neighbours on each side averaged when smoothing radii
    pub smoothing_half_width: usize,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            angle_step: std::f32::consts::PI / 360.0,
            radial_step: 0.25,
            edge_jump: 50.0,
            smoothing_half_width: 5,
        }
    }
}

/// Edge radius found along one scan angle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialSample {
    pub angle: f32,
    pub radius: f32,
}

#[derive(Debug, Clone, Default)]
pub struct ShapeExtractor {
    pub config: ShapeConfig,
}

impl ShapeExtractor {
    pub fn new(config: ShapeConfig) -> Self {
        Self { config }
    }

    /// Distance from the texture centre to the first sharp alpha change
    /// along `angle`, or 0 when the ray never crosses an edge.
    pub fn edge_radius(&self, texture: &Texture<'_>, angle: f32) -> f32 {
        let centre = Vec2::new(texture.width() as f32 / 2.0, texture.height() as f32 / 2.0);
        let dir = Vec2::new(angle.cos(), angle.sin());
        // One texel past the corner so edges touching the border are still seen
        let max_radius = texture.bounding_radius() + 1.0;
        let step = self.config.radial_step.max(f32::EPSILON);

        let mut last: Option<f32> = None;
        let mut i = 0usize;
        loop {
            let r = i as f32 * step;
            if r > max_radius {
                return 0.0;
            }
            let p = centre + dir * r;
            let alpha = texture.alpha_bilinear(p.x, p.y);
            if let Some(prev) = last {
                if (alpha - prev).abs() > self.config.edge_jump {
                    return r;
                }
            }
            last = Some(alpha);
            i += 1;
        }
    }

    /// Raw edge radii for every scan angle that found an edge.
    pub fn scan(&self, texture: &Texture<'_>) -> Vec<RadialSample> {
        let step = self.config.angle_step.max(1e-4);
        // Tolerance keeps 2*pi/step from rounding up to one extra ray
        let count = ((std::f32::consts::TAU / step) - 1e-3).ceil().max(1.0) as usize;
        (0..count)
            .map(|i| i as f32 * step)
            .filter_map(|angle| {
                let radius = self.edge_radius(texture, angle);
                (radius > 0.0).then_some(RadialSample { angle, radius })
            })
            .collect()
    }

    /// Circular moving average over `half_width` neighbours on each side.
    pub fn smooth(samples: &[RadialSample], half_width: usize) -> Vec<RadialSample> {
        let n = samples.len();
        if n < 3 {
            return samples.to_vec();
        }
        let window = 2 * half_width + 1;
        (0..n)
            .map(|i| {
                let sum: f32 = (0..window)
                    .map(|k| samples[(i + n * window + k - half_width) % n].radius)
                    .sum();
                RadialSample { angle: samples[i].angle, radius: sum / window as f32 }
            })
            .collect()
    }

    /// Smoothed outline of a sprite in stage coordinates.
    ///
    /// Returns an empty polygon when the costume cannot be read.
    pub fn extract(&self, view: &dyn OccluderView) -> Vec<Vec2> {
        match view.texture() {
            Ok(texture) => self.extract_texture(&LocalFrame::of(view, &texture), &texture),
            Err(e) => {
                log::warn!("Outline extraction skipped: {}", e);
                Vec::new()
            }
        }
    }

    /// Outline of an already-read texture placed by `frame`.
    pub fn extract_texture(&self, frame: &LocalFrame, texture: &Texture<'_>) -> Vec<Vec2> {
        let raw = self.scan(texture);
        if raw.is_empty() {
            log::debug!("No edge found, using bounding rectangle");
            return bounding_rect(frame, texture);
        }

        let centre = Vec2::new(texture.width() as f32 / 2.0, texture.height() as f32 / 2.0);
        Self::smooth(&raw, self.config.smoothing_half_width)
            .into_iter()
            .map(|s| frame.to_stage(centre + Vec2::new(s.angle.cos(), s.angle.sin()) * s.radius))
            .collect()
    }
}

/// The costume rectangle rotated, scaled and translated into stage space.
pub fn bounding_rect(frame: &LocalFrame, texture: &Texture<'_>) -> Vec<Vec2> {
    let (w, h) = (texture.width() as f32, texture.height() as f32);
    [Vec2::new(0.0, 0.0), Vec2::new(w, 0.0), Vec2::new(w, h), Vec2::new(0.0, h)]
        .into_iter()
        .map(|corner| frame.to_stage(corner))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba8;
    use crate::scene::{Costume, Sprite};
    use approx::assert_relative_eq;

    const OPAQUE: Rgba8 = Rgba8::new(0, 0, 0, 255);

    #[test]
    fn test_edge_radius_of_solid_square() {
        let sprite = Sprite::new("box", Vec2::ZERO, Costume::rect(20, 20, OPAQUE));
        let tex = sprite.texture().unwrap();
        let extractor = ShapeExtractor::default();
        // Straight right: alpha holds up to the border at 10 texels
        let r = extractor.edge_radius(&tex, 0.0);
        assert!(r > 9.5 && r <= 10.0, "radius {}", r);
        // Diagonal reaches the corner at 10 * sqrt(2), within one radial step
        let r = extractor.edge_radius(&tex, std::f32::consts::FRAC_PI_4);
        assert!(r > 14.1 && r <= 14.5, "radius {}", r);
    }

    #[test]
    fn test_transparent_costume_has_no_edges() {
        let sprite = Sprite::new("air", Vec2::ZERO, Costume::rect(8, 8, Rgba8::TRANSPARENT));
        let tex = sprite.texture().unwrap();
        let extractor = ShapeExtractor::default();
        assert!(extractor.scan(&tex).is_empty());

        // Falls back to the bounding rectangle, placed at the sprite
        let frame = LocalFrame::of(&sprite, &tex);
        let outline = extractor.extract_texture(&frame, &tex);
        assert_eq!(outline.len(), 4);
        assert_relative_eq!(outline[0].x, -4.0);
        assert_relative_eq!(outline[0].y, 4.0);
        assert_relative_eq!(outline[2].x, 4.0);
        assert_relative_eq!(outline[2].y, -4.0);
    }

    #[test]
    fn test_disc_outline_is_round() {
        let sprite = Sprite::new("ball", Vec2::new(50.0, -20.0), Costume::disc(12, OPAQUE)).with_size(50.0);
        let outline = ShapeExtractor::default().extract(&sprite);
        assert!(outline.len() > 700, "only {} edge samples", outline.len());
        for p in &outline {
            let d = p.distance(sprite.position);
            // 12 texels at 50% scale
            assert!((d - 6.0).abs() < 0.5, "distance {}", d);
        }
    }

    #[test]
    fn test_smoothing_wraps_around() {
        let mut samples: Vec<RadialSample> = (0..20)
            .map(|i| RadialSample { angle: i as f32, radius: 10.0 })
            .collect();
        samples[0].radius = 21.0;
        let smoothed = ShapeExtractor::smooth(&samples, 5);
        assert_eq!(smoothed.len(), 20);
        // The spike spreads to both neighbours across the wrap point
        assert_relative_eq!(smoothed[0].radius, 11.0);
        assert_relative_eq!(smoothed[19].radius, 11.0);
        assert_relative_eq!(smoothed[5].radius, 11.0);
        assert_relative_eq!(smoothed[6].radius, 10.0);
        assert_relative_eq!(smoothed[3].angle, 3.0);
    }

    #[test]
    fn test_smoothing_short_input_unchanged() {
        let samples = vec![RadialSample { angle: 0.0, radius: 3.0 }];
        assert_eq!(ShapeExtractor::smooth(&samples, 5), samples);
    }

    #[test]
    fn test_unreadable_costume_yields_empty_outline() {
        let sprite = Sprite::new("loading", Vec2::ZERO, Costume::Loading);
        assert!(ShapeExtractor::default().extract(&sprite).is_empty());
    }
}
