//! Silhouette sampling: alpha queries against a sprite's pixel buffer
//!
//! Texel (i, j) covers the square [i, i+1) x [j, j+1) in texture space, so
//! its centre sits at (i + 0.5, j + 0.5). Fractional queries blend the four
//! surrounding texel centres bilinearly. Queries outside the buffer read 0,
//! and neighbours past the edge repeat the edge texel.

use crate::color::Rgba8;

/// Alpha at or below this value does not occlude
pub const DEFAULT_ALPHA_THRESHOLD: f32 = 10.0;

/// Borrowed, read-only view of a costume's pixels (row-major).
#[derive(Debug, Clone, Copy)]
pub struct Texture<'a> {
    width: usize,
    height: usize,
    pixels: &'a [Rgba8],
}

impl<'a> Texture<'a> {
    /// Returns `None` when the slice does not hold `width * height` pixels.
    pub fn new(width: usize, height: usize, pixels: &'a [Rgba8]) -> Option<Self> {
        (pixels.len() == width * height).then_some(Texture { width, height, pixels })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Pixel at an in-bounds texel; panics outside the buffer.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Rgba8 {
        self.pixels[y * self.width + x]
    }

    /// Alpha of one texel; 0 outside the buffer.
    #[inline]
    pub fn alpha(&self, x: i64, y: i64) -> f32 {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return 0.0;
        }
        self.pixels[y as usize * self.width + x as usize].a as f32
    }

    /// Bilinear alpha at a fractional texture-space point.
    pub fn alpha_bilinear(&self, x: f32, y: f32) -> f32 {
        if !(x >= 0.0 && y >= 0.0 && x < self.width as f32 && y < self.height as f32) {
            return 0.0;
        }

        // Shift so texel centres land on integer coordinates
        let sx = x - 0.5;
        let sy = y - 0.5;
        let x0 = sx.floor();
        let y0 = sy.floor();
        let fx = sx - x0;
        let fy = sy - y0;

        let max_x = self.width as i64 - 1;
        let max_y = self.height as i64 - 1;
        let (x0, y0) = (x0 as i64, y0 as i64);
        let (x1, y1) = ((x0 + 1).clamp(0, max_x), (y0 + 1).clamp(0, max_y));
        let (x0, y0) = (x0.clamp(0, max_x), y0.clamp(0, max_y));

        let a00 = self.alpha(x0, y0);
        let a10 = self.alpha(x1, y0);
        let a01 = self.alpha(x0, y1);
        let a11 = self.alpha(x1, y1);

        a00 * (1.0 - fx) * (1.0 - fy) + a10 * fx * (1.0 - fy) + a01 * (1.0 - fx) * fy + a11 * fx * fy
    }

    /// Radius of the circle around the texture centre that encloses every texel.
    pub fn bounding_radius(&self) -> f32 {
        (self.width as f32).hypot(self.height as f32) / 2.0
    }
}

/// Answers "is this point of the sprite opaque enough to block light".
#[derive(Debug, Clone, Copy)]
pub struct SilhouetteSampler {
    /// Alpha strictly above this blocks light (0-255 scale)
    pub threshold: f32,
}

impl Default for SilhouetteSampler {
    fn default() -> Self {
        SilhouetteSampler { threshold: DEFAULT_ALPHA_THRESHOLD }
    }
}

impl SilhouetteSampler {
    pub fn with_threshold(threshold: f32) -> Self {
        SilhouetteSampler { threshold }
    }

    /// Interpolated alpha in [0, 255]
    #[inline]
    pub fn alpha(&self, texture: &Texture<'_>, x: f32, y: f32) -> f32 {
        texture.alpha_bilinear(x, y)
    }

    #[inline]
    pub fn is_opaque_alpha(&self, alpha: f32) -> bool {
        alpha > self.threshold
    }

    #[inline]
    pub fn is_opaque(&self, texture: &Texture<'_>, x: f32, y: f32) -> bool {
        self.is_opaque_alpha(self.alpha(texture, x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn alpha_row(alphas: &[u8]) -> Vec<Rgba8> {
        alphas.iter().map(|&a| Rgba8::new(0, 0, 0, a)).collect()
    }

    #[test]
    fn test_texture_rejects_wrong_length() {
        let px = alpha_row(&[0, 0, 0]);
        assert!(Texture::new(2, 2, &px).is_none());
        assert!(Texture::new(3, 1, &px).is_some());
    }

    #[test]
    fn test_texel_centres_return_exact_alpha() {
        let px = alpha_row(&[0, 100, 200, 255]);
        let tex = Texture::new(2, 2, &px).unwrap();
        assert_relative_eq!(tex.alpha_bilinear(0.5, 0.5), 0.0);
        assert_relative_eq!(tex.alpha_bilinear(1.5, 0.5), 100.0);
        assert_relative_eq!(tex.alpha_bilinear(0.5, 1.5), 200.0);
        assert_relative_eq!(tex.alpha_bilinear(1.5, 1.5), 255.0);
    }

    #[test]
    fn test_bilinear_midpoint() {
        let px = alpha_row(&[0, 100, 200, 255]);
        let tex = Texture::new(2, 2, &px).unwrap();
        // Halfway between all four centres
        assert_relative_eq!(tex.alpha_bilinear(1.0, 1.0), (0.0 + 100.0 + 200.0 + 255.0) / 4.0);
        // Halfway along the top row
        assert_relative_eq!(tex.alpha_bilinear(1.0, 0.5), 50.0);
    }

    #[test]
    fn test_out_of_bounds_is_transparent() {
        let px = alpha_row(&[255; 4]);
        let tex = Texture::new(2, 2, &px).unwrap();
        assert_eq!(tex.alpha_bilinear(-5.0, 1.0), 0.0);
        assert_eq!(tex.alpha_bilinear(1.0, 40.0), 0.0);
        assert_eq!(tex.alpha_bilinear(-0.25, 1.0), 0.0);
        assert_eq!(tex.alpha_bilinear(1.0, 2.0), 0.0);
    }

    #[test]
    fn test_edge_texels_hold_to_the_border() {
        let px = alpha_row(&[255; 4]);
        let tex = Texture::new(2, 2, &px).unwrap();
        assert_relative_eq!(tex.alpha_bilinear(0.0, 1.0), 255.0);
        assert_relative_eq!(tex.alpha_bilinear(0.1, 0.1), 255.0);
        assert_relative_eq!(tex.alpha_bilinear(1.99, 1.99), 255.0);

        let px = alpha_row(&[0, 200]);
        let tex = Texture::new(2, 1, &px).unwrap();
        assert_relative_eq!(tex.alpha_bilinear(1.9, 0.5), 200.0);
        assert_relative_eq!(tex.alpha_bilinear(0.2, 0.5), 0.0);
    }

    #[test]
    fn test_threshold_boundary() {
        let px = alpha_row(&[10, 11]);
        let tex = Texture::new(2, 1, &px).unwrap();
        let sampler = SilhouetteSampler::default();
        assert!(!sampler.is_opaque(&tex, 0.5, 0.5), "alpha exactly at threshold must not occlude");
        assert!(sampler.is_opaque(&tex, 1.5, 0.5), "alpha just above threshold must occlude");
    }

    #[test]
    fn test_custom_threshold() {
        let sampler = SilhouetteSampler::with_threshold(128.0);
        assert!(!sampler.is_opaque_alpha(128.0));
        assert!(sampler.is_opaque_alpha(128.5));
    }
}
