//! Stage <-> overlay pixel mapping
//!
//! Lights and sprites live in the host's logical stage space (origin at the
//! centre, y pointing up). Overlay buffers are addressed in pixels (origin at
//! the top-left, y pointing down). Every component that needs pixel positions
//! goes through this one transform so they never drift apart.

use glam::Vec2;

/// Logical stage width the host designs against
pub const REF_WIDTH: f32 = 480.0;
/// Logical stage height the host designs against
pub const REF_HEIGHT: f32 = 360.0;

/// Uniform scale-and-offset from stage units to overlay pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageTransform {
    width: f32,
    height: f32,
    scale: f32,
}

impl StageTransform {
    /// Build the transform for a canvas of `width` x `height` pixels.
    pub fn new(width: usize, height: usize) -> Self {
        let width = width as f32;
        let height = height as f32;
        let scale = (width / REF_WIDTH).min(height / REF_HEIGHT);
        Self { width, height, scale }
    }

    /// Recompute after the canvas changed size.
    pub fn resize(&mut self, width: usize, height: usize) {
        *self = Self::new(width, height);
    }

    /// Pixels per stage unit
    #[inline]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width as usize, self.height as usize)
    }

    /// Stage coordinates to overlay pixel coordinates.
    #[inline]
    pub fn to_pixel(&self, stage: Vec2) -> Vec2 {
        Vec2::new(
            self.width / 2.0 + stage.x * self.scale,
            self.height / 2.0 - stage.y * self.scale,
        )
    }

    /// Overlay pixel coordinates back to stage coordinates.
    ///
    /// Returns the origin when the canvas is degenerate (zero scale).
    #[inline]
    pub fn to_stage(&self, pixel: Vec2) -> Vec2 {
        if self.scale <= 0.0 {
            return Vec2::ZERO;
        }
        Vec2::new(
            (pixel.x - self.width / 2.0) / self.scale,
            -(pixel.y - self.height / 2.0) / self.scale,
        )
    }

    /// Stage length to pixel length
    #[inline]
    pub fn length_to_pixels(&self, length: f32) -> f32 {
        length * self.scale
    }
}
