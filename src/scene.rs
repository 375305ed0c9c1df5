//! Host scene boundary: the sprites the engine reads occluders from
//!
//! The engine never owns sprites. Each tick it asks the [`Host`] for the live
//! occluders and reads their transform and costume pixels through
//! [`OccluderView`]. [`Scene`] is a self-contained host used by the viewer,
//! the headless renderer and the tests.

use glam::Vec2;

use crate::color::{RGBA, Rgba8};
use crate::composite::Surface;
use crate::error::OccluderError;
use crate::silhouette::Texture;
use crate::transform::StageTransform;

/// Read-only view of one sprite that can block light.
pub trait OccluderView: Sync {
    /// Stage position of the sprite centre
    fn position(&self) -> Vec2;
    /// Facing direction in degrees (90 = right, 0 = up)
    fn direction(&self) -> f32;
    /// Uniform scale in percent
    fn size(&self) -> f32;
    /// Current costume pixels at native resolution
    fn texture(&self) -> Result<Texture<'_>, OccluderError>;
}

/// Everything the engine consumes from the host runtime.
pub trait Host {
    /// False when running inside a sandbox without renderer access
    fn is_unsandboxed(&self) -> bool;
    /// Render surface size in pixels, `None` until the renderer exists
    fn surface_size(&self) -> Option<(usize, usize)>;
    /// Live sprites in enumeration order, stage excluded
    fn occluders(&self) -> Vec<&dyn OccluderView>;
}

/// Mapping between stage space and one sprite's texture space.
#[derive(Debug, Clone, Copy)]
pub struct LocalFrame {
    pub position: Vec2,
    /// Counter-clockwise rotation in radians (`90 - direction` degrees)
    pub rotation: f32,
    pub scale: f32,
    pub half_extent: Vec2,
    cos: f32,
    sin: f32,
}

impl LocalFrame {
    pub fn new(position: Vec2, direction: f32, size: f32, tex_width: usize, tex_height: usize) -> Self {
        let rotation = (90.0 - direction).to_radians();
        LocalFrame {
            position,
            rotation,
            scale: size / 100.0,
            half_extent: Vec2::new(tex_width as f32 / 2.0, tex_height as f32 / 2.0),
            cos: rotation.cos(),
            sin: rotation.sin(),
        }
    }

    pub fn of(view: &dyn OccluderView, texture: &Texture<'_>) -> Self {
        LocalFrame::new(view.position(), view.direction(), view.size(), texture.width(), texture.height())
    }

    /// Stage point to texture pixel coordinates (y down).
    #[inline]
    pub fn to_texture(&self, stage: Vec2) -> Vec2 {
        let rel = stage - self.position;
        // Inverse rotation
        let rx = rel.x * self.cos + rel.y * self.sin;
        let ry = -rel.x * self.sin + rel.y * self.cos;
        Vec2::new(rx / self.scale + self.half_extent.x, -ry / self.scale + self.half_extent.y)
    }

    /// Texture pixel coordinates back to stage space.
    #[inline]
    pub fn to_stage(&self, texel: Vec2) -> Vec2 {
        let lx = (texel.x - self.half_extent.x) * self.scale;
        let ly = -(texel.y - self.half_extent.y) * self.scale;
        self.position + Vec2::new(lx * self.cos - ly * self.sin, lx * self.sin + ly * self.cos)
    }
}

/// Costume pixels, or a costume still being fetched by the host.
#[derive(Debug, Clone)]
pub enum Costume {
    Loaded {
        width: usize,
        height: usize,
        pixels: Vec<Rgba8>,
    },
    Loading,
}

impl Costume {
    /// Wrap raw RGBA bytes as produced by canvas `getImageData`.
    pub fn from_rgba_bytes(width: usize, height: usize, bytes: &[u8]) -> Result<Self, OccluderError> {
        let expected = width * height * 4;
        let malformed = || OccluderError::Malformed { width, height, expected, got: bytes.len() };
        if bytes.len() != expected {
            return Err(malformed());
        }
        let pixels: &[Rgba8] = bytemuck::try_cast_slice(bytes).map_err(|_| malformed())?;
        Ok(Costume::Loaded { width, height, pixels: pixels.to_vec() })
    }

    /// Solid rectangle filling the whole costume
    pub fn rect(width: usize, height: usize, color: Rgba8) -> Self {
        Costume::Loaded { width, height, pixels: vec![color; width * height] }
    }

    /// Solid disc of `radius` texels centred in a square costume
    pub fn disc(radius: usize, color: Rgba8) -> Self {
        let side = radius * 2;
        let r = radius as f32;
        let mut pixels = vec![Rgba8::TRANSPARENT; side * side];
        for y in 0..side {
            for x in 0..side {
                let dx = x as f32 + 0.5 - r;
                let dy = y as f32 + 0.5 - r;
                if dx * dx + dy * dy <= r * r {
                    pixels[y * side + x] = color;
                }
            }
        }
        Costume::Loaded { width: side, height: side, pixels }
    }
}

/// A sprite as the host exposes it.
#[derive(Debug, Clone)]
pub struct Sprite {
    pub name: String,
    pub position: Vec2,
    pub direction: f32,
    pub size: f32,
    pub costume: Costume,
    pub is_stage: bool,
}

impl Sprite {
    pub fn new(name: impl Into<String>, position: Vec2, costume: Costume) -> Self {
        Sprite {
            name: name.into(),
            position,
            direction: 90.0,
            size: 100.0,
            costume,
            is_stage: false,
        }
    }

    pub fn with_direction(mut self, direction: f32) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    /// Backdrop sprite, never treated as an occluder
    pub fn stage(costume: Costume) -> Self {
        Sprite { is_stage: true, ..Sprite::new("Stage", Vec2::ZERO, costume) }
    }
}

impl OccluderView for Sprite {
    fn position(&self) -> Vec2 {
        self.position
    }

    fn direction(&self) -> f32 {
        self.direction
    }

    fn size(&self) -> f32 {
        self.size
    }

    fn texture(&self) -> Result<Texture<'_>, OccluderError> {
        match &self.costume {
            Costume::Loaded { width, height, pixels } => {
                Texture::new(*width, *height, pixels).ok_or_else(|| OccluderError::Malformed {
                    width: *width,
                    height: *height,
                    expected: width * height * 4,
                    got: pixels.len() * 4,
                })
            }
            Costume::Loading => Err(OccluderError::NotLoaded(self.name.clone())),
        }
    }
}

/// Self-contained host: a sprite list and a render surface.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub sprites: Vec<Sprite>,
    pub surface: Option<(usize, usize)>,
    pub sandboxed: bool,
}

impl Scene {
    /// Scene with a ready render surface
    pub fn with_surface(width: usize, height: usize) -> Self {
        Scene { surface: Some((width, height)), ..Scene::default() }
    }

    pub fn push(&mut self, sprite: Sprite) -> &mut Self {
        self.sprites.push(sprite);
        self
    }

    /// A few assorted occluders: a crate, a tilted pillar, a ball and a low wall.
    pub fn demo(width: usize, height: usize) -> Self {
        let mut scene = Scene::with_surface(width, height);
        scene
            .push(Sprite::stage(Costume::rect(480, 360, Rgba8::new(90, 110, 90, 255))))
            .push(Sprite::new("crate", Vec2::new(-120.0, 60.0), Costume::rect(40, 40, Rgba8::new(150, 100, 50, 255))))
            .push(
                Sprite::new("pillar", Vec2::new(100.0, -40.0), Costume::rect(12, 80, Rgba8::new(160, 160, 170, 255)))
                    .with_direction(120.0),
            )
            .push(Sprite::new("ball", Vec2::new(60.0, 100.0), Costume::disc(20, Rgba8::new(60, 90, 200, 255))))
            .push(
                Sprite::new("wall", Vec2::new(0.0, -120.0), Costume::rect(80, 5, Rgba8::new(120, 120, 120, 255)))
                    .with_size(200.0),
            );
        scene
    }

    pub fn sprite_mut(&mut self, name: &str) -> Option<&mut Sprite> {
        self.sprites.iter_mut().find(|s| s.name == name)
    }

    /// Paint every non-stage sprite onto `surface` (nearest texel, source-over).
    pub fn draw(&self, surface: &mut Surface, transform: &StageTransform) {
        for sprite in self.sprites.iter().filter(|s| !s.is_stage) {
            let Ok(texture) = sprite.texture() else {
                continue;
            };
            let frame = LocalFrame::of(sprite, &texture);
            if frame.scale <= 0.0 {
                continue;
            }

            // Pixel bounding box of the rotated sprite
            let reach = transform.length_to_pixels(texture.bounding_radius() * frame.scale);
            let centre = transform.to_pixel(sprite.position);
            let (w, h) = (surface.width() as f32, surface.height() as f32);
            let x0 = (centre.x - reach).floor().clamp(0.0, w) as usize;
            let x1 = (centre.x + reach).ceil().clamp(0.0, w) as usize;
            let y0 = (centre.y - reach).floor().clamp(0.0, h) as usize;
            let y1 = (centre.y + reach).ceil().clamp(0.0, h) as usize;

            for py in y0..y1 {
                for px in x0..x1 {
                    let stage = transform.to_stage(Vec2::new(px as f32 + 0.5, py as f32 + 0.5));
                    let t = frame.to_texture(stage);
                    if t.x < 0.0 || t.y < 0.0 {
                        continue;
                    }
                    let (tx, ty) = (t.x as usize, t.y as usize);
                    if tx >= texture.width() || ty >= texture.height() {
                        continue;
                    }
                    let texel = RGBA::from(texture.pixel(tx, ty));
                    if texel.a > 0.0 {
                        surface.blend_over(px, py, texel.premultiplied());
                    }
                }
            }
        }
    }
}

impl Host for Scene {
    fn is_unsandboxed(&self) -> bool {
        !self.sandboxed
    }

    fn surface_size(&self) -> Option<(usize, usize)> {
        self.surface
    }

    fn occluders(&self) -> Vec<&dyn OccluderView> {
        self.sprites
            .iter()
            .filter(|s| !s.is_stage)
            .map(|s| s as &dyn OccluderView)
            .collect()
    }
}
