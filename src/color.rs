//! Colour types for overlay surfaces and host pixel buffers
//!
//! `RGBA` is the floating point colour the overlays are painted with.
//! `Rgba8` is the byte layout sprite costumes arrive in and exports leave in.

use bytemuck::{Pod, Zeroable};

/// RGBA color with floating point components
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RGBA {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl RGBA {
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        RGBA { r, g, b, a }
    }

    pub fn black() -> Self {
        RGBA { r: 0.0, g: 0.0, b: 0.0, a: 1.0 }
    }

    pub fn white() -> Self {
        RGBA { r: 1.0, g: 1.0, b: 1.0, a: 1.0 }
    }

    pub fn transparent() -> Self {
        RGBA { r: 0.0, g: 0.0, b: 0.0, a: 0.0 }
    }

    /// Same colour with a different alpha
    pub fn with_alpha(self, a: f32) -> Self {
        RGBA { a, ..self }
    }

    /// Straight-alpha linear interpolation
    pub fn lerp(self, other: RGBA, t: f32) -> Self {
        RGBA {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }

    /// Convert to premultiplied form (color channels scaled by alpha)
    pub fn premultiplied(self) -> Self {
        RGBA { r: self.r * self.a, g: self.g * self.a, b: self.b * self.a, a: self.a }
    }

    /// Parse a host colour string.
    ///
    /// Accepts `#rgb`, `#rrggbb`, `rgb(r, g, b)`, `rgba(r, g, b, a)` and the
    /// unterminated `rgba(r, g, b` form the ray blocks store as their default.
    /// Channels are 0-255, alpha 0-1.
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }

        let body = s
            .strip_prefix("rgba(")
            .or_else(|| s.strip_prefix("rgb("))?;
        let body = body.trim_end_matches(')');
        let parts: Vec<f32> = body
            .split(',')
            .map(|p| p.trim().parse::<f32>())
            .collect::<Result<_, _>>()
            .ok()?;

        match parts.as_slice() {
            [r, g, b] => Some(RGBA::new(r / 255.0, g / 255.0, b / 255.0, 1.0)),
            [r, g, b, a] => Some(RGBA::new(r / 255.0, g / 255.0, b / 255.0, a.clamp(0.0, 1.0))),
            _ => None,
        }
    }
}

fn parse_hex(hex: &str) -> Option<RGBA> {
    let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
    match hex.len() {
        3 => {
            let mut chans = hex.chars().map(|c| {
                let d = c.to_digit(16)? as f32;
                Some(d * 17.0 / 255.0)
            });
            let r = chans.next()??;
            let g = chans.next()??;
            let b = chans.next()??;
            Some(RGBA::new(r, g, b, 1.0))
        }
        6 => Some(RGBA::new(
            channel(hex.get(0..2)?)?,
            channel(hex.get(2..4)?)?,
            channel(hex.get(4..6)?)?,
            1.0,
        )),
        _ => None,
    }
}

/// One RGBA8 pixel, byte-compatible with canvas image data.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const TRANSPARENT: Rgba8 = Rgba8 { r: 0, g: 0, b: 0, a: 0 };

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Rgba8 { r, g, b, a }
    }
}

impl From<RGBA> for Rgba8 {
    fn from(c: RGBA) -> Self {
        Rgba8 {
            r: crate::render::to_byte(c.r),
            g: crate::render::to_byte(c.g),
            b: crate::render::to_byte(c.b),
            a: crate::render::to_byte(c.a),
        }
    }
}

impl From<Rgba8> for RGBA {
    fn from(p: Rgba8) -> Self {
        RGBA::new(
            p.r as f32 / 255.0,
            p.g as f32 / 255.0,
            p.b as f32 / 255.0,
            p.a as f32 / 255.0,
        )
    }
}

/// Piecewise-linear colour ramp, as used by canvas gradients.
#[derive(Debug, Clone)]
pub struct Gradient {
    stops: Vec<(f32, RGBA)>,
}

impl Gradient {
    /// Stops must be sorted by offset; offsets are clamped into [0, 1].
    pub fn new(stops: Vec<(f32, RGBA)>) -> Self {
        let stops = stops
            .into_iter()
            .map(|(t, c)| (t.clamp(0.0, 1.0), c))
            .collect();
        Gradient { stops }
    }

    /// Colour at offset `t`; values outside the ramp take the nearest end stop.
    pub fn sample(&self, t: f32) -> RGBA {
        let Some(&(first_t, first)) = self.stops.first() else {
            return RGBA::transparent();
        };
        if t <= first_t {
            return first;
        }
        for pair in self.stops.windows(2) {
            let (t0, c0) = pair[0];
            let (t1, c1) = pair[1];
            if t <= t1 {
                let span = t1 - t0;
                if span <= f32::EPSILON {
                    return c1;
                }
                return c0.lerp(c1, (t - t0) / span);
            }
        }
        // Non-empty: last() exists
        self.stops.last().map(|&(_, c)| c).unwrap_or(first)
    }
}
