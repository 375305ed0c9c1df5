//! Writing composited surfaces to disk

use crate::composite::Surface;
use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};

/// Convert a float value (0.0-1.0) to a byte (0-255)
#[inline]
pub fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0) as u8
}

/// Save a surface to a PPM file, composited over black.
///
/// Each surface pixel becomes a `scale` x `scale` block.
pub fn save_ppm(surface: &Surface, filename: &str, scale: usize) -> Result<()> {
    let scale = scale.max(1);
    let img_width = surface.width() * scale;
    let img_height = surface.height() * scale;

    let mut file = BufWriter::new(File::create(filename)?);
    writeln!(file, "P3")?;
    writeln!(file, "{} {}", img_width, img_height)?;
    writeln!(file, "255")?;

    for img_y in 0..img_height {
        for img_x in 0..img_width {
            let pixel = surface.get(img_x / scale, img_y / scale);
            write!(file, "{} {} {} ", to_byte(pixel.r), to_byte(pixel.g), to_byte(pixel.b))?;
        }
        writeln!(file)?;
    }

    file.flush()?;
    log::info!("Wrote {}x{} PPM to {}", img_width, img_height, filename);
    Ok(())
}

/// Save straight-alpha RGBA bytes, row-major, no header.
pub fn save_rgba(surface: &Surface, filename: &str) -> Result<()> {
    let pixels = surface.to_rgba8();
    let mut file = BufWriter::new(File::create(filename)?);
    file.write_all(bytemuck::cast_slice(&pixels))?;
    file.flush()?;
    log::info!("Wrote {}x{} RGBA to {}", surface.width(), surface.height(), filename);
    Ok(())
}
