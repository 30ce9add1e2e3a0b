use std::path::Path;

use image::{Rgba, Rgba32FImage, RgbaImage};
use log::info;
use nalgebra::Point2;

use crate::error::Result;

pub fn screen_to_uv(e: Point2<f32>, extent: [u32; 2]) -> Point2<f32> {
    let x = e[0] / extent[0] as f32;
    let y = e[1] / extent[1] as f32;
    Point2::new(2.0 * x - 1.0, 2.0 * y - 1.0)
}

/// Average Rec. 709 luminance of a linear surface.
pub fn get_surface_luminance(surface: &Rgba32FImage) -> f32 {
    let texels = surface.width() as u64 * surface.height() as u64;
    if texels == 0 {
        return 0.0;
    }
    let mut luminance = 0.0f64;
    for pixel in surface.pixels() {
        let [r, g, b, _] = pixel.0;
        luminance += (0.2126 * r + 0.7152 * g + 0.0722 * b) as f64;
    }
    (luminance / texels as f64) as f32
}

fn linear_to_srgb(c: f32) -> f32 {
    let c = c.clamp(0.0, 1.0);
    if c <= 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Exposure-scaled, clamped sRGB conversion of a linear surface.
pub fn to_rgba8(surface: &Rgba32FImage, exposure: f32) -> RgbaImage {
    RgbaImage::from_fn(surface.width(), surface.height(), |x, y| {
        let [r, g, b, _] = surface.get_pixel(x, y).0;
        let q = |c: f32| (linear_to_srgb(c * exposure) * 255.0).round() as u8;
        Rgba([q(r), q(g), q(b), 255])
    })
}

pub fn save_surface(surface: &Rgba32FImage, exposure: f32, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    to_rgba8(surface, exposure).save(path)?;
    info!("wrote {}", path.display());
    Ok(())
}
