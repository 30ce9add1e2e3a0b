use std::path::Path;

use image::{Rgba, Rgba32FImage};
use log::info;
use nalgebra::Vector3;

use crate::error::Result;

/// Equirectangular background sampled by rays that leave the scene.
#[derive(Clone, Debug)]
pub struct EnvironmentMap {
    image: Rgba32FImage,
    intensity: f32,
}

impl EnvironmentMap {
    pub fn from_image(image: Rgba32FImage, intensity: f32) -> EnvironmentMap {
        EnvironmentMap { image, intensity }
    }

    /// Loads any format the image crate decodes (HDR and EXR included).
    pub fn load(path: impl AsRef<Path>, intensity: f32) -> Result<EnvironmentMap> {
        let path = path.as_ref();
        let image = image::open(path)?.into_rgba32f();
        info!(
            "loaded environment map {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        Ok(EnvironmentMap::from_image(image, intensity))
    }

    /// Vertical sky gradient from `horizon` to `zenith`, ground mirrors the sky.
    pub fn gradient(horizon: [f32; 3], zenith: [f32; 3]) -> EnvironmentMap {
        let (width, height) = (64, 32);
        let image = Rgba32FImage::from_fn(width, height, |_, y| {
            // 0 at the horizon, 1 at the poles
            let v = (y as f32 + 0.5) / height as f32;
            let t = (2.0 * v - 1.0).abs();
            let mix = |a: f32, b: f32| a + (b - a) * t;
            Rgba([
                mix(horizon[0], zenith[0]),
                mix(horizon[1], zenith[1]),
                mix(horizon[2], zenith[2]),
                1.0,
            ])
        });
        EnvironmentMap::from_image(image, 1.0)
    }

    pub fn extent(&self) -> [u32; 2] {
        [self.image.width(), self.image.height()]
    }

    // direction need not be normalized
    pub fn sample(&self, direction: &Vector3<f32>) -> Vector3<f32> {
        let d = direction.normalize();
        let theta = d.y.clamp(-1.0, 1.0).acos() / std::f32::consts::PI;
        let phi = 0.5 + d.x.atan2(-d.z) / std::f32::consts::TAU;

        let [w, h] = self.extent();
        let x = ((phi * w as f32) as u32).min(w - 1);
        let y = ((theta * h as f32) as u32).min(h - 1);
        let Rgba([r, g, b, _]) = *self.image.get_pixel(x, y);
        Vector3::new(r, g, b) * self.intensity
    }
}
