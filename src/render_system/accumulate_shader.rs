use image::{Rgba, Rgba32FImage};

use crate::error::BackendError;

use super::backend::{Compositor, blend_weight};
use super::software_device::SoftwareDevice;

/// Alpha-blends the newest sample over the displayed average so that the
/// destination stays the mean of every sample since the last reset.
#[derive(Clone, Debug, Default)]
pub struct AddCompositor {
    // number of blends performed
    blends: u64,
}

impl AddCompositor {
    pub fn new() -> AddCompositor {
        AddCompositor { blends: 0 }
    }

    pub fn blends(&self) -> u64 {
        self.blends
    }
}

/// `previous * (1 - a) + sample * a` with `a = 1 / (sample_index + 1)`.
pub fn blend_texel(previous: Rgba<f32>, sample: Rgba<f32>, sample_index: u32) -> Rgba<f32> {
    let a = blend_weight(sample_index);
    let Rgba(p) = previous;
    let Rgba(s) = sample;
    Rgba([
        p[0] * (1.0 - a) + s[0] * a,
        p[1] * (1.0 - a) + s[1] * a,
        p[2] * (1.0 - a) + s[2] * a,
        1.0,
    ])
}

impl Compositor<SoftwareDevice> for AddCompositor {
    fn blend(
        &mut self,
        _backend: &mut SoftwareDevice,
        source: &Rgba32FImage,
        destination: &mut Rgba32FImage,
        sample: u32,
    ) -> Result<(), BackendError> {
        if source.dimensions() != destination.dimensions() {
            return Err(BackendError::Composite(format!(
                "source is {:?} but destination is {:?}",
                source.dimensions(),
                destination.dimensions()
            )));
        }

        for (dst, src) in destination.pixels_mut().zip(source.pixels()) {
            *dst = blend_texel(*dst, *src, sample);
        }
        self.blends += 1;
        Ok(())
    }
}
