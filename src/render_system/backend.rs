use nalgebra::{Matrix4, Vector2};

use crate::error::BackendError;

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    R32G32B32A32_SFLOAT,
    R16G16B16A16_SFLOAT,
    R8G8B8A8_UNORM,
}

impl ImageFormat {
    pub fn bits_per_channel(&self) -> u32 {
        match self {
            ImageFormat::R32G32B32A32_SFLOAT => 32,
            ImageFormat::R16G16B16A16_SFLOAT => 16,
            ImageFormat::R8G8B8A8_UNORM => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        !matches!(self, ImageFormat::R8G8B8A8_UNORM)
    }
}

/// Everything a kernel needs for one frame besides its image bindings.
#[derive(Clone, Debug, PartialEq)]
pub struct DispatchParameters {
    // sub-pixel offset, each component in [0, 1)
    pub pixel_offset: Vector2<f32>,
    pub camera_to_world: Matrix4<f32>,
    pub camera_inverse_projection: Matrix4<f32>,
    // number of workgroups along x, y, z
    pub group_count: [u32; 3],
    // size of the result image
    pub extent: [u32; 2],
}

/// Owns device memory for storage images and the resources kernels run on.
pub trait RenderBackend {
    // random-write storage image
    type Image;
    // read-only sampled texture
    type Texture;
    type Surface;

    fn allocate_storage_image(
        &mut self,
        width: u32,
        height: u32,
        format: ImageFormat,
    ) -> Result<Self::Image, BackendError>;

    fn release_image(&mut self, image: Self::Image);
}

/// The ray tracing program. Writes one sample per pixel of `result`.
///
/// `dispatch` must not return until every write to `result` is visible to a
/// subsequent `Compositor::blend` on the same backend.
pub trait ComputeKernel<B: RenderBackend> {
    fn local_size(&self) -> [u32; 3];

    fn dispatch(
        &mut self,
        backend: &mut B,
        params: &DispatchParameters,
        result: &mut B::Image,
        environment: &B::Texture,
    ) -> Result<(), BackendError>;
}

/// Blends the accumulation image into the display surface.
///
/// `sample` is the number of samples already averaged into `destination`;
/// the new sample contributes `blend_weight(sample)`.
pub trait Compositor<B: RenderBackend> {
    fn blend(
        &mut self,
        backend: &mut B,
        source: &B::Image,
        destination: &mut B::Surface,
        sample: u32,
    ) -> Result<(), BackendError>;
}

/// Weight of the newest sample in a running mean over `sample + 1` samples.
#[inline]
pub fn blend_weight(sample: u32) -> f32 {
    1.0 / (sample as f32 + 1.0)
}

pub fn group_count(extent: [u32; 2], local_size: [u32; 3]) -> [u32; 3] {
    [
        extent[0].div_ceil(local_size[0]),
        extent[1].div_ceil(local_size[1]),
        1,
    ]
}
