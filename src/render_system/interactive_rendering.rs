use log::debug;
use nalgebra::Vector2;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::camera::Camera;
use crate::error::{Error, Result};

use super::backend::{
    ComputeKernel, Compositor, DispatchParameters, ImageFormat, RenderBackend, group_count,
};
use super::frame_target::FrameTargetManager;
use super::sample_accumulator::SampleAccumulator;

pub const ACCUMULATION_FORMAT: ImageFormat = ImageFormat::R32G32B32A32_SFLOAT;

/// Drives one progressive sample per frame: sizes the accumulation buffer,
/// decides whether convergence restarts, dispatches the kernel with fresh
/// jitter and blends the result into the display surface.
pub struct Renderer<B, K, C>
where
    B: RenderBackend,
    K: ComputeKernel<B>,
    C: Compositor<B>,
{
    backend: B,
    kernel: K,
    compositor: C,
    // background sampled by rays that miss the scene
    environment: B::Texture,
    targets: FrameTargetManager<B>,
    accumulator: SampleAccumulator,
    // source of per-frame pixel jitter
    rng: StdRng,
    // frames that completed dispatch and blend
    frame_count: u64,
}

impl<B, K, C> Renderer<B, K, C>
where
    B: RenderBackend,
    K: ComputeKernel<B>,
    C: Compositor<B>,
{
    pub fn new(
        backend: B,
        kernel: K,
        compositor: C,
        environment: B::Texture,
        seed: u64,
    ) -> Renderer<B, K, C> {
        Renderer {
            backend,
            kernel,
            compositor,
            environment,
            targets: FrameTargetManager::new(ACCUMULATION_FORMAT),
            accumulator: SampleAccumulator::new(),
            rng: StdRng::seed_from_u64(seed),
            frame_count: 0,
        }
    }

    /// Renders one sample into the accumulation buffer and folds it into
    /// `destination`. Call once per display refresh.
    ///
    /// On error nothing is blended and the sample count is not advanced.
    pub fn render_frame(
        &mut self,
        width: u32,
        height: u32,
        camera: &mut dyn Camera,
        destination: &mut B::Surface,
    ) -> Result<()> {
        let ensured = self.targets.ensure_target(&mut self.backend, width, height);
        let (target, resized) = match ensured {
            Ok(ensured) => ensured,
            Err(e) => {
                // the old buffer is gone, so are its samples
                if matches!(e, Error::RenderBackend(_)) {
                    self.accumulator.reset();
                }
                return Err(e);
            }
        };

        self.accumulator.notify_resized(resized);
        self.accumulator.notify_camera_moved(camera.take_changed());

        // new sub-pixel position every frame
        let pixel_offset = Vector2::new(self.rng.random::<f32>(), self.rng.random::<f32>());

        let aspect = width as f32 / height as f32;
        let camera_inverse_projection = camera
            .projection(aspect)
            .try_inverse()
            .ok_or(Error::SingularProjection)?;

        let extent = [width, height];
        let params = DispatchParameters {
            pixel_offset,
            camera_to_world: camera.camera_to_world(),
            camera_inverse_projection,
            group_count: group_count(extent, self.kernel.local_size()),
            extent,
        };

        let sample = self.accumulator.current_sample();
        debug!(
            "frame {}: sample {} offset ({:.3}, {:.3}) groups {:?}",
            self.frame_count, sample, pixel_offset.x, pixel_offset.y, params.group_count
        );

        self.kernel
            .dispatch(&mut self.backend, &params, target.image_mut(), &self.environment)?;
        self.compositor
            .blend(&mut self.backend, target.image(), destination, sample)?;

        self.accumulator.advance();
        self.frame_count += 1;
        Ok(())
    }

    // restart convergence after a scene edit
    pub fn reset(&mut self) {
        self.accumulator.reset();
    }

    pub fn sample_count(&self) -> u32 {
        self.accumulator.current_sample()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn target_extent(&self) -> Option<[u32; 2]> {
        self.targets.extent()
    }

    pub fn target_allocations(&self) -> u64 {
        self.targets.allocations()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn compositor(&self) -> &C {
        &self.compositor
    }

    /// Releases the accumulation buffer. Rendering again reallocates it.
    pub fn shutdown(&mut self) {
        self.targets.release(&mut self.backend);
    }
}

impl<B, K, C> Drop for Renderer<B, K, C>
where
    B: RenderBackend,
    K: ComputeKernel<B>,
    C: Compositor<B>,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}
