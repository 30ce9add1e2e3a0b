use std::sync::Arc;

use image::Rgba32FImage;
use log::{debug, info};
use threadpool::ThreadPool;

use crate::error::BackendError;

use super::backend::{ImageFormat, RenderBackend};
use super::environment::EnvironmentMap;

/// CPU stand-in for a GPU: images live in host memory and kernels run their
/// workgroups on a thread pool.
pub struct SoftwareDevice {
    threadpool: ThreadPool,
    // storage images handed out and not yet released
    live_images: u32,
    allocations: u64,
    releases: u64,
}

impl SoftwareDevice {
    pub fn new(worker_threads: usize) -> Result<SoftwareDevice, BackendError> {
        if worker_threads == 0 {
            return Err(BackendError::Unavailable(
                "software device needs at least one worker thread".into(),
            ));
        }
        info!("software device with {} worker threads", worker_threads);
        Ok(SoftwareDevice {
            threadpool: ThreadPool::new(worker_threads),
            live_images: 0,
            allocations: 0,
            releases: 0,
        })
    }

    pub fn threadpool(&self) -> &ThreadPool {
        &self.threadpool
    }

    pub fn live_images(&self) -> u32 {
        self.live_images
    }

    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    pub fn releases(&self) -> u64 {
        self.releases
    }

    /// Display surface the compositor can blend into.
    pub fn create_surface(&self, width: u32, height: u32) -> Rgba32FImage {
        Rgba32FImage::new(width, height)
    }

    pub fn upload_environment(&self, environment: EnvironmentMap) -> Arc<EnvironmentMap> {
        Arc::new(environment)
    }
}

impl RenderBackend for SoftwareDevice {
    type Image = Rgba32FImage;
    type Texture = Arc<EnvironmentMap>;
    type Surface = Rgba32FImage;

    fn allocate_storage_image(
        &mut self,
        width: u32,
        height: u32,
        format: ImageFormat,
    ) -> Result<Rgba32FImage, BackendError> {
        // host images are f32 per channel
        if !format.is_float() || format.bits_per_channel() != 32 {
            return Err(BackendError::UnsupportedFormat(format));
        }
        let texels = (width as u64) * (height as u64);
        if texels.checked_mul(16).is_none_or(|bytes| bytes > isize::MAX as u64) {
            return Err(BackendError::Allocation(format!(
                "{}x{} storage image exceeds addressable memory",
                width, height
            )));
        }

        self.live_images += 1;
        self.allocations += 1;
        debug!("allocated {}x{} storage image", width, height);
        Ok(Rgba32FImage::new(width, height))
    }

    fn release_image(&mut self, image: Rgba32FImage) {
        self.live_images = self.live_images.saturating_sub(1);
        self.releases += 1;
        debug!("released {}x{} storage image", image.width(), image.height());
    }
}
