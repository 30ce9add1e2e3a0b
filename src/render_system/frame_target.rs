use log::info;

use crate::error::{Error, Result};

use super::backend::{ImageFormat, RenderBackend};

/// Random-write float image holding the running average since the last reset.
pub struct AccumulationBuffer<I> {
    image: I,
    width: u32,
    height: u32,
    format: ImageFormat,
}

impl<I> AccumulationBuffer<I> {
    pub fn image(&self) -> &I {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut I {
        &mut self.image
    }

    pub fn extent(&self) -> [u32; 2] {
        [self.width, self.height]
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }
}

/// Keeps exactly one accumulation buffer alive, sized to the output surface.
pub struct FrameTargetManager<B: RenderBackend> {
    format: ImageFormat,
    target: Option<AccumulationBuffer<B::Image>>,
    // number of storage images allocated over the manager's lifetime
    allocations: u64,
}

impl<B: RenderBackend> FrameTargetManager<B> {
    pub fn new(format: ImageFormat) -> FrameTargetManager<B> {
        FrameTargetManager {
            format,
            target: None,
            allocations: 0,
        }
    }

    /// Returns a buffer of exactly `width` x `height`, reallocating if the size
    /// changed. The flag is true when the returned buffer is freshly allocated.
    pub fn ensure_target(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> Result<(&mut AccumulationBuffer<B::Image>, bool)> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimension { width, height });
        }

        let mut resized = false;
        let target = match self.target.take() {
            Some(target) if target.width == width && target.height == height => target,
            old => {
                if let Some(old) = old {
                    backend.release_image(old.image);
                }
                let image = backend.allocate_storage_image(width, height, self.format)?;
                self.allocations += 1;
                resized = true;
                info!(
                    "allocated {}x{} accumulation target ({:?})",
                    width, height, self.format
                );
                AccumulationBuffer {
                    image,
                    width,
                    height,
                    format: self.format,
                }
            }
        };

        Ok((self.target.insert(target), resized))
    }

    pub fn release(&mut self, backend: &mut B) {
        if let Some(old) = self.target.take() {
            backend.release_image(old.image);
        }
    }

    pub fn extent(&self) -> Option<[u32; 2]> {
        self.target.as_ref().map(|t| t.extent())
    }

    pub fn allocations(&self) -> u64 {
        self.allocations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;

    // hands out numbered images and remembers which are still live
    #[derive(Default)]
    struct CountingBackend {
        next_id: u32,
        live: Vec<u32>,
        fail_allocation: bool,
    }

    impl RenderBackend for CountingBackend {
        type Image = u32;
        type Texture = ();
        type Surface = ();

        fn allocate_storage_image(
            &mut self,
            _width: u32,
            _height: u32,
            format: ImageFormat,
        ) -> std::result::Result<u32, BackendError> {
            if self.fail_allocation {
                return Err(BackendError::Allocation("out of memory".into()));
            }
            if format != ImageFormat::R32G32B32A32_SFLOAT {
                return Err(BackendError::UnsupportedFormat(format));
            }
            self.next_id += 1;
            self.live.push(self.next_id);
            Ok(self.next_id)
        }

        fn release_image(&mut self, image: u32) {
            self.live.retain(|&id| id != image);
        }
    }

    fn manager() -> FrameTargetManager<CountingBackend> {
        FrameTargetManager::new(ImageFormat::R32G32B32A32_SFLOAT)
    }

    #[test]
    fn test_first_call_allocates() {
        let mut backend = CountingBackend::default();
        let mut targets = manager();
        let (target, resized) = targets.ensure_target(&mut backend, 800, 600).unwrap();
        assert!(resized);
        assert_eq!(target.extent(), [800, 600]);
        assert_eq!(target.format(), ImageFormat::R32G32B32A32_SFLOAT);
        assert_eq!(targets.allocations(), 1);
        assert_eq!(backend.live, vec![1]);
    }

    #[test]
    fn test_same_size_is_idempotent() {
        let mut backend = CountingBackend::default();
        let mut targets = manager();
        targets.ensure_target(&mut backend, 800, 600).unwrap();
        let (target, resized) = targets.ensure_target(&mut backend, 800, 600).unwrap();
        assert!(!resized);
        assert_eq!(*target.image(), 1);
        assert_eq!(targets.allocations(), 1);
    }

    #[test]
    fn test_resize_releases_old_image() {
        let mut backend = CountingBackend::default();
        let mut targets = manager();
        targets.ensure_target(&mut backend, 800, 600).unwrap();
        let (target, resized) = targets.ensure_target(&mut backend, 801, 600).unwrap();
        assert!(resized);
        assert_eq!(target.extent(), [801, 600]);
        assert_eq!(targets.allocations(), 2);
        // exactly one live image at a time
        assert_eq!(backend.live, vec![2]);
    }

    #[test]
    fn test_zero_area_fails_fast() {
        let mut backend = CountingBackend::default();
        let mut targets = manager();
        targets.ensure_target(&mut backend, 800, 600).unwrap();

        let err = targets.ensure_target(&mut backend, 0, 600).err().unwrap();
        assert!(matches!(err, Error::InvalidDimension { width: 0, height: 600 }));
        let err = targets.ensure_target(&mut backend, 800, 0).err().unwrap();
        assert!(matches!(err, Error::InvalidDimension { width: 800, height: 0 }));

        // nothing released, nothing allocated
        assert_eq!(targets.extent(), Some([800, 600]));
        assert_eq!(targets.allocations(), 1);
        assert_eq!(backend.live, vec![1]);
    }

    #[test]
    fn test_failed_allocation_leaves_no_target() {
        let mut backend = CountingBackend::default();
        let mut targets = manager();
        targets.ensure_target(&mut backend, 800, 600).unwrap();

        backend.fail_allocation = true;
        let err = targets.ensure_target(&mut backend, 1024, 768).err().unwrap();
        assert!(matches!(err, Error::RenderBackend(BackendError::Allocation(_))));
        assert_eq!(targets.extent(), None);
        assert!(backend.live.is_empty());

        backend.fail_allocation = false;
        let (_, resized) = targets.ensure_target(&mut backend, 1024, 768).unwrap();
        assert!(resized);
    }

    #[test]
    fn test_unsupported_format() {
        let mut backend = CountingBackend::default();
        let mut targets: FrameTargetManager<CountingBackend> =
            FrameTargetManager::new(ImageFormat::R8G8B8A8_UNORM);
        let err = targets.ensure_target(&mut backend, 8, 8).err().unwrap();
        assert!(matches!(
            err,
            Error::RenderBackend(BackendError::UnsupportedFormat(ImageFormat::R8G8B8A8_UNORM))
        ));
    }

    #[test]
    fn test_release() {
        let mut backend = CountingBackend::default();
        let mut targets = manager();
        targets.ensure_target(&mut backend, 16, 16).unwrap();
        targets.release(&mut backend);
        assert!(backend.live.is_empty());
        assert_eq!(targets.extent(), None);
        let (_, resized) = targets.ensure_target(&mut backend, 16, 16).unwrap();
        assert!(resized);
    }
}
