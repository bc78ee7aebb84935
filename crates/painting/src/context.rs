//! Per-invocation working images.

use glam::Vec3;
use tracing::debug;

use crate::backend::ComputeBackend;
use crate::error::PaintError;

/// Source and target height images for one paint invocation.
///
/// Both images are released together by [`release`](Self::release) or on
/// drop; a context is never reused across invocations.
pub struct PaintContext<B: ComputeBackend> {
    images: Option<(B::Image, B::Image)>,
    resolution: u32,
    world_position: Vec3,
    world_size: Vec3,
}

impl<B: ComputeBackend> PaintContext<B> {
    /// Allocate both working images for a `resolution × resolution` terrain.
    ///
    /// If the second allocation fails the first is freed before returning.
    pub fn acquire(
        backend: &B,
        resolution: u32,
        world_position: Vec3,
        world_size: Vec3,
    ) -> Result<Self, PaintError> {
        let source = backend.create_height_image(resolution)?;
        let target = backend.create_height_image(resolution)?;
        debug!("PaintContext: acquired {}x{} images on {}", resolution, resolution, backend.name());
        Ok(Self {
            images: Some((source, target)),
            resolution,
            world_position,
            world_size,
        })
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn world_position(&self) -> Vec3 {
        self.world_position
    }

    pub fn world_size(&self) -> Vec3 {
        self.world_size
    }

    pub fn is_acquired(&self) -> bool {
        self.images.is_some()
    }

    /// Source image (read by the kernel)
    pub fn source(&self) -> Option<&B::Image> {
        self.images.as_ref().map(|(source, _)| source)
    }

    pub fn source_mut(&mut self) -> Option<&mut B::Image> {
        self.images.as_mut().map(|(source, _)| source)
    }

    /// Target image (written by the kernel)
    pub fn target(&self) -> Option<&B::Image> {
        self.images.as_ref().map(|(_, target)| target)
    }

    /// Both images at once, for binding
    pub fn images_mut(&mut self) -> Option<(&B::Image, &mut B::Image)> {
        self.images.as_mut().map(|(source, target)| (&*source, target))
    }

    /// Free both images. Safe to call repeatedly.
    pub fn release(&mut self) {
        if self.images.take().is_some() {
            debug!("PaintContext: released {}x{} images", self.resolution, self.resolution);
        }
    }
}

impl<B: ComputeBackend> Drop for PaintContext<B> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;

    #[test]
    fn test_acquire_and_release() {
        let backend = CpuBackend::new();
        let mut ctx = PaintContext::acquire(&backend, 16, Vec3::ZERO, Vec3::splat(10.0)).unwrap();
        assert!(ctx.is_acquired());
        assert_eq!(backend.live_resources(), 2);
        assert_eq!(ctx.source().unwrap().width(), 16);

        ctx.release();
        ctx.release();
        assert!(!ctx.is_acquired());
        assert!(ctx.images_mut().is_none());
        assert_eq!(backend.live_resources(), 0);
    }

    #[test]
    fn test_drop_releases() {
        let backend = CpuBackend::new();
        {
            let _ctx = PaintContext::acquire(&backend, 8, Vec3::ZERO, Vec3::ONE).unwrap();
            assert_eq!(backend.live_resources(), 2);
        }
        assert_eq!(backend.live_resources(), 0);
    }

    #[test]
    fn test_failed_acquire_leaks_nothing() {
        let backend = CpuBackend::new().with_max_image_size(4);
        let result = PaintContext::acquire(&backend, 8, Vec3::ZERO, Vec3::ONE);
        assert!(matches!(result, Err(PaintError::ResourceAllocation(_))));
        assert_eq!(backend.live_resources(), 0);
    }
}
