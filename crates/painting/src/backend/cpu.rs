//! CPU reference backend.
//!
//! Runs the compositing kernel on the calling thread, one workgroup at a
//! time, with the same bounds checks the WGSL kernel performs. Every buffer
//! and image carries a guard that counts live allocations, which makes leak
//! and release-order checks observable in tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, trace};

use super::{ComputeBackend, KernelBindings};
use crate::composite::composite_cell;
use crate::constants::KERNEL_ENTRY_POINT;
use crate::error::PaintError;
use crate::height_field::HeightField;
use crate::types::{GpuSegment, PaintUniforms};

use terrain_paint_config::DEFAULT_WORKGROUP_SIZE;

/// Signature of a CPU kernel: computes the target value of cell `(x, y)`
pub type CellKernel =
    fn(&PaintUniforms, &[GpuSegment], &[f32], Option<&[f32]>, u32, u32) -> f32;

#[derive(Debug, Default)]
struct AllocationCounters {
    live: AtomicUsize,
    total: AtomicUsize,
}

/// Decrements the live count when the owning resource is dropped
#[derive(Debug)]
struct AllocationGuard {
    counters: Arc<AllocationCounters>,
}

impl AllocationGuard {
    fn new(counters: &Arc<AllocationCounters>) -> Self {
        counters.live.fetch_add(1, Ordering::SeqCst);
        counters.total.fetch_add(1, Ordering::SeqCst);
        Self {
            counters: Arc::clone(counters),
        }
    }
}

impl Drop for AllocationGuard {
    fn drop(&mut self) {
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Segment storage buffer
#[derive(Debug)]
pub struct CpuBuffer {
    segments: Vec<GpuSegment>,
    _guard: AllocationGuard,
}

impl CpuBuffer {
    pub fn segments(&self) -> &[GpuSegment] {
        &self.segments
    }
}

/// Single-channel float image
#[derive(Debug)]
pub struct CpuImage {
    width: u32,
    height: u32,
    texels: Vec<f32>,
    _guard: AllocationGuard,
}

impl CpuImage {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn texels(&self) -> &[f32] {
        &self.texels
    }
}

/// A registered kernel
#[derive(Debug, Clone)]
pub struct CpuKernel {
    entry_point: String,
    workgroup: [u32; 3],
    cell: CellKernel,
}

impl CpuKernel {
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
}

/// Backend that executes kernels on the CPU.
#[derive(Debug)]
pub struct CpuBackend {
    kernels: HashMap<String, (CellKernel, [u32; 3])>,
    /// Largest image edge this backend will allocate (None = unlimited)
    max_image_size: Option<u32>,
    counters: Arc<AllocationCounters>,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuBackend {
    /// Backend with the built-in compositing kernel registered under
    /// [`KERNEL_ENTRY_POINT`]
    pub fn new() -> Self {
        Self::with_workgroup_size(DEFAULT_WORKGROUP_SIZE)
    }

    /// Backend whose built-in kernel uses square `size × size` workgroups
    pub fn with_workgroup_size(size: u32) -> Self {
        let mut backend = Self::empty();
        backend.register_kernel(KERNEL_ENTRY_POINT, composite_cell, [size.max(1), size.max(1), 1]);
        backend
    }

    /// Backend with no kernels registered
    pub fn empty() -> Self {
        Self {
            kernels: HashMap::new(),
            max_image_size: None,
            counters: Arc::new(AllocationCounters::default()),
        }
    }

    /// Register (or replace) a kernel under `entry_point`
    pub fn register_kernel(&mut self, entry_point: &str, cell: CellKernel, workgroup: [u32; 3]) {
        self.kernels.insert(entry_point.to_string(), (cell, workgroup));
    }

    /// Refuse image allocations larger than `size` on either edge
    pub fn with_max_image_size(mut self, size: u32) -> Self {
        self.max_image_size = Some(size);
        self
    }

    /// Number of buffers and images currently alive
    pub fn live_resources(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }

    /// Number of buffers and images ever allocated
    pub fn total_allocations(&self) -> usize {
        self.counters.total.load(Ordering::SeqCst)
    }

    fn allocate_image(&self, width: u32, height: u32, texels: Vec<f32>) -> Result<CpuImage, PaintError> {
        if let Some(max) = self.max_image_size {
            if width > max || height > max {
                return Err(PaintError::ResourceAllocation(format!(
                    "{}x{} image (limit {})",
                    width, height, max
                )));
            }
        }
        trace!("cpu: allocate {}x{} image", width, height);
        Ok(CpuImage {
            width,
            height,
            texels,
            _guard: AllocationGuard::new(&self.counters),
        })
    }
}

impl ComputeBackend for CpuBackend {
    type Buffer = CpuBuffer;
    type Image = CpuImage;
    type Kernel = CpuKernel;

    fn name(&self) -> &str {
        "cpu"
    }

    fn load_kernel(&self, entry_point: &str) -> Result<CpuKernel, PaintError> {
        let (cell, workgroup) = self
            .kernels
            .get(entry_point)
            .copied()
            .ok_or_else(|| PaintError::KernelUnavailable(entry_point.to_string()))?;
        Ok(CpuKernel {
            entry_point: entry_point.to_string(),
            workgroup,
            cell,
        })
    }

    fn workgroup_size(&self, kernel: &CpuKernel) -> [u32; 3] {
        kernel.workgroup
    }

    fn create_segment_buffer(&self, segments: &[GpuSegment]) -> Result<CpuBuffer, PaintError> {
        trace!("cpu: allocate segment buffer ({} segments)", segments.len());
        Ok(CpuBuffer {
            segments: segments.to_vec(),
            _guard: AllocationGuard::new(&self.counters),
        })
    }

    fn create_height_image(&self, resolution: u32) -> Result<CpuImage, PaintError> {
        let texels = vec![0.0; resolution as usize * resolution as usize];
        self.allocate_image(resolution, resolution, texels)
    }

    fn create_curve_image(&self, samples: &[f32]) -> Result<CpuImage, PaintError> {
        self.allocate_image(samples.len() as u32, 1, samples.to_vec())
    }

    fn upload_heights(&self, image: &mut CpuImage, heights: &HeightField) -> Result<(), PaintError> {
        if heights.width() != image.width || heights.height() != image.height {
            return Err(PaintError::ResolutionMismatch {
                expected: image.width,
                actual: heights.width(),
            });
        }
        image.texels.copy_from_slice(heights.as_slice());
        Ok(())
    }

    fn copy_image(&self, source: &CpuImage, target: &mut CpuImage) -> Result<(), PaintError> {
        if source.width != target.width || source.height != target.height {
            return Err(PaintError::ResolutionMismatch {
                expected: target.width,
                actual: source.width,
            });
        }
        target.texels.copy_from_slice(&source.texels);
        Ok(())
    }

    fn download_heights(&self, image: &CpuImage) -> Result<HeightField, PaintError> {
        HeightField::from_vec(image.width, image.height, image.texels.clone())
            .ok_or_else(|| PaintError::Backend("image texel count does not match its size".into()))
    }

    fn dispatch(
        &self,
        kernel: &CpuKernel,
        bindings: KernelBindings<'_, Self>,
        groups: [u32; 3],
    ) -> Result<(), PaintError> {
        let KernelBindings {
            uniforms,
            segments,
            source,
            target,
            bank_curve,
        } = bindings;

        let source = source.ok_or_else(|| PaintError::Backend("source image not bound".into()))?;
        let target = target.ok_or_else(|| PaintError::Backend("target image not bound".into()))?;

        let resolution = uniforms.resolution;
        for size in [source.width, target.width, source.height, target.height] {
            if size != resolution {
                return Err(PaintError::ResolutionMismatch {
                    expected: resolution,
                    actual: size,
                });
            }
        }

        let segments = segments.map(CpuBuffer::segments).unwrap_or(&[]);
        let curve = bank_curve.map(CpuImage::texels);
        let [wx, wy, _] = kernel.workgroup;

        debug!(
            "cpu: dispatch '{}' {:?} groups of {:?} over {}x{} ({} segments)",
            kernel.entry_point, groups, kernel.workgroup, resolution, resolution, uniforms.segment_count
        );

        for gy in 0..groups[1] {
            for gx in 0..groups[0] {
                for ly in 0..wy {
                    for lx in 0..wx {
                        let x = gx * wx + lx;
                        let y = gy * wy + ly;
                        if x >= resolution || y >= resolution {
                            continue;
                        }
                        let value = (kernel.cell)(&uniforms, segments, &source.texels, curve, x, y);
                        target.texels[cell_index(x, y, resolution)] = value;
                    }
                }
            }
        }

        Ok(())
    }
}

/// Row-major texel index, widened before multiplying
fn cell_index(x: u32, y: u32, resolution: u32) -> usize {
    y as usize * resolution as usize + x as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dispatch_groups;

    fn write_index(_: &PaintUniforms, _: &[GpuSegment], _: &[f32], _: Option<&[f32]>, x: u32, y: u32) -> f32 {
        (y * 100 + x) as f32
    }

    #[test]
    fn test_missing_kernel() {
        let backend = CpuBackend::empty();
        let err = backend.load_kernel("cs_main").unwrap_err();
        assert!(matches!(err, PaintError::KernelUnavailable(name) if name == "cs_main"));
    }

    #[test]
    fn test_default_kernel_registered() {
        let backend = CpuBackend::with_workgroup_size(16);
        let kernel = backend.load_kernel(KERNEL_ENTRY_POINT).unwrap();
        assert_eq!(kernel.entry_point(), KERNEL_ENTRY_POINT);
        assert_eq!(backend.workgroup_size(&kernel), [16, 16, 1]);
    }

    #[test]
    fn test_live_resource_tracking() {
        let backend = CpuBackend::new();
        assert_eq!(backend.live_resources(), 0);

        let image = backend.create_height_image(4).unwrap();
        let buffer = backend.create_segment_buffer(&[GpuSegment::default()]).unwrap();
        assert_eq!(backend.live_resources(), 2);

        drop(image);
        assert_eq!(backend.live_resources(), 1);
        drop(buffer);
        assert_eq!(backend.live_resources(), 0);
        assert_eq!(backend.total_allocations(), 2);
    }

    #[test]
    fn test_allocation_limit() {
        let backend = CpuBackend::new().with_max_image_size(64);
        assert!(backend.create_height_image(64).is_ok());
        assert!(matches!(
            backend.create_height_image(65),
            Err(PaintError::ResourceAllocation(_))
        ));
        assert_eq!(backend.live_resources(), 0);
    }

    #[test]
    fn test_upload_copy_download() {
        let backend = CpuBackend::new();
        let heights = HeightField::from_fn(3, 3, |x, y| (x + y) as f32);

        let mut source = backend.create_height_image(3).unwrap();
        let mut target = backend.create_height_image(3).unwrap();
        backend.upload_heights(&mut source, &heights).unwrap();
        backend.copy_image(&source, &mut target).unwrap();

        assert_eq!(backend.download_heights(&target).unwrap(), heights);
    }

    #[test]
    fn test_upload_size_mismatch() {
        let backend = CpuBackend::new();
        let mut image = backend.create_height_image(4).unwrap();
        let heights = HeightField::square(3, 0.0);
        assert!(matches!(
            backend.upload_heights(&mut image, &heights),
            Err(PaintError::ResolutionMismatch { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn test_dispatch_covers_every_cell_once() {
        let mut backend = CpuBackend::empty();
        backend.register_kernel("index", write_index, [4, 4, 1]);
        let kernel = backend.load_kernel("index").unwrap();

        // 10 is not a multiple of 4: edge groups must bounds-check
        let resolution = 10;
        let source = backend.create_height_image(resolution).unwrap();
        let mut target = backend.create_height_image(resolution).unwrap();

        let mut bindings = KernelBindings::new(PaintUniforms {
            resolution,
            ..Default::default()
        });
        bindings.source = Some(&source);
        bindings.target = Some(&mut target);

        let groups = dispatch_groups(resolution, backend.workgroup_size(&kernel));
        backend.dispatch(&kernel, bindings, groups).unwrap();

        let result = backend.download_heights(&target).unwrap();
        for y in 0..resolution {
            for x in 0..resolution {
                assert_eq!(result.get(x, y), Some((y * 100 + x) as f32));
            }
        }
    }

    #[test]
    fn test_dispatch_requires_images() {
        let backend = CpuBackend::new();
        let kernel = backend.load_kernel(KERNEL_ENTRY_POINT).unwrap();
        let bindings = KernelBindings::<CpuBackend>::new(PaintUniforms::default());
        assert!(matches!(
            backend.dispatch(&kernel, bindings, [1, 1, 1]),
            Err(PaintError::Backend(_))
        ));
    }

    #[test]
    fn test_cell_index_does_not_wrap() {
        assert_eq!(cell_index(3, 2, 10), 23);
        assert_eq!(cell_index(65535, 65535, 65536), 65536 * 65536 - 1);
    }
}
