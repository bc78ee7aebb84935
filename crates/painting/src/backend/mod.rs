//! Compute backends that own GPU-side resources and run the compositing kernel.
//!
//! The painting core is written against [`ComputeBackend`]. Resources are
//! plain owned values (`Buffer`, `Image`): dropping one releases it, so the
//! brush, the modifiers and the paint context release deterministically on
//! every exit path, including errors.
//!
//! Two backends ship with the crate:
//! - [`cpu::CpuBackend`] - reference implementation that runs the kernel
//!   cell by cell, workgroup by workgroup. Always available.
//! - `gpu::WgpuBackend` - runs `shaders/path_brush.wgsl` on a GPU device
//!   (feature `gpu`).

pub mod cpu;
#[cfg(feature = "gpu")]
pub mod gpu;

use crate::error::PaintError;
use crate::height_field::HeightField;
use crate::types::{GpuSegment, PaintUniforms};

pub use cpu::CpuBackend;
#[cfg(feature = "gpu")]
pub use gpu::WgpuBackend;

/// A device able to hold height images and segment buffers and to run the
/// compositing kernel over them.
pub trait ComputeBackend: Sized + 'static {
    /// Storage buffer holding [`GpuSegment`]s
    type Buffer: 'static;
    /// Single-channel float image
    type Image: 'static;
    /// A loaded compute entry point
    type Kernel: 'static;

    /// Human-readable backend name for logs
    fn name(&self) -> &str;

    /// Look up a kernel by entry point name.
    ///
    /// Fails with [`PaintError::KernelUnavailable`] when the entry point is
    /// missing or did not compile.
    fn load_kernel(&self, entry_point: &str) -> Result<Self::Kernel, PaintError>;

    /// Workgroup dimensions declared by the kernel
    fn workgroup_size(&self, kernel: &Self::Kernel) -> [u32; 3];

    /// Allocate a buffer and upload `segments` (never called with an empty slice)
    fn create_segment_buffer(&self, segments: &[GpuSegment]) -> Result<Self::Buffer, PaintError>;

    /// Allocate a `resolution × resolution` read/write height image
    fn create_height_image(&self, resolution: u32) -> Result<Self::Image, PaintError>;

    /// Allocate a `samples.len() × 1` lookup image holding `samples`
    fn create_curve_image(&self, samples: &[f32]) -> Result<Self::Image, PaintError>;

    /// Upload CPU heights into an image of the same size
    fn upload_heights(&self, image: &mut Self::Image, heights: &HeightField) -> Result<(), PaintError>;

    /// Copy one image into another of the same size
    fn copy_image(&self, source: &Self::Image, target: &mut Self::Image) -> Result<(), PaintError>;

    /// Read an image back to the CPU
    fn download_heights(&self, image: &Self::Image) -> Result<HeightField, PaintError>;

    /// Run `kernel` over `groups` workgroups with the given bindings.
    ///
    /// Returns once the dispatch has completed.
    fn dispatch(
        &self,
        kernel: &Self::Kernel,
        bindings: KernelBindings<'_, Self>,
        groups: [u32; 3],
    ) -> Result<(), PaintError>;
}

/// Everything bound to the kernel for one dispatch.
///
/// Brushes and modifiers fill their part through `bind`; the painter fills
/// the terrain scalars and the source/target images.
pub struct KernelBindings<'a, B: ComputeBackend> {
    pub uniforms: PaintUniforms,
    /// Segment buffer; `None` when the brush has no segments
    pub segments: Option<&'a B::Buffer>,
    pub source: Option<&'a B::Image>,
    pub target: Option<&'a mut B::Image>,
    /// Bank curve lookup image; `None` disables bank blending
    pub bank_curve: Option<&'a B::Image>,
}

impl<'a, B: ComputeBackend> KernelBindings<'a, B> {
    pub fn new(uniforms: PaintUniforms) -> Self {
        Self {
            uniforms,
            segments: None,
            source: None,
            target: None,
            bank_curve: None,
        }
    }
}

/// Number of workgroups needed to cover `resolution × resolution` cells
pub fn dispatch_groups(resolution: u32, workgroup: [u32; 3]) -> [u32; 3] {
    [
        resolution.div_ceil(workgroup[0].max(1)),
        resolution.div_ceil(workgroup[1].max(1)),
        1,
    ]
}
