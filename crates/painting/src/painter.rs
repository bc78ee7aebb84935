//! Compositing dispatcher.
//!
//! One [`TerrainPainter::paint`] call binds the brush, the modifiers and the
//! context images to the kernel and runs a single dispatch over the whole
//! terrain. The brush and every modifier are released before returning,
//! whether the dispatch succeeded or not.

use tracing::{debug, warn};

use terrain_paint_config::KernelConfig;

use crate::backend::{ComputeBackend, KernelBindings, dispatch_groups};
use crate::brush::TerrainBrush;
use crate::constants::KERNEL_ENTRY_POINT;
use crate::context::PaintContext;
use crate::error::PaintError;
use crate::modifiers::BrushModifier;
use crate::path::PathSource;
use crate::types::PaintUniforms;

/// Runs the compositing kernel for a brush and its modifiers.
#[derive(Debug, Clone)]
pub struct TerrainPainter {
    entry_point: String,
}

impl Default for TerrainPainter {
    fn default() -> Self {
        Self::new(KERNEL_ENTRY_POINT)
    }
}

impl TerrainPainter {
    pub fn new(entry_point: impl Into<String>) -> Self {
        Self {
            entry_point: entry_point.into(),
        }
    }

    pub fn from_config(config: &KernelConfig) -> Self {
        Self::new(config.entry_point.clone())
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Whether the kernel can be loaded on `backend`
    pub fn kernel_available<B: ComputeBackend>(&self, backend: &B) -> bool {
        backend.load_kernel(&self.entry_point).is_ok()
    }

    /// Composite `ctx`'s source image into its target image.
    ///
    /// The kernel is resolved before anything is built, so a missing kernel
    /// fails with [`PaintError::KernelUnavailable`] without touching the
    /// target.
    pub fn paint<B: ComputeBackend>(
        &self,
        backend: &B,
        ctx: &mut PaintContext<B>,
        brush: &mut dyn TerrainBrush<B>,
        path: &dyn PathSource,
        modifiers: &mut [Box<dyn BrushModifier<B>>],
    ) -> Result<(), PaintError> {
        let kernel = backend.load_kernel(&self.entry_point).inspect_err(|err| {
            warn!("TerrainPainter: {}", err);
        })?;

        let result = Self::run(backend, &kernel, ctx, brush, path, modifiers);

        brush.release();
        for modifier in modifiers.iter_mut() {
            modifier.release();
        }

        result
    }

    fn run<B: ComputeBackend>(
        backend: &B,
        kernel: &B::Kernel,
        ctx: &mut PaintContext<B>,
        brush: &mut dyn TerrainBrush<B>,
        path: &dyn PathSource,
        modifiers: &mut [Box<dyn BrushModifier<B>>],
    ) -> Result<(), PaintError> {
        brush.build_geometry(backend, path)?;
        for modifier in modifiers.iter_mut() {
            modifier.prepare(backend)?;
        }

        let resolution = ctx.resolution();
        let uniforms = PaintUniforms {
            terrain_position: ctx.world_position().extend(0.0).to_array(),
            terrain_size: ctx.world_size().extend(0.0).to_array(),
            resolution,
            ..Default::default()
        };

        let (source, target) = ctx
            .images_mut()
            .ok_or_else(|| PaintError::Backend("paint context was already released".into()))?;

        let mut bindings = KernelBindings::new(uniforms);
        bindings.source = Some(source);
        bindings.target = Some(target);

        let brush: &dyn TerrainBrush<B> = brush;
        brush.bind(&mut bindings);
        for modifier in modifiers.iter() {
            modifier.bind(&mut bindings);
        }

        let groups = dispatch_groups(resolution, backend.workgroup_size(kernel));
        debug!(
            "TerrainPainter: {} segments, {:?} groups on {}",
            bindings.uniforms.segment_count,
            groups,
            backend.name()
        );
        backend.dispatch(kernel, bindings, groups)
    }
}
