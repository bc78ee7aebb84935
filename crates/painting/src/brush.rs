//! Terrain brushes: turn a path into kernel geometry.
//!
//! A brush rebuilds its segment buffer from the path on every paint, binds
//! the buffer plus its scalars to the kernel, and releases the buffer once
//! the dispatch has finished.

use tracing::debug;

use terrain_paint_config::{BrushConfig, clamp_brush_width, clamp_sampling_density};

use crate::backend::{ComputeBackend, KernelBindings};
use crate::error::PaintError;
use crate::geometry::{WorldBounds, brush_world_bounds, build_segments};
use crate::path::PathSource;
use crate::segment_buffer::SegmentBuffer;
use crate::types::{GlobalBounds, PaintMode};

/// A brush that can be bound to the compositing kernel.
pub trait TerrainBrush<B: ComputeBackend> {
    /// Rebuild GPU geometry from `path`
    fn build_geometry(&mut self, backend: &B, path: &dyn PathSource) -> Result<(), PaintError>;

    /// Bind segments and brush scalars
    fn bind<'a>(&'a self, bindings: &mut KernelBindings<'a, B>);

    /// Free GPU geometry. Safe to call repeatedly.
    fn release(&mut self);

    /// Coarse world box affected by the brush, if the path is sampleable
    fn world_bounds(&self, path: &dyn PathSource) -> Option<WorldBounds>;
}

/// Brush settings, clamped to their legal ranges on construction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathBrushSettings {
    pub mode: PaintMode,
    pub width: f32,
    pub sampling_density: f32,
}

impl PathBrushSettings {
    pub fn new(mode: PaintMode, width: f32, sampling_density: f32) -> Self {
        Self {
            mode,
            width: clamp_brush_width(width),
            sampling_density: clamp_sampling_density(sampling_density),
        }
    }
}

impl Default for PathBrushSettings {
    fn default() -> Self {
        BrushConfig::default().into()
    }
}

impl From<BrushConfig> for PathBrushSettings {
    fn from(config: BrushConfig) -> Self {
        Self::new(config.mode, config.width, config.sampling_density)
    }
}

/// Brush that paints along (or inside) a path.
pub struct PathBrush<B: ComputeBackend> {
    settings: PathBrushSettings,
    segments: SegmentBuffer<B>,
    bounds: GlobalBounds,
}

impl<B: ComputeBackend> PathBrush<B> {
    pub fn new(settings: PathBrushSettings) -> Self {
        Self {
            settings,
            segments: SegmentBuffer::new(),
            bounds: GlobalBounds::empty(),
        }
    }

    pub fn settings(&self) -> PathBrushSettings {
        self.settings
    }

    pub fn set_mode(&mut self, mode: PaintMode) {
        self.settings.mode = mode;
    }

    pub fn set_width(&mut self, width: f32) {
        self.settings.width = clamp_brush_width(width);
    }

    pub fn set_sampling_density(&mut self, density: f32) {
        self.settings.sampling_density = clamp_sampling_density(density);
    }

    /// Segments currently uploaded
    pub fn segment_count(&self) -> u32 {
        self.segments.count()
    }
}

impl<B: ComputeBackend> TerrainBrush<B> for PathBrush<B> {
    fn build_geometry(&mut self, backend: &B, path: &dyn PathSource) -> Result<(), PaintError> {
        let geometry = build_segments(
            path,
            self.settings.width,
            self.settings.sampling_density,
            self.settings.mode,
        );
        self.segments.rebuild(backend, &geometry.segments)?;
        self.bounds = geometry.bounds;
        Ok(())
    }

    fn bind<'a>(&'a self, bindings: &mut KernelBindings<'a, B>) {
        bindings.segments = self.segments.buffer();
        bindings.uniforms.segment_count = self.segments.count();
        bindings.uniforms.global_bounds = self.bounds.to_array();
        bindings.uniforms.brush_width = self.settings.width;
        bindings.uniforms.paint_mode = self.settings.mode.as_gpu();
    }

    fn release(&mut self) {
        if self.segments.count() > 0 {
            debug!("PathBrush: releasing {} segments", self.segments.count());
        }
        self.segments.release();
        self.bounds = GlobalBounds::empty();
    }

    fn world_bounds(&self, path: &dyn PathSource) -> Option<WorldBounds> {
        brush_world_bounds(path, self.settings.width, self.settings.sampling_density)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::path::SplinePath;
    use crate::types::PaintUniforms;
    use glam::Vec3;

    fn path() -> SplinePath {
        SplinePath::polyline(vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(20.0, 0.0, 0.0)])
    }

    #[test]
    fn test_settings_clamped() {
        let settings = PathBrushSettings::new(PaintMode::StrokePath, 0.0, 50.0);
        assert_eq!(settings.width, 0.1);
        assert_eq!(settings.sampling_density, 5.0);

        let mut brush = PathBrush::<CpuBackend>::new(PathBrushSettings::default());
        brush.set_width(-3.0);
        brush.set_sampling_density(0.0);
        assert_eq!(brush.settings().width, 0.1);
        assert_eq!(brush.settings().sampling_density, 0.1);
    }

    #[test]
    fn test_bind_fills_brush_uniforms() {
        let backend = CpuBackend::new();
        let mut brush = PathBrush::new(PathBrushSettings::new(PaintMode::FillPolygon, 3.0, 1.0));
        brush.build_geometry(&backend, &path()).unwrap();

        let mut bindings = KernelBindings::new(PaintUniforms::default());
        brush.bind(&mut bindings);

        // 20 steps plus the closing segment
        assert_eq!(bindings.uniforms.segment_count, 21);
        assert_eq!(bindings.uniforms.brush_width, 3.0);
        assert_eq!(bindings.uniforms.paint_mode, PaintMode::FillPolygon.as_gpu());
        assert_eq!(bindings.uniforms.global_bounds, [0.0, 0.0, 20.0, 0.0]);
        assert!(bindings.segments.is_some());
    }

    #[test]
    fn test_release_frees_segments() {
        let backend = CpuBackend::new();
        let mut brush = PathBrush::new(PathBrushSettings::default());
        brush.build_geometry(&backend, &path()).unwrap();
        assert_eq!(backend.live_resources(), 1);

        brush.release();
        brush.release();
        assert_eq!(brush.segment_count(), 0);
        assert_eq!(backend.live_resources(), 0);

        let mut bindings = KernelBindings::new(PaintUniforms::default());
        brush.bind(&mut bindings);
        assert!(bindings.segments.is_none());
        assert_eq!(bindings.uniforms.segment_count, 0);
    }

    #[test]
    fn test_empty_path_binds_nothing() {
        let backend = CpuBackend::new();
        let mut brush = PathBrush::new(PathBrushSettings::default());
        brush.build_geometry(&backend, &SplinePath::default()).unwrap();
        assert_eq!(brush.segment_count(), 0);
        assert_eq!(backend.live_resources(), 0);
        assert!(brush.world_bounds(&SplinePath::default()).is_none());
    }
}
