//! Core geometry and GPU-layout types shared by the brush, the backends and the kernel.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::constants::SEGMENT_HEIGHT_SENTINEL;

pub use terrain_paint_config::PaintMode;

/// One straight piece of a sampled path, in world space.
///
/// The box grows by `expand` on X and Z; its vertical extent is always the
/// height sentinel so that terrain relief never excludes a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub p0: Vec3,
    pub p1: Vec3,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
}

impl Segment {
    /// Build a segment and its culling box
    pub fn new(p0: Vec3, p1: Vec3, expand: f32) -> Self {
        let min = p0.min(p1);
        let max = p0.max(p1);
        Self {
            p0,
            p1,
            bounds_min: Vec3::new(min.x - expand, -SEGMENT_HEIGHT_SENTINEL, min.z - expand),
            bounds_max: Vec3::new(max.x + expand, SEGMENT_HEIGHT_SENTINEL, max.z + expand),
        }
    }

    /// Whether a world position lies inside the segment's culling box
    #[inline]
    pub fn box_contains(&self, position: Vec3) -> bool {
        position.cmpge(self.bounds_min).all() && position.cmple(self.bounds_max).all()
    }

    /// GPU representation (four `vec4<f32>`)
    pub fn to_gpu(&self) -> GpuSegment {
        GpuSegment {
            p0: self.p0.extend(0.0).to_array(),
            p1: self.p1.extend(0.0).to_array(),
            bounds_min: self.bounds_min.extend(0.0).to_array(),
            bounds_max: self.bounds_max.extend(0.0).to_array(),
        }
    }
}

/// Segment as laid out in the kernel's storage buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct GpuSegment {
    pub p0: [f32; 4],
    pub p1: [f32; 4],
    pub bounds_min: [f32; 4],
    pub bounds_max: [f32; 4],
}

impl GpuSegment {
    #[inline]
    pub fn p0(&self) -> Vec3 {
        Vec3::new(self.p0[0], self.p0[1], self.p0[2])
    }

    #[inline]
    pub fn p1(&self) -> Vec3 {
        Vec3::new(self.p1[0], self.p1[1], self.p1[2])
    }

    #[inline]
    pub fn bounds_min(&self) -> Vec3 {
        Vec3::new(self.bounds_min[0], self.bounds_min[1], self.bounds_min[2])
    }

    #[inline]
    pub fn bounds_max(&self) -> Vec3 {
        Vec3::new(self.bounds_max[0], self.bounds_max[1], self.bounds_max[2])
    }
}

/// Global horizontal rectangle covering every segment endpoint.
///
/// An empty rectangle is inverted (`min = f32::MAX`, `max = -f32::MAX`) so
/// that every point is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalBounds {
    pub min_x: f32,
    pub min_z: f32,
    pub max_x: f32,
    pub max_z: f32,
}

impl Default for GlobalBounds {
    fn default() -> Self {
        Self::empty()
    }
}

impl GlobalBounds {
    /// Inverted rectangle that contains nothing
    pub fn empty() -> Self {
        Self {
            min_x: f32::MAX,
            min_z: f32::MAX,
            max_x: f32::MIN,
            max_z: f32::MIN,
        }
    }

    /// Whether no point has been added yet
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_z > self.max_z
    }

    /// Grow the rectangle to include a point (Y ignored)
    pub fn include(&mut self, point: Vec3) {
        self.min_x = self.min_x.min(point.x);
        self.min_z = self.min_z.min(point.z);
        self.max_x = self.max_x.max(point.x);
        self.max_z = self.max_z.max(point.z);
    }

    /// Whether `(x, z)` lies within the rectangle grown by `pad`
    #[inline]
    pub fn contains_padded(&self, x: f32, z: f32, pad: f32) -> bool {
        x >= self.min_x - pad && x <= self.max_x + pad && z >= self.min_z - pad && z <= self.max_z + pad
    }

    /// Packed as `(min_x, min_z, max_x, max_z)` for the kernel
    pub fn to_array(&self) -> [f32; 4] {
        [self.min_x, self.min_z, self.max_x, self.max_z]
    }
}

/// Scalar parameters bound to the compositing kernel.
///
/// Layout matches the `PaintUniforms` struct in `shaders/path_brush.wgsl`.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct PaintUniforms {
    pub terrain_position: [f32; 4],
    pub terrain_size: [f32; 4],
    /// `(min_x, min_z, max_x, max_z)`
    pub global_bounds: [f32; 4],
    pub resolution: u32,
    pub segment_count: u32,
    pub paint_mode: u32,
    pub _padding0: u32,
    pub brush_width: f32,
    pub height_offset: f32,
    pub bank_width: f32,
    pub _padding1: f32,
}

impl Default for PaintUniforms {
    fn default() -> Self {
        Self {
            terrain_position: [0.0; 4],
            terrain_size: [0.0; 4],
            global_bounds: GlobalBounds::empty().to_array(),
            resolution: 0,
            segment_count: 0,
            paint_mode: PaintMode::StrokePath.as_gpu(),
            _padding0: 0,
            brush_width: 0.0,
            height_offset: 0.0,
            bank_width: 0.0,
            _padding1: 0.0,
        }
    }
}

impl PaintUniforms {
    #[inline]
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.terrain_position[0], self.terrain_position[1], self.terrain_position[2])
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        Vec3::new(self.terrain_size[0], self.terrain_size[1], self.terrain_size[2])
    }

    pub fn bounds(&self) -> GlobalBounds {
        let [min_x, min_z, max_x, max_z] = self.global_bounds;
        GlobalBounds { min_x, min_z, max_x, max_z }
    }

    pub fn mode(&self) -> PaintMode {
        if self.paint_mode == PaintMode::FillPolygon.as_gpu() {
            PaintMode::FillPolygon
        } else {
            PaintMode::StrokePath
        }
    }
}
