//! Per-cell compositing math.
//!
//! This is the reference implementation of `cs_main` in
//! `shaders/path_brush.wgsl`; the CPU backend calls [`composite_cell`] for
//! every cell. Each cell depends only on the bound inputs, never on its
//! neighbours, so cells can run in any order.

use glam::{Vec2, Vec3};

use crate::types::{GpuSegment, PaintMode, PaintUniforms};

/// Nearest-segment query result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestSegment {
    /// Horizontal distance to the closest point
    pub distance: f32,
    /// Path height at the closest point
    pub height: f32,
}

impl NearestSegment {
    pub const NONE: Self = Self {
        distance: f32::INFINITY,
        height: 0.0,
    };
}

/// World position of a cell. `source` is the normalized height sample.
#[inline]
pub fn cell_world_position(uniforms: &PaintUniforms, x: u32, y: u32, source: f32) -> Vec3 {
    let pos = uniforms.position();
    let size = uniforms.size();
    let span = uniforms.resolution.saturating_sub(1).max(1) as f32;
    Vec3::new(
        pos.x + x as f32 / span * size.x,
        pos.y + source * size.y,
        pos.z + y as f32 / span * size.z,
    )
}

/// Horizontal distance from `point` to the segment, plus the interpolated
/// segment height at the closest point.
#[inline]
pub fn segment_distance_xz(segment: &GpuSegment, point: Vec2) -> NearestSegment {
    let p0 = segment.p0();
    let p1 = segment.p1();
    let a = Vec2::new(p0.x, p0.z);
    let ab = Vec2::new(p1.x, p1.z) - a;

    let len2 = ab.length_squared();
    let t = if len2 > 0.0 {
        ((point - a).dot(ab) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };

    NearestSegment {
        distance: point.distance(a + ab * t),
        height: p0.y + (p1.y - p0.y) * t,
    }
}

/// Closest segment to `world` on the horizontal plane.
///
/// With `cull` set, segments whose box does not contain `world` are skipped.
/// Ties keep the earlier segment.
pub fn nearest_segment(segments: &[GpuSegment], world: Vec3, cull: bool) -> NearestSegment {
    let point = Vec2::new(world.x, world.z);
    let mut best = NearestSegment::NONE;

    for segment in segments {
        if cull {
            let min = segment.bounds_min();
            let max = segment.bounds_max();
            if world.cmplt(min).any() || world.cmpgt(max).any() {
                continue;
            }
        }

        let candidate = segment_distance_xz(segment, point);
        if candidate.distance < best.distance {
            best = candidate;
        }
    }

    best
}

/// Even-odd test of `(x, z)` against the polygon formed by all segments
pub fn point_in_polygon(segments: &[GpuSegment], x: f32, z: f32) -> bool {
    let mut inside = false;
    for segment in segments {
        let (xi, zi) = (segment.p0[0], segment.p0[2]);
        let (xj, zj) = (segment.p1[0], segment.p1[2]);
        if (zi > z) != (zj > z) && x < (xj - xi) * (z - zi) / (zj - zi) + xi {
            inside = !inside;
        }
    }
    inside
}

/// Brush strength in `[0, 1]`: full on the path, zero at `width`
#[inline]
pub fn brush_influence(distance: f32, width: f32) -> f32 {
    if width <= 0.0 {
        return 0.0;
    }
    (1.0 - distance / width).clamp(0.0, 1.0)
}

/// Sample a lookup curve at `s` in `[0, 1]` with linear interpolation between texels
#[inline]
pub fn sample_curve(curve: &[f32], s: f32) -> f32 {
    match curve.len() {
        0 => s.clamp(0.0, 1.0),
        1 => curve[0],
        n => {
            let f = s.clamp(0.0, 1.0) * (n - 1) as f32;
            let i0 = (f.floor() as usize).min(n - 1);
            let i1 = (i0 + 1).min(n - 1);
            let frac = f - i0 as f32;
            curve[i0] + (curve[i1] - curve[i0]) * frac
        }
    }
}

/// Composite one cell and return the value for the target image.
///
/// `source` is the full row-major source image. Cells outside the brush
/// footprint return their source value bit for bit.
pub fn composite_cell(
    uniforms: &PaintUniforms,
    segments: &[GpuSegment],
    source: &[f32],
    bank_curve: Option<&[f32]>,
    x: u32,
    y: u32,
) -> f32 {
    let resolution = uniforms.resolution as usize;
    let src = source[y as usize * resolution + x as usize];

    let world = cell_world_position(uniforms, x, y, src);
    let width = uniforms.brush_width;

    // Fast reject against the global rectangle
    if !uniforms.bounds().contains_padded(world.x, world.z, width) {
        return src;
    }

    let count = (uniforms.segment_count as usize).min(segments.len());
    let segments = &segments[..count];
    let mode = uniforms.mode();

    let nearest = nearest_segment(segments, world, mode == PaintMode::StrokePath);
    let inside = mode == PaintMode::FillPolygon && point_in_polygon(segments, world.x, world.z);
    let distance = if inside { 0.0 } else { nearest.distance };

    let influence = brush_influence(distance, width);
    let size_y = uniforms.terrain_size[1];
    if influence <= 0.0 || size_y <= 0.0 {
        return src;
    }

    // Height offset
    let offset = uniforms.height_offset;
    let mut height = world.y + offset * influence;

    // Bank blend toward the path height
    if let Some(curve) = bank_curve {
        if uniforms.bank_width > 0.0 {
            let s = (distance / uniforms.bank_width).clamp(0.0, 1.0);
            let weight = (1.0 - sample_curve(curve, s)) * influence;
            let target = nearest.height + offset;
            height += (target - height) * weight;
        }
    }

    ((height - uniforms.terrain_position[1]) / size_y).clamp(0.0, 1.0)
}
