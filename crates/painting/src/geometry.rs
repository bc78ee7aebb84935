//! Path sampling: curves to world-space segments with culling boxes.
//!
//! Every curve is sampled at `ceil(length * density)` uniform parameter
//! steps (at least [`MIN_CURVE_STEPS`]) plus its start point. Consecutive
//! samples become [`Segment`]s whose boxes grow by `2 * width` on the
//! horizontal plane; the global rectangle covers all un-expanded endpoints
//! and is the kernel's fast-reject region.

use glam::Vec3;
use tracing::{debug, trace};

use crate::constants::{
    BRUSH_BOUNDS_HEIGHT, BRUSH_BOUNDS_PAD_FACTOR, MIN_CURVE_STEPS, SEGMENT_EXPAND_FACTOR,
};
use crate::path::PathSource;
use crate::types::{GlobalBounds, PaintMode, Segment};

/// Samples closer than this are treated as the same point when closing a polygon
const CLOSE_EPSILON: f32 = 1e-4;

/// Output of a geometry rebuild
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentGeometry {
    /// Segments in curve order, then sample order
    pub segments: Vec<Segment>,
    /// Horizontal rectangle over all segment endpoints
    pub bounds: GlobalBounds,
}

impl SegmentGeometry {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }
}

/// Axis-aligned world box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub center: Vec3,
    pub size: Vec3,
}

impl WorldBounds {
    pub fn min(&self) -> Vec3 {
        self.center - self.size * 0.5
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.size * 0.5
    }
}

/// Number of uniform steps used to sample a curve
pub fn curve_steps(length: f32, density: f32) -> u32 {
    let steps = (length * density).ceil();
    if !steps.is_finite() || steps < MIN_CURVE_STEPS as f32 {
        return MIN_CURVE_STEPS;
    }
    steps as u32
}

/// Sample every curve of `path` in world space.
///
/// Curves with fewer than two control points are skipped.
fn sample_curves(path: &dyn PathSource, density: f32) -> Vec<Vec<Vec3>> {
    let transform = path.local_to_world();
    let mut polylines = Vec::new();

    for (index, curve) in path.curves().into_iter().enumerate() {
        if curve.control_point_count() < 2 {
            trace!("curve {} has fewer than two control points, skipped", index);
            continue;
        }

        let steps = curve_steps(curve.length(), density);
        let mut samples = Vec::with_capacity(steps as usize + 1);
        samples.push(transform.transform_point3(curve.position_at(0.0)));
        for i in 1..=steps {
            let t = i as f32 / steps as f32;
            samples.push(transform.transform_point3(curve.position_at(t)));
        }
        polylines.push(samples);
    }

    polylines
}

/// Convert a path into segments and a global bounding rectangle.
///
/// In [`PaintMode::FillPolygon`] each open curve is closed with one extra
/// segment from its last sample back to its first.
pub fn build_segments(
    path: &dyn PathSource,
    width: f32,
    density: f32,
    mode: PaintMode,
) -> SegmentGeometry {
    let expand = width * SEGMENT_EXPAND_FACTOR;
    let mut geometry = SegmentGeometry::default();

    for samples in sample_curves(path, density) {
        for pair in samples.windows(2) {
            push_segment(&mut geometry, pair[0], pair[1], expand);
        }

        if mode == PaintMode::FillPolygon {
            if let (Some(&first), Some(&last)) = (samples.first(), samples.last()) {
                if first.distance(last) > CLOSE_EPSILON {
                    push_segment(&mut geometry, last, first, expand);
                }
            }
        }
    }

    debug!(
        "build_segments: {} segments, bounds {:?}, mode {:?}",
        geometry.segments.len(),
        geometry.bounds.to_array(),
        mode
    );
    geometry
}

fn push_segment(geometry: &mut SegmentGeometry, p0: Vec3, p1: Vec3, expand: f32) {
    geometry.bounds.include(p0);
    geometry.bounds.include(p1);
    geometry.segments.push(Segment::new(p0, p1, expand));
}

/// Coarse world box around the brush footprint.
///
/// Covers every path sample, grows by `4 * width` on all axes and spans
/// [`BRUSH_BOUNDS_HEIGHT`] vertically to absorb terrain relief. `None` when
/// the path has no sampleable curve.
pub fn brush_world_bounds(path: &dyn PathSource, width: f32, density: f32) -> Option<WorldBounds> {
    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    let mut any = false;

    for samples in sample_curves(path, density) {
        for p in samples {
            min = min.min(p);
            max = max.max(p);
            any = true;
        }
    }

    if !any {
        return None;
    }

    let center = (min + max) * 0.5;
    let mut size = max - min;
    size.y = BRUSH_BOUNDS_HEIGHT;
    Some(WorldBounds {
        center,
        size: size + Vec3::splat(width * BRUSH_BOUNDS_PAD_FACTOR),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SEGMENT_HEIGHT_SENTINEL;
    use crate::path::{BezierCurve, Curve, Polyline, SplinePath};
    use glam::Affine3A;

    fn straight_path() -> SplinePath {
        SplinePath::polyline(vec![Vec3::new(100.0, 0.0, 256.0), Vec3::new(200.0, 0.0, 256.0)])
    }

    #[test]
    fn test_curve_steps_floor() {
        assert_eq!(curve_steps(0.0, 1.0), 2);
        assert_eq!(curve_steps(1.2, 1.0), 2);
        assert_eq!(curve_steps(100.0, 1.0), 100);
        assert_eq!(curve_steps(100.0, 0.5), 50);
        assert_eq!(curve_steps(10.1, 1.0), 11);
        assert_eq!(curve_steps(f32::NAN, 1.0), 2);
    }

    #[test]
    fn test_straight_path_segment_count() {
        let geometry = build_segments(&straight_path(), 5.0, 1.0, PaintMode::StrokePath);
        assert_eq!(geometry.len(), 100);
        assert_eq!(geometry.segments[0].p0, Vec3::new(100.0, 0.0, 256.0));
        assert_eq!(geometry.segments[99].p1, Vec3::new(200.0, 0.0, 256.0));
        assert_eq!(geometry.bounds.to_array(), [100.0, 256.0, 200.0, 256.0]);
    }

    #[test]
    fn test_segments_are_contiguous() {
        let geometry = build_segments(&straight_path(), 5.0, 1.0, PaintMode::StrokePath);
        for pair in geometry.segments.windows(2) {
            assert_eq!(pair[0].p1, pair[1].p0);
        }
    }

    #[test]
    fn test_bounding_box_soundness() {
        let path = SplinePath::new(Affine3A::from_rotation_y(0.7))
            .with_curve(Curve::Bezier(BezierCurve::through_knots(&[
                Vec3::new(0.0, 10.0, 0.0),
                Vec3::new(30.0, -40.0, 12.0),
                Vec3::new(55.0, 80.0, -20.0),
            ])))
            .with_curve(Curve::Polyline(Polyline::new(vec![
                Vec3::new(-10.0, 0.0, -10.0),
                Vec3::new(-30.0, 5.0, 40.0),
            ])));

        let width = 3.0;
        let geometry = build_segments(&path, width, 2.0, PaintMode::StrokePath);
        assert!(!geometry.is_empty());

        let expand = width * SEGMENT_EXPAND_FACTOR;
        for seg in &geometry.segments {
            for p in [seg.p0, seg.p1] {
                assert!(p.x >= seg.bounds_min.x + expand - 1e-3);
                assert!(p.x <= seg.bounds_max.x - expand + 1e-3);
                assert!(p.z >= seg.bounds_min.z + expand - 1e-3);
                assert!(p.z <= seg.bounds_max.z - expand + 1e-3);
                assert!(geometry.bounds.contains_padded(p.x, p.z, 1e-3));
            }
            assert_eq!(seg.bounds_min.y, -SEGMENT_HEIGHT_SENTINEL);
            assert_eq!(seg.bounds_max.y, SEGMENT_HEIGHT_SENTINEL);
            assert!(seg.box_contains(Vec3::new(seg.p0.x, 9_999.0, seg.p0.z)));
        }
    }

    #[test]
    fn test_empty_path_has_no_segments() {
        let empty = SplinePath::default();
        let geometry = build_segments(&empty, 5.0, 1.0, PaintMode::StrokePath);
        assert!(geometry.is_empty());
        assert!(geometry.bounds.is_empty());

        let single = SplinePath::polyline(vec![Vec3::ONE]);
        let geometry = build_segments(&single, 5.0, 1.0, PaintMode::FillPolygon);
        assert!(geometry.is_empty());
    }

    #[test]
    fn test_fill_mode_closes_open_curve() {
        let triangle = SplinePath::polyline(vec![
            Vec3::ZERO,
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 10.0),
        ]);
        let stroke = build_segments(&triangle, 1.0, 1.0, PaintMode::StrokePath);
        let fill = build_segments(&triangle, 1.0, 1.0, PaintMode::FillPolygon);
        assert_eq!(fill.len(), stroke.len() + 1);

        let closing = fill.segments.last().unwrap();
        assert_eq!(closing.p0, Vec3::new(0.0, 0.0, 10.0));
        assert_eq!(closing.p1, Vec3::ZERO);
    }

    #[test]
    fn test_fill_mode_keeps_closed_curve() {
        let square = SplinePath::polyline(vec![
            Vec3::ZERO,
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::ZERO,
        ]);
        let stroke = build_segments(&square, 1.0, 1.0, PaintMode::StrokePath);
        let fill = build_segments(&square, 1.0, 1.0, PaintMode::FillPolygon);
        assert_eq!(fill.len(), stroke.len());
    }

    #[test]
    fn test_brush_world_bounds() {
        let bounds = brush_world_bounds(&straight_path(), 5.0, 1.0).unwrap();
        assert_eq!(bounds.center, Vec3::new(150.0, 0.0, 256.0));
        assert_eq!(bounds.size, Vec3::new(120.0, BRUSH_BOUNDS_HEIGHT + 20.0, 20.0));

        assert!(brush_world_bounds(&SplinePath::default(), 5.0, 1.0).is_none());
    }
}
