//! Path collaborator interface and the built-in spline path.
//!
//! The painting core only reads paths: it asks each curve for its arc length
//! and for positions at parameters in `[0, 1]`, then moves the samples to
//! world space with the path's transform. [`SplinePath`] is the in-crate
//! implementation used by headless tools and tests; editors can implement
//! [`PathSource`] on their own scene objects instead.

use glam::{Affine3A, Vec3};

/// Samples per Bézier piece when approximating arc length
const BEZIER_LENGTH_SAMPLES: u32 = 16;

/// A single continuous curve in path-local space.
pub trait PathCurve {
    /// Arc length in local units
    fn length(&self) -> f32;

    /// Position at parameter `t` in `[0, 1]` (clamped)
    fn position_at(&self, t: f32) -> Vec3;

    /// Number of authored control points
    fn control_point_count(&self) -> usize;

    /// First authored control point, if any
    fn first_control_point(&self) -> Option<Vec3>;
}

/// An ordered set of curves plus a local-to-world transform.
pub trait PathSource {
    /// Curves in authoring order
    fn curves(&self) -> Vec<&dyn PathCurve>;

    /// Transform applied to every sampled position
    fn local_to_world(&self) -> Affine3A;

    /// World position of the first control point of the first curve, or the
    /// path origin when there is none
    fn anchor_point(&self) -> Vec3 {
        let transform = self.local_to_world();
        let local = self
            .curves()
            .first()
            .and_then(|curve| curve.first_control_point())
            .unwrap_or(Vec3::ZERO);
        transform.transform_point3(local)
    }
}

/// Piecewise-linear curve, parameterized by arc length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polyline {
    points: Vec<Vec3>,
    /// Cumulative length at each point (same length as `points`)
    cumulative: Vec<f32>,
}

impl Polyline {
    pub fn new(points: Vec<Vec3>) -> Self {
        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0;
        for (i, p) in points.iter().enumerate() {
            if i > 0 {
                total += p.distance(points[i - 1]);
            }
            cumulative.push(total);
        }
        Self { points, cumulative }
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }
}

impl PathCurve for Polyline {
    fn length(&self) -> f32 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    fn position_at(&self, t: f32) -> Vec3 {
        let Some(&first) = self.points.first() else {
            return Vec3::ZERO;
        };
        let total = self.length();
        if total <= 0.0 {
            return first;
        }

        let target = t.clamp(0.0, 1.0) * total;
        // First point whose cumulative length reaches the target
        let idx = self.cumulative.partition_point(|&d| d < target);
        if idx == 0 {
            return first;
        }
        if idx >= self.points.len() {
            return self.points[self.points.len() - 1];
        }

        let d0 = self.cumulative[idx - 1];
        let d1 = self.cumulative[idx];
        let span = d1 - d0;
        if span <= 0.0 {
            return self.points[idx];
        }
        self.points[idx - 1].lerp(self.points[idx], (target - d0) / span)
    }

    fn control_point_count(&self) -> usize {
        self.points.len()
    }

    fn first_control_point(&self) -> Option<Vec3> {
        self.points.first().copied()
    }
}

/// Piecewise cubic Bézier curve.
///
/// Control points are laid out as `[k0, out0, in1, k1, out1, in2, k2, ...]`,
/// i.e. `3n + 1` points for `n` pieces. The parameter is uniform per piece.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BezierCurve {
    controls: Vec<Vec3>,
    length: f32,
}

impl BezierCurve {
    /// Build from raw control points. Trailing points that do not complete a
    /// piece are ignored.
    pub fn new(mut controls: Vec<Vec3>) -> Self {
        if controls.len() >= 4 {
            let pieces = (controls.len() - 1) / 3;
            controls.truncate(pieces * 3 + 1);
        }
        let mut curve = Self { controls, length: 0.0 };
        curve.length = curve.approximate_length();
        curve
    }

    /// Smooth curve through `knots`, with Catmull-Rom derived tangents
    pub fn through_knots(knots: &[Vec3]) -> Self {
        if knots.len() < 2 {
            return Self::new(knots.to_vec());
        }

        let mut controls = Vec::with_capacity((knots.len() - 1) * 3 + 1);
        for i in 0..knots.len() - 1 {
            let prev = knots[i.saturating_sub(1)];
            let k0 = knots[i];
            let k1 = knots[i + 1];
            let next = knots[(i + 2).min(knots.len() - 1)];

            if i == 0 {
                controls.push(k0);
            }
            controls.push(k0 + (k1 - prev) / 6.0);
            controls.push(k1 - (next - k0) / 6.0);
            controls.push(k1);
        }
        Self::new(controls)
    }

    fn piece_count(&self) -> usize {
        if self.controls.len() < 4 {
            0
        } else {
            (self.controls.len() - 1) / 3
        }
    }

    fn evaluate_piece(&self, piece: usize, u: f32) -> Vec3 {
        let base = piece * 3;
        let p0 = self.controls[base];
        let p1 = self.controls[base + 1];
        let p2 = self.controls[base + 2];
        let p3 = self.controls[base + 3];

        let v = 1.0 - u;
        p0 * (v * v * v) + p1 * (3.0 * v * v * u) + p2 * (3.0 * v * u * u) + p3 * (u * u * u)
    }

    fn approximate_length(&self) -> f32 {
        let pieces = self.piece_count();
        if pieces == 0 {
            return match self.controls.as_slice() {
                [a, b, ..] => a.distance(*b),
                _ => 0.0,
            };
        }

        let mut total = 0.0;
        for piece in 0..pieces {
            let mut prev = self.evaluate_piece(piece, 0.0);
            for i in 1..=BEZIER_LENGTH_SAMPLES {
                let p = self.evaluate_piece(piece, i as f32 / BEZIER_LENGTH_SAMPLES as f32);
                total += p.distance(prev);
                prev = p;
            }
        }
        total
    }
}

impl PathCurve for BezierCurve {
    fn length(&self) -> f32 {
        self.length
    }

    fn position_at(&self, t: f32) -> Vec3 {
        let t = t.clamp(0.0, 1.0);
        let pieces = self.piece_count();
        if pieces == 0 {
            // Degenerate: straight line between the first two points
            return match self.controls.as_slice() {
                [] => Vec3::ZERO,
                [a] => *a,
                [a, b, ..] => a.lerp(*b, t),
            };
        }

        let scaled = t * pieces as f32;
        let piece = (scaled.floor() as usize).min(pieces - 1);
        self.evaluate_piece(piece, scaled - piece as f32)
    }

    fn control_point_count(&self) -> usize {
        self.controls.len()
    }

    fn first_control_point(&self) -> Option<Vec3> {
        self.controls.first().copied()
    }
}

/// Curve variants stored by [`SplinePath`]
#[derive(Debug, Clone, PartialEq)]
pub enum Curve {
    Polyline(Polyline),
    Bezier(BezierCurve),
}

impl Curve {
    fn as_dyn(&self) -> &dyn PathCurve {
        match self {
            Curve::Polyline(c) => c,
            Curve::Bezier(c) => c,
        }
    }
}

/// In-memory path: a transform and a list of curves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplinePath {
    pub transform: Affine3A,
    pub curves: Vec<Curve>,
}

impl SplinePath {
    pub fn new(transform: Affine3A) -> Self {
        Self {
            transform,
            curves: Vec::new(),
        }
    }

    /// Path with a single straight polyline in world space
    pub fn polyline(points: Vec<Vec3>) -> Self {
        Self {
            transform: Affine3A::IDENTITY,
            curves: vec![Curve::Polyline(Polyline::new(points))],
        }
    }

    /// Append a curve
    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curves.push(curve);
        self
    }
}

impl PathSource for SplinePath {
    fn curves(&self) -> Vec<&dyn PathCurve> {
        self.curves.iter().map(Curve::as_dyn).collect()
    }

    fn local_to_world(&self) -> Affine3A {
        self.transform
    }
}
