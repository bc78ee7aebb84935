//! Response curves baked into lookup images.

use serde::{Deserialize, Serialize};

/// Maps a normalized distance in `[0, 1]` to a response in `[0, 1]`.
///
/// Bank blending weights the blend by `1 - curve(s)`, so a curve rising from
/// 0 to 1 blends fully on the path and not at all at the bank edge.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ResponseCurve {
    /// `f(s) = s`
    Linear,
    /// Cubic Hermite with flat end tangents: `3s² - 2s³`
    #[default]
    EaseInOut,
    /// Piecewise-linear through `(s, value)` keys, sorted by `s`.
    /// Outside the keyed range the nearest key's value holds.
    Keyframes(Vec<(f32, f32)>),
}

impl ResponseCurve {
    /// Keyframed curve; keys are sorted by position
    pub fn keyframes(mut keys: Vec<(f32, f32)>) -> Self {
        keys.sort_by(|a, b| a.0.total_cmp(&b.0));
        ResponseCurve::Keyframes(keys)
    }

    /// Evaluate at `s` (clamped to `[0, 1]`)
    pub fn evaluate(&self, s: f32) -> f32 {
        let s = s.clamp(0.0, 1.0);
        match self {
            ResponseCurve::Linear => s,
            ResponseCurve::EaseInOut => s * s * (3.0 - 2.0 * s),
            ResponseCurve::Keyframes(keys) => evaluate_keys(keys, s),
        }
    }

    /// Bake `resolution` evenly spaced samples covering `[0, 1]` inclusive
    pub fn sample(&self, resolution: u32) -> Vec<f32> {
        match resolution {
            0 => Vec::new(),
            1 => vec![self.evaluate(0.0)],
            n => {
                let last = (n - 1) as f32;
                (0..n).map(|i| self.evaluate(i as f32 / last)).collect()
            }
        }
    }
}

fn evaluate_keys(keys: &[(f32, f32)], s: f32) -> f32 {
    let (Some(&first), Some(&last)) = (keys.first(), keys.last()) else {
        return s;
    };
    if s <= first.0 {
        return first.1;
    }
    if s >= last.0 {
        return last.1;
    }

    let idx = keys.partition_point(|&(k, _)| k <= s);
    let (s0, v0) = keys[idx - 1];
    let (s1, v1) = keys[idx];
    let span = s1 - s0;
    if span <= 0.0 {
        return v1;
    }
    v0 + (v1 - v0) * (s - s0) / span
}
