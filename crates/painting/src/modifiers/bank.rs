//! Bank blending: pull terrain toward the path height near the path.

use tracing::{debug, trace};

use terrain_paint_config::BankConfig;

use super::BrushModifier;
use super::curve::ResponseCurve;
use crate::backend::{ComputeBackend, KernelBindings};
use crate::error::PaintError;

/// Blends terrain toward the path height within `width` of the path.
///
/// The blend weight at normalized distance `s` is `1 - curve(s)`. The curve
/// is baked into a `resolution × 1` lookup image on [`prepare`], so editing
/// the curve takes effect on the next paint.
///
/// [`prepare`]: BrushModifier::prepare
pub struct BankBlend<B: ComputeBackend> {
    /// Falloff distance in world units; 0 disables the stage
    pub width: f32,
    pub curve: ResponseCurve,
    resolution: u32,
    lookup: Option<B::Image>,
}

impl<B: ComputeBackend> BankBlend<B> {
    pub fn new(width: f32, curve: ResponseCurve, resolution: u32) -> Self {
        Self {
            width: width.max(0.0),
            curve,
            resolution: resolution.max(2),
            lookup: None,
        }
    }

    pub fn from_config(config: &BankConfig) -> Self {
        Self::new(config.width, ResponseCurve::default(), config.curve_resolution)
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Whether a lookup image is currently allocated
    pub fn is_prepared(&self) -> bool {
        self.lookup.is_some()
    }
}

impl<B: ComputeBackend> BrushModifier<B> for BankBlend<B> {
    fn name(&self) -> &'static str {
        "bank_blend"
    }

    fn prepare(&mut self, backend: &B) -> Result<(), PaintError> {
        self.lookup = None;
        let samples = self.curve.sample(self.resolution);
        self.lookup = Some(backend.create_curve_image(&samples)?);
        trace!("BankBlend: baked {} curve samples", samples.len());
        Ok(())
    }

    fn bind<'a>(&'a self, bindings: &mut KernelBindings<'a, B>) {
        bindings.uniforms.bank_width = self.width;
        bindings.bank_curve = self.lookup.as_ref();
    }

    fn release(&mut self) {
        if self.lookup.take().is_some() {
            debug!("BankBlend: released curve lookup");
        }
    }
}
