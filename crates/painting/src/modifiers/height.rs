//! Constant height offset scaled by brush influence.

use super::BrushModifier;
use crate::backend::{ComputeBackend, KernelBindings};

/// Adds `offset` world units to every cell, weighted by influence
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HeightOffset {
    pub offset: f32,
}

impl HeightOffset {
    pub fn new(offset: f32) -> Self {
        Self { offset }
    }
}

impl<B: ComputeBackend> BrushModifier<B> for HeightOffset {
    fn name(&self) -> &'static str {
        "height_offset"
    }

    fn bind<'a>(&'a self, bindings: &mut KernelBindings<'a, B>) {
        bindings.uniforms.height_offset = self.offset;
    }
}
