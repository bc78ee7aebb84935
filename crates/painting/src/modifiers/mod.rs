//! Brush modifiers: value-transform stages applied after the brush falloff.
//!
//! Each modifier owns its GPU-side state, binds it for a dispatch and
//! releases it afterwards. Modifiers are independent: the kernel applies
//! the height offset first, then the bank blend.

pub mod bank;
pub mod curve;
pub mod height;

use crate::backend::{ComputeBackend, KernelBindings};
use crate::error::PaintError;

pub use bank::BankBlend;
pub use curve::ResponseCurve;
pub use height::HeightOffset;

/// A stage that contributes bindings to the compositing kernel.
pub trait BrushModifier<B: ComputeBackend> {
    fn name(&self) -> &'static str;

    /// Allocate any backend resources needed for the next dispatch
    fn prepare(&mut self, _backend: &B) -> Result<(), PaintError> {
        Ok(())
    }

    fn bind<'a>(&'a self, bindings: &mut KernelBindings<'a, B>);

    /// Free backend resources. Safe to call repeatedly.
    fn release(&mut self) {}
}
