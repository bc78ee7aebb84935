use thiserror::Error;

/// Errors surfaced by paint invocations and the preview transaction.
///
/// None of these leave the terrain or a preview backup in a partially
/// written state; the height field is only touched after a dispatch
/// completes.
#[derive(Debug, Error)]
pub enum PaintError {
    #[error("Setup incomplete: {0} is not assigned")]
    SetupIncomplete(&'static str),
    #[error("Compute kernel '{0}' not found. Check shader compilation errors.")]
    KernelUnavailable(String),
    #[error("Failed to allocate {0}")]
    ResourceAllocation(String),
    #[error("Height field resolution mismatch: expected {expected}, got {actual}")]
    ResolutionMismatch { expected: u32, actual: u32 },
    #[error("A preview is already active")]
    PreviewActive,
    #[error("Compute backend error: {0}")]
    Backend(String),
}
