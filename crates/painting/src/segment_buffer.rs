//! Backend buffer holding the current segment list.

use tracing::debug;

use crate::backend::ComputeBackend;
use crate::error::PaintError;
use crate::types::{GpuSegment, Segment};

/// Owns at most one segment buffer on a backend.
///
/// An empty segment list allocates nothing; the kernel then sees a zero
/// segment count and copies its source.
pub struct SegmentBuffer<B: ComputeBackend> {
    buffer: Option<B::Buffer>,
    count: u32,
}

impl<B: ComputeBackend> Default for SegmentBuffer<B> {
    fn default() -> Self {
        Self {
            buffer: None,
            count: 0,
        }
    }
}

impl<B: ComputeBackend> SegmentBuffer<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the buffer contents with `segments`.
    ///
    /// The previous buffer is released first, also when allocation fails.
    pub fn rebuild(&mut self, backend: &B, segments: &[Segment]) -> Result<(), PaintError> {
        self.release();

        if segments.is_empty() {
            debug!("SegmentBuffer: no segments, nothing allocated");
            return Ok(());
        }

        let gpu: Vec<GpuSegment> = segments.iter().map(Segment::to_gpu).collect();
        self.buffer = Some(backend.create_segment_buffer(&gpu)?);
        self.count = gpu.len() as u32;
        debug!("SegmentBuffer: uploaded {} segments to {}", self.count, backend.name());
        Ok(())
    }

    /// Drop the buffer. Safe to call repeatedly.
    pub fn release(&mut self) {
        self.buffer = None;
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn buffer(&self) -> Option<&B::Buffer> {
        self.buffer.as_ref()
    }
}
