/// Vertical half extent of every segment box. Large enough that terrain relief never culls a segment.
pub const SEGMENT_HEIGHT_SENTINEL: f32 = 100_000.0;

/// Segment boxes grow by this multiple of the brush width on X and Z.
pub const SEGMENT_EXPAND_FACTOR: f32 = 2.0;

/// Minimum samples per curve, regardless of its length.
pub const MIN_CURVE_STEPS: u32 = 2;

/// Vertical size of the brush world bounds.
pub const BRUSH_BOUNDS_HEIGHT: f32 = 10_000.0;

/// Brush world bounds grow by this multiple of the brush width.
pub const BRUSH_BOUNDS_PAD_FACTOR: f32 = 4.0;

/// Undo label used when a preview is committed.
pub const APPLY_UNDO_LABEL: &str = "Apply Terrain Paint";

/// Name of the built-in compositing kernel.
pub use terrain_paint_config::DEFAULT_KERNEL_ENTRY_POINT as KERNEL_ENTRY_POINT;

/// Texels in the bank curve lookup image.
pub use terrain_paint_config::DEFAULT_CURVE_RESOLUTION as CURVE_LOOKUP_RESOLUTION;
