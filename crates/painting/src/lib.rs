//! Non-destructive terrain path painting
//!
//! This crate paints terrain heights along authored paths with a compute
//! kernel and previews the result before committing it:
//! - [`geometry`] - Path sampling into world-space segments with culling boxes
//! - [`segment_buffer`] - Backend buffer holding the current segments
//! - [`brush`] - Path brush (stroke or fill) bound to the kernel
//! - [`modifiers`] - Height offset and bank blend stages
//! - [`composite`] - Per-cell kernel math (CPU reference of `cs_main`)
//! - [`backend`] - Compute backends (CPU, and wgpu with feature `gpu`)
//! - [`context`] - Per-invocation working images
//! - [`painter`] - Compositing dispatcher
//! - [`preview`] - Preview transaction with apply and cancel
//! - [`tool`] - Tool tying terrain, path, brush and preview together

pub mod backend;
pub mod brush;
pub mod composite;
pub mod constants;
pub mod context;
pub mod error;
pub mod events;
pub mod geometry;
pub mod height_field;
pub mod modifiers;
pub mod painter;
pub mod path;
pub mod preview;
pub mod segment_buffer;
pub mod terrain;
pub mod tool;
pub mod types;
pub mod undo;

pub use backend::{ComputeBackend, CpuBackend, KernelBindings};
pub use brush::{PathBrush, PathBrushSettings, TerrainBrush};
pub use constants::*;
pub use context::PaintContext;
pub use error::PaintError;
pub use events::{EditEvent, EditEvents, Subscription};
pub use geometry::{SegmentGeometry, WorldBounds, brush_world_bounds, build_segments};
pub use height_field::{HeightField, HeightRegion};
pub use modifiers::{BankBlend, BrushModifier, HeightOffset, ResponseCurve};
pub use painter::TerrainPainter;
pub use path::{BezierCurve, Curve, PathCurve, PathSource, Polyline, SplinePath};
pub use preview::{PreviewPhase, PreviewTransaction};
pub use segment_buffer::SegmentBuffer;
pub use terrain::{MemoryTerrain, TerrainTarget, find_terrain_under};
pub use tool::{BankSettings, PaintTool};
pub use types::*;
pub use undo::{UndoEntry, UndoHistory, UndoSink};

pub use terrain_paint_config as config;

#[cfg(feature = "gpu")]
pub use backend::WgpuBackend;
