//! Terrain path paint tool.
//!
//! Owns the backend, the brush settings, the modifier settings, the target
//! terrain, the path and the preview transaction. Panels call the setters
//! (which mark the preview dirty) and poll [`PaintTool::tick`] once per
//! frame.

use std::time::Instant;

use glam::Vec3;
use tracing::{debug, info, warn};

use terrain_paint_config::PaintConfig;

use crate::backend::{ComputeBackend, CpuBackend};
use crate::brush::{PathBrush, PathBrushSettings, TerrainBrush};
use crate::context::PaintContext;
use crate::error::PaintError;
use crate::events::{EditEvent, EditEvents};
use crate::geometry::WorldBounds;
use crate::height_field::HeightField;
use crate::modifiers::{BankBlend, BrushModifier, HeightOffset, ResponseCurve};
use crate::painter::TerrainPainter;
use crate::path::PathSource;
use crate::preview::{PreviewPhase, PreviewTransaction};
use crate::terrain::{TerrainTarget, find_terrain_under};
use crate::types::PaintMode;
use crate::undo::UndoSink;

/// Bank blend parameters; the lookup image is built per paint
#[derive(Debug, Clone, PartialEq)]
pub struct BankSettings {
    pub width: f32,
    pub curve: ResponseCurve,
    pub resolution: u32,
}

/// Interactive path paint tool.
pub struct PaintTool<B: ComputeBackend> {
    backend: B,
    painter: TerrainPainter,
    brush: PathBrush<B>,
    height_offset: f32,
    bank: BankSettings,
    terrain: Option<Box<dyn TerrainTarget>>,
    path: Option<Box<dyn PathSource>>,
    preview: PreviewTransaction,
    events: EditEvents,
}

impl PaintTool<CpuBackend> {
    /// Tool running on the CPU reference backend
    pub fn with_cpu_backend(config: &PaintConfig) -> Self {
        Self::new(CpuBackend::with_workgroup_size(config.kernel.workgroup_size), config)
    }
}

impl<B: ComputeBackend> PaintTool<B> {
    pub fn new(backend: B, config: &PaintConfig) -> Self {
        debug!("PaintTool: created on {} backend", backend.name());
        Self {
            backend,
            painter: TerrainPainter::from_config(&config.kernel),
            brush: PathBrush::new(PathBrushSettings::from(config.brush.clone())),
            height_offset: config.height_offset,
            bank: BankSettings {
                width: config.bank.width.max(0.0),
                curve: ResponseCurve::default(),
                resolution: config.bank.curve_resolution,
            },
            terrain: None,
            path: None,
            preview: PreviewTransaction::from_config(&config.preview),
            events: EditEvents::new(),
        }
    }

    /// Share a notification hub with the path owner and the undo history
    pub fn with_events(mut self, events: EditEvents) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EditEvents {
        &self.events
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn brush_settings(&self) -> PathBrushSettings {
        self.brush.settings()
    }

    pub fn phase(&self) -> PreviewPhase {
        self.preview.phase()
    }

    pub fn is_previewing(&self) -> bool {
        self.preview.is_active()
    }

    pub fn terrain(&self) -> Option<&dyn TerrainTarget> {
        self.terrain.as_deref()
    }

    pub fn path(&self) -> Option<&dyn PathSource> {
        self.path.as_deref()
    }

    /// Assign the terrain to paint. A running preview is cancelled first.
    pub fn set_terrain(&mut self, terrain: Box<dyn TerrainTarget>) {
        self.cancel_preview();
        self.terrain = Some(terrain);
    }

    /// Release the terrain, cancelling any preview on it
    pub fn take_terrain(&mut self) -> Option<Box<dyn TerrainTarget>> {
        self.cancel_preview();
        self.terrain.take()
    }

    /// Assign the path and announce the change
    pub fn set_path(&mut self, path: Box<dyn PathSource>) {
        self.path = Some(path);
        self.events.notify(EditEvent::PathChanged);
    }

    /// Pick the first candidate whose horizontal footprint contains the
    /// path's anchor point and make it the target terrain.
    ///
    /// The chosen terrain is removed from `candidates`. Returns false when
    /// there is no path or no candidate lies under it.
    pub fn auto_find_terrain(&mut self, candidates: &mut Vec<Box<dyn TerrainTarget>>) -> bool {
        let Some(path) = self.path.as_deref() else {
            return false;
        };
        let anchor = path.anchor_point();
        let Some(index) = find_terrain_under(candidates.iter().map(|t| &**t), anchor) else {
            info!("No terrain found under path anchor {:?}", anchor);
            return false;
        };
        let terrain = candidates.remove(index);
        self.set_terrain(terrain);
        true
    }

    /// Coarse world box the brush can affect
    pub fn brush_world_bounds(&self) -> Option<WorldBounds> {
        self.path.as_deref().and_then(|path| self.brush.world_bounds(path))
    }

    pub fn set_mode(&mut self, mode: PaintMode) {
        self.brush.set_mode(mode);
        self.preview.mark_dirty();
    }

    pub fn set_width(&mut self, width: f32) {
        self.brush.set_width(width);
        self.preview.mark_dirty();
    }

    pub fn set_sampling_density(&mut self, density: f32) {
        self.brush.set_sampling_density(density);
        self.preview.mark_dirty();
    }

    pub fn set_height_offset(&mut self, offset: f32) {
        self.height_offset = offset;
        self.preview.mark_dirty();
    }

    pub fn set_bank_width(&mut self, width: f32) {
        self.bank.width = width.max(0.0);
        self.preview.mark_dirty();
    }

    pub fn set_bank_curve(&mut self, curve: ResponseCurve) {
        self.bank.curve = curve;
        self.preview.mark_dirty();
    }

    /// Request a repaint on the next tick
    pub fn mark_dirty(&mut self) {
        self.preview.mark_dirty();
    }

    /// Start previewing.
    ///
    /// Fails with [`PaintError::SetupIncomplete`] when the terrain, the path
    /// or the kernel is missing, and with [`PaintError::PreviewActive`] when
    /// a preview is already running.
    pub fn start_preview(&mut self) -> Result<(), PaintError> {
        let terrain = self
            .terrain
            .as_deref()
            .ok_or(PaintError::SetupIncomplete("terrain"))?;
        if self.path.is_none() {
            return Err(PaintError::SetupIncomplete("path"));
        }
        if !self.painter.kernel_available(&self.backend) {
            warn!("Kernel '{}' unavailable on {}", self.painter.entry_point(), self.backend.name());
            return Err(PaintError::SetupIncomplete("compute kernel"));
        }
        self.preview.start(terrain, &self.events)
    }

    /// [`start_preview`](Self::start_preview), first picking a terrain from
    /// `candidates` with [`auto_find_terrain`](Self::auto_find_terrain) when
    /// none is assigned.
    pub fn start_preview_with_candidates(
        &mut self,
        candidates: &mut Vec<Box<dyn TerrainTarget>>,
    ) -> Result<(), PaintError> {
        if self.terrain.is_none() && !self.auto_find_terrain(candidates) {
            return Err(PaintError::SetupIncomplete("terrain"));
        }
        self.start_preview()
    }

    /// Repaint the preview if it is dirty and not throttled
    pub fn tick(&mut self) -> Result<bool, PaintError> {
        self.tick_at(Instant::now())
    }

    /// [`tick`](Self::tick) at an explicit time
    pub fn tick_at(&mut self, now: Instant) -> Result<bool, PaintError> {
        let Some(terrain) = self.terrain.as_deref_mut() else {
            return Ok(false);
        };
        let Some(path) = self.path.as_deref() else {
            return Ok(false);
        };

        let resolution = terrain.resolution();
        let position = terrain.world_position();
        let size = terrain.world_size();

        let backend = &self.backend;
        let painter = &self.painter;
        let brush = &mut self.brush;
        let height_offset = self.height_offset;
        let bank = &self.bank;

        self.preview.tick_at(now, terrain, |backup| {
            let mut modifiers: Vec<Box<dyn BrushModifier<B>>> = vec![
                Box::new(HeightOffset::new(height_offset)),
                Box::new(BankBlend::<B>::new(bank.width, bank.curve.clone(), bank.resolution)),
            ];
            composite(
                backend,
                painter,
                brush,
                &mut modifiers,
                path,
                Frame {
                    resolution,
                    position,
                    size,
                },
                backup,
            )
        })
    }

    /// Commit the preview to `undo`. Returns false when not previewing.
    pub fn apply_preview(&mut self, undo: &mut dyn UndoSink) -> bool {
        match self.terrain.as_deref() {
            Some(terrain) => self.preview.apply(terrain, undo),
            None => false,
        }
    }

    /// Restore the terrain and stop previewing. Returns false when not previewing.
    pub fn cancel_preview(&mut self) -> bool {
        match self.terrain.as_deref_mut() {
            Some(terrain) => self.preview.cancel(terrain),
            None => false,
        }
    }
}

impl<B: ComputeBackend> Drop for PaintTool<B> {
    fn drop(&mut self) {
        if self.cancel_preview() {
            debug!("PaintTool: dropped while previewing, preview cancelled");
        }
    }
}

/// Terrain placement for one paint
#[derive(Debug, Clone, Copy)]
struct Frame {
    resolution: u32,
    position: Vec3,
    size: Vec3,
}

fn context_released() -> PaintError {
    PaintError::Backend("paint context was already released".into())
}

/// Paint `backup` through a fresh context and read the result back
fn composite<B: ComputeBackend>(
    backend: &B,
    painter: &TerrainPainter,
    brush: &mut dyn TerrainBrush<B>,
    modifiers: &mut [Box<dyn BrushModifier<B>>],
    path: &dyn PathSource,
    frame: Frame,
    backup: &HeightField,
) -> Result<HeightField, PaintError> {
    let mut ctx = PaintContext::acquire(backend, frame.resolution, frame.position, frame.size)?;

    // Both images start from the backup; cells outside the brush keep it
    let source = ctx.source_mut().ok_or_else(context_released)?;
    backend.upload_heights(source, backup)?;
    let (source, target) = ctx.images_mut().ok_or_else(context_released)?;
    backend.copy_image(source, target)?;

    painter.paint(backend, &mut ctx, brush, path, modifiers)?;

    let target = ctx.target().ok_or_else(context_released)?;
    let painted = backend.download_heights(target)?;
    ctx.release();
    Ok(painted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::height_field::HeightRegion;
    use crate::path::SplinePath;
    use crate::terrain::MemoryTerrain;
    use crate::undo::UndoHistory;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    /// Terrain handle that stays observable after the tool takes ownership
    #[derive(Clone)]
    struct SharedTerrain(Rc<RefCell<MemoryTerrain>>);

    impl SharedTerrain {
        fn new(terrain: MemoryTerrain) -> Self {
            Self(Rc::new(RefCell::new(terrain)))
        }

        fn field(&self) -> HeightField {
            self.0.borrow().height_field().clone()
        }

        fn writes(&self) -> usize {
            self.0.borrow().write_count()
        }
    }

    impl TerrainTarget for SharedTerrain {
        fn resolution(&self) -> u32 {
            self.0.borrow().resolution()
        }

        fn world_position(&self) -> Vec3 {
            self.0.borrow().world_position()
        }

        fn world_size(&self) -> Vec3 {
            self.0.borrow().world_size()
        }

        fn heights(&self, region: HeightRegion) -> HeightField {
            self.0.borrow().heights(region)
        }

        fn set_heights(&mut self, region: HeightRegion, heights: &HeightField) {
            self.0.borrow_mut().set_heights(region, heights);
        }
    }

    fn config() -> PaintConfig {
        let mut config = PaintConfig::default();
        config.height_offset = 10.0;
        config
    }

    /// Flat 513² terrain spanning 512 units, one unit per cell
    fn flat_terrain() -> SharedTerrain {
        SharedTerrain::new(MemoryTerrain::new(513, Vec3::ZERO, Vec3::new(512.0, 600.0, 512.0)))
    }

    /// Small bumpy terrain for transaction tests
    fn bumpy_terrain() -> SharedTerrain {
        let heights = HeightField::from_fn(65, 65, |x, y| ((x * 7 + y * 13) % 17) as f32 / 40.0);
        SharedTerrain::new(
            MemoryTerrain::with_heights(heights, Vec3::new(-32.0, 5.0, -32.0), Vec3::new(64.0, 100.0, 64.0))
                .unwrap(),
        )
    }

    fn road() -> Box<SplinePath> {
        Box::new(SplinePath::polyline(vec![
            Vec3::new(100.0, 0.0, 256.0),
            Vec3::new(200.0, 0.0, 256.0),
        ]))
    }

    fn short_road() -> Box<SplinePath> {
        Box::new(SplinePath::polyline(vec![
            Vec3::new(-20.0, 30.0, 0.0),
            Vec3::new(20.0, 30.0, 4.0),
        ]))
    }

    fn tool_on(terrain: &SharedTerrain, path: Box<SplinePath>) -> PaintTool<CpuBackend> {
        let mut tool = PaintTool::with_cpu_backend(&config());
        tool.set_terrain(Box::new(terrain.clone()));
        tool.set_path(path);
        tool
    }

    #[test]
    fn test_stroke_paint_scenario() {
        let terrain = flat_terrain();
        let mut tool = tool_on(&terrain, road());
        tool.start_preview().unwrap();
        assert!(tool.tick().unwrap());

        let field = terrain.field();
        // Within the brush width of the path: raised
        for (x, y) in [(150, 256), (100, 256), (200, 256), (150, 252), (150, 260), (96, 256), (204, 256)] {
            assert!(field.get(x, y).unwrap() > 0.0, "cell ({}, {}) not raised", x, y);
        }
        // At or beyond the width: exactly flat
        for (x, y) in [(150, 261), (150, 251), (150, 262), (95, 256), (205, 256), (50, 256), (0, 0)] {
            assert_eq!(field.get(x, y), Some(0.0), "cell ({}, {}) was touched", x, y);
        }
    }

    #[test]
    fn test_start_requires_setup() {
        let mut tool = PaintTool::with_cpu_backend(&config());
        assert!(matches!(tool.start_preview(), Err(PaintError::SetupIncomplete("terrain"))));

        let terrain = bumpy_terrain();
        tool.set_terrain(Box::new(terrain.clone()));
        assert!(matches!(tool.start_preview(), Err(PaintError::SetupIncomplete("path"))));

        let mut no_kernel = PaintTool::new(CpuBackend::empty(), &config());
        no_kernel.set_terrain(Box::new(terrain.clone()));
        no_kernel.set_path(short_road());
        assert!(matches!(
            no_kernel.start_preview(),
            Err(PaintError::SetupIncomplete("compute kernel"))
        ));
        assert_eq!(no_kernel.phase(), PreviewPhase::Idle);
        assert_eq!(terrain.writes(), 0);
    }

    #[test]
    fn test_second_start_rejected() {
        let terrain = bumpy_terrain();
        let mut tool = tool_on(&terrain, short_road());
        tool.start_preview().unwrap();
        assert!(matches!(tool.start_preview(), Err(PaintError::PreviewActive)));
        assert!(tool.is_previewing());
    }

    #[test]
    fn test_cancel_after_three_ticks_restores_start() {
        let terrain = bumpy_terrain();
        let start = terrain.field();
        let mut tool = tool_on(&terrain, short_road());
        tool.start_preview().unwrap();

        let t0 = Instant::now();
        for i in 0..3u32 {
            tool.set_height_offset(5.0 * (i + 1) as f32);
            assert!(tool.tick_at(t0 + Duration::from_millis(50 * i as u64)).unwrap());
        }
        assert!(!terrain.field().bit_eq(&start));

        assert!(tool.cancel_preview());
        assert!(terrain.field().bit_eq(&start));

        // Idempotent
        let writes = terrain.writes();
        assert!(!tool.cancel_preview());
        assert_eq!(terrain.writes(), writes);
        assert!(terrain.field().bit_eq(&start));
    }

    #[test]
    fn test_repaint_is_deterministic() {
        let terrain = bumpy_terrain();
        let mut tool = tool_on(&terrain, short_road());
        tool.set_bank_width(6.0);
        tool.start_preview().unwrap();

        let t0 = Instant::now();
        tool.tick_at(t0).unwrap();
        let first = terrain.field();

        tool.mark_dirty();
        assert!(tool.tick_at(t0 + Duration::from_millis(50)).unwrap());
        assert!(terrain.field().bit_eq(&first));
    }

    #[test]
    fn test_tick_throttle_and_path_notification() {
        let terrain = bumpy_terrain();
        let mut tool = tool_on(&terrain, short_road());
        tool.start_preview().unwrap();

        let t0 = Instant::now();
        assert!(tool.tick_at(t0).unwrap());
        assert_eq!(tool.phase(), PreviewPhase::Clean);

        tool.set_path(Box::new(SplinePath::polyline(vec![
            Vec3::new(0.0, 20.0, -20.0),
            Vec3::new(0.0, 20.0, 20.0),
        ])));
        assert!(!tool.tick_at(t0 + Duration::from_millis(10)).unwrap());
        assert_eq!(tool.phase(), PreviewPhase::Dirty);
        assert!(tool.tick_at(t0 + Duration::from_millis(60)).unwrap());
        assert_eq!(tool.phase(), PreviewPhase::Clean);
    }

    #[test]
    fn test_apply_is_final() {
        let terrain = bumpy_terrain();
        let start = terrain.field();
        let mut undo = UndoHistory::new();
        let mut tool = tool_on(&terrain, short_road());
        tool.start_preview().unwrap();
        tool.tick().unwrap();
        let painted = terrain.field();
        assert!(!painted.bit_eq(&start));

        assert!(tool.apply_preview(&mut undo));
        assert!(!tool.is_previewing());
        assert!(!tool.cancel_preview());
        assert!(terrain.field().bit_eq(&painted));

        let entry = undo.last().unwrap();
        assert!(entry.before.bit_eq(&start));
        assert!(entry.after.bit_eq(&painted));

        // Undo through the history restores the start field
        let mut handle = terrain.clone();
        assert!(undo.undo(&mut handle));
        assert!(terrain.field().bit_eq(&start));
    }

    #[test]
    fn test_undo_notification_marks_preview_dirty() {
        let events = EditEvents::new();
        let terrain = bumpy_terrain();
        let mut tool = PaintTool::with_cpu_backend(&config()).with_events(events.clone());
        tool.set_terrain(Box::new(terrain.clone()));
        tool.set_path(short_road());
        tool.start_preview().unwrap();
        tool.tick().unwrap();

        let mut history = UndoHistory::new().with_events(events);
        history.snapshot_for_undo("earlier edit", terrain.field(), terrain.field());
        let mut handle = terrain.clone();
        history.undo(&mut handle);

        tool.tick_at(Instant::now() - Duration::from_secs(1)).unwrap();
        assert_eq!(tool.phase(), PreviewPhase::Dirty);
    }

    #[test]
    fn test_no_resources_outlive_a_tick() {
        let terrain = bumpy_terrain();
        let mut tool = tool_on(&terrain, short_road());
        tool.start_preview().unwrap();
        tool.tick().unwrap();
        assert_eq!(tool.backend().live_resources(), 0);
        // Two images, one segment buffer, one curve lookup
        assert_eq!(tool.backend().total_allocations(), 4);
    }

    #[test]
    fn test_allocation_failure_leaves_terrain() {
        let terrain = bumpy_terrain();
        let start = terrain.field();
        let mut tool = PaintTool::new(CpuBackend::new().with_max_image_size(32), &config());
        tool.set_terrain(Box::new(terrain.clone()));
        tool.set_path(short_road());
        tool.start_preview().unwrap();

        assert!(matches!(tool.tick(), Err(PaintError::ResourceAllocation(_))));
        assert_eq!(tool.phase(), PreviewPhase::Dirty);
        assert!(terrain.field().bit_eq(&start));
        assert_eq!(tool.backend().live_resources(), 0);
    }

    #[test]
    fn test_cancel_without_repaint_restores_start() {
        let terrain = bumpy_terrain();
        let start = terrain.field();
        let mut tool = tool_on(&terrain, short_road());
        tool.start_preview().unwrap();
        assert_eq!(terrain.writes(), 0);

        assert!(tool.cancel_preview());
        assert!(terrain.field().bit_eq(&start));
        assert_eq!(tool.phase(), PreviewPhase::Idle);
    }

    #[test]
    fn test_empty_path_repaint_is_noop() {
        let heights = HeightField::from_fn(33, 33, |x, y| ((x * 5 + y * 3) % 11) as f32 / 12.0);
        let terrain = SharedTerrain::new(
            MemoryTerrain::with_heights(heights, Vec3::new(-16.0, 0.0, -16.0), Vec3::new(32.0, 50.0, 32.0))
                .unwrap(),
        );
        let start = terrain.field();
        let mut tool = tool_on(&terrain, Box::new(SplinePath::new(glam::Affine3A::IDENTITY)));
        tool.start_preview().unwrap();

        assert!(tool.tick().unwrap());
        assert!(terrain.field().bit_eq(&start));
        assert_eq!(tool.backend().live_resources(), 0);
    }

    #[test]
    fn test_start_picks_terrain_from_candidates() {
        let mut tool = PaintTool::with_cpu_backend(&config());
        tool.set_path(road());

        let mut candidates: Vec<Box<dyn TerrainTarget>> = vec![Box::new(bumpy_terrain())];
        assert!(matches!(
            tool.start_preview_with_candidates(&mut candidates),
            Err(PaintError::SetupIncomplete("terrain"))
        ));
        assert_eq!(candidates.len(), 1);

        candidates.push(Box::new(flat_terrain()));
        tool.start_preview_with_candidates(&mut candidates).unwrap();
        assert!(tool.is_previewing());
        assert_eq!(tool.terrain().map(|t| t.resolution()), Some(513));
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_drop_cancels_preview() {
        let terrain = bumpy_terrain();
        let start = terrain.field();
        {
            let mut tool = tool_on(&terrain, short_road());
            tool.start_preview().unwrap();
            tool.tick().unwrap();
            assert!(!terrain.field().bit_eq(&start));
        }
        assert!(terrain.field().bit_eq(&start));
    }

    #[test]
    fn test_auto_find_terrain() {
        let mut tool = PaintTool::with_cpu_backend(&config());
        let mut candidates: Vec<Box<dyn TerrainTarget>> = vec![Box::new(bumpy_terrain())];
        assert!(!tool.auto_find_terrain(&mut candidates));

        tool.set_path(road());
        candidates.push(Box::new(flat_terrain()));
        assert!(tool.auto_find_terrain(&mut candidates));
        assert_eq!(candidates.len(), 1);
        assert_eq!(tool.terrain().map(|t| t.resolution()), Some(513));
    }

    #[test]
    fn test_fill_mode_paints_interior() {
        let terrain = flat_terrain();
        let square = SplinePath::polyline(vec![
            Vec3::new(100.0, 0.0, 100.0),
            Vec3::new(200.0, 0.0, 100.0),
            Vec3::new(200.0, 0.0, 200.0),
            Vec3::new(100.0, 0.0, 200.0),
        ]);
        let mut tool = tool_on(&terrain, Box::new(square));
        tool.set_mode(PaintMode::FillPolygon);
        tool.set_bank_width(0.0);
        tool.start_preview().unwrap();
        tool.tick().unwrap();

        let field = terrain.field();
        let expected = 10.0 / 600.0;
        assert!((field.get(150, 150).unwrap() - expected).abs() < 1e-6);
        assert_eq!(field.get(50, 150), Some(0.0));
        assert_eq!(field.get(300, 300), Some(0.0));
    }
}
