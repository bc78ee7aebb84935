//! Preview transaction: non-destructive repainting with apply or cancel.
//!
//! Starting a preview captures a full backup of the terrain. Every repaint
//! composites from that backup and overwrites the live field, so repeated
//! repaints never accumulate. [`apply`](PreviewTransaction::apply) hands
//! the backup and the current field to the undo collaborator;
//! [`cancel`](PreviewTransaction::cancel) writes the backup back.
//!
//! ```text
//! Idle --start--> Previewing(dirty) --tick--> Previewing(clean)
//!                   ^                               |
//!                   +-- mark_dirty / notification --+
//! Previewing(*) --apply/cancel--> Idle
//! ```

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use terrain_paint_config::PreviewConfig;

use crate::constants::APPLY_UNDO_LABEL;
use crate::error::PaintError;
use crate::events::{EditEvent, EditEvents, Subscription};
use crate::height_field::{HeightField, HeightRegion};
use crate::terrain::TerrainTarget;
use crate::undo::UndoSink;

/// Notifications that invalidate the current preview
const PREVIEW_EVENTS: [EditEvent; 2] = [EditEvent::PathChanged, EditEvent::UndoPerformed];

/// Observable preview phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewPhase {
    Idle,
    /// Previewing and the live field reflects the current inputs
    Clean,
    /// Previewing and a repaint is pending
    Dirty,
}

/// State held while a preview is running
#[derive(Debug)]
struct ActivePreview {
    dirty: bool,
    backup: HeightField,
    last_paint: Option<Instant>,
    subscription: Subscription,
}

#[derive(Debug, Default)]
enum PreviewState {
    #[default]
    Idle,
    Previewing(ActivePreview),
}

/// The preview state machine.
#[derive(Debug)]
pub struct PreviewTransaction {
    state: PreviewState,
    min_interval: Duration,
}

impl Default for PreviewTransaction {
    fn default() -> Self {
        Self::from_config(&PreviewConfig::default())
    }
}

impl PreviewTransaction {
    /// Transaction that repaints at most once per `min_interval`
    pub fn new(min_interval: Duration) -> Self {
        Self {
            state: PreviewState::Idle,
            min_interval,
        }
    }

    pub fn from_config(config: &PreviewConfig) -> Self {
        Self::new(Duration::from_millis(config.min_repaint_interval_ms))
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn phase(&self) -> PreviewPhase {
        match &self.state {
            PreviewState::Idle => PreviewPhase::Idle,
            PreviewState::Previewing(active) if active.dirty => PreviewPhase::Dirty,
            PreviewState::Previewing(_) => PreviewPhase::Clean,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, PreviewState::Previewing(_))
    }

    /// Heights captured at start, while previewing
    pub fn backup(&self) -> Option<&HeightField> {
        match &self.state {
            PreviewState::Previewing(active) => Some(&active.backup),
            PreviewState::Idle => None,
        }
    }

    /// Begin previewing on `terrain`.
    ///
    /// Captures the full height field and subscribes to `events`. Fails with
    /// [`PaintError::PreviewActive`] if a preview is already running.
    pub fn start(&mut self, terrain: &dyn TerrainTarget, events: &EditEvents) -> Result<(), PaintError> {
        if self.is_active() {
            warn!("Preview start rejected: a preview is already active");
            return Err(PaintError::PreviewActive);
        }

        let resolution = terrain.resolution();
        let backup = terrain.heights(HeightRegion::full(resolution));
        let subscription = events.subscribe(&PREVIEW_EVENTS);

        self.state = PreviewState::Previewing(ActivePreview {
            dirty: true,
            backup,
            last_paint: None,
            subscription,
        });
        info!("Preview started ({}x{} backup)", resolution, resolution);
        Ok(())
    }

    /// Request a repaint. No-op while idle.
    pub fn mark_dirty(&mut self) {
        if let PreviewState::Previewing(active) = &mut self.state {
            active.dirty = true;
        }
    }

    /// Fold pending notifications into the dirty flag
    pub fn poll_events(&mut self) {
        if let PreviewState::Previewing(active) = &mut self.state {
            if active.subscription.take_pending() {
                debug!("Preview invalidated by an edit notification");
                active.dirty = true;
            }
        }
    }

    /// [`tick_at`](Self::tick_at) with the current time
    pub fn tick<F>(&mut self, terrain: &mut dyn TerrainTarget, repaint: F) -> Result<bool, PaintError>
    where
        F: FnOnce(&HeightField) -> Result<HeightField, PaintError>,
    {
        self.tick_at(Instant::now(), terrain, repaint)
    }

    /// Repaint if dirty and the throttle interval has elapsed.
    ///
    /// `repaint` receives the backup and returns the composited field, which
    /// is written to `terrain` only on success. Returns whether a repaint
    /// happened. A failed repaint leaves the preview dirty and the terrain
    /// untouched; the failure still counts against the throttle.
    pub fn tick_at<F>(
        &mut self,
        now: Instant,
        terrain: &mut dyn TerrainTarget,
        repaint: F,
    ) -> Result<bool, PaintError>
    where
        F: FnOnce(&HeightField) -> Result<HeightField, PaintError>,
    {
        self.poll_events();

        let min_interval = self.min_interval;
        let PreviewState::Previewing(active) = &mut self.state else {
            return Ok(false);
        };
        if !active.dirty {
            return Ok(false);
        }
        if let Some(last) = active.last_paint {
            if now.saturating_duration_since(last) < min_interval {
                return Ok(false);
            }
        }

        active.last_paint = Some(now);
        let painted = repaint(&active.backup).inspect_err(|err| {
            warn!("Preview repaint failed: {}", err);
        })?;

        if painted.width() != active.backup.width() || painted.height() != active.backup.height() {
            return Err(PaintError::ResolutionMismatch {
                expected: active.backup.width(),
                actual: painted.width(),
            });
        }

        terrain.set_heights(HeightRegion::full(painted.width()), &painted);
        active.dirty = false;
        debug!("Preview repainted");
        Ok(true)
    }

    /// Commit the preview.
    ///
    /// Hands the backup and the current field to `undo` and returns to idle.
    /// Returns false (and does nothing) while idle.
    pub fn apply(&mut self, terrain: &dyn TerrainTarget, undo: &mut dyn UndoSink) -> bool {
        let PreviewState::Previewing(active) = std::mem::take(&mut self.state) else {
            return false;
        };

        let current = terrain.heights(HeightRegion::full(terrain.resolution()));
        undo.snapshot_for_undo(APPLY_UNDO_LABEL, active.backup, current);
        info!("Preview applied");
        true
    }

    /// Discard the preview and restore the backup.
    ///
    /// Returns false (and does nothing) while idle.
    pub fn cancel(&mut self, terrain: &mut dyn TerrainTarget) -> bool {
        let PreviewState::Previewing(active) = std::mem::take(&mut self.state) else {
            return false;
        };

        terrain.set_heights(HeightRegion::full(active.backup.width()), &active.backup);
        info!("Preview cancelled, terrain restored");
        true
    }
}
