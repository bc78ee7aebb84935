//! Undo collaborator interface and an in-memory history.

use tracing::{debug, warn};

use terrain_paint_config::{DEFAULT_MAX_UNDO_LEVELS, UndoConfig};

use crate::events::{EditEvent, EditEvents};
use crate::height_field::{HeightField, HeightRegion};
use crate::terrain::TerrainTarget;

/// Receives a committed paint as a before/after pair.
pub trait UndoSink {
    fn snapshot_for_undo(&mut self, label: &str, before: HeightField, after: HeightField);
}

/// A committed paint
#[derive(Debug, Clone, PartialEq)]
pub struct UndoEntry {
    pub label: String,
    pub before: HeightField,
    pub after: HeightField,
}

/// Stack of committed paints with undo and redo.
///
/// Undo and redo write whole height fields back to the terrain and announce
/// [`EditEvent::UndoPerformed`], which marks a running preview dirty. At most
/// `max_levels` entries are kept; the oldest is dropped first.
#[derive(Debug)]
pub struct UndoHistory {
    undo_stack: Vec<UndoEntry>,
    redo_stack: Vec<UndoEntry>,
    max_levels: usize,
    events: Option<EditEvents>,
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::with_max_levels(DEFAULT_MAX_UNDO_LEVELS)
    }
}

impl UndoHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// History keeping at most `max_levels` entries (floored at 1)
    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels: max_levels.max(1),
            events: None,
        }
    }

    pub fn from_config(config: &UndoConfig) -> Self {
        Self::with_max_levels(config.max_levels)
    }

    /// History that announces undo and redo on `events`
    pub fn with_events(mut self, events: EditEvents) -> Self {
        self.events = Some(events);
        self
    }

    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Most recent undoable entry
    pub fn last(&self) -> Option<&UndoEntry> {
        self.undo_stack.last()
    }

    /// Restore the `before` field of the last entry.
    ///
    /// Returns true if an undo was performed.
    pub fn undo(&mut self, terrain: &mut dyn TerrainTarget) -> bool {
        let Some(entry) = self.undo_stack.pop() else {
            debug!("Undo: no entries available");
            return false;
        };

        debug!("Undoing '{}'", entry.label);
        write_field(terrain, &entry.before);
        self.redo_stack.push(entry);
        self.announce();
        true
    }

    /// Re-apply the `after` field of the last undone entry.
    ///
    /// Returns true if a redo was performed.
    pub fn redo(&mut self, terrain: &mut dyn TerrainTarget) -> bool {
        let Some(entry) = self.redo_stack.pop() else {
            debug!("Redo: no entries available");
            return false;
        };

        debug!("Redoing '{}'", entry.label);
        write_field(terrain, &entry.after);
        self.undo_stack.push(entry);
        self.announce();
        true
    }

    fn announce(&self) {
        if let Some(events) = &self.events {
            events.notify(EditEvent::UndoPerformed);
        }
    }
}

impl UndoSink for UndoHistory {
    fn snapshot_for_undo(&mut self, label: &str, before: HeightField, after: HeightField) {
        debug!("Recorded undo entry '{}'", label);
        self.redo_stack.clear();
        self.undo_stack.push(UndoEntry {
            label: label.to_string(),
            before,
            after,
        });
        if self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
            debug!("Undo history full, dropped the oldest entry");
        }
    }
}

fn write_field(terrain: &mut dyn TerrainTarget, field: &HeightField) {
    let resolution = terrain.resolution();
    if field.width() != resolution || field.height() != resolution {
        warn!(
            "Undo snapshot is {}x{} but terrain is {}x{}, writing the overlap",
            field.width(),
            field.height(),
            resolution,
            resolution
        );
    }
    terrain.set_heights(HeightRegion::full(resolution), field);
}
