//! Playback-related types shared between the store and the UI

use super::types::QueueItem;

/// Read-only view of the playback store, taken once per frame by the UI.
#[derive(Clone, Debug)]
pub struct PlayerSnapshot {
    pub current: Option<QueueItem>,
    pub queue: Vec<QueueItem>,
    pub playing: bool,
    /// Normalized progress, always in `[0, 1]`.
    pub progress: f64,
    /// Whole seconds; 0 means "unknown" and the UI must render the
    /// elapsed/total display as indeterminate.
    pub duration_secs: u64,
    pub open: bool,
    pub has_controller: bool,
    pub expecting_controller: bool,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            current: None,
            queue: Vec::new(),
            playing: false,
            progress: 0.0,
            duration_secs: 0,
            open: false,
            has_controller: false,
            expecting_controller: false,
        }
    }
}

impl PlayerSnapshot {
    /// Elapsed playback position in seconds, derived from the normalized
    /// progress. Zero while the duration is unknown.
    pub fn position_secs(&self) -> f64 {
        self.progress * self.duration_secs as f64
    }
}
