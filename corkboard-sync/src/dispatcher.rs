//! Push timing policy.
//!
//! Pure state machine, no I/O: the engine feeds it intents and asks what
//! is due. Immediate actions keep arrival order; content edits hold one
//! deadline per note with cancel-and-replace semantics, so rapid edits
//! within the window collapse into a single push. Actions carry note ids
//! only — the engine looks the payload up at fire time, which is what
//! guarantees a debounced push carries the latest content.

use corkboard_types::SyncIntent;
use std::collections::HashMap;
use tokio::time::{Duration, Instant};

/// A push ready to execute against the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushAction {
    Upsert(String),
    Delete(String),
    Batch(Vec<String>),
}

/// Per-note debounce/coalesce policy.
pub struct SyncDispatcher {
    window: Duration,
    immediate: Vec<PushAction>,
    /// Pending debounce deadline per note id.
    debounced: HashMap<String, Instant>,
}

impl SyncDispatcher {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            immediate: Vec::new(),
            debounced: HashMap::new(),
        }
    }

    /// Files an intent. Immediate intents cancel any pending debounce for
    /// the same note — the immediate push already carries the latest
    /// state, and a delete makes a stale edit meaningless.
    pub fn schedule(&mut self, intent: SyncIntent) {
        match intent {
            SyncIntent::Upsert { note_id } => {
                self.debounced.remove(&note_id);
                self.immediate.push(PushAction::Upsert(note_id));
            }
            SyncIntent::Edit { note_id } => {
                self.debounced.insert(note_id, Instant::now() + self.window);
            }
            SyncIntent::Delete { note_id } => {
                self.debounced.remove(&note_id);
                self.immediate.push(PushAction::Delete(note_id));
            }
            SyncIntent::Batch { note_ids } => {
                for id in &note_ids {
                    self.debounced.remove(id);
                }
                self.immediate.push(PushAction::Batch(note_ids));
            }
        }
    }

    /// Drains every action that is due at `now`: all immediates in arrival
    /// order, then expired debounces (oldest deadline first).
    pub fn take_due(&mut self, now: Instant) -> Vec<PushAction> {
        let mut due = std::mem::take(&mut self.immediate);

        let mut expired: Vec<(String, Instant)> = self
            .debounced
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, deadline)| (id.clone(), *deadline))
            .collect();
        expired.sort_by_key(|(_, deadline)| *deadline);
        for (id, _) in expired {
            self.debounced.remove(&id);
            due.push(PushAction::Upsert(id));
        }

        due
    }

    /// Drains everything, including debounces whose window has not yet
    /// expired. Used for the final flush on shutdown.
    pub fn drain_all(&mut self) -> Vec<PushAction> {
        let horizon = self
            .debounced
            .values()
            .max()
            .copied()
            .unwrap_or_else(Instant::now);
        self.take_due(horizon)
    }

    /// The earliest pending debounce deadline, for the engine's sleep.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounced.values().min().copied()
    }

    pub fn is_idle(&self) -> bool {
        self.immediate.is_empty() && self.debounced.is_empty()
    }

    /// Drops all pending work (sign-out).
    pub fn clear(&mut self) {
        self.immediate.clear();
        self.debounced.clear();
    }
}
