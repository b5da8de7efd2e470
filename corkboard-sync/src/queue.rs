//! Durable retry queue for failed remote operations.
//!
//! Entries are persisted as one JSON array under a dedicated storage key
//! and survive restarts. Access is whole-queue read-modify-write, which is
//! correct here because the engine is the only writer.

use crate::api_client::NotesRemote;
use corkboard_storage::{keys, KvStore};
use corkboard_types::{now_millis, Note};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Kind of pending remote operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    Upsert,
    Delete,
}

/// A remote operation that could not be completed and awaits replay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub kind: QueueKind,
    pub note_id: String,
    /// Full note payload for upserts; absent for deletes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Note>,
    pub queued_at: i64,
}

/// Durable journal of pending remote operations.
#[derive(Clone)]
pub struct SyncQueue {
    kv: KvStore,
}

impl SyncQueue {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    /// Records a failed upsert, superseding any live upsert entry for the
    /// same note — only the newest intent survives.
    pub fn enqueue_upsert(&self, note: Note) {
        self.enqueue(QueueEntry {
            kind: QueueKind::Upsert,
            note_id: note.id.clone(),
            payload: Some(note),
            queued_at: now_millis(),
        });
    }

    /// Records a failed delete.
    pub fn enqueue_delete(&self, note_id: impl Into<String>) {
        self.enqueue(QueueEntry {
            kind: QueueKind::Delete,
            note_id: note_id.into(),
            payload: None,
            queued_at: now_millis(),
        });
    }

    /// Appends an entry, replacing any existing entry with the same
    /// `(note_id, kind)` pair — last write wins, so rapid edit failures
    /// can't grow the queue without bound.
    pub fn enqueue(&self, entry: QueueEntry) {
        let mut entries = self.load();
        entries.retain(|e| !(e.note_id == entry.note_id && e.kind == entry.kind));
        entries.push(entry);
        self.save(&entries);
    }

    /// Reads the current queue without mutating it.
    pub fn peek_all(&self) -> Vec<QueueEntry> {
        self.load()
    }

    pub fn len(&self) -> usize {
        self.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.load().is_empty()
    }

    /// Empties the queue (successful full drain, or sign-out).
    pub fn clear(&self) {
        if let Err(e) = self.kv.remove(keys::SYNC_QUEUE) {
            warn!("failed to clear sync queue: {e}");
        }
    }

    /// Replays the queue oldest-first against the remote store. Each entry
    /// is attempted independently — one failure never aborts the pass —
    /// and the queue is rewritten to exactly the still-failing subset.
    /// Returns the number of entries still pending.
    pub async fn drain(&self, owner_id: &str, remote: &dyn NotesRemote) -> usize {
        let mut entries = self.load();
        if entries.is_empty() {
            return 0;
        }
        entries.sort_by_key(|e| e.queued_at);
        debug!("draining {} queued sync operations", entries.len());

        let mut failed = Vec::new();
        for entry in entries {
            let result = match (entry.kind, &entry.payload) {
                (QueueKind::Upsert, Some(note)) => remote.upsert(note, owner_id).await,
                // An upsert entry with no payload carries nothing to
                // replay; drop it.
                (QueueKind::Upsert, None) => Ok(()),
                (QueueKind::Delete, _) => remote.delete(&entry.note_id).await,
            };
            if let Err(e) = result {
                warn!("queued {:?} for note {} failed again: {e}", entry.kind, entry.note_id);
                failed.push(entry);
            }
        }

        let remaining = failed.len();
        if failed.is_empty() {
            self.clear();
        } else {
            self.save(&failed);
        }
        remaining
    }

    fn load(&self) -> Vec<QueueEntry> {
        match self.kv.get(keys::SYNC_QUEUE) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("failed to read sync queue: {e}");
                Vec::new()
            }
        }
    }

    fn save(&self, entries: &[QueueEntry]) {
        match serde_json::to_string(entries) {
            Ok(json) => {
                if let Err(e) = self.kv.put(keys::SYNC_QUEUE, &json) {
                    warn!("failed to persist sync queue: {e}");
                }
            }
            Err(e) => warn!("failed to serialize sync queue: {e}"),
        }
    }
}
