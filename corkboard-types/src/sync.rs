//! Sync messages exchanged between the local store and the sync engine.

/// A push request emitted by a store mutation. Intents carry note ids, not
/// payloads — the engine looks the note up at fire time so a debounced push
/// always carries the latest state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncIntent {
    /// Push this note now.
    Upsert { note_id: String },
    /// Push this note after the debounce window; later edits for the same
    /// note re-arm the window.
    Edit { note_id: String },
    /// Delete this note remotely now.
    Delete { note_id: String },
    /// Push a set of notes in one batched call.
    Batch { note_ids: Vec<String> },
}

impl SyncIntent {
    pub fn upsert(note_id: impl Into<String>) -> Self {
        SyncIntent::Upsert {
            note_id: note_id.into(),
        }
    }

    pub fn edit(note_id: impl Into<String>) -> Self {
        SyncIntent::Edit {
            note_id: note_id.into(),
        }
    }

    pub fn delete(note_id: impl Into<String>) -> Self {
        SyncIntent::Delete {
            note_id: note_id.into(),
        }
    }
}
