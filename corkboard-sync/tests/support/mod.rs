//! Shared test support: an in-memory, scriptable remote store.

#![allow(dead_code)]

use async_trait::async_trait;
use corkboard_sync::error::{SyncError, SyncResult};
use corkboard_sync::NotesRemote;
use corkboard_types::Note;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// In-memory [`NotesRemote`] with programmable failures and call
/// recording.
#[derive(Default)]
pub struct FakeRemote {
    rows: Mutex<HashMap<String, Note>>,
    fail_note_ids: Mutex<HashSet<String>>,
    fail_all: Mutex<bool>,
    pub upsert_calls: Mutex<Vec<Note>>,
    pub delete_calls: Mutex<Vec<String>>,
    pub batch_calls: Mutex<Vec<Vec<String>>>,
    pub fetch_calls: Mutex<usize>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a row as if it already existed remotely.
    pub fn seed(&self, note: Note) {
        self.rows.lock().unwrap().insert(note.id.clone(), note);
    }

    /// Makes every operation touching this note id fail.
    pub fn fail_note(&self, id: impl Into<String>) {
        self.fail_note_ids.lock().unwrap().insert(id.into());
    }

    pub fn clear_failures(&self) {
        self.fail_note_ids.lock().unwrap().clear();
        *self.fail_all.lock().unwrap() = false;
    }

    /// Makes every operation fail (network down).
    pub fn set_fail_all(&self, fail: bool) {
        *self.fail_all.lock().unwrap() = fail;
    }

    pub fn row(&self, id: &str) -> Option<Note> {
        self.rows.lock().unwrap().get(id).cloned()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn upsert_count(&self) -> usize {
        self.upsert_calls.lock().unwrap().len()
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetch_calls.lock().unwrap()
    }

    fn should_fail(&self, id: &str) -> bool {
        *self.fail_all.lock().unwrap() || self.fail_note_ids.lock().unwrap().contains(id)
    }
}

#[async_trait]
impl NotesRemote for FakeRemote {
    async fn fetch_all(&self, _owner_id: &str) -> SyncResult<Vec<Note>> {
        *self.fetch_calls.lock().unwrap() += 1;
        if *self.fail_all.lock().unwrap() {
            return Err(SyncError::Api("fetch refused".into()));
        }
        let mut notes: Vec<Note> = self.rows.lock().unwrap().values().cloned().collect();
        notes.sort_by_key(|n| n.created_at);
        Ok(notes)
    }

    async fn upsert(&self, note: &Note, _owner_id: &str) -> SyncResult<()> {
        self.upsert_calls.lock().unwrap().push(note.clone());
        if self.should_fail(&note.id) {
            return Err(SyncError::Api(format!("upsert refused for {}", note.id)));
        }
        self.rows.lock().unwrap().insert(note.id.clone(), note.clone());
        Ok(())
    }

    async fn delete(&self, note_id: &str) -> SyncResult<()> {
        self.delete_calls.lock().unwrap().push(note_id.to_owned());
        if self.should_fail(note_id) {
            return Err(SyncError::Api(format!("delete refused for {note_id}")));
        }
        self.rows.lock().unwrap().remove(note_id);
        Ok(())
    }

    async fn batch_upsert(&self, notes: &[Note], _owner_id: &str) -> SyncResult<()> {
        self.batch_calls
            .lock()
            .unwrap()
            .push(notes.iter().map(|n| n.id.clone()).collect());
        if *self.fail_all.lock().unwrap() || notes.iter().any(|n| self.should_fail(&n.id)) {
            return Err(SyncError::Api("batch upsert refused".into()));
        }
        let mut rows = self.rows.lock().unwrap();
        for note in notes {
            rows.insert(note.id.clone(), note.clone());
        }
        Ok(())
    }

    async fn delete_all_for_owner(&self, _owner_id: &str) -> SyncResult<()> {
        if *self.fail_all.lock().unwrap() {
            return Err(SyncError::Api("delete all refused".into()));
        }
        self.rows.lock().unwrap().clear();
        Ok(())
    }
}

/// A note with a specific id and content, for merge scenarios.
pub fn note_with(id: &str, content: &str) -> Note {
    let mut note = Note::new(0.0, 0.0);
    note.id = id.to_owned();
    note.content = content.to_owned();
    note
}
