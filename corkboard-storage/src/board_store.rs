//! The authoritative in-process board state.
//!
//! Every mutation applies in memory, persists the full note collection to
//! the key-value store synchronously, and then emits a [`SyncIntent`]
//! toward the sync engine (when one is attached). Persistence failures are
//! logged and never propagate — local state is the source of truth and a
//! mutation never fails because the disk did.
//!
//! The store is a cloneable handle over shared state; the mutex preserves
//! the single-writer invariant when the engine reads notes at push time.

use crate::error::{StorageError, StorageResult};
use crate::kv_store::{keys, KvStore};
use crate::layout::layout_positions;
use corkboard_types::note::{MIN_NOTE_HEIGHT, MIN_NOTE_WIDTH};
use corkboard_types::{
    now_millis, BoardSettings, LayoutMode, Note, NotePatch, SyncIntent, Viewport, MAX_PINNED_NOTES,
};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

/// How long the pin-limit notice stays raised after a refused pin.
const PIN_NOTICE_DURATION: Duration = Duration::from_secs(3);

/// Offset applied to duplicated notes, in canvas space.
const DUPLICATE_OFFSET: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UndoKind {
    Archived,
    Deleted,
}

struct UndoEntry {
    note: Note,
    index: usize,
    kind: UndoKind,
}

struct BoardState {
    notes: Vec<Note>,
    viewport: Viewport,
    view_size: (f64, f64),
    settings: BoardSettings,
    undo_stack: Vec<UndoEntry>,
    search_query: String,
    selected: Option<String>,
    editing: Option<String>,
    pin_notice_at: Option<Instant>,
    intents: Option<UnboundedSender<SyncIntent>>,
}

/// Cloneable handle to the board state.
#[derive(Clone)]
pub struct BoardStore {
    kv: KvStore,
    inner: Arc<Mutex<BoardState>>,
}

impl BoardStore {
    /// Opens the store, loading any persisted notes, viewport, and
    /// settings. Unparseable persisted data falls back to defaults rather
    /// than failing the open.
    pub fn open(kv: KvStore) -> StorageResult<Self> {
        let notes = match kv.get(keys::NOTES)? {
            Some(raw) => serde_json::from_str::<Vec<serde_json::Value>>(&raw)
                .map(|values| values.iter().map(Note::from_value).collect())
                .unwrap_or_default(),
            None => Vec::new(),
        };
        let viewport = kv
            .get(keys::VIEWPORT)?
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        let settings = kv
            .get(keys::SETTINGS)?
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();

        Ok(Self {
            kv,
            inner: Arc::new(Mutex::new(BoardState {
                notes,
                viewport,
                view_size: (1280.0, 800.0),
                settings,
                undo_stack: Vec::new(),
                search_query: String::new(),
                selected: None,
                editing: None,
                pin_notice_at: None,
                intents: None,
            })),
        })
    }

    /// Attaches the channel mutations emit sync intents on.
    pub fn attach_sync(&self, tx: UnboundedSender<SyncIntent>) {
        self.inner.lock().unwrap().intents = Some(tx);
    }

    // ── Accessors ──

    pub fn notes(&self) -> Vec<Note> {
        self.inner.lock().unwrap().notes.clone()
    }

    pub fn note(&self, id: &str) -> Option<Note> {
        let state = self.inner.lock().unwrap();
        state.notes.iter().find(|n| n.id == id).cloned()
    }

    /// Notes currently on the board (not archived).
    pub fn active_notes(&self) -> Vec<Note> {
        let state = self.inner.lock().unwrap();
        state.notes.iter().filter(|n| !n.archived).cloned().collect()
    }

    pub fn archived_notes(&self) -> Vec<Note> {
        let state = self.inner.lock().unwrap();
        state.notes.iter().filter(|n| n.archived).cloned().collect()
    }

    pub fn pinned_count(&self) -> usize {
        let state = self.inner.lock().unwrap();
        state.notes.iter().filter(|n| n.pinned && !n.archived).count()
    }

    pub fn viewport(&self) -> Viewport {
        self.inner.lock().unwrap().viewport
    }

    pub fn settings(&self) -> BoardSettings {
        self.inner.lock().unwrap().settings
    }

    pub fn search_query(&self) -> String {
        self.inner.lock().unwrap().search_query.clone()
    }

    pub fn selected(&self) -> Option<String> {
        self.inner.lock().unwrap().selected.clone()
    }

    pub fn editing(&self) -> Option<String> {
        self.inner.lock().unwrap().editing.clone()
    }

    pub fn undo_depth(&self) -> usize {
        self.inner.lock().unwrap().undo_stack.len()
    }

    /// True while the pin-limit notice is raised (refused pin within the
    /// last few seconds).
    pub fn pin_limit_notice(&self) -> bool {
        let state = self.inner.lock().unwrap();
        state
            .pin_notice_at
            .is_some_and(|at| at.elapsed() < PIN_NOTICE_DURATION)
    }

    // ── Mutations ──

    /// Creates a note with defaults at the given canvas position, or at a
    /// smart placement derived from the last note and the viewport.
    /// Returns the new note's id.
    pub fn add_note(&self, at: Option<(f64, f64)>) -> String {
        let mut state = self.inner.lock().unwrap();
        let (x, y) = at.unwrap_or_else(|| {
            smart_position(&state.notes, &state.viewport, state.view_size)
        });
        let note = Note::new(x, y);
        let id = note.id.clone();
        state.notes.push(note);
        state.selected = Some(id.clone());
        state.editing = Some(id.clone());
        self.persist_notes(&state);
        self.emit(&state, SyncIntent::upsert(&id));
        id
    }

    /// Merges patch fields into the note and bumps `updated_at`. Content
    /// edits schedule a debounced push; any other field change pushes
    /// immediately.
    pub fn update_note(&self, id: &str, patch: NotePatch) {
        if patch.is_empty() {
            return;
        }
        let mut state = self.inner.lock().unwrap();
        let Some(note) = state.notes.iter_mut().find(|n| n.id == id) else {
            return;
        };
        let content_only = patch.is_content_only();
        if let Some(content) = patch.content {
            note.content = content;
        }
        if let Some(color) = patch.color {
            note.color = color;
        }
        if let Some(x) = patch.x {
            note.x = x;
        }
        if let Some(y) = patch.y {
            note.y = y;
        }
        if let Some(width) = patch.width {
            note.width = width.max(MIN_NOTE_WIDTH);
        }
        if let Some(height) = patch.height {
            note.height = height.max(MIN_NOTE_HEIGHT);
        }
        note.updated_at = now_millis();
        self.persist_notes(&state);
        let intent = if content_only {
            SyncIntent::edit(id)
        } else {
            SyncIntent::upsert(id)
        };
        self.emit(&state, intent);
    }

    /// Archives a note (soft delete): sets the archived flags, forcibly
    /// unpins, and records an undo entry.
    pub fn delete_note(&self, id: &str) {
        let mut state = self.inner.lock().unwrap();
        let Some(index) = state.notes.iter().position(|n| n.id == id) else {
            return;
        };
        let snapshot = state.notes[index].clone();
        {
            let note = &mut state.notes[index];
            note.archived = true;
            note.archived_at = Some(now_millis());
            note.pinned = false;
            note.updated_at = now_millis();
        }
        state.undo_stack.push(UndoEntry {
            note: snapshot,
            index,
            kind: UndoKind::Archived,
        });
        clear_selection_of(&mut state, id);
        self.persist_notes(&state);
        self.emit(&state, SyncIntent::upsert(id));
    }

    /// Reverts the most recent archive or permanent delete. Returns the
    /// restored note, or `None` when the undo stack is empty.
    pub fn undo_delete(&self) -> Option<Note> {
        let mut state = self.inner.lock().unwrap();
        let entry = state.undo_stack.pop()?;
        let restored = match entry.kind {
            UndoKind::Archived => {
                match state.notes.iter_mut().find(|n| n.id == entry.note.id) {
                    Some(note) => {
                        note.archived = false;
                        note.archived_at = None;
                        note.updated_at = now_millis();
                        note.clone()
                    }
                    // The archived copy is gone (e.g. archive was cleared);
                    // fall back to re-inserting the snapshot.
                    None => {
                        let mut note = entry.note;
                        note.archived = false;
                        note.archived_at = None;
                        note.updated_at = now_millis();
                        let index = entry.index.min(state.notes.len());
                        state.notes.insert(index, note.clone());
                        note
                    }
                }
            }
            UndoKind::Deleted => {
                let note = entry.note;
                let index = entry.index.min(state.notes.len());
                state.notes.insert(index, note.clone());
                note
            }
        };
        self.persist_notes(&state);
        self.emit(&state, SyncIntent::upsert(&restored.id));
        Some(restored)
    }

    /// Pins or unpins a note, converting its position between canvas and
    /// viewport space. Pinning past the cap refuses, raises the transient
    /// pin-limit notice, and leaves the pin set unchanged.
    pub fn toggle_pin(&self, id: &str) -> StorageResult<()> {
        let mut state = self.inner.lock().unwrap();
        let viewport = state.viewport;
        let Some(index) = state.notes.iter().position(|n| n.id == id) else {
            return Err(StorageError::NoteNotFound(id.to_owned()));
        };
        if state.notes[index].archived {
            return Ok(());
        }
        if !state.notes[index].pinned {
            let pinned = state.notes.iter().filter(|n| n.pinned && !n.archived).count();
            if pinned >= MAX_PINNED_NOTES {
                state.pin_notice_at = Some(Instant::now());
                return Err(StorageError::PinLimit {
                    max: MAX_PINNED_NOTES,
                });
            }
            let note = &mut state.notes[index];
            let (sx, sy) = viewport.to_screen(note.x, note.y);
            note.pinned = true;
            note.x = sx;
            note.y = sy;
            note.updated_at = now_millis();
        } else {
            let note = &mut state.notes[index];
            let (cx, cy) = viewport.to_canvas(note.x, note.y);
            note.pinned = false;
            note.x = cx;
            note.y = cy;
            note.updated_at = now_millis();
        }
        self.persist_notes(&state);
        self.emit(&state, SyncIntent::upsert(id));
        Ok(())
    }

    /// Removes a note from the collection entirely and records an undo
    /// entry. The remote copy is deleted, not upserted.
    pub fn permanently_delete(&self, id: &str) {
        let mut state = self.inner.lock().unwrap();
        let Some(index) = state.notes.iter().position(|n| n.id == id) else {
            return;
        };
        let note = state.notes.remove(index);
        state.undo_stack.push(UndoEntry {
            note,
            index,
            kind: UndoKind::Deleted,
        });
        clear_selection_of(&mut state, id);
        self.persist_notes(&state);
        self.emit(&state, SyncIntent::delete(id));
    }

    /// Removes every archived note in one batch, issuing one remote delete
    /// per removed id.
    pub fn clear_archive(&self) {
        let mut state = self.inner.lock().unwrap();
        let removed: Vec<String> = state
            .notes
            .iter()
            .filter(|n| n.archived)
            .map(|n| n.id.clone())
            .collect();
        if removed.is_empty() {
            return;
        }
        state.notes.retain(|n| !n.archived);
        self.persist_notes(&state);
        for id in removed {
            self.emit(&state, SyncIntent::delete(id));
        }
    }

    /// Un-archives a note in place (archive panel path).
    pub fn restore_note(&self, id: &str) {
        let mut state = self.inner.lock().unwrap();
        let Some(note) = state.notes.iter_mut().find(|n| n.id == id) else {
            return;
        };
        note.archived = false;
        note.archived_at = None;
        note.updated_at = now_millis();
        self.persist_notes(&state);
        self.emit(&state, SyncIntent::upsert(id));
    }

    /// Advances the note's color tag to the next in the fixed cycle.
    pub fn cycle_color(&self, id: &str) {
        let mut state = self.inner.lock().unwrap();
        let Some(note) = state.notes.iter_mut().find(|n| n.id == id) else {
            return;
        };
        note.color = note.color.next();
        note.updated_at = now_millis();
        self.persist_notes(&state);
        self.emit(&state, SyncIntent::upsert(id));
    }

    pub fn move_note(&self, id: &str, x: f64, y: f64) {
        self.update_note(
            id,
            NotePatch {
                x: Some(x),
                y: Some(y),
                ..NotePatch::default()
            },
        );
    }

    pub fn resize_note(&self, id: &str, width: f64, height: f64) {
        self.update_note(
            id,
            NotePatch {
                width: Some(width),
                height: Some(height),
                ..NotePatch::default()
            },
        );
    }

    /// Clones a non-archived note with a new id at a +30/+30 canvas-space
    /// offset (converting from viewport space first when the source is
    /// pinned). Returns the new id, or `None` when the source is missing
    /// or archived.
    pub fn duplicate_note(&self, id: &str) -> Option<String> {
        let mut state = self.inner.lock().unwrap();
        let viewport = state.viewport;
        let source = state.notes.iter().find(|n| n.id == id)?;
        if source.archived {
            return None;
        }
        let (base_x, base_y) = if source.pinned {
            viewport.to_canvas(source.x, source.y)
        } else {
            (source.x, source.y)
        };
        let now = now_millis();
        let mut clone = source.clone();
        clone.id = corkboard_types::note::new_note_id();
        clone.x = base_x + DUPLICATE_OFFSET;
        clone.y = base_y + DUPLICATE_OFFSET;
        clone.pinned = false;
        clone.created_at = now;
        clone.updated_at = now;
        let new_id = clone.id.clone();
        state.notes.push(clone);
        state.selected = Some(new_id.clone());
        state.editing = None;
        self.persist_notes(&state);
        self.emit(&state, SyncIntent::upsert(&new_id));
        Some(new_id)
    }

    /// Repositions all non-archived, non-pinned notes per the layout mode
    /// and batch-pushes them. `Freeform` is a no-op.
    pub fn rearrange_notes(&self, mode: LayoutMode) {
        let mut state = self.inner.lock().unwrap();
        let viewport = state.viewport;
        let (view_w, view_h) = state.view_size;
        let count = state
            .notes
            .iter()
            .filter(|n| !n.archived && !n.pinned)
            .count();
        let positions = layout_positions(mode, count, &viewport, view_w, view_h);
        if positions.is_empty() {
            return;
        }
        let now = now_millis();
        let mut ids = Vec::with_capacity(count);
        let mut slots = positions.into_iter();
        for note in state.notes.iter_mut().filter(|n| !n.archived && !n.pinned) {
            if let Some((x, y)) = slots.next() {
                note.x = x;
                note.y = y;
                note.updated_at = now;
                ids.push(note.id.clone());
            }
        }
        self.persist_notes(&state);
        self.emit(&state, SyncIntent::Batch { note_ids: ids });
    }

    // ── Export / import / bulk replace ──

    /// Serializes the full collection as pretty JSON.
    pub fn export_notes(&self) -> String {
        let state = self.inner.lock().unwrap();
        match serde_json::to_string_pretty(&state.notes) {
            Ok(json) => json,
            Err(e) => {
                warn!("note export failed: {e}");
                "[]".to_owned()
            }
        }
    }

    /// Replaces the collection with the parsed snapshot, running each
    /// entry through the defensive field migration, and batch-pushes every
    /// imported note. Malformed input returns `false` and leaves the
    /// collection untouched.
    pub fn import_notes(&self, json: &str) -> bool {
        let Ok(parsed) = serde_json::from_str::<serde_json::Value>(json) else {
            return false;
        };
        let Some(entries) = parsed.as_array() else {
            return false;
        };
        let migrated: Vec<Note> = entries.iter().map(Note::from_value).collect();
        let mut state = self.inner.lock().unwrap();
        state.notes = migrated;
        state.undo_stack.clear();
        state.selected = None;
        state.editing = None;
        self.persist_notes(&state);
        let ids: Vec<String> = state.notes.iter().map(|n| n.id.clone()).collect();
        if !ids.is_empty() {
            self.emit(&state, SyncIntent::Batch { note_ids: ids });
        }
        true
    }

    /// Silent bulk replace used by the session reconciler: the new
    /// collection *is* the result of a sync, so no pushes are emitted. The
    /// undo stack is cleared.
    pub fn set_notes_directly(&self, notes: Vec<Note>) {
        let mut state = self.inner.lock().unwrap();
        state.notes = notes;
        state.undo_stack.clear();
        self.persist_notes(&state);
    }

    /// Empties the board: notes, undo stack, selection, and search. Used
    /// on sign-out; emits nothing.
    pub fn clear_all(&self) {
        let mut state = self.inner.lock().unwrap();
        state.notes.clear();
        state.undo_stack.clear();
        state.selected = None;
        state.editing = None;
        state.search_query.clear();
        self.persist_notes(&state);
    }

    // ── Viewport / settings / transient state ──

    pub fn set_viewport(&self, x: f64, y: f64) {
        let mut state = self.inner.lock().unwrap();
        state.viewport.x = x;
        state.viewport.y = y;
        self.persist_viewport(&state);
    }

    pub fn set_zoom(&self, zoom: f64) {
        let mut state = self.inner.lock().unwrap();
        state.viewport.zoom = Viewport::clamp_zoom(zoom);
        self.persist_viewport(&state);
    }

    /// Records the view's pixel size for smart placement and layouts.
    pub fn set_view_size(&self, width: f64, height: f64) {
        let mut state = self.inner.lock().unwrap();
        state.view_size = (width, height);
    }

    pub fn set_settings(&self, settings: BoardSettings) {
        let mut state = self.inner.lock().unwrap();
        state.settings = settings;
        match serde_json::to_string(&settings) {
            Ok(json) => {
                if let Err(e) = self.kv.put(keys::SETTINGS, &json) {
                    warn!("failed to persist settings: {e}");
                }
            }
            Err(e) => warn!("failed to serialize settings: {e}"),
        }
    }

    pub fn set_search_query(&self, query: impl Into<String>) {
        self.inner.lock().unwrap().search_query = query.into();
    }

    pub fn set_selected(&self, id: Option<String>) {
        self.inner.lock().unwrap().selected = id;
    }

    pub fn set_editing(&self, id: Option<String>) {
        self.inner.lock().unwrap().editing = id;
    }

    // ── Internals ──

    fn persist_notes(&self, state: &BoardState) {
        match serde_json::to_string(&state.notes) {
            Ok(json) => {
                if let Err(e) = self.kv.put(keys::NOTES, &json) {
                    warn!("failed to persist notes: {e}");
                }
            }
            Err(e) => warn!("failed to serialize notes: {e}"),
        }
    }

    fn persist_viewport(&self, state: &BoardState) {
        match serde_json::to_string(&state.viewport) {
            Ok(json) => {
                if let Err(e) = self.kv.put(keys::VIEWPORT, &json) {
                    warn!("failed to persist viewport: {e}");
                }
            }
            Err(e) => warn!("failed to serialize viewport: {e}"),
        }
    }

    fn emit(&self, state: &BoardState, intent: SyncIntent) {
        if let Some(tx) = &state.intents {
            // The engine may already be gone on shutdown; that's fine.
            let _ = tx.send(intent);
        }
    }
}

fn clear_selection_of(state: &mut BoardState, id: &str) {
    if state.selected.as_deref() == Some(id) {
        state.selected = None;
    }
    if state.editing.as_deref() == Some(id) {
        state.editing = None;
    }
}

/// Placement for a new note with no explicit position: +30/+30 from the
/// last note, falling back to the view center when that would land on an
/// existing note.
fn smart_position(notes: &[Note], viewport: &Viewport, (view_w, view_h): (f64, f64)) -> (f64, f64) {
    let (cx, cy) = viewport.canvas_center(view_w, view_h);
    let fallback = (cx - 100.0, cy - 75.0);
    let Some(last) = notes.last() else {
        return fallback;
    };
    let (x, y) = (last.x + 30.0, last.y + 30.0);
    let overlaps = notes
        .iter()
        .any(|n| (n.x - x).abs() < 20.0 && (n.y - y).abs() < 20.0);
    if overlaps {
        fallback
    } else {
        (x, y)
    }
}
