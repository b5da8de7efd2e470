//! Shared types for the Corkboard core.
//!
//! The note data model, board-level state (viewport, customization
//! settings), and the sync intents that the local store emits toward the
//! sync engine. This crate does no I/O; persistence and networking live in
//! `corkboard-storage` and `corkboard-sync`.

pub mod board;
pub mod note;
pub mod sync;

pub use board::{BoardSettings, CanvasBackground, FontId, LayoutMode, ThemeId, Viewport};
pub use note::{Note, NoteColor, NotePatch, DEFAULT_NOTE_HEIGHT, DEFAULT_NOTE_WIDTH, MAX_PINNED_NOTES};
pub use sync::SyncIntent;

/// Current wall-clock time as epoch milliseconds.
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
