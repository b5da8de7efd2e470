//! The note data model.
//!
//! Notes carry their position in canvas coordinates, or in viewport-fixed
//! coordinates while pinned; the store converts between the two when the
//! pinned flag flips. Timestamps are epoch milliseconds on the local side —
//! the remote client translates to ISO-8601 at the wire boundary.

use crate::now_millis;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of simultaneously pinned notes.
pub const MAX_PINNED_NOTES: usize = 5;

pub const DEFAULT_NOTE_WIDTH: f64 = 220.0;
pub const DEFAULT_NOTE_HEIGHT: f64 = 180.0;

/// Minimum note size enforced on resize.
pub const MIN_NOTE_WIDTH: f64 = 150.0;
pub const MIN_NOTE_HEIGHT: f64 = 100.0;

/// Color tag for a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteColor {
    #[default]
    Yellow,
    Pink,
    Blue,
    Green,
    Orange,
    Purple,
}

impl NoteColor {
    /// All colors, in cycle order.
    pub const ALL: [NoteColor; 6] = [
        NoteColor::Yellow,
        NoteColor::Pink,
        NoteColor::Blue,
        NoteColor::Green,
        NoteColor::Orange,
        NoteColor::Purple,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NoteColor::Yellow => "yellow",
            NoteColor::Pink => "pink",
            NoteColor::Blue => "blue",
            NoteColor::Green => "green",
            NoteColor::Orange => "orange",
            NoteColor::Purple => "purple",
        }
    }

    /// Parses a color tag; unknown values return `None` so callers can
    /// degrade to the default instead of failing a whole load.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == s)
    }

    /// The next color in the fixed cycle order.
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|c| *c == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

/// A sticky note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub content: String,
    pub color: NoteColor,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub pinned: bool,
    pub archived: bool,
    pub archived_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Note {
    /// Creates a note with defaults and a freshly minted id at the given
    /// canvas position.
    pub fn new(x: f64, y: f64) -> Self {
        let now = now_millis();
        Self {
            id: new_note_id(),
            content: String::new(),
            color: NoteColor::default(),
            x,
            y,
            width: DEFAULT_NOTE_WIDTH,
            height: DEFAULT_NOTE_HEIGHT,
            pinned: false,
            archived: false,
            archived_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds a note from loosely-typed JSON, backfilling every missing
    /// field with its default so older persisted shapes remain loadable.
    pub fn from_value(raw: &serde_json::Value) -> Self {
        let now = now_millis();
        Self {
            id: raw
                .get("id")
                .and_then(|v| v.as_str())
                .map(str::to_owned)
                .unwrap_or_else(new_note_id),
            content: raw
                .get("content")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_owned(),
            color: raw
                .get("color")
                .and_then(|v| v.as_str())
                .and_then(NoteColor::parse)
                .unwrap_or_default(),
            x: raw.get("x").and_then(|v| v.as_f64()).unwrap_or(0.0),
            y: raw.get("y").and_then(|v| v.as_f64()).unwrap_or(0.0),
            width: raw
                .get("width")
                .and_then(|v| v.as_f64())
                .unwrap_or(DEFAULT_NOTE_WIDTH),
            height: raw
                .get("height")
                .and_then(|v| v.as_f64())
                .unwrap_or(DEFAULT_NOTE_HEIGHT),
            pinned: raw.get("pinned").and_then(|v| v.as_bool()).unwrap_or(false),
            archived: raw
                .get("archived")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            archived_at: raw.get("archived_at").and_then(|v| v.as_i64()),
            created_at: raw.get("created_at").and_then(|v| v.as_i64()).unwrap_or(now),
            updated_at: raw.get("updated_at").and_then(|v| v.as_i64()).unwrap_or(now),
        }
    }
}

/// Mints a fresh canonical note id.
pub fn new_note_id() -> String {
    Uuid::new_v4().to_string()
}

/// Whether an id is a canonical UUID. Pre-account notes may carry legacy
/// identifiers (short base-36 strings from old exports); those are migrated
/// to fresh UUIDs the first time they sync to an account.
pub fn is_canonical_uuid(id: &str) -> bool {
    Uuid::try_parse(id).is_ok()
}

/// A partial update to a note. Unset fields are left untouched. Pin state
/// is not patchable — it only changes through `toggle_pin`, where the pin
/// cap is enforced.
#[derive(Debug, Clone, Default)]
pub struct NotePatch {
    pub content: Option<String>,
    pub color: Option<NoteColor>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl NotePatch {
    pub fn content(value: impl Into<String>) -> Self {
        Self {
            content: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.color.is_none()
            && self.x.is_none()
            && self.y.is_none()
            && self.width.is_none()
            && self.height.is_none()
    }

    /// True when the patch touches only the note's text content. Content
    /// edits are pushed on a debounce window; everything else pushes
    /// immediately.
    pub fn is_content_only(&self) -> bool {
        self.content.is_some()
            && self.color.is_none()
            && self.x.is_none()
            && self.y.is_none()
            && self.width.is_none()
            && self.height.is_none()
    }
}
