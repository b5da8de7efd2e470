//! Board-level state: the canvas viewport and customization settings.

use serde::{Deserialize, Serialize};

pub const MIN_ZOOM: f64 = 0.5;
pub const MAX_ZOOM: f64 = 2.0;

/// Canvas pan/zoom state. `x`/`y` are the canvas translation in screen
/// pixels; `zoom` is clamped to [`MIN_ZOOM`]..=[`MAX_ZOOM`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

impl Viewport {
    /// Converts a canvas-space point to viewport (screen) space.
    pub fn to_screen(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.zoom + self.x, y * self.zoom + self.y)
    }

    /// Converts a viewport (screen) point back to canvas space.
    pub fn to_canvas(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.x) / self.zoom, (y - self.y) / self.zoom)
    }

    /// The canvas-space point currently at the center of a view of the
    /// given pixel size.
    pub fn canvas_center(&self, view_width: f64, view_height: f64) -> (f64, f64) {
        (
            (-self.x + view_width / 2.0) / self.zoom,
            (-self.y + view_height / 2.0) / self.zoom,
        )
    }

    pub fn clamp_zoom(zoom: f64) -> f64 {
        zoom.clamp(MIN_ZOOM, MAX_ZOOM)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeId {
    #[default]
    Ivory,
    Pastel,
    Onyx,
    Ember,
}

impl ThemeId {
    pub fn is_dark(self) -> bool {
        matches!(self, ThemeId::Onyx | ThemeId::Ember)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CanvasBackground {
    #[default]
    DotGrid,
    SquareGrid,
    Plain,
    Lined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontId {
    #[default]
    Geist,
    PatrickHand,
    Caveat,
    JetbrainsMono,
}

/// Note arrangement mode. `Freeform` keeps user-placed positions; the
/// other modes are deterministic layouts applied by `rearrange_notes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    #[default]
    Freeform,
    Grid,
    Radial,
    Timeline,
}

/// Persisted customization settings. Fields missing from older persisted
/// data fall back to defaults on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardSettings {
    pub theme: ThemeId,
    pub canvas: CanvasBackground,
    pub font: FontId,
    pub layout: LayoutMode,
}
