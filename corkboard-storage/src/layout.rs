//! Deterministic note layouts.
//!
//! Pure functions of note count and the current viewport — the store
//! applies the returned positions to the active (non-archived, non-pinned)
//! notes in collection order.

use corkboard_types::note::{DEFAULT_NOTE_HEIGHT, DEFAULT_NOTE_WIDTH};
use corkboard_types::{LayoutMode, Viewport};

const GRID_GAP: f64 = 30.0;
const TIMELINE_GAP: f64 = 40.0;

/// Computes canvas-space positions for `count` notes under the given
/// layout mode, centered on the current view. `Freeform` returns an empty
/// vector (nothing to rearrange).
pub fn layout_positions(
    mode: LayoutMode,
    count: usize,
    viewport: &Viewport,
    view_width: f64,
    view_height: f64,
) -> Vec<(f64, f64)> {
    if count == 0 {
        return Vec::new();
    }
    let center = viewport.canvas_center(view_width, view_height);
    match mode {
        LayoutMode::Freeform => Vec::new(),
        LayoutMode::Grid => grid(count, center),
        LayoutMode::Radial => radial(count, center),
        LayoutMode::Timeline => timeline(count, center),
    }
}

fn grid(count: usize, (cx, cy): (f64, f64)) -> Vec<(f64, f64)> {
    let cols = ((count as f64 * 1.5).sqrt().floor() as usize).max(1);
    let rows = count.div_ceil(cols);
    let total_w = cols as f64 * DEFAULT_NOTE_WIDTH + (cols - 1) as f64 * GRID_GAP;
    let total_h = rows as f64 * DEFAULT_NOTE_HEIGHT + (rows - 1) as f64 * GRID_GAP;
    let start_x = cx - total_w / 2.0;
    let start_y = cy - total_h / 2.0;

    (0..count)
        .map(|i| {
            let col = (i % cols) as f64;
            let row = (i / cols) as f64;
            (
                start_x + col * (DEFAULT_NOTE_WIDTH + GRID_GAP),
                start_y + row * (DEFAULT_NOTE_HEIGHT + GRID_GAP),
            )
        })
        .collect()
}

fn radial(count: usize, (cx, cy): (f64, f64)) -> Vec<(f64, f64)> {
    // Offsets center each note on its ring position.
    let (half_w, half_h) = (DEFAULT_NOTE_WIDTH / 2.0, DEFAULT_NOTE_HEIGHT / 2.0);
    if count == 1 {
        return vec![(cx - half_w, cy - half_h)];
    }
    let radius = (count as f64 * 30.0).max(200.0);
    let step = std::f64::consts::TAU / count as f64;

    (0..count)
        .map(|i| {
            let angle = step * i as f64 - std::f64::consts::FRAC_PI_2;
            (
                cx + angle.cos() * radius - half_w,
                cy + angle.sin() * radius - half_h,
            )
        })
        .collect()
}

fn timeline(count: usize, (cx, cy): (f64, f64)) -> Vec<(f64, f64)> {
    let total_w = count as f64 * DEFAULT_NOTE_WIDTH + (count - 1) as f64 * TIMELINE_GAP;
    let start_x = cx - total_w / 2.0;

    (0..count)
        .map(|i| {
            (
                start_x + i as f64 * (DEFAULT_NOTE_WIDTH + TIMELINE_GAP),
                cy - DEFAULT_NOTE_HEIGHT / 2.0,
            )
        })
        .collect()
}
