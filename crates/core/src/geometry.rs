//! Preview geometry.
//!
//! Maps a catalog entry's screen rectangle into fractions of its frame so a
//! local screenshot can be laid over the bezel image at any display size,
//! before the frame service has produced the real composite.

use crate::catalog::CatalogEntry;
use serde::Serialize;

/// A rectangle expressed as fractions of the frame's width and height.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    /// Scales the rectangle onto a frame displayed at `width` x `height` pixels.
    ///
    /// Returns `(x, y, width, height)` rounded to whole pixels.
    pub fn to_pixels(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let w = f64::from(width);
        let h = f64::from(height);
        (
            (self.x * w).round() as u32,
            (self.y * h).round() as u32,
            (self.width * w).round() as u32,
            (self.height * h).round() as u32,
        )
    }
}

/// Normalized position of the screen inside the frame.
///
/// Every component lies in `[0, 1]` for entries accepted by
/// [`Catalog::load`](crate::catalog::Catalog::load), which guarantees a
/// positive frame size and a screen that stays inside it.
pub fn overlay_rect(entry: &CatalogEntry) -> NormalizedRect {
    let fw = f64::from(entry.frame_size.width);
    let fh = f64::from(entry.frame_size.height);
    let screen = entry.screen_rect;
    NormalizedRect {
        x: f64::from(screen.x) / fw,
        y: f64::from(screen.y) / fh,
        width: f64::from(screen.width) / fw,
        height: f64::from(screen.height) / fh,
    }
}

/// Width divided by height of the bezel image.
pub fn aspect_ratio(entry: &CatalogEntry) -> f64 {
    f64::from(entry.frame_size.width) / f64::from(entry.frame_size.height)
}
