//! Pan/zoom viewport state and the transform math behind it.
//!
//! The renderer maps a render-space pixel `p` to the world point
//! `(p - resolution/2) / zoom - offset`. Under that convention the drag
//! and pinch updates below keep the world point under the finger(s)
//! visually stationary: for a drag the offset moves by the screen delta
//! over the current zoom, and for a pinch the offset is corrected so the
//! world point that sat under the midpoint before the update still sits
//! under the (possibly moved) midpoint after it.

use serde::{Deserialize, Serialize};

use crate::math::Vec2;

pub const MIN_ZOOM: f32 = 0.25;
/// Exponent on the pinch scale factor; 1.0 keeps the response linear.
pub const ZOOM_SPEED: f32 = 1.0;

/// Anchors closer than this make the scale factor numerically unsafe.
const MIN_PINCH_DIST: f32 = 1e-3;

/// The unit of persistence: saved verbatim on suspend, restored verbatim
/// on resume. `width`/`height` are owned by the surface lifecycle and are
/// read-only to the gesture code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    pub offset: Vec2,
    pub zoom: f32,
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
            width: 0,
            height: 0,
        }
    }
}

impl ViewportState {
    pub fn set_surface_size(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    pub fn resolution(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// Device space (origin top-left) to render space: X mirrored, Y kept.
    pub fn to_render_space(&self, p: Vec2) -> Vec2 {
        Vec2::new(self.width as f32 - p.x, p.y)
    }

    /// Re-establishes the zoom floor on state loaded from disk.
    pub fn sanitized(mut self) -> Self {
        self.zoom = self.zoom.max(MIN_ZOOM);
        self
    }

    /// Incremental drag: sensitivity is inversely proportional to zoom so
    /// a finger-width movement covers the same world distance at any zoom.
    pub fn pan(&mut self, anchor: Vec2, current: Vec2) {
        self.offset += (current - anchor) / self.zoom;
    }

    /// Incremental pinch, zoom anchored at the midpoint. `last` and
    /// `current` are the two pointer positions in render space.
    pub fn pinch(&mut self, last: (Vec2, Vec2), current: (Vec2, Vec2)) {
        let last_dist = (last.0 - last.1).length();
        if !(last_dist >= MIN_PINCH_DIST) {
            // Coincident (or NaN) anchors; skip this update and let the
            // caller re-anchor at the current positions.
            return;
        }
        let current_dist = (current.0 - current.1).length();
        let scale = (current_dist / last_dist).powf(ZOOM_SPEED);

        // Pinch centers relative to the viewport center.
        let resolution = self.resolution();
        let last_center = (last.0 + last.1 - resolution) / 2.0;
        let current_center = (current.0 + current.1 - resolution) / 2.0;

        let last_world = last_center / self.zoom + self.offset;
        self.zoom = (self.zoom * scale).max(MIN_ZOOM);
        let current_world = current_center / self.zoom + self.offset;

        self.offset += current_world - last_world;
    }
}
