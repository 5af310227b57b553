//! Pure coordinate transforms and alignment snapping.
//!
//! Screen coordinates are relative to the canvas origin; the host subtracts
//! the canvas rect's top-left corner before calling in here.

use crate::model::Point;
use eframe::egui;

/// Pan/zoom pair mapping world space onto a canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub pan: egui::Vec2,
    pub zoom: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            pan: egui::Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl Transform {
    pub fn world_to_screen(&self, world: egui::Pos2) -> egui::Pos2 {
        (world.to_vec2() * self.zoom + self.pan).to_pos2()
    }

    pub fn screen_to_world(&self, screen: egui::Pos2) -> egui::Pos2 {
        ((screen.to_vec2() - self.pan) / self.zoom).to_pos2()
    }

    /// Changes the zoom while keeping the world point under `anchor` fixed.
    pub fn zoom_about(&self, anchor: egui::Pos2, zoom: f32) -> Self {
        let world = self.screen_to_world(anchor);
        Self {
            pan: anchor.to_vec2() - world.to_vec2() * zoom,
            zoom,
        }
    }

    pub fn screen_delta_to_world(&self, delta: egui::Vec2) -> egui::Vec2 {
        delta / self.zoom
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomLimits {
    pub min: f32,
    pub max: f32,
}

impl ZoomLimits {
    pub fn clamp(&self, zoom: f32) -> f32 {
        if zoom.is_finite() {
            zoom.clamp(self.min, self.max)
        } else {
            1.0f32.clamp(self.min, self.max)
        }
    }
}

/// Position an entity ends up at after a pointer moved `screen_delta` since
/// the drag started.
pub fn dragged_position(start: Point, screen_delta: egui::Vec2, zoom: f32) -> Point {
    start.translated(screen_delta / zoom)
}

/// Alignment guide surfaced while snapping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Guide {
    /// Vertical line at the given world x.
    Vertical(f32),
    /// Horizontal line at the given world y.
    Horizontal(f32),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Snapped {
    pub position: Point,
    pub guides: Vec<Guide>,
}

/// Snaps each axis of `candidate` independently to the closest coordinate
/// among `others` whose distance is strictly below `threshold`.
pub fn snap_to_neighbors(
    candidate: Point,
    others: impl IntoIterator<Item = Point>,
    threshold: f32,
) -> Snapped {
    let mut best_x: Option<(f32, f32)> = None;
    let mut best_y: Option<(f32, f32)> = None;
    for other in others {
        let dx = (candidate.x - other.x).abs();
        if dx < threshold && best_x.is_none_or(|(d, _)| dx < d) {
            best_x = Some((dx, other.x));
        }
        let dy = (candidate.y - other.y).abs();
        if dy < threshold && best_y.is_none_or(|(d, _)| dy < d) {
            best_y = Some((dy, other.y));
        }
    }

    let mut position = candidate;
    let mut guides = Vec::new();
    if let Some((_, x)) = best_x {
        position.x = x;
        guides.push(Guide::Vertical(x));
    }
    if let Some((_, y)) = best_y {
        position.y = y;
        guides.push(Guide::Horizontal(y));
    }
    Snapped { position, guides }
}

/// Scales `(width, height)` down so the larger side fits in `max_side`.
pub fn fit_within(width: f32, height: f32, max_side: f32) -> (f32, f32) {
    let largest = width.max(height);
    if largest <= max_side || largest <= f32::EPSILON {
        return (width, height);
    }
    let scale = max_side / largest;
    (width * scale, height * scale)
}
