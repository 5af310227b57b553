//! Per-surface pan/zoom state and the transient drag/pan gestures that
//! operate on it.

use crate::model::{EntityId, EntityKind, Point, Selection};
use crate::spatial::{self, Guide, Transform, ZoomLimits};
use eframe::egui;
use std::collections::HashMap;

/// Zoom step used by the zoom buttons.
pub const ZOOM_STEP: f32 = 1.25;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Surface {
    Main,
    MoodBoard,
}

impl Surface {
    pub fn zoom_limits(self) -> ZoomLimits {
        match self {
            Surface::Main => ZoomLimits { min: 0.1, max: 4.0 },
            Surface::MoodBoard => ZoomLimits { min: 0.1, max: 5.0 },
        }
    }
}

/// View state of one canvas surface.
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    pub transform: Transform,
    pub limits: ZoomLimits,
    pub selection: Option<Selection>,
}

impl Viewport {
    pub fn new(limits: ZoomLimits) -> Self {
        Self {
            transform: Transform::default(),
            limits,
            selection: None,
        }
    }

    pub fn zoom(&self) -> f32 {
        self.transform.zoom
    }

    /// Sets the zoom (clamped) keeping the world point under `anchor` fixed.
    pub fn set_zoom(&mut self, zoom: f32, anchor: egui::Pos2) {
        let zoom = self.limits.clamp(zoom);
        self.transform = self.transform.zoom_about(anchor, zoom);
    }

    pub fn pan_by(&mut self, delta: egui::Vec2) {
        if delta.is_finite() {
            self.transform.pan += delta;
        }
    }
}

/// A drag in progress. Only `in_flight` changes until the drag ends.
#[derive(Clone, Debug, PartialEq)]
pub struct DragSession {
    pub surface: Surface,
    pub target: Selection,
    pub start: Point,
    pub current: Point,
    snaps: bool,
}

/// Where a finished drag started and ended, in world units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragOutcome {
    pub target: Selection,
    pub from: Point,
    pub to: Point,
}

impl DragOutcome {
    pub fn moved(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct PanSession {
    surface: Surface,
    last: egui::Pos2,
}

pub struct ViewportController {
    main: Viewport,
    moodboard: Viewport,
    snap_threshold: f32,
    drag: Option<DragSession>,
    pan: Option<PanSession>,
    in_flight: HashMap<EntityId, Point>,
    guides: Vec<Guide>,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::new(8.0)
    }
}

impl ViewportController {
    pub fn new(snap_threshold: f32) -> Self {
        Self {
            main: Viewport::new(Surface::Main.zoom_limits()),
            moodboard: Viewport::new(Surface::MoodBoard.zoom_limits()),
            snap_threshold,
            drag: None,
            pan: None,
            in_flight: HashMap::new(),
            guides: Vec::new(),
        }
    }

    pub fn viewport(&self, surface: Surface) -> &Viewport {
        match surface {
            Surface::Main => &self.main,
            Surface::MoodBoard => &self.moodboard,
        }
    }

    pub fn viewport_mut(&mut self, surface: Surface) -> &mut Viewport {
        match surface {
            Surface::Main => &mut self.main,
            Surface::MoodBoard => &mut self.moodboard,
        }
    }

    pub fn transform(&self, surface: Surface) -> Transform {
        self.viewport(surface).transform
    }

    pub fn snap_threshold(&self) -> f32 {
        self.snap_threshold
    }

    pub fn set_snap_threshold(&mut self, threshold: f32) {
        if threshold.is_finite() && threshold >= 0.0 {
            self.snap_threshold = threshold;
        }
    }

    /// Wheel input: zooms about the cursor with the modifier held, pans
    /// otherwise.
    pub fn wheel(
        &mut self,
        surface: Surface,
        delta: egui::Vec2,
        cursor: egui::Pos2,
        zoom_modifier: bool,
    ) {
        let viewport = self.viewport_mut(surface);
        if zoom_modifier {
            if delta.y == 0.0 || !delta.y.is_finite() {
                return;
            }
            let factor = (1.0 + delta.y * 0.001).clamp(0.8, 1.25);
            let zoom = viewport.zoom() * factor;
            viewport.set_zoom(zoom, cursor);
        } else {
            viewport.pan_by(delta);
        }
    }

    pub fn zoom_in(&mut self, surface: Surface, anchor: egui::Pos2) {
        let viewport = self.viewport_mut(surface);
        let zoom = viewport.zoom() * ZOOM_STEP;
        viewport.set_zoom(zoom, anchor);
    }

    pub fn zoom_out(&mut self, surface: Surface, anchor: egui::Pos2) {
        let viewport = self.viewport_mut(surface);
        let zoom = viewport.zoom() / ZOOM_STEP;
        viewport.set_zoom(zoom, anchor);
    }

    pub fn set_zoom(&mut self, surface: Surface, zoom: f32, anchor: egui::Pos2) {
        self.viewport_mut(surface).set_zoom(zoom, anchor);
    }

    pub fn begin_pan(&mut self, surface: Surface, at: egui::Pos2) {
        self.pan = Some(PanSession { surface, last: at });
    }

    pub fn pan_to(&mut self, at: egui::Pos2) {
        let Some(session) = self.pan.as_mut() else {
            return;
        };
        let delta = at - session.last;
        session.last = at;
        let surface = session.surface;
        self.viewport_mut(surface).pan_by(delta);
    }

    pub fn end_pan(&mut self) {
        self.pan = None;
    }

    pub fn is_panning(&self) -> bool {
        self.pan.is_some()
    }

    pub fn select(&mut self, surface: Surface, selection: Option<Selection>) {
        self.viewport_mut(surface).selection = selection;
    }

    pub fn selection(&self, surface: Surface) -> Option<Selection> {
        self.viewport(surface).selection
    }

    /// Starts dragging `target` from its committed position. Sequences on
    /// the main surface snap to their neighbours.
    pub fn begin_drag(&mut self, surface: Surface, target: Selection, start: Point) {
        self.cancel_drag();
        let snaps = surface == Surface::Main && target.kind == EntityKind::Sequence;
        self.in_flight.insert(target.id, start);
        self.drag = Some(DragSession {
            surface,
            target,
            start,
            current: start,
            snaps,
        });
    }

    /// Moves the dragged entity by `screen_delta` (total since the drag
    /// began) and returns its in-flight position.
    pub fn drag_to(
        &mut self,
        screen_delta: egui::Vec2,
        neighbors: impl IntoIterator<Item = Point>,
    ) -> Option<Point> {
        let threshold = self.snap_threshold;
        let (surface, start, snaps) = {
            let drag = self.drag.as_ref()?;
            (drag.surface, drag.start, drag.snaps)
        };
        let zoom = self.viewport(surface).zoom();
        let raw = spatial::dragged_position(start, screen_delta, zoom);
        if !raw.is_finite() {
            return self.drag.as_ref().map(|d| d.current);
        }
        let position = if snaps {
            let snapped = spatial::snap_to_neighbors(raw, neighbors, threshold);
            self.guides = snapped.guides;
            snapped.position
        } else {
            raw
        };
        let drag = self.drag.as_mut()?;
        drag.current = position;
        self.in_flight.insert(drag.target.id, position);
        Some(position)
    }

    pub fn end_drag(&mut self) -> Option<DragOutcome> {
        let drag = self.drag.take()?;
        self.in_flight.remove(&drag.target.id);
        self.guides.clear();
        Some(DragOutcome {
            target: drag.target,
            from: drag.start,
            to: drag.current,
        })
    }

    pub fn cancel_drag(&mut self) {
        if let Some(drag) = self.drag.take() {
            self.in_flight.remove(&drag.target.id);
        }
        self.guides.clear();
    }

    pub fn drag(&self) -> Option<&DragSession> {
        self.drag.as_ref()
    }

    /// Transient position of an entity being dragged.
    pub fn in_flight(&self, id: EntityId) -> Option<Point> {
        self.in_flight.get(&id).copied()
    }

    pub fn guides(&self) -> &[Guide] {
        &self.guides
    }

    /// Drops every gesture and selection, keeping pan/zoom.
    pub fn reset_interaction(&mut self) {
        self.cancel_drag();
        self.end_pan();
        self.main.selection = None;
        self.moodboard.selection = None;
    }

    /// Rewrites a temporary id after its insert was confirmed.
    pub fn reconcile_id(&mut self, from: EntityId, to: EntityId) {
        for viewport in [&mut self.main, &mut self.moodboard] {
            if let Some(selection) = viewport.selection.as_mut() {
                if selection.id == from {
                    selection.id = to;
                }
            }
        }
        if let Some(drag) = self.drag.as_mut() {
            if drag.target.id == from {
                drag.target.id = to;
            }
        }
        if let Some(p) = self.in_flight.remove(&from) {
            self.in_flight.insert(to, p);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence(id: EntityId) -> Selection {
        Selection {
            id,
            kind: EntityKind::Sequence,
        }
    }

    #[test]
    fn wheel_zoom_keeps_the_cursor_anchored() {
        let mut vc = ViewportController::default();
        let cursor = egui::pos2(320.0, 240.0);
        let before = vc.transform(Surface::Main).screen_to_world(cursor);
        vc.wheel(Surface::Main, egui::vec2(0.0, 120.0), cursor, true);
        let t = vc.transform(Surface::Main);
        assert!(t.zoom > 1.0);
        let after = t.screen_to_world(cursor);
        assert!((before - after).length() < 1e-3);
    }

    #[test]
    fn wheel_without_modifier_pans() {
        let mut vc = ViewportController::default();
        vc.wheel(Surface::MoodBoard, egui::vec2(10.0, -5.0), egui::Pos2::ZERO, false);
        let t = vc.transform(Surface::MoodBoard);
        assert_eq!(t.pan, egui::vec2(10.0, -5.0));
        assert_eq!(t.zoom, 1.0);
    }

    #[test]
    fn zoom_is_clamped_per_surface() {
        let mut vc = ViewportController::default();
        vc.set_zoom(Surface::Main, 100.0, egui::Pos2::ZERO);
        vc.set_zoom(Surface::MoodBoard, 100.0, egui::Pos2::ZERO);
        assert_eq!(vc.transform(Surface::Main).zoom, 4.0);
        assert_eq!(vc.transform(Surface::MoodBoard).zoom, 5.0);
        for _ in 0..50 {
            vc.zoom_out(Surface::Main, egui::pos2(10.0, 10.0));
        }
        assert_eq!(vc.transform(Surface::Main).zoom, 0.1);
    }

    #[test]
    fn drag_converts_screen_delta_to_world_and_snaps() {
        let mut vc = ViewportController::default();
        vc.set_zoom(Surface::Main, 2.0, egui::Pos2::ZERO);
        let id = EntityId::temporary();
        vc.begin_drag(Surface::Main, sequence(id), Point::new(500.0, 0.0));

        // 12 screen px at zoom 2 is 6 world units.
        let p = vc.drag_to(egui::vec2(12.0, 0.0), [Point::new(0.0, 0.0)]).unwrap();
        assert_eq!(p, Point::new(506.0, 0.0));
        assert_eq!(vc.guides(), &[Guide::Horizontal(0.0)]);
        assert_eq!(vc.in_flight(id), Some(p));

        let outcome = vc.end_drag().unwrap();
        assert_eq!(outcome.from, Point::new(500.0, 0.0));
        assert_eq!(outcome.to, p);
        assert!(vc.guides().is_empty());
        assert_eq!(vc.in_flight(id), None);
    }

    #[test]
    fn cancel_discards_in_flight_state() {
        let mut vc = ViewportController::default();
        let id = EntityId::temporary();
        vc.begin_drag(Surface::Main, sequence(id), Point::ZERO);
        vc.drag_to(egui::vec2(40.0, 40.0), [Point::ZERO; 0]);
        vc.cancel_drag();
        assert!(vc.drag().is_none());
        assert_eq!(vc.in_flight(id), None);
        assert!(vc.end_drag().is_none());
    }

    #[test]
    fn pan_gesture_accumulates_deltas() {
        let mut vc = ViewportController::default();
        vc.begin_pan(Surface::Main, egui::pos2(0.0, 0.0));
        vc.pan_to(egui::pos2(5.0, 5.0));
        vc.pan_to(egui::pos2(15.0, 0.0));
        vc.end_pan();
        vc.pan_to(egui::pos2(100.0, 100.0));
        assert_eq!(vc.transform(Surface::Main).pan, egui::vec2(15.0, 0.0));
    }
}
