use super::geometry::{self, MARKER_BAND};
use eframe::egui;
use storyframe::graph::{self, RenderNode};
use storyframe::model::{CanvasBackground, EntityId, MoodBoardKind, Point, Project, Sequence};
use storyframe::settings::ConnectorStyle;
use storyframe::spatial::{Guide, Transform};
use storyframe::viewport::ViewportController;

fn to_screen(origin: egui::Pos2, t: &Transform, world: egui::Pos2) -> egui::Pos2 {
    t.world_to_screen(world) + origin.to_vec2()
}

fn rect_to_screen(origin: egui::Pos2, t: &Transform, r: egui::Rect) -> egui::Rect {
    egui::Rect::from_min_max(to_screen(origin, t, r.min), to_screen(origin, t, r.max))
}

pub(super) fn draw_background(
    painter: &egui::Painter,
    rect: egui::Rect,
    t: &Transform,
    background: CanvasBackground,
) {
    let bg = painter.ctx().style().visuals.extreme_bg_color;
    painter.rect_filled(rect, 0.0, bg);
    let color = egui::Color32::from_gray(60);
    let spacing = 64.0 * t.zoom;
    if background == CanvasBackground::Plain || spacing < 24.0 {
        return;
    }
    let start = rect.min + t.pan;
    let x0 = ((rect.min.x - start.x) / spacing).floor() * spacing + start.x;
    let y0 = ((rect.min.y - start.y) / spacing).floor() * spacing + start.y;
    match background {
        CanvasBackground::Grid => {
            let mut x = x0;
            while x < rect.max.x {
                painter.line_segment(
                    [egui::pos2(x, rect.min.y), egui::pos2(x, rect.max.y)],
                    egui::Stroke::new(1.0, color),
                );
                x += spacing;
            }
            let mut y = y0;
            while y < rect.max.y {
                painter.line_segment(
                    [egui::pos2(rect.min.x, y), egui::pos2(rect.max.x, y)],
                    egui::Stroke::new(1.0, color),
                );
                y += spacing;
            }
        }
        _ => {
            let mut x = x0;
            while x < rect.max.x {
                let mut y = y0;
                while y < rect.max.y {
                    painter.circle_filled(egui::pos2(x, y), 1.5, color);
                    y += spacing;
                }
                x += spacing;
            }
        }
    }
}

/// Committed position, or the in-flight one while dragged.
pub(super) fn shown_position(
    viewports: &ViewportController,
    id: EntityId,
    committed: Point,
) -> Point {
    viewports.in_flight(id).unwrap_or(committed)
}

pub(super) fn draw_project(
    painter: &egui::Painter,
    origin: egui::Pos2,
    project: &Project,
    viewports: &ViewportController,
    t: &Transform,
    selected: Option<EntityId>,
    connectors: ConnectorStyle,
) {
    let position_of = |s: &Sequence| shown_position(viewports, s.id, s.position);
    let link = egui::Stroke::new(1.5 * t.zoom.max(0.5), egui::Color32::from_gray(150));
    for c in &project.connections {
        let a = geometry::node_center(project, c.from_id, position_of);
        let b = geometry::node_center(project, c.to_id, position_of);
        if let (Some(a), Some(b)) = (a, b) {
            draw_connector(
                painter,
                to_screen(origin, t, a),
                to_screen(origin, t, b),
                link,
                connectors,
            );
        }
    }
    for sequence in project.sequences.iter().filter(|s| s.visible) {
        draw_sequence(painter, origin, sequence, position_of(sequence), t, selected);
    }
}

fn draw_connector(
    painter: &egui::Painter,
    a: egui::Pos2,
    b: egui::Pos2,
    stroke: egui::Stroke,
    style: ConnectorStyle,
) {
    match style {
        ConnectorStyle::Straight => {
            painter.line_segment([a, b], stroke);
        }
        ConnectorStyle::Curved => {
            // Horizontal tangents at both ends.
            let bend = ((b.x - a.x).abs() * 0.5).max(30.0);
            let points = [a, a + egui::vec2(bend, 0.0), b - egui::vec2(bend, 0.0), b];
            painter.add(egui::epaint::CubicBezierShape::from_points_stroke(
                points,
                false,
                egui::Color32::TRANSPARENT,
                stroke,
            ));
        }
    }
}

fn draw_sequence(
    painter: &egui::Painter,
    origin: egui::Pos2,
    sequence: &Sequence,
    position: Point,
    t: &Transform,
    selected: Option<EntityId>,
) {
    let card = rect_to_screen(origin, t, geometry::sequence_rect(sequence, position));
    let header = rect_to_screen(origin, t, geometry::header_rect(sequence, position));
    let outline = if selected == Some(sequence.id) {
        egui::Color32::from_rgb(0x3b, 0x82, 0xf6)
    } else {
        egui::Color32::from_gray(90)
    };
    painter.rect_filled(card, 6.0, egui::Color32::from_gray(36));
    painter.rect_stroke(card, 6.0, egui::Stroke::new(1.5, outline), egui::StrokeKind::Middle);
    painter.text(
        header.left_center() + egui::vec2(8.0, 0.0),
        egui::Align2::LEFT_CENTER,
        &sequence.title,
        egui::FontId::proportional(14.0 * t.zoom.clamp(0.5, 2.0)),
        egui::Color32::WHITE,
    );

    let rects = geometry::scene_rects(sequence, position);
    let rect_of = |id: EntityId| rects.iter().find(|(sid, _)| *sid == id).map(|(_, r)| *r);
    for node in graph::render_order(sequence) {
        match node {
            RenderNode::Scene { scene, .. } => {
                if let Some(r) = rect_of(scene.id) {
                    let r = rect_to_screen(origin, t, r);
                    draw_scene(painter, r, &scene.title, t, selected == Some(scene.id));
                }
            }
            RenderNode::Group { marker, scenes, .. } => {
                let span = scenes
                    .iter()
                    .filter_map(|s| rect_of(s.id))
                    .reduce(|a, b| a.union(b));
                if let Some(span) = span {
                    let band = egui::Rect::from_min_max(
                        span.min - egui::vec2(4.0, MARKER_BAND + 4.0),
                        egui::pos2(span.max.x + 4.0, span.min.y - 4.0),
                    );
                    let band = rect_to_screen(origin, t, band);
                    painter.rect_filled(band, 3.0, marker.color.to_color32());
                    painter.text(
                        band.left_center() + egui::vec2(4.0, 0.0),
                        egui::Align2::LEFT_CENTER,
                        &marker.label,
                        egui::FontId::proportional(11.0 * t.zoom.clamp(0.5, 2.0)),
                        egui::Color32::BLACK,
                    );
                }
                for scene in scenes {
                    if let Some(r) = rect_of(scene.id) {
                        let r = rect_to_screen(origin, t, r);
                        draw_scene(painter, r, &scene.title, t, selected == Some(scene.id));
                    }
                }
            }
        }
    }
}

fn draw_scene(painter: &egui::Painter, r: egui::Rect, title: &str, t: &Transform, selected: bool) {
    painter.rect_filled(r, 4.0, egui::Color32::from_gray(52));
    let stroke = if selected {
        egui::Stroke::new(2.0, egui::Color32::from_rgb(0x3b, 0x82, 0xf6))
    } else {
        egui::Stroke::new(1.0, egui::Color32::from_gray(80))
    };
    painter.rect_stroke(r, 4.0, stroke, egui::StrokeKind::Middle);
    painter.text(
        r.left_bottom() + egui::vec2(6.0, -6.0),
        egui::Align2::LEFT_BOTTOM,
        title,
        egui::FontId::proportional(12.0 * t.zoom.clamp(0.5, 2.0)),
        egui::Color32::LIGHT_GRAY,
    );
}

pub(super) fn draw_guides(
    painter: &egui::Painter,
    rect: egui::Rect,
    origin: egui::Pos2,
    t: &Transform,
    guides: &[Guide],
) {
    let stroke = egui::Stroke::new(1.0, egui::Color32::from_rgb(0xec, 0x48, 0x99));
    for guide in guides {
        match *guide {
            Guide::Vertical(x) => {
                let sx = to_screen(origin, t, egui::pos2(x, 0.0)).x;
                let ends = [egui::pos2(sx, rect.min.y), egui::pos2(sx, rect.max.y)];
                painter.line_segment(ends, stroke);
            }
            Guide::Horizontal(y) => {
                let sy = to_screen(origin, t, egui::pos2(0.0, y)).y;
                let ends = [egui::pos2(rect.min.x, sy), egui::pos2(rect.max.x, sy)];
                painter.line_segment(ends, stroke);
            }
        }
    }
}

pub(super) fn draw_moodboard(
    painter: &egui::Painter,
    origin: egui::Pos2,
    project: &Project,
    viewports: &ViewportController,
    t: &Transform,
    selected: Option<EntityId>,
) {
    let mut items: Vec<_> = project.moodboard.iter().collect();
    items.sort_by_key(|i| i.z_index);
    for item in items {
        let position = shown_position(viewports, item.id, item.position);
        let r = rect_to_screen(origin, t, geometry::item_rect(item, position));
        let fill = item
            .color
            .map(|c| c.to_color32())
            .unwrap_or(egui::Color32::from_gray(45));
        painter.rect_filled(r, 2.0, fill);
        if selected == Some(item.id) {
            painter.rect_stroke(
                r,
                2.0,
                egui::Stroke::new(2.0, egui::Color32::from_rgb(0x3b, 0x82, 0xf6)),
                egui::StrokeKind::Middle,
            );
        }
        let (text, color) = match item.kind {
            MoodBoardKind::Note => (item.content.as_str(), egui::Color32::BLACK),
            MoodBoardKind::Image => ("image", egui::Color32::LIGHT_GRAY),
        };
        painter.text(
            r.min + egui::vec2(8.0, 8.0),
            egui::Align2::LEFT_TOP,
            text,
            egui::FontId::proportional(13.0 * t.zoom.clamp(0.5, 2.0)),
            color,
        );
    }
}
