use eframe::egui;
use storyframe::graph;
use storyframe::model::{EntityId, LayoutDirection, MoodBoardItem, Point, Project, Sequence};

pub(super) const SCENE_WIDTH: f32 = 160.0;
pub(super) const GAP: f32 = 12.0;
pub(super) const HEADER_HEIGHT: f32 = 28.0;
pub(super) const MARKER_BAND: f32 = 16.0;
const MIN_WIDTH: f32 = 220.0;

/// World-space scene cards of a sequence drawn at `position`.
pub(super) fn scene_rects(sequence: &Sequence, position: Point) -> Vec<(EntityId, egui::Rect)> {
    if sequence.collapsed {
        return Vec::new();
    }
    let size = egui::vec2(SCENE_WIDTH, SCENE_WIDTH / sequence.aspect_ratio.ratio());
    let mut cursor = egui::pos2(
        position.x + GAP,
        position.y + HEADER_HEIGHT + MARKER_BAND + GAP,
    );
    let mut rects = Vec::new();
    for scene in graph::top_level_visible(sequence) {
        rects.push((scene.id, egui::Rect::from_min_size(cursor, size)));
        match sequence.layout {
            LayoutDirection::Horizontal => cursor.x += size.x + GAP,
            LayoutDirection::Vertical => cursor.y += size.y + GAP,
        }
    }
    rects
}

/// Whole card of a sequence, header included.
pub(super) fn sequence_rect(sequence: &Sequence, position: Point) -> egui::Rect {
    let header =
        egui::Rect::from_min_size(position.to_pos2(), egui::vec2(MIN_WIDTH, HEADER_HEIGHT));
    scene_rects(sequence, position)
        .iter()
        .fold(header, |acc, (_, r)| acc.union(r.expand(GAP)))
}

pub(super) fn header_rect(sequence: &Sequence, position: Point) -> egui::Rect {
    let card = sequence_rect(sequence, position);
    egui::Rect::from_min_size(card.min, egui::vec2(card.width(), HEADER_HEIGHT))
}

pub(super) fn item_rect(item: &MoodBoardItem, position: Point) -> egui::Rect {
    egui::Rect::from_min_size(position.to_pos2(), egui::vec2(item.width, item.height))
}

/// Center of a sequence card or scene card, for connection endpoints.
pub(super) fn node_center(
    project: &Project,
    id: EntityId,
    position_of: impl Fn(&Sequence) -> Point,
) -> Option<egui::Pos2> {
    for sequence in &project.sequences {
        let position = position_of(sequence);
        if sequence.id == id {
            return Some(sequence_rect(sequence, position).center());
        }
        let rects = scene_rects(sequence, position);
        if let Some((_, r)) = rects.into_iter().find(|(sid, _)| *sid == id) {
            return Some(r.center());
        }
    }
    None
}
