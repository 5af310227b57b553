use chrono::{DateTime, Utc};
use eframe::egui;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of any persisted entity.
///
/// Entities created locally carry a temporary id until the persistence
/// collaborator confirms them; the store swaps it for the confirmed id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub uuid::Uuid);

impl EntityId {
    pub fn temporary() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s).ok().map(Self)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn from_pos2(p: egui::Pos2) -> Self {
        Self { x: p.x, y: p.y }
    }

    pub fn to_pos2(self) -> egui::Pos2 {
        egui::pos2(self.x, self.y)
    }

    pub fn translated(self, delta: egui::Vec2) -> Self {
        Self {
            x: self.x + delta.x,
            y: self.y + delta.y,
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Colour stored as `#rrggbb` / `#rrggbbaa` on the wire.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(into = "String", try_from = "String")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn to_color32(self) -> egui::Color32 {
        egui::Color32::from_rgba_unmultiplied(self.r, self.g, self.b, self.a)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: byte(6)?,
            }),
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl From<Rgba> for String {
    fn from(c: Rgba) -> Self {
        c.to_hex()
    }
}

impl TryFrom<String> for Rgba {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Rgba::from_hex(&s).ok_or_else(|| format!("invalid colour `{s}`"))
    }
}

/// Palette cycled through when creating narrative markers.
pub const MARKER_COLORS: [Rgba; 6] = [
    Rgba::rgb(0xf5, 0x9e, 0x0b),
    Rgba::rgb(0x3b, 0x82, 0xf6),
    Rgba::rgb(0x10, 0xb9, 0x81),
    Rgba::rgb(0xef, 0x44, 0x44),
    Rgba::rgb(0x8b, 0x5c, 0xf6),
    Rgba::rgb(0xec, 0x48, 0x99),
];

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "9:16")]
    Vertical,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:3")]
    Classic,
    #[serde(rename = "21:9")]
    Cinema,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Widescreen,
        AspectRatio::Vertical,
        AspectRatio::Square,
        AspectRatio::Classic,
        AspectRatio::Cinema,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Widescreen => "16:9",
            AspectRatio::Vertical => "9:16",
            AspectRatio::Square => "1:1",
            AspectRatio::Classic => "4:3",
            AspectRatio::Cinema => "21:9",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == s)
    }

    /// Width divided by height.
    pub fn ratio(self) -> f32 {
        match self {
            AspectRatio::Widescreen => 16.0 / 9.0,
            AspectRatio::Vertical => 9.0 / 16.0,
            AspectRatio::Square => 1.0,
            AspectRatio::Classic => 4.0 / 3.0,
            AspectRatio::Cinema => 21.0 / 9.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LayoutDirection {
    #[default]
    Horizontal,
    Vertical,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CanvasBackground {
    #[default]
    Dots,
    Grid,
    Plain,
}

/// Discriminator for connection endpoints.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Sequence,
    Scene,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Sequence => "sequence",
            NodeKind::Scene => "scene",
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MoodBoardKind {
    Image,
    Note,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub notes: String,
    pub position: Point,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub parent_id: Option<EntityId>,
    #[serde(default)]
    pub expanded: bool,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

impl Scene {
    pub fn new(title: impl Into<String>, position: Point) -> Self {
        Self {
            id: EntityId::temporary(),
            title: title.into(),
            image: None,
            notes: String::new(),
            position,
            aspect_ratio: AspectRatio::default(),
            parent_id: None,
            expanded: false,
            visible: true,
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

fn default_visible() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeMarker {
    pub id: EntityId,
    pub label: String,
    pub color: Rgba,
    pub start_scene_id: EntityId,
    pub end_scene_id: EntityId,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sequence {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub story_context: String,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    pub position: Point,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub layout: LayoutDirection,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub markers: Vec<NarrativeMarker>,
}

impl Sequence {
    pub fn new(title: impl Into<String>, position: Point) -> Self {
        Self {
            id: EntityId::temporary(),
            title: title.into(),
            story_context: String::new(),
            scenes: Vec::new(),
            position,
            collapsed: false,
            aspect_ratio: AspectRatio::default(),
            layout: LayoutDirection::default(),
            visible: true,
            markers: Vec::new(),
        }
    }

    pub fn scene(&self, id: EntityId) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }

    pub fn scene_index(&self, id: EntityId) -> Option<usize> {
        self.scenes.iter().position(|s| s.id == id)
    }

    pub fn marker(&self, id: EntityId) -> Option<&NarrativeMarker> {
        self.markers.iter().find(|m| m.id == id)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: EntityId,
    pub from_id: EntityId,
    pub from_type: NodeKind,
    pub to_id: EntityId,
    pub to_type: NodeKind,
}

impl Connection {
    pub fn touches(&self, id: EntityId) -> bool {
        self.from_id == id || self.to_id == id
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MoodBoardItem {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub kind: MoodBoardKind,
    pub content: String,
    pub position: Point,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub z_index: i32,
    #[serde(default)]
    pub rotation: Option<f32>,
    #[serde(default)]
    pub color: Option<Rgba>,
}

impl MoodBoardItem {
    pub fn note(content: impl Into<String>, position: Point) -> Self {
        Self {
            id: EntityId::temporary(),
            kind: MoodBoardKind::Note,
            content: content.into(),
            position,
            width: 200.0,
            height: 200.0,
            z_index: 0,
            rotation: None,
            color: Some(Rgba::rgb(0xfe, 0xf0, 0x8a)),
        }
    }
}

/// A reusable prompt style, optionally filed under a category.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: EntityId,
    pub name: String,
    pub text: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: EntityId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Set alongside `created_at` and round-tripped through persistence.
    /// Edits leave it alone so undo restores a project exactly; the backend
    /// owns modification stamps.
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub background: CanvasBackground,
    #[serde(default)]
    pub sequences: Vec<Sequence>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub prompts: Vec<Prompt>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub moodboard: Vec<MoodBoardItem>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::temporary(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            background: CanvasBackground::default(),
            sequences: Vec::new(),
            connections: Vec::new(),
            prompts: Vec::new(),
            categories: Vec::new(),
            moodboard: Vec::new(),
        }
    }

    pub fn sequence(&self, id: EntityId) -> Option<&Sequence> {
        self.sequences.iter().find(|s| s.id == id)
    }

    pub fn sequence_mut(&mut self, id: EntityId) -> Option<&mut Sequence> {
        self.sequences.iter_mut().find(|s| s.id == id)
    }

    /// Locates a scene anywhere in the project as `(sequence index, scene index)`.
    pub fn locate_scene(&self, id: EntityId) -> Option<(usize, usize)> {
        self.sequences
            .iter()
            .enumerate()
            .find_map(|(si, seq)| seq.scene_index(id).map(|ci| (si, ci)))
    }

    pub fn scene(&self, id: EntityId) -> Option<&Scene> {
        let (si, ci) = self.locate_scene(id)?;
        Some(&self.sequences[si].scenes[ci])
    }

    pub fn scene_mut(&mut self, id: EntityId) -> Option<&mut Scene> {
        let (si, ci) = self.locate_scene(id)?;
        Some(&mut self.sequences[si].scenes[ci])
    }

    pub fn moodboard_item(&self, id: EntityId) -> Option<&MoodBoardItem> {
        self.moodboard.iter().find(|i| i.id == id)
    }

    pub fn node_kind(&self, id: EntityId) -> Option<NodeKind> {
        if self.sequence(id).is_some() {
            Some(NodeKind::Sequence)
        } else if self.locate_scene(id).is_some() {
            Some(NodeKind::Scene)
        } else {
            None
        }
    }

    pub fn top_z_index(&self) -> i32 {
        self.moodboard.iter().map(|i| i.z_index).max().unwrap_or(0)
    }
}

/// What the user has selected on a canvas surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub id: EntityId,
    pub kind: EntityKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Sequence,
    Scene,
    Connection,
    Prompt,
    MoodBoardItem,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::Sequence => "sequence",
            EntityKind::Scene => "scene",
            EntityKind::Connection => "connection",
            EntityKind::Prompt => "prompt",
            EntityKind::MoodBoardItem => "moodboard item",
        }
    }
}

impl From<NodeKind> for EntityKind {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Sequence => EntityKind::Sequence,
            NodeKind::Scene => EntityKind::Scene,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colours_parse_with_and_without_alpha() {
        assert_eq!(Rgba::from_hex("#f59e0b"), Some(Rgba::rgb(0xf5, 0x9e, 0x0b)));
        let c = Rgba::from_hex("10b98180").unwrap();
        assert_eq!(c.a, 0x80);
        assert_eq!(c.to_hex(), "#10b98180");
        assert_eq!(Rgba::from_hex("#xyz"), None);
    }

    #[test]
    fn aspect_ratio_uses_ratio_strings_on_the_wire() {
        let json = serde_json::to_string(&AspectRatio::Cinema).unwrap();
        assert_eq!(json, "\"21:9\"");
        assert_eq!(AspectRatio::parse("9:16"), Some(AspectRatio::Vertical));
    }

    #[test]
    fn moodboard_item_serializes_kind_as_type() {
        let item = MoodBoardItem::note("hello", Point::new(1.0, 2.0));
        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(v["type"], "note");
        assert_eq!(v["zIndex"], 0);
        assert_eq!(v["color"], "#fef08a");
    }

    #[test]
    fn locate_scene_searches_every_sequence() {
        let mut project = Project::new("p");
        let mut a = Sequence::new("a", Point::ZERO);
        let mut b = Sequence::new("b", Point::ZERO);
        a.scenes.push(Scene::new("a1", Point::ZERO));
        let target = Scene::new("b1", Point::ZERO);
        let id = target.id;
        b.scenes.push(Scene::new("b0", Point::ZERO));
        b.scenes.push(target);
        project.sequences.push(a);
        project.sequences.push(b);
        assert_eq!(project.locate_scene(id), Some((1, 1)));
        assert_eq!(project.node_kind(id), Some(NodeKind::Scene));
    }
}
