//! Mapping between the in-memory model and the flat snake_case records the
//! persistence collaborator stores (`position: {x, y}` ⇄ `position_x`,
//! `position_y`, and so on).

use crate::error::PersistError;
use crate::model::{
    AspectRatio, CanvasBackground, Connection, EntityId, LayoutDirection, MoodBoardItem,
    MoodBoardKind, NarrativeMarker, NodeKind, Point, Project, Prompt, Rgba, Scene, Sequence,
};
use crate::patch::{MoodBoardPatch, ProjectPatch, ScenePatch, SequencePatch};
use crate::persistence::Record;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub fn to_record<T: Serialize>(row: &T) -> Result<Record, PersistError> {
    match serde_json::to_value(row) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(PersistError::Malformed(format!(
            "expected an object row, got {other}"
        ))),
        Err(e) => Err(PersistError::Malformed(e.to_string())),
    }
}

pub fn from_record<T: DeserializeOwned>(record: Record) -> Result<T, PersistError> {
    serde_json::from_value(Value::Object(record))
        .map_err(|e| PersistError::Malformed(e.to_string()))
}

fn required_id(id: Option<EntityId>, table: &str) -> Result<EntityId, PersistError> {
    id.ok_or_else(|| PersistError::Malformed(format!("{table} row without id")))
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProjectRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub canvas_background: CanvasBackground,
    #[serde(default)]
    pub prompt_categories: Vec<String>,
}

impl ProjectRow {
    pub fn new(project: &Project, id: Option<EntityId>) -> Self {
        Self {
            id,
            name: project.name.clone(),
            created_at: project.created_at,
            updated_at: project.updated_at,
            canvas_background: project.background,
            prompt_categories: project.categories.clone(),
        }
    }

    pub fn into_project(self) -> Result<Project, PersistError> {
        Ok(Project {
            id: required_id(self.id, "project")?,
            name: self.name,
            created_at: self.created_at,
            updated_at: self.updated_at,
            background: self.canvas_background,
            sequences: Vec::new(),
            connections: Vec::new(),
            prompts: Vec::new(),
            categories: self.prompt_categories,
            moodboard: Vec::new(),
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SequenceRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub project_id: EntityId,
    pub title: String,
    #[serde(default)]
    pub story_context: String,
    pub position_x: f32,
    pub position_y: f32,
    #[serde(default)]
    pub is_collapsed: bool,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub layout_direction: LayoutDirection,
    #[serde(default = "visible_default")]
    pub is_visible: bool,
    #[serde(default)]
    pub narrative_markers: Vec<NarrativeMarker>,
}

impl SequenceRow {
    pub fn new(sequence: &Sequence, project_id: EntityId, id: Option<EntityId>) -> Self {
        Self {
            id,
            project_id,
            title: sequence.title.clone(),
            story_context: sequence.story_context.clone(),
            position_x: sequence.position.x,
            position_y: sequence.position.y,
            is_collapsed: sequence.collapsed,
            aspect_ratio: sequence.aspect_ratio,
            layout_direction: sequence.layout,
            is_visible: sequence.visible,
            narrative_markers: sequence.markers.clone(),
        }
    }

    pub fn into_sequence(self) -> Result<Sequence, PersistError> {
        Ok(Sequence {
            id: required_id(self.id, "sequence")?,
            title: self.title,
            story_context: self.story_context,
            scenes: Vec::new(),
            position: Point::new(self.position_x, self.position_y),
            collapsed: self.is_collapsed,
            aspect_ratio: self.aspect_ratio,
            layout: self.layout_direction,
            visible: self.is_visible,
            markers: self.narrative_markers,
        })
    }
}

fn visible_default() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SceneRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub sequence_id: EntityId,
    pub title: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub notes: String,
    pub position_x: f32,
    pub position_y: f32,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub parent_id: Option<EntityId>,
    #[serde(default)]
    pub is_expanded: bool,
    #[serde(default = "visible_default")]
    pub is_visible: bool,
    #[serde(default)]
    pub order_index: usize,
}

impl SceneRow {
    pub fn new(
        scene: &Scene,
        sequence_id: EntityId,
        order_index: usize,
        id: Option<EntityId>,
    ) -> Self {
        Self {
            id,
            sequence_id,
            title: scene.title.clone(),
            image_url: scene.image.clone(),
            notes: scene.notes.clone(),
            position_x: scene.position.x,
            position_y: scene.position.y,
            aspect_ratio: scene.aspect_ratio,
            parent_id: scene.parent_id,
            is_expanded: scene.expanded,
            is_visible: scene.visible,
            order_index,
        }
    }

    pub fn into_scene(self) -> Result<Scene, PersistError> {
        Ok(Scene {
            id: required_id(self.id, "scene")?,
            title: self.title,
            image: self.image_url,
            notes: self.notes,
            position: Point::new(self.position_x, self.position_y),
            aspect_ratio: self.aspect_ratio,
            parent_id: self.parent_id,
            expanded: self.is_expanded,
            visible: self.is_visible,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConnectionRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub project_id: EntityId,
    pub from_id: EntityId,
    pub from_type: NodeKind,
    pub to_id: EntityId,
    pub to_type: NodeKind,
}

impl ConnectionRow {
    pub fn new(c: &Connection, project_id: EntityId, id: Option<EntityId>) -> Self {
        Self {
            id,
            project_id,
            from_id: c.from_id,
            from_type: c.from_type,
            to_id: c.to_id,
            to_type: c.to_type,
        }
    }

    pub fn into_connection(self) -> Result<Connection, PersistError> {
        Ok(Connection {
            id: required_id(self.id, "connection")?,
            from_id: self.from_id,
            from_type: self.from_type,
            to_id: self.to_id,
            to_type: self.to_type,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PromptRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub project_id: EntityId,
    pub name: String,
    pub prompt_text: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl PromptRow {
    pub fn new(p: &Prompt, project_id: EntityId, id: Option<EntityId>) -> Self {
        Self {
            id,
            project_id,
            name: p.name.clone(),
            prompt_text: p.text.clone(),
            category: p.category.clone(),
        }
    }

    pub fn into_prompt(self) -> Result<Prompt, PersistError> {
        Ok(Prompt {
            id: required_id(self.id, "prompt")?,
            name: self.name,
            text: self.prompt_text,
            category: self.category,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MoodBoardRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub project_id: EntityId,
    pub item_type: MoodBoardKind,
    pub content: String,
    pub position_x: f32,
    pub position_y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub z_index: i32,
    #[serde(default)]
    pub rotation: Option<f32>,
    #[serde(default)]
    pub color: Option<Rgba>,
}

impl MoodBoardRow {
    pub fn new(item: &MoodBoardItem, project_id: EntityId, id: Option<EntityId>) -> Self {
        Self {
            id,
            project_id,
            item_type: item.kind,
            content: item.content.clone(),
            position_x: item.position.x,
            position_y: item.position.y,
            width: item.width,
            height: item.height,
            z_index: item.z_index,
            rotation: item.rotation,
            color: item.color,
        }
    }

    pub fn into_item(self) -> Result<MoodBoardItem, PersistError> {
        Ok(MoodBoardItem {
            id: required_id(self.id, "moodboard item")?,
            kind: self.item_type,
            content: self.content,
            position: Point::new(self.position_x, self.position_y),
            width: self.width,
            height: self.height,
            z_index: self.z_index,
            rotation: self.rotation,
            color: self.color,
        })
    }
}

fn put_position(record: &mut Record, position: Option<Point>) {
    if let Some(p) = position {
        record.insert("position_x".into(), json!(p.x));
        record.insert("position_y".into(), json!(p.y));
    }
}

fn put<T: Serialize>(record: &mut Record, key: &str, value: Option<&T>) {
    if let Some(v) = value {
        record.insert(key.into(), serde_json::to_value(v).unwrap_or(Value::Null));
    }
}

pub fn project_patch(patch: &ProjectPatch) -> Record {
    let mut r = Record::new();
    put(&mut r, "name", patch.name.as_ref());
    put(&mut r, "canvas_background", patch.background.as_ref());
    put(&mut r, "prompt_categories", patch.categories.as_ref());
    r
}

pub fn sequence_patch(patch: &SequencePatch) -> Record {
    let mut r = Record::new();
    put(&mut r, "title", patch.title.as_ref());
    put(&mut r, "story_context", patch.story_context.as_ref());
    put_position(&mut r, patch.position);
    put(&mut r, "is_collapsed", patch.collapsed.as_ref());
    put(&mut r, "aspect_ratio", patch.aspect_ratio.as_ref());
    put(&mut r, "layout_direction", patch.layout.as_ref());
    put(&mut r, "is_visible", patch.visible.as_ref());
    put(&mut r, "narrative_markers", patch.markers.as_ref());
    r
}

pub fn scene_patch(patch: &ScenePatch) -> Record {
    let mut r = Record::new();
    put(&mut r, "title", patch.title.as_ref());
    put(&mut r, "image_url", patch.image.as_ref());
    put(&mut r, "notes", patch.notes.as_ref());
    put_position(&mut r, patch.position);
    put(&mut r, "aspect_ratio", patch.aspect_ratio.as_ref());
    put(&mut r, "parent_id", patch.parent_id.as_ref());
    put(&mut r, "is_expanded", patch.expanded.as_ref());
    put(&mut r, "is_visible", patch.visible.as_ref());
    r
}

pub fn moodboard_patch(patch: &MoodBoardPatch) -> Record {
    let mut r = Record::new();
    put(&mut r, "content", patch.content.as_ref());
    put_position(&mut r, patch.position);
    put(&mut r, "width", patch.width.as_ref());
    put(&mut r, "height", patch.height.as_ref());
    put(&mut r, "z_index", patch.z_index.as_ref());
    put(&mut r, "rotation", patch.rotation.as_ref());
    put(&mut r, "color", patch.color.as_ref());
    r
}

pub fn order_index(index: usize) -> Record {
    let mut r = Record::new();
    r.insert("order_index".into(), json!(index));
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_rows_flatten_position() {
        let mut scene = Scene::new("Opening", Point::new(12.5, -4.0));
        scene.aspect_ratio = AspectRatio::Square;
        let seq_id = EntityId::temporary();
        let record = to_record(&SceneRow::new(&scene, seq_id, 3, Some(scene.id))).unwrap();
        assert_eq!(record["position_x"], 12.5);
        assert_eq!(record["position_y"], -4.0);
        assert_eq!(record["aspect_ratio"], "1:1");
        assert_eq!(record["order_index"], 3);
        assert!(!record.contains_key("position"));

        let back: SceneRow = from_record(record).unwrap();
        assert_eq!(back.into_scene().unwrap(), scene);
    }

    #[test]
    fn rows_without_confirmed_id_omit_the_key() {
        let project = Project::new("Pilot");
        let record = to_record(&ProjectRow::new(&project, None)).unwrap();
        assert!(!record.contains_key("id"));
        let row: ProjectRow = from_record(record).unwrap();
        assert!(row.into_project().is_err());
    }

    #[test]
    fn patch_records_carry_only_patched_fields() {
        let patch = ScenePatch {
            position: Some(Point::new(1.0, 2.0)),
            parent_id: Some(None),
            ..ScenePatch::default()
        };
        let record = scene_patch(&patch);
        let mut keys: Vec<_> = record.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["parent_id", "position_x", "position_y"]);
        assert_eq!(record["parent_id"], Value::Null);
    }

    #[test]
    fn malformed_records_are_reported() {
        let mut record = Record::new();
        record.insert("title".into(), json!(42));
        let err = from_record::<SceneRow>(record).unwrap_err();
        assert!(matches!(err, PersistError::Malformed(_)));
    }
}
