//! Optional-field deltas for each editable entity.
//!
//! A field left as `None` is untouched by [`Edit::apply`]. Nullable entity
//! fields use `Option<Option<T>>`: `Some(None)` clears the value.

use crate::error::{StoreError, StoreResult};
use crate::graph;
use crate::model::{
    AspectRatio, CanvasBackground, EntityId, LayoutDirection, MoodBoardItem, NarrativeMarker,
    Point, Project, Rgba, Scene, Sequence,
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub background: Option<CanvasBackground>,
    pub categories: Option<Vec<String>>,
}

impl ProjectPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.background.is_none() && self.categories.is_none()
    }

    fn capture(&self, current: &Project) -> Self {
        Self {
            name: self.name.as_ref().map(|_| current.name.clone()),
            background: self.background.map(|_| current.background),
            categories: self.categories.as_ref().map(|_| current.categories.clone()),
        }
    }

    fn merge_into(&self, target: &mut Project) {
        if let Some(name) = &self.name {
            target.name = name.clone();
        }
        if let Some(background) = self.background {
            target.background = background;
        }
        if let Some(categories) = &self.categories {
            target.categories = categories.clone();
        }
    }

    fn validate(&self) -> StoreResult<()> {
        if let Some(name) = &self.name {
            non_blank("project name", name)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SequencePatch {
    pub title: Option<String>,
    pub story_context: Option<String>,
    pub position: Option<Point>,
    pub collapsed: Option<bool>,
    pub aspect_ratio: Option<AspectRatio>,
    pub layout: Option<LayoutDirection>,
    pub visible: Option<bool>,
    pub markers: Option<Vec<NarrativeMarker>>,
}

impl SequencePatch {
    pub fn position(position: Point) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn markers(markers: Vec<NarrativeMarker>) -> Self {
        Self {
            markers: Some(markers),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.story_context.is_none()
            && self.position.is_none()
            && self.collapsed.is_none()
            && self.aspect_ratio.is_none()
            && self.layout.is_none()
            && self.visible.is_none()
            && self.markers.is_none()
    }

    fn capture(&self, current: &Sequence) -> Self {
        Self {
            title: self.title.as_ref().map(|_| current.title.clone()),
            story_context: self
                .story_context
                .as_ref()
                .map(|_| current.story_context.clone()),
            position: self.position.map(|_| current.position),
            collapsed: self.collapsed.map(|_| current.collapsed),
            aspect_ratio: self.aspect_ratio.map(|_| current.aspect_ratio),
            layout: self.layout.map(|_| current.layout),
            visible: self.visible.map(|_| current.visible),
            markers: self.markers.as_ref().map(|_| current.markers.clone()),
        }
    }

    fn merge_into(&self, target: &mut Sequence) {
        if let Some(title) = &self.title {
            target.title = title.clone();
        }
        if let Some(story_context) = &self.story_context {
            target.story_context = story_context.clone();
        }
        if let Some(position) = self.position {
            target.position = position;
        }
        if let Some(collapsed) = self.collapsed {
            target.collapsed = collapsed;
        }
        if let Some(aspect_ratio) = self.aspect_ratio {
            target.aspect_ratio = aspect_ratio;
        }
        if let Some(layout) = self.layout {
            target.layout = layout;
        }
        if let Some(visible) = self.visible {
            target.visible = visible;
        }
        if let Some(markers) = &self.markers {
            target.markers = markers.clone();
        }
    }

    fn validate(&self, current: &Sequence) -> StoreResult<()> {
        if let Some(title) = &self.title {
            non_blank("sequence title", title)?;
        }
        if let Some(position) = self.position {
            finite("sequence position", position)?;
        }
        if let Some(markers) = &self.markers {
            for marker in markers {
                for end in [marker.start_scene_id, marker.end_scene_id] {
                    if current.scene(end).is_none() {
                        return Err(StoreError::validation(format!(
                            "marker `{}` references scene {end} outside its sequence",
                            marker.label
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScenePatch {
    pub title: Option<String>,
    pub image: Option<Option<String>>,
    pub notes: Option<String>,
    pub position: Option<Point>,
    pub aspect_ratio: Option<AspectRatio>,
    pub parent_id: Option<Option<EntityId>>,
    pub expanded: Option<bool>,
    pub visible: Option<bool>,
}

impl ScenePatch {
    pub fn position(position: Point) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.image.is_none()
            && self.notes.is_none()
            && self.position.is_none()
            && self.aspect_ratio.is_none()
            && self.parent_id.is_none()
            && self.expanded.is_none()
            && self.visible.is_none()
    }

    fn capture(&self, current: &Scene) -> Self {
        Self {
            title: self.title.as_ref().map(|_| current.title.clone()),
            image: self.image.as_ref().map(|_| current.image.clone()),
            notes: self.notes.as_ref().map(|_| current.notes.clone()),
            position: self.position.map(|_| current.position),
            aspect_ratio: self.aspect_ratio.map(|_| current.aspect_ratio),
            parent_id: self.parent_id.map(|_| current.parent_id),
            expanded: self.expanded.map(|_| current.expanded),
            visible: self.visible.map(|_| current.visible),
        }
    }

    fn merge_into(&self, target: &mut Scene) {
        if let Some(title) = &self.title {
            target.title = title.clone();
        }
        if let Some(image) = &self.image {
            target.image = image.clone();
        }
        if let Some(notes) = &self.notes {
            target.notes = notes.clone();
        }
        if let Some(position) = self.position {
            target.position = position;
        }
        if let Some(aspect_ratio) = self.aspect_ratio {
            target.aspect_ratio = aspect_ratio;
        }
        if let Some(parent_id) = self.parent_id {
            target.parent_id = parent_id;
        }
        if let Some(expanded) = self.expanded {
            target.expanded = expanded;
        }
        if let Some(visible) = self.visible {
            target.visible = visible;
        }
    }

    fn validate(&self, sequence: &Sequence, scene_id: EntityId) -> StoreResult<()> {
        if let Some(title) = &self.title {
            non_blank("scene title", title)?;
        }
        if let Some(position) = self.position {
            finite("scene position", position)?;
        }
        if let Some(parent_id) = self.parent_id {
            graph::validate_nesting(sequence, scene_id, parent_id)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MoodBoardPatch {
    pub content: Option<String>,
    pub position: Option<Point>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub z_index: Option<i32>,
    pub rotation: Option<Option<f32>>,
    pub color: Option<Option<Rgba>>,
}

impl MoodBoardPatch {
    pub fn position(position: Point) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.position.is_none()
            && self.width.is_none()
            && self.height.is_none()
            && self.z_index.is_none()
            && self.rotation.is_none()
            && self.color.is_none()
    }

    fn capture(&self, current: &MoodBoardItem) -> Self {
        Self {
            content: self.content.as_ref().map(|_| current.content.clone()),
            position: self.position.map(|_| current.position),
            width: self.width.map(|_| current.width),
            height: self.height.map(|_| current.height),
            z_index: self.z_index.map(|_| current.z_index),
            rotation: self.rotation.map(|_| current.rotation),
            color: self.color.map(|_| current.color),
        }
    }

    fn merge_into(&self, target: &mut MoodBoardItem) {
        if let Some(content) = &self.content {
            target.content = content.clone();
        }
        if let Some(position) = self.position {
            target.position = position;
        }
        if let Some(width) = self.width {
            target.width = width;
        }
        if let Some(height) = self.height {
            target.height = height;
        }
        if let Some(z_index) = self.z_index {
            target.z_index = z_index;
        }
        if let Some(rotation) = self.rotation {
            target.rotation = rotation;
        }
        if let Some(color) = self.color {
            target.color = color;
        }
    }

    fn validate(&self) -> StoreResult<()> {
        if let Some(position) = self.position {
            finite("item position", position)?;
        }
        for (name, size) in [("width", self.width), ("height", self.height)] {
            match size {
                Some(size) if !(size.is_finite() && size > 0.0) => {
                    return Err(StoreError::validation(format!("item {name} must be positive")));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// A field-level change to one entity of the active project.
#[derive(Clone, Debug, PartialEq)]
pub enum Edit {
    Project(ProjectPatch),
    Sequence(EntityId, SequencePatch),
    Scene(EntityId, ScenePatch),
    MoodBoardItem(EntityId, MoodBoardPatch),
    /// Replaces the order of a sequence's scenes; the ids must be a
    /// permutation of the current scene ids.
    SceneOrder(EntityId, Vec<EntityId>),
}

impl Edit {
    pub fn is_empty(&self) -> bool {
        match self {
            Edit::Project(p) => p.is_empty(),
            Edit::Sequence(_, p) => p.is_empty(),
            Edit::Scene(_, p) => p.is_empty(),
            Edit::MoodBoardItem(_, p) => p.is_empty(),
            Edit::SceneOrder(..) => false,
        }
    }

    /// Validates and merges the edit, returning the edit that restores
    /// exactly the touched fields.
    pub fn apply(&self, project: &mut Project) -> StoreResult<Edit> {
        match self {
            Edit::Project(patch) => {
                patch.validate()?;
                let undo = patch.capture(project);
                patch.merge_into(project);
                Ok(Edit::Project(undo))
            }
            Edit::Sequence(id, patch) => {
                let sequence = project
                    .sequence_mut(*id)
                    .ok_or_else(|| StoreError::not_found("sequence", *id))?;
                patch.validate(sequence)?;
                let undo = patch.capture(sequence);
                patch.merge_into(sequence);
                Ok(Edit::Sequence(*id, undo))
            }
            Edit::Scene(id, patch) => {
                let (si, ci) = project
                    .locate_scene(*id)
                    .ok_or_else(|| StoreError::not_found("scene", *id))?;
                let sequence = &mut project.sequences[si];
                patch.validate(sequence, *id)?;
                let scene = &mut sequence.scenes[ci];
                let undo = patch.capture(scene);
                patch.merge_into(scene);
                Ok(Edit::Scene(*id, undo))
            }
            Edit::MoodBoardItem(id, patch) => {
                patch.validate()?;
                let item = project
                    .moodboard
                    .iter_mut()
                    .find(|i| i.id == *id)
                    .ok_or_else(|| StoreError::not_found("moodboard item", *id))?;
                let undo = patch.capture(item);
                patch.merge_into(item);
                Ok(Edit::MoodBoardItem(*id, undo))
            }
            Edit::SceneOrder(sequence_id, order) => {
                let sequence = project
                    .sequence_mut(*sequence_id)
                    .ok_or_else(|| StoreError::not_found("sequence", *sequence_id))?;
                let previous: Vec<EntityId> = sequence.scenes.iter().map(|s| s.id).collect();
                let mut sorted_new = order.clone();
                let mut sorted_old = previous.clone();
                sorted_new.sort();
                sorted_old.sort();
                if sorted_new != sorted_old {
                    return Err(StoreError::validation(
                        "scene order must list every scene of the sequence exactly once",
                    ));
                }
                sequence
                    .scenes
                    .sort_by_key(|s| order.iter().position(|id| *id == s.id));
                Ok(Edit::SceneOrder(*sequence_id, previous))
            }
        }
    }

    /// Rewrites references to `from` after a temporary id was confirmed.
    pub fn remap_id(&mut self, from: EntityId, to: EntityId) {
        let swap = |id: &mut EntityId| {
            if *id == from {
                *id = to;
            }
        };
        match self {
            Edit::Project(_) => {}
            Edit::Sequence(id, patch) => {
                swap(id);
                if let Some(markers) = &mut patch.markers {
                    for m in markers {
                        swap(&mut m.start_scene_id);
                        swap(&mut m.end_scene_id);
                    }
                }
            }
            Edit::Scene(id, patch) => {
                swap(id);
                if let Some(Some(parent)) = &mut patch.parent_id {
                    swap(parent);
                }
            }
            Edit::MoodBoardItem(id, _) => swap(id),
            Edit::SceneOrder(id, order) => {
                swap(id);
                order.iter_mut().for_each(swap);
            }
        }
    }
}

fn non_blank(what: &str, value: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::validation(format!("{what} cannot be empty")));
    }
    Ok(())
}

fn finite(what: &str, p: Point) -> StoreResult<()> {
    if !p.is_finite() {
        return Err(StoreError::validation(format!("{what} must be finite")));
    }
    Ok(())
}
