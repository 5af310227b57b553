//! The project aggregate: every mutation of the editor goes through
//! [`ProjectStore`], which applies it locally, notifies observers, confirms
//! it against the persistence collaborator and records it for undo.

use crate::clipboard::{self, Pasted};
use crate::error::{PersistError, StoreError, StoreResult};
use crate::graph::{self, MarkerEdge, SearchHit, Step};
use crate::history::{Command, CommandHistory, HISTORY_LIMIT};
use crate::model::{
    AspectRatio, Connection, EntityId, EntityKind, MoodBoardItem, NarrativeMarker, Point, Project,
    Prompt, Rgba, Scene, Selection, Sequence,
};
use crate::mutator::{self, Entity, EntityRef, Operation, Snapshot, Write};
use crate::patch::{Edit, MoodBoardPatch, ProjectPatch, ScenePatch, SequencePatch};
use crate::persistence::{Filter, Persistence, Table};
use crate::viewport::{Surface, ViewportController};
use crate::wire::{self, ConnectionRow, MoodBoardRow, ProjectRow, PromptRow, SceneRow, SequenceRow};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct StoreConfig {
    /// Upper bound for every persistence call.
    pub persist_timeout: Duration,
    pub history_limit: usize,
    /// Snap distance in world units for sequence drags.
    pub snap_threshold: f32,
    /// Aspect ratio given to new sequences and scenes.
    pub default_aspect_ratio: AspectRatio,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            persist_timeout: Duration::from_secs(10),
            history_limit: HISTORY_LIMIT,
            snap_threshold: 8.0,
            default_aspect_ratio: AspectRatio::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StoreEvent {
    /// Project contents changed (locally applied, confirmed or rolled back).
    Changed,
    ProjectSwitched(Option<EntityId>),
    /// User-facing message, e.g. after a rollback.
    Notice(String),
}

pub type Listener = Box<dyn FnMut(&StoreEvent)>;

/// Outcome of a confirmed operation.
struct Executed {
    redo: Operation,
    undo: Operation,
    swaps: Vec<(EntityId, EntityId)>,
}

impl Executed {
    fn confirmed_id(&self, local: EntityId) -> EntityId {
        self.swaps
            .iter()
            .find(|(from, _)| *from == local)
            .map_or(local, |(_, to)| *to)
    }
}

pub struct ProjectStore {
    persistence: Arc<dyn Persistence>,
    config: StoreConfig,
    projects: Vec<Project>,
    active: Option<EntityId>,
    history: CommandHistory,
    viewports: ViewportController,
    pending: HashSet<EntityId>,
    listeners: Vec<Listener>,
    notices: Vec<String>,
}

fn non_blank(what: &str, value: &str) -> StoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::validation(format!("{what} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

impl ProjectStore {
    pub fn new(persistence: Arc<dyn Persistence>, config: StoreConfig) -> Self {
        Self {
            persistence,
            history: CommandHistory::new(config.history_limit),
            viewports: ViewportController::new(config.snap_threshold),
            config,
            projects: Vec::new(),
            active: None,
            pending: HashSet::new(),
            listeners: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // Observers

    pub fn subscribe(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    fn emit(&mut self, event: StoreEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }

    fn notify(&mut self, message: String) {
        self.notices.push(message.clone());
        self.emit(StoreEvent::Notice(message));
    }

    /// Drains notices raised since the last call.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    // Read access

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn active_project_id(&self) -> Option<EntityId> {
        self.active
    }

    pub fn active_project(&self) -> Option<&Project> {
        let id = self.active?;
        self.projects.iter().find(|p| p.id == id)
    }

    fn active_mut(&mut self) -> StoreResult<&mut Project> {
        let id = self.active.ok_or(StoreError::NoActiveProject)?;
        self.projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NoActiveProject)
    }

    fn project(&self) -> StoreResult<&Project> {
        self.active_project().ok_or(StoreError::NoActiveProject)
    }

    /// True while the entity's insert has not been confirmed.
    pub fn is_pending(&self, id: EntityId) -> bool {
        self.pending.contains(&id)
    }

    pub fn viewports(&self) -> &ViewportController {
        &self.viewports
    }

    pub fn viewports_mut(&mut self) -> &mut ViewportController {
        &mut self.viewports
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        self.active_project()
            .map(|p| graph::search(p, query))
            .unwrap_or_default()
    }

    // Pipeline

    async fn execute(&mut self, label: &str, op: Operation) -> StoreResult<Executed> {
        let project = self.active_mut()?;
        let applied = mutator::apply(project, &op)?;
        let fresh: Vec<EntityId> = applied
            .writes
            .iter()
            .filter_map(|w| match w {
                Write::Insert {
                    local_id,
                    fresh: true,
                    ..
                } => Some(*local_id),
                _ => None,
            })
            .collect();
        self.pending.extend(fresh.iter().copied());
        if let Operation::Remove(target) = &op {
            self.forget_selection(target.id());
        }
        tracing::debug!(label, writes = applied.writes.len(), "applied locally");
        self.emit(StoreEvent::Changed);

        let result = mutator::persist(
            self.persistence.as_ref(),
            applied.writes,
            self.config.persist_timeout,
        )
        .await;
        for id in &fresh {
            self.pending.remove(id);
        }

        match result {
            Ok(swaps) => {
                let mut redo = op;
                let mut undo = applied.inverse;
                for &(from, to) in &swaps {
                    self.reconcile(from, to);
                    redo.remap_id(from, to);
                    undo.remap_id(from, to);
                }
                redo.settle();
                if !swaps.is_empty() {
                    self.emit(StoreEvent::Changed);
                }
                tracing::debug!(label, "confirmed");
                Ok(Executed { redo, undo, swaps })
            }
            Err(error) => Err(self.roll_back(label, &applied.inverse, error)),
        }
    }

    fn roll_back(&mut self, label: &str, inverse: &Operation, error: PersistError) -> StoreError {
        tracing::warn!(label, error = %error, "persistence failed, rolling back");
        match self.active_mut() {
            Ok(project) => {
                if let Err(e) = mutator::apply(project, inverse) {
                    tracing::error!(label, error = %e, "rollback could not be applied");
                }
            }
            Err(e) => tracing::error!(label, error = %e, "rollback without an active project"),
        }
        self.emit(StoreEvent::Changed);
        self.notify(format!("Couldn't save {label}: {error}"));
        error.into()
    }

    fn reconcile(&mut self, from: EntityId, to: EntityId) {
        if let Ok(project) = self.active_mut() {
            mutator::reconcile_id(project, from, to);
        }
        self.viewports.reconcile_id(from, to);
        tracing::debug!(%from, %to, "temporary id confirmed");
    }

    fn forget_selection(&mut self, id: EntityId) {
        for surface in [Surface::Main, Surface::MoodBoard] {
            if self.viewports.selection(surface).map(|s| s.id) == Some(id) {
                self.viewports.select(surface, None);
            }
        }
        if self.viewports.drag().map(|d| d.target.id) == Some(id) {
            self.viewports.cancel_drag();
        }
    }

    /// Applies and persists `op` without recording it.
    pub async fn run(&mut self, label: &str, op: Operation) -> StoreResult<()> {
        self.execute(label, op).await.map(|_| ())
    }

    /// Like [`ProjectStore::run`], recording the command once confirmed.
    pub async fn run_tracked(&mut self, label: &str, op: Operation) -> StoreResult<()> {
        self.track(label, op).await.map(|_| ())
    }

    async fn track(&mut self, label: &str, op: Operation) -> StoreResult<Executed> {
        let executed = self.execute(label, op).await?;
        self.history.record(Command::new(
            label,
            executed.redo.clone(),
            executed.undo.clone(),
        ));
        Ok(executed)
    }

    async fn insert_tracked(&mut self, label: &str, entity: Entity) -> StoreResult<EntityId> {
        let local = entity.id();
        let executed = self
            .track(label, Operation::Insert(Snapshot::fresh(entity)))
            .await?;
        Ok(executed.confirmed_id(local))
    }

    async fn edit(&mut self, label: &str, edit: Edit) -> StoreResult<()> {
        self.run_tracked(label, Operation::Edit(edit)).await
    }

    /// Undoes the most recent command. `Ok(false)` when there is none.
    pub async fn undo(&mut self) -> StoreResult<bool> {
        let Some(command) = self.history.take_undo() else {
            return Ok(false);
        };
        let label = format!("undo {}", command.label);
        match self.run(&label, command.undo.clone()).await {
            Ok(()) => {
                self.history.finish_undo(command);
                Ok(true)
            }
            Err(e) => {
                self.history.restore_undo(command);
                Err(e)
            }
        }
    }

    pub async fn redo(&mut self) -> StoreResult<bool> {
        let Some(command) = self.history.take_redo() else {
            return Ok(false);
        };
        let label = format!("redo {}", command.label);
        match self.run(&label, command.redo.clone()).await {
            Ok(()) => {
                self.history.finish_redo(command);
                Ok(true)
            }
            Err(e) => {
                self.history.restore_redo(command);
                Err(e)
            }
        }
    }

    // Projects

    /// Replaces the in-memory projects with what persistence holds.
    pub async fn load(&mut self) -> StoreResult<()> {
        let persistence = Arc::clone(&self.persistence);
        let timeout = self.config.persist_timeout;
        let rows =
            mutator::bounded(timeout, persistence.select(Table::Projects, Filter::All)).await?;
        let mut projects = Vec::with_capacity(rows.len());
        for record in rows {
            let mut project = wire::from_record::<ProjectRow>(record)?.into_project()?;
            load_children(persistence.as_ref(), timeout, &mut project).await?;
            projects.push(project);
        }
        projects.sort_by_key(|p| p.created_at);
        tracing::info!(projects = projects.len(), "loaded projects");

        let keep = self
            .active
            .filter(|id| projects.iter().any(|p| p.id == *id))
            .or_else(|| projects.first().map(|p| p.id));
        self.projects = projects;
        self.active = None;
        self.set_active(keep);
        self.emit(StoreEvent::Changed);
        Ok(())
    }

    fn set_active(&mut self, id: Option<EntityId>) {
        if self.active == id {
            return;
        }
        self.history.clear();
        self.viewports.reset_interaction();
        self.active = id;
        tracing::info!(project = ?id, "switched project");
        self.emit(StoreEvent::ProjectSwitched(id));
    }

    pub fn switch_project(&mut self, id: EntityId) -> StoreResult<()> {
        if !self.projects.iter().any(|p| p.id == id) {
            return Err(StoreError::not_found("project", id));
        }
        self.set_active(Some(id));
        Ok(())
    }

    /// Creates a project and makes it active once confirmed.
    pub async fn create_project(&mut self, name: &str) -> StoreResult<EntityId> {
        let project = Project::new(non_blank("project name", name)?);
        let local = project.id;
        let record = wire::to_record(&ProjectRow::new(&project, None))?;
        self.projects.push(project);
        self.pending.insert(local);
        self.emit(StoreEvent::Changed);

        let writes = vec![Write::Insert {
            table: Table::Projects,
            record,
            local_id: local,
            fresh: true,
        }];
        let result = mutator::persist(
            self.persistence.as_ref(),
            writes,
            self.config.persist_timeout,
        )
        .await;
        self.pending.remove(&local);
        match result {
            Ok(swaps) => {
                let id = swaps.first().map_or(local, |(_, to)| *to);
                if let Some(project) = self.projects.iter_mut().find(|p| p.id == local) {
                    project.id = id;
                }
                self.set_active(Some(id));
                self.emit(StoreEvent::Changed);
                Ok(id)
            }
            Err(error) => {
                tracing::warn!(error = %error, "project creation failed");
                self.projects.retain(|p| p.id != local);
                self.emit(StoreEvent::Changed);
                self.notify(format!("Couldn't create project: {error}"));
                Err(error.into())
            }
        }
    }

    /// Deletes a project with everything it owns. Not undoable.
    pub async fn delete_project(&mut self, id: EntityId) -> StoreResult<()> {
        let index = self
            .projects
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| StoreError::not_found("project", id))?;
        let project = self.projects.remove(index);
        let was_active = self.active == Some(id);
        if was_active {
            let next = self.projects.first().map(|p| p.id);
            self.set_active(next);
        }
        self.emit(StoreEvent::Changed);

        let writes = vec![Write::Delete {
            table: Table::Projects,
            id,
        }];
        let result = mutator::persist(
            self.persistence.as_ref(),
            writes,
            self.config.persist_timeout,
        )
        .await;
        match result {
            Ok(_) => Ok(()),
            Err(error) => {
                tracing::warn!(%id, error = %error, "project deletion failed");
                let at = index.min(self.projects.len());
                self.projects.insert(at, project);
                if was_active {
                    self.set_active(Some(id));
                }
                self.emit(StoreEvent::Changed);
                self.notify(format!("Couldn't delete project: {error}"));
                Err(error.into())
            }
        }
    }

    pub async fn update_project(&mut self, patch: ProjectPatch) -> StoreResult<()> {
        self.edit("project settings", Edit::Project(patch)).await
    }

    // Sequences

    pub async fn create_sequence(&mut self, title: &str, position: Point) -> StoreResult<EntityId> {
        let mut sequence = Sequence::new(non_blank("sequence title", title)?, position);
        sequence.aspect_ratio = self.config.default_aspect_ratio;
        self.insert_tracked("create sequence", Entity::Sequence(sequence))
            .await
    }

    pub async fn update_sequence(&mut self, id: EntityId, patch: SequencePatch) -> StoreResult<()> {
        self.edit("edit sequence", Edit::Sequence(id, patch)).await
    }

    pub async fn delete_sequence(&mut self, id: EntityId) -> StoreResult<()> {
        self.run_tracked("delete sequence", Operation::Remove(EntityRef::Sequence(id)))
            .await
    }

    // Scenes

    /// Appends a scene to a sequence, optionally as a sub-scene of `parent`.
    pub async fn create_scene(
        &mut self,
        sequence_id: EntityId,
        title: &str,
        parent: Option<EntityId>,
    ) -> StoreResult<EntityId> {
        let mut scene = Scene::new(non_blank("scene title", title)?, Point::ZERO);
        scene.parent_id = parent;
        scene.aspect_ratio = self.config.default_aspect_ratio;
        self.insert_tracked("create scene", Entity::Scene { sequence_id, scene })
            .await
    }

    pub async fn update_scene(&mut self, id: EntityId, patch: ScenePatch) -> StoreResult<()> {
        self.edit("edit scene", Edit::Scene(id, patch)).await
    }

    /// Removes a scene, its sub-scenes and every connection touching them.
    pub async fn delete_scene(&mut self, id: EntityId) -> StoreResult<()> {
        self.run_tracked("delete scene", Operation::Remove(EntityRef::Scene(id)))
            .await
    }

    /// Moves a scene to `to_index` within its sequence.
    pub async fn move_scene(&mut self, scene_id: EntityId, to_index: usize) -> StoreResult<()> {
        let project = self.project()?;
        let (si, ci) = project
            .locate_scene(scene_id)
            .ok_or_else(|| StoreError::not_found("scene", scene_id))?;
        let sequence = &project.sequences[si];
        let mut order: Vec<EntityId> = sequence.scenes.iter().map(|s| s.id).collect();
        let to = to_index.min(order.len() - 1);
        if to == ci {
            return Ok(());
        }
        let moved = order.remove(ci);
        order.insert(to, moved);

        let mut reordered = sequence.clone();
        reordered
            .scenes
            .sort_by_key(|s| order.iter().position(|id| *id == s.id));
        if graph::marker_conflicts(&reordered) > graph::marker_conflicts(sequence) {
            return Err(StoreError::invariant(
                "that move would break a narrative marker; adjust the marker first",
            ));
        }
        let sequence_id = sequence.id;
        self.edit("reorder scenes", Edit::SceneOrder(sequence_id, order))
            .await
    }

    // Narrative markers

    fn sequence(&self, id: EntityId) -> StoreResult<&Sequence> {
        self.project()?
            .sequence(id)
            .ok_or_else(|| StoreError::not_found("sequence", id))
    }

    async fn set_markers(
        &mut self,
        label: &str,
        sequence_id: EntityId,
        markers: Vec<NarrativeMarker>,
    ) -> StoreResult<()> {
        self.edit(
            label,
            Edit::Sequence(sequence_id, SequencePatch::markers(markers)),
        )
        .await
    }

    /// Creates a marker over the first free one- or two-scene span.
    pub async fn create_marker(
        &mut self,
        sequence_id: EntityId,
        label: &str,
    ) -> StoreResult<EntityId> {
        let sequence = self.sequence(sequence_id)?;
        let marker = graph::new_marker(sequence, non_blank("marker label", label)?)?;
        let id = marker.id;
        let mut markers = sequence.markers.clone();
        markers.push(marker);
        self.set_markers("create marker", sequence_id, markers).await?;
        Ok(id)
    }

    /// Moves one edge of a marker by one scene. `Ok(false)` when the move
    /// was clamped away.
    pub async fn update_marker_range(
        &mut self,
        sequence_id: EntityId,
        marker_id: EntityId,
        edge: MarkerEdge,
        step: Step,
    ) -> StoreResult<bool> {
        let sequence = self.sequence(sequence_id)?;
        let Some(updated) = graph::adjusted_marker(sequence, marker_id, edge, step)? else {
            return Ok(false);
        };
        let markers = replace_marker(&sequence.markers, updated);
        self.set_markers("resize marker", sequence_id, markers).await?;
        Ok(true)
    }

    pub async fn update_marker(
        &mut self,
        sequence_id: EntityId,
        marker_id: EntityId,
        label: Option<&str>,
        color: Option<Rgba>,
    ) -> StoreResult<()> {
        let sequence = self.sequence(sequence_id)?;
        let mut marker = sequence
            .marker(marker_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("marker", marker_id))?;
        if let Some(label) = label {
            marker.label = non_blank("marker label", label)?;
        }
        if let Some(color) = color {
            marker.color = color;
        }
        let markers = replace_marker(&sequence.markers, marker);
        self.set_markers("edit marker", sequence_id, markers).await
    }

    pub async fn delete_marker(
        &mut self,
        sequence_id: EntityId,
        marker_id: EntityId,
    ) -> StoreResult<()> {
        let sequence = self.sequence(sequence_id)?;
        if sequence.marker(marker_id).is_none() {
            return Err(StoreError::not_found("marker", marker_id));
        }
        let markers = sequence
            .markers
            .iter()
            .filter(|m| m.id != marker_id)
            .cloned()
            .collect();
        self.set_markers("delete marker", sequence_id, markers).await
    }

    // Connections

    pub async fn create_connection(
        &mut self,
        from: EntityId,
        to: EntityId,
    ) -> StoreResult<EntityId> {
        let project = self.project()?;
        let kind_of = |id| {
            project.node_kind(id).ok_or_else(|| {
                StoreError::invariant(format!("connection endpoint {id} does not exist"))
            })
        };
        let connection = Connection {
            id: EntityId::temporary(),
            from_id: from,
            from_type: kind_of(from)?,
            to_id: to,
            to_type: kind_of(to)?,
        };
        self.insert_tracked("connect", Entity::Connection(connection))
            .await
    }

    pub async fn delete_connection(&mut self, id: EntityId) -> StoreResult<()> {
        self.run_tracked("disconnect", Operation::Remove(EntityRef::Connection(id)))
            .await
    }

    // Prompts and categories

    pub async fn create_prompt(
        &mut self,
        name: &str,
        text: &str,
        category: Option<&str>,
    ) -> StoreResult<EntityId> {
        let project = self.project()?;
        if let Some(category) = category {
            if !project.categories.iter().any(|c| c == category) {
                return Err(StoreError::validation(format!(
                    "unknown prompt category `{category}`"
                )));
            }
        }
        let prompt = Prompt {
            id: EntityId::temporary(),
            name: non_blank("prompt name", name)?,
            text: text.to_string(),
            category: category.map(str::to_string),
        };
        self.insert_tracked("create prompt", Entity::Prompt(prompt))
            .await
    }

    pub async fn delete_prompt(&mut self, id: EntityId) -> StoreResult<()> {
        self.run_tracked("delete prompt", Operation::Remove(EntityRef::Prompt(id)))
            .await
    }

    pub async fn add_category(&mut self, name: &str) -> StoreResult<()> {
        let name = non_blank("category name", name)?;
        let project = self.project()?;
        if project.categories.contains(&name) {
            return Err(StoreError::validation(format!(
                "category `{name}` already exists"
            )));
        }
        let mut categories = project.categories.clone();
        categories.push(name);
        self.update_project(ProjectPatch {
            categories: Some(categories),
            ..ProjectPatch::default()
        })
        .await
    }

    /// Removes a category; refused while prompts are filed under it.
    pub async fn delete_category(&mut self, name: &str) -> StoreResult<()> {
        let project = self.project()?;
        if !project.categories.iter().any(|c| c == name) {
            return Err(StoreError::validation(format!("unknown category `{name}`")));
        }
        let dependents = project
            .prompts
            .iter()
            .filter(|p| p.category.as_deref() == Some(name))
            .count();
        if dependents > 0 {
            return Err(StoreError::invariant(format!(
                "category `{name}` is used by {dependents} prompt(s); reassign them first"
            )));
        }
        let categories = project
            .categories
            .iter()
            .filter(|c| c.as_str() != name)
            .cloned()
            .collect();
        self.update_project(ProjectPatch {
            categories: Some(categories),
            ..ProjectPatch::default()
        })
        .await
    }

    // Moodboard

    /// Adds an item on top of the moodboard stack.
    pub async fn create_moodboard_item(
        &mut self,
        mut item: MoodBoardItem,
    ) -> StoreResult<EntityId> {
        item.id = EntityId::temporary();
        item.z_index = self.project()?.top_z_index() + 1;
        self.insert_tracked("add to moodboard", Entity::MoodBoardItem(item))
            .await
    }

    pub async fn create_note(&mut self, content: &str, at: Point) -> StoreResult<EntityId> {
        self.create_moodboard_item(MoodBoardItem::note(content, at))
            .await
    }

    pub async fn update_moodboard_item(
        &mut self,
        id: EntityId,
        patch: MoodBoardPatch,
    ) -> StoreResult<()> {
        self.edit("edit moodboard item", Edit::MoodBoardItem(id, patch))
            .await
    }

    pub async fn delete_moodboard_item(&mut self, id: EntityId) -> StoreResult<()> {
        self.run_tracked(
            "delete moodboard item",
            Operation::Remove(EntityRef::MoodBoardItem(id)),
        )
        .await
    }

    pub async fn bring_to_front(&mut self, id: EntityId) -> StoreResult<()> {
        let project = self.project()?;
        let item = project
            .moodboard_item(id)
            .ok_or_else(|| StoreError::not_found("moodboard item", id))?;
        let top = project.top_z_index();
        let at_top = project.moodboard.iter().filter(|i| i.z_index == top).count();
        if item.z_index == top && at_top == 1 {
            return Ok(());
        }
        self.update_moodboard_item(
            id,
            MoodBoardPatch {
                z_index: Some(top + 1),
                ..MoodBoardPatch::default()
            },
        )
        .await
    }

    pub fn copy_moodboard_item(&self, id: EntityId) -> StoreResult<String> {
        let item = self
            .project()?
            .moodboard_item(id)
            .ok_or_else(|| StoreError::not_found("moodboard item", id))?;
        clipboard::copy_item(item).map_err(|e| StoreError::validation(e.to_string()))
    }

    /// Pastes clipboard content onto the moodboard at `at`. Unrecognised
    /// content is ignored with `Ok(None)`.
    pub async fn paste(
        &mut self,
        text: Option<&str>,
        bytes: Option<&[u8]>,
        at: Point,
    ) -> StoreResult<Option<EntityId>> {
        let Some(pasted) = clipboard::paste(text, bytes) else {
            return Ok(None);
        };
        let label = match pasted {
            Pasted::Item(_) => "paste moodboard item",
            Pasted::Image { .. } => "paste image",
        };
        let item = pasted.into_item(at, self.project()?.top_z_index() + 1);
        self.insert_tracked(label, Entity::MoodBoardItem(item))
            .await
            .map(Some)
    }

    // Dragging

    fn committed_position(&self, target: Selection) -> StoreResult<Point> {
        let project = self.project()?;
        let position = match target.kind {
            EntityKind::Sequence => project.sequence(target.id).map(|s| s.position),
            EntityKind::Scene => project.scene(target.id).map(|s| s.position),
            EntityKind::MoodBoardItem => project.moodboard_item(target.id).map(|i| i.position),
            _ => {
                return Err(StoreError::validation(format!(
                    "a {} cannot be dragged",
                    target.kind.as_str()
                )));
            }
        };
        position.ok_or_else(|| StoreError::not_found(target.kind.as_str(), target.id))
    }

    pub fn begin_drag(&mut self, surface: Surface, target: Selection) -> StoreResult<()> {
        let start = self.committed_position(target)?;
        self.viewports.begin_drag(surface, target, start);
        Ok(())
    }

    /// Updates the in-flight position from the pointer's total screen delta.
    pub fn drag_to(&mut self, screen_delta: eframe::egui::Vec2) -> Option<Point> {
        let dragged = self.viewports.drag()?.target.id;
        let neighbors: Vec<Point> = self
            .active_project()
            .map(|p| {
                p.sequences
                    .iter()
                    .filter(|s| s.id != dragged)
                    .map(|s| s.position)
                    .collect()
            })
            .unwrap_or_default();
        let position = self.viewports.drag_to(screen_delta, neighbors);
        self.emit(StoreEvent::Changed);
        position
    }

    pub fn cancel_drag(&mut self) {
        self.viewports.cancel_drag();
        self.emit(StoreEvent::Changed);
    }

    /// Commits a finished drag as one undoable move whose undo restores the
    /// drag-start position. `Ok(false)` when nothing moved.
    pub async fn end_drag(&mut self) -> StoreResult<bool> {
        let Some(outcome) = self.viewports.end_drag() else {
            return Ok(false);
        };
        if !outcome.moved() {
            return Ok(false);
        }
        let id = outcome.target.id;
        let (label, redo, undo) = match outcome.target.kind {
            EntityKind::Sequence => (
                "move sequence",
                Edit::Sequence(id, SequencePatch::position(outcome.to)),
                Edit::Sequence(id, SequencePatch::position(outcome.from)),
            ),
            EntityKind::Scene => (
                "move scene",
                Edit::Scene(id, ScenePatch::position(outcome.to)),
                Edit::Scene(id, ScenePatch::position(outcome.from)),
            ),
            _ => (
                "move moodboard item",
                Edit::MoodBoardItem(id, MoodBoardPatch::position(outcome.to)),
                Edit::MoodBoardItem(id, MoodBoardPatch::position(outcome.from)),
            ),
        };
        let executed = self.execute(label, Operation::Edit(redo)).await?;
        self.history
            .record(Command::new(label, executed.redo, Operation::Edit(undo)));
        Ok(true)
    }
}

fn replace_marker(
    markers: &[NarrativeMarker],
    updated: NarrativeMarker,
) -> Vec<NarrativeMarker> {
    markers
        .iter()
        .map(|m| if m.id == updated.id { updated.clone() } else { m.clone() })
        .collect()
}

async fn load_children(
    persistence: &dyn Persistence,
    timeout: Duration,
    project: &mut Project,
) -> StoreResult<()> {
    let project_id = project.id;
    let by_project = || Filter::Eq("project_id", project_id);

    let rows = mutator::bounded(timeout, persistence.select(Table::Sequences, by_project())).await?;
    for record in rows {
        let mut sequence = wire::from_record::<SequenceRow>(record)?.into_sequence()?;
        let by_sequence = Filter::Eq("sequence_id", sequence.id);
        let scene_rows =
            mutator::bounded(timeout, persistence.select(Table::Scenes, by_sequence)).await?;
        let mut scenes = scene_rows
            .into_iter()
            .map(wire::from_record::<SceneRow>)
            .collect::<Result<Vec<_>, _>>()?;
        scenes.sort_by_key(|row| row.order_index);
        sequence.scenes = scenes
            .into_iter()
            .map(SceneRow::into_scene)
            .collect::<Result<_, _>>()?;
        project.sequences.push(sequence);
    }

    let rows =
        mutator::bounded(timeout, persistence.select(Table::Connections, by_project())).await?;
    for record in rows {
        let connection = wire::from_record::<ConnectionRow>(record)?.into_connection()?;
        project.connections.push(connection);
    }

    let rows = mutator::bounded(timeout, persistence.select(Table::Prompts, by_project())).await?;
    for record in rows {
        project
            .prompts
            .push(wire::from_record::<PromptRow>(record)?.into_prompt()?);
    }

    let rows =
        mutator::bounded(timeout, persistence.select(Table::MoodBoardItems, by_project())).await?;
    for record in rows {
        project
            .moodboard
            .push(wire::from_record::<MoodBoardRow>(record)?.into_item()?);
    }
    project.moodboard.sort_by_key(|i| i.z_index);
    tracing::debug!(
        project = %project.id,
        sequences = project.sequences.len(),
        items = project.moodboard.len(),
        "loaded project"
    );
    Ok(())
}
