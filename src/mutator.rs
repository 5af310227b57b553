//! Optimistic mutation: apply locally, confirm remotely, roll back on
//! failure.
//!
//! [`apply`] performs the synchronous local effect and returns both the
//! inverse operation and the remote writes needed to confirm it. [`persist`]
//! replays those writes against the collaborator. The store glues the two
//! together and applies the inverse locally when persistence fails.

use crate::error::{PersistError, StoreError, StoreResult};
use crate::graph;
use crate::model::{Connection, EntityId, MoodBoardItem, Project, Prompt, Scene, Sequence};
use crate::patch::Edit;
use crate::persistence::{Persistence, Record, Table};
use crate::wire::{self, ConnectionRow, MoodBoardRow, PromptRow, SceneRow, SequenceRow};
use serde_json::Value;
use std::time::Duration;

/// Reference to a removable child of the active project.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityRef {
    Sequence(EntityId),
    Scene(EntityId),
    Connection(EntityId),
    Prompt(EntityId),
    MoodBoardItem(EntityId),
}

impl EntityRef {
    pub fn id(self) -> EntityId {
        match self {
            EntityRef::Sequence(id)
            | EntityRef::Scene(id)
            | EntityRef::Connection(id)
            | EntityRef::Prompt(id)
            | EntityRef::MoodBoardItem(id) => id,
        }
    }

    fn kind(self) -> &'static str {
        match self {
            EntityRef::Sequence(_) => "sequence",
            EntityRef::Scene(_) => "scene",
            EntityRef::Connection(_) => "connection",
            EntityRef::Prompt(_) => "prompt",
            EntityRef::MoodBoardItem(_) => "moodboard item",
        }
    }
}

/// An owned entity, ready to be (re-)inserted.
#[derive(Clone, Debug, PartialEq)]
pub enum Entity {
    Sequence(Sequence),
    Scene { sequence_id: EntityId, scene: Scene },
    Connection(Connection),
    Prompt(Prompt),
    MoodBoardItem(MoodBoardItem),
}

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Entity::Sequence(s) => s.id,
            Entity::Scene { scene, .. } => scene.id,
            Entity::Connection(c) => c.id,
            Entity::Prompt(p) => p.id,
            Entity::MoodBoardItem(i) => i.id,
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        match self {
            Entity::Sequence(s) => EntityRef::Sequence(s.id),
            Entity::Scene { scene, .. } => EntityRef::Scene(scene.id),
            Entity::Connection(c) => EntityRef::Connection(c.id),
            Entity::Prompt(p) => EntityRef::Prompt(p.id),
            Entity::MoodBoardItem(i) => EntityRef::MoodBoardItem(i.id),
        }
    }
}

/// Everything a removal took out of the project, with original indices.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub entity: Entity,
    /// Index in the owning collection; `None` appends.
    pub index: Option<usize>,
    /// Sub-scenes removed together with a scene.
    pub sub_scenes: Vec<(usize, Scene)>,
    /// Connections that referenced the removed entities.
    pub connections: Vec<(usize, Connection)>,
    /// The entity carries a temporary id the remote side has never seen.
    pub fresh: bool,
}

impl Snapshot {
    /// Snapshot for a brand-new entity appended to its collection.
    pub fn fresh(entity: Entity) -> Self {
        Self {
            entity,
            index: None,
            sub_scenes: Vec::new(),
            connections: Vec::new(),
            fresh: true,
        }
    }
}

/// A replayable change; commands are pairs of these.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    Edit(Edit),
    Insert(Snapshot),
    Remove(EntityRef),
}

impl Operation {
    /// Marks a confirmed insert so replaying it keeps the confirmed id.
    pub fn settle(&mut self) {
        if let Operation::Insert(snapshot) = self {
            snapshot.fresh = false;
        }
    }

    pub fn remap_id(&mut self, from: EntityId, to: EntityId) {
        match self {
            Operation::Edit(edit) => edit.remap_id(from, to),
            Operation::Insert(snapshot) => remap_snapshot(snapshot, from, to),
            Operation::Remove(r) => {
                if r.id() == from {
                    *r = match *r {
                        EntityRef::Sequence(_) => EntityRef::Sequence(to),
                        EntityRef::Scene(_) => EntityRef::Scene(to),
                        EntityRef::Connection(_) => EntityRef::Connection(to),
                        EntityRef::Prompt(_) => EntityRef::Prompt(to),
                        EntityRef::MoodBoardItem(_) => EntityRef::MoodBoardItem(to),
                    };
                }
            }
        }
    }
}

/// A remote write derived from a local operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Write {
    Insert {
        table: Table,
        record: Record,
        /// Id the entity has locally; swapped for the confirmed id when
        /// `fresh`.
        local_id: EntityId,
        fresh: bool,
    },
    Update {
        table: Table,
        id: EntityId,
        record: Record,
    },
    Delete {
        table: Table,
        id: EntityId,
    },
}

impl Write {
    fn remap(&mut self, from: EntityId, to: EntityId) {
        let from_s = from.to_string();
        let fix = |record: &mut Record| {
            for value in record.values_mut() {
                if value.as_str() == Some(from_s.as_str()) {
                    *value = Value::String(to.to_string());
                }
            }
        };
        match self {
            Write::Insert { record, .. } => fix(record),
            Write::Update { id, record, .. } => {
                if *id == from {
                    *id = to;
                }
                fix(record);
            }
            Write::Delete { id, .. } => {
                if *id == from {
                    *id = to;
                }
            }
        }
    }
}

/// Result of a local apply.
#[derive(Debug)]
pub struct Applied {
    pub inverse: Operation,
    pub writes: Vec<Write>,
}

pub fn apply(project: &mut Project, op: &Operation) -> StoreResult<Applied> {
    match op {
        Operation::Edit(edit) => {
            if edit.is_empty() {
                return Err(StoreError::validation("nothing to change"));
            }
            let inverse = edit.apply(project)?;
            let writes = edit_writes(project, edit);
            Ok(Applied {
                inverse: Operation::Edit(inverse),
                writes,
            })
        }
        Operation::Insert(snapshot) => {
            let writes = insert(project, snapshot)?;
            Ok(Applied {
                inverse: Operation::Remove(snapshot.entity.entity_ref()),
                writes,
            })
        }
        Operation::Remove(target) => {
            let (snapshot, writes) = remove(project, *target)?;
            Ok(Applied {
                inverse: Operation::Insert(snapshot),
                writes,
            })
        }
    }
}

fn edit_writes(project: &Project, edit: &Edit) -> Vec<Write> {
    match edit {
        Edit::Project(patch) => vec![Write::Update {
            table: Table::Projects,
            id: project.id,
            record: wire::project_patch(patch),
        }],
        Edit::Sequence(id, patch) => vec![Write::Update {
            table: Table::Sequences,
            id: *id,
            record: wire::sequence_patch(patch),
        }],
        Edit::Scene(id, patch) => vec![Write::Update {
            table: Table::Scenes,
            id: *id,
            record: wire::scene_patch(patch),
        }],
        Edit::MoodBoardItem(id, patch) => vec![Write::Update {
            table: Table::MoodBoardItems,
            id: *id,
            record: wire::moodboard_patch(patch),
        }],
        Edit::SceneOrder(sequence_id, _) => project
            .sequence(*sequence_id)
            .map(|seq| renumber_scenes(seq, 0))
            .unwrap_or_default(),
    }
}

fn renumber_scenes(sequence: &Sequence, from: usize) -> Vec<Write> {
    sequence
        .scenes
        .iter()
        .enumerate()
        .skip(from)
        .map(|(i, scene)| Write::Update {
            table: Table::Scenes,
            id: scene.id,
            record: wire::order_index(i),
        })
        .collect()
}

fn row<T: serde::Serialize>(row: &T) -> StoreResult<Record> {
    Ok(wire::to_record(row)?)
}

fn insert_write(table: Table, record: Record, local_id: EntityId, fresh: bool) -> Write {
    Write::Insert {
        table,
        record,
        local_id,
        fresh,
    }
}

fn ensure_absent(project: &Project, id: EntityId) -> StoreResult<()> {
    let present = project.sequence(id).is_some()
        || project.locate_scene(id).is_some()
        || project.connections.iter().any(|c| c.id == id)
        || project.prompts.iter().any(|p| p.id == id)
        || project.moodboard.iter().any(|i| i.id == id);
    if present {
        return Err(StoreError::invariant(format!("entity {id} already exists")));
    }
    Ok(())
}

fn validate_connection(project: &Project, c: &Connection) -> StoreResult<()> {
    if c.from_id == c.to_id {
        return Err(StoreError::invariant("a connection needs two different endpoints"));
    }
    for (id, kind) in [(c.from_id, c.from_type), (c.to_id, c.to_type)] {
        if project.node_kind(id) != Some(kind) {
            return Err(StoreError::invariant(format!(
                "connection endpoint {id} is not an existing {}",
                kind.as_str()
            )));
        }
    }
    Ok(())
}

fn id_if_known(id: EntityId, fresh: bool) -> Option<EntityId> {
    (!fresh).then_some(id)
}

fn insert_at<T>(items: &mut Vec<T>, index: Option<usize>, item: T) -> usize {
    let at = index.unwrap_or(items.len()).min(items.len());
    items.insert(at, item);
    at
}

fn insert(project: &mut Project, snapshot: &Snapshot) -> StoreResult<Vec<Write>> {
    let fresh = snapshot.fresh;
    ensure_absent(project, snapshot.entity.id())?;
    let project_id = project.id;
    let mut writes = Vec::new();

    match &snapshot.entity {
        Entity::Sequence(seq) => {
            for scene in &seq.scenes {
                ensure_absent(project, scene.id)?;
            }
            writes.push(insert_write(
                Table::Sequences,
                row(&SequenceRow::new(seq, project_id, id_if_known(seq.id, fresh)))?,
                seq.id,
                fresh,
            ));
            for (i, scene) in seq.scenes.iter().enumerate() {
                writes.push(insert_write(
                    Table::Scenes,
                    row(&SceneRow::new(scene, seq.id, i, id_if_known(scene.id, fresh)))?,
                    scene.id,
                    fresh,
                ));
            }
            insert_at(&mut project.sequences, snapshot.index, seq.clone());
        }
        Entity::Scene { sequence_id, scene } => {
            let sequence = project
                .sequence_mut(*sequence_id)
                .ok_or_else(|| StoreError::not_found("sequence", *sequence_id))?;
            graph::validate_nesting(sequence, scene.id, scene.parent_id)?;
            let mut batch: Vec<(Option<usize>, &Scene)> = vec![(snapshot.index, scene)];
            batch.extend(snapshot.sub_scenes.iter().map(|(i, s)| (Some(*i), s)));
            batch.sort_by_key(|(i, _)| i.unwrap_or(usize::MAX));
            let mut first = usize::MAX;
            for (index, s) in batch {
                let at = insert_at(&mut sequence.scenes, index, s.clone());
                first = first.min(at);
                writes.push(insert_write(
                    Table::Scenes,
                    row(&SceneRow::new(s, *sequence_id, at, id_if_known(s.id, fresh)))?,
                    s.id,
                    fresh,
                ));
            }
            let inserted = 1 + snapshot.sub_scenes.len();
            writes.extend(renumber_scenes(sequence, first + inserted));
        }
        Entity::Connection(c) => {
            validate_connection(project, c)?;
            writes.push(insert_write(
                Table::Connections,
                row(&ConnectionRow::new(c, project_id, id_if_known(c.id, fresh)))?,
                c.id,
                fresh,
            ));
            insert_at(&mut project.connections, snapshot.index, c.clone());
        }
        Entity::Prompt(p) => {
            writes.push(insert_write(
                Table::Prompts,
                row(&PromptRow::new(p, project_id, id_if_known(p.id, fresh)))?,
                p.id,
                fresh,
            ));
            insert_at(&mut project.prompts, snapshot.index, p.clone());
        }
        Entity::MoodBoardItem(item) => {
            writes.push(insert_write(
                Table::MoodBoardItems,
                row(&MoodBoardRow::new(item, project_id, id_if_known(item.id, fresh)))?,
                item.id,
                fresh,
            ));
            insert_at(&mut project.moodboard, snapshot.index, item.clone());
        }
    }

    for (index, c) in &snapshot.connections {
        if project.connections.iter().any(|existing| existing.id == c.id) {
            continue;
        }
        writes.push(insert_write(
            Table::Connections,
            row(&ConnectionRow::new(c, project_id, Some(c.id)))?,
            c.id,
            false,
        ));
        insert_at(&mut project.connections, Some(*index), c.clone());
    }
    Ok(writes)
}

/// Removes connections touching `ids`, returning them with their indices.
fn take_connections(project: &mut Project, ids: &[EntityId]) -> Vec<(usize, Connection)> {
    let indices = graph::connections_touching(project, ids);
    let taken: Vec<(usize, Connection)> = indices
        .iter()
        .map(|i| (*i, project.connections[*i].clone()))
        .collect();
    for i in indices.into_iter().rev() {
        project.connections.remove(i);
    }
    taken
}

fn delete_writes(connections: &[(usize, Connection)]) -> Vec<Write> {
    connections
        .iter()
        .map(|(_, c)| Write::Delete {
            table: Table::Connections,
            id: c.id,
        })
        .collect()
}

fn remove(project: &mut Project, target: EntityRef) -> StoreResult<(Snapshot, Vec<Write>)> {
    let missing = || StoreError::not_found(target.kind(), target.id());
    let mut sub_scenes = Vec::new();
    let (entity, index, connections, writes) = match target {
        EntityRef::Sequence(id) => {
            let index = project
                .sequences
                .iter()
                .position(|s| s.id == id)
                .ok_or_else(missing)?;
            let mut ids = vec![id];
            ids.extend(project.sequences[index].scenes.iter().map(|s| s.id));
            let connections = take_connections(project, &ids);
            let seq = project.sequences.remove(index);
            let mut writes = delete_writes(&connections);
            writes.push(Write::Delete {
                table: Table::Sequences,
                id,
            });
            (Entity::Sequence(seq), index, connections, writes)
        }
        EntityRef::Scene(id) => {
            let (si, ci) = project.locate_scene(id).ok_or_else(missing)?;
            let ids = graph::scene_with_children(&project.sequences[si], id);
            let connections = take_connections(project, &ids);
            let mut writes = delete_writes(&connections);
            let sequence = &mut project.sequences[si];
            let sequence_id = sequence.id;
            let mut scene = None;
            for i in (0..sequence.scenes.len()).rev() {
                if !ids.contains(&sequence.scenes[i].id) {
                    continue;
                }
                let removed = sequence.scenes.remove(i);
                if removed.id == id {
                    scene = Some(removed);
                } else {
                    sub_scenes.push((i, removed));
                }
            }
            sub_scenes.reverse();
            let scene = scene.ok_or_else(missing)?;
            for (_, sub) in &sub_scenes {
                writes.push(Write::Delete {
                    table: Table::Scenes,
                    id: sub.id,
                });
            }
            writes.push(Write::Delete {
                table: Table::Scenes,
                id,
            });
            let first = sub_scenes.first().map_or(ci, |(i, _)| (*i).min(ci));
            writes.extend(renumber_scenes(sequence, first));
            (Entity::Scene { sequence_id, scene }, ci, connections, writes)
        }
        EntityRef::Connection(id) => {
            let index = project
                .connections
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(missing)?;
            let c = project.connections.remove(index);
            let writes = vec![Write::Delete {
                table: Table::Connections,
                id,
            }];
            (Entity::Connection(c), index, Vec::new(), writes)
        }
        EntityRef::Prompt(id) => {
            let index = project
                .prompts
                .iter()
                .position(|p| p.id == id)
                .ok_or_else(missing)?;
            let p = project.prompts.remove(index);
            let writes = vec![Write::Delete {
                table: Table::Prompts,
                id,
            }];
            (Entity::Prompt(p), index, Vec::new(), writes)
        }
        EntityRef::MoodBoardItem(id) => {
            let index = project
                .moodboard
                .iter()
                .position(|i| i.id == id)
                .ok_or_else(missing)?;
            let item = project.moodboard.remove(index);
            let writes = vec![Write::Delete {
                table: Table::MoodBoardItems,
                id,
            }];
            (Entity::MoodBoardItem(item), index, Vec::new(), writes)
        }
    };
    Ok((
        Snapshot {
            entity,
            index: Some(index),
            sub_scenes,
            connections,
            fresh: false,
        },
        writes,
    ))
}

fn swap_ref(id: &mut EntityId, from: EntityId, to: EntityId) {
    if *id == from {
        *id = to;
    }
}

fn remap_scene(scene: &mut Scene, from: EntityId, to: EntityId) {
    swap_ref(&mut scene.id, from, to);
    if let Some(parent) = &mut scene.parent_id {
        swap_ref(parent, from, to);
    }
}

fn remap_sequence(seq: &mut Sequence, from: EntityId, to: EntityId) {
    swap_ref(&mut seq.id, from, to);
    for scene in &mut seq.scenes {
        remap_scene(scene, from, to);
    }
    for marker in &mut seq.markers {
        swap_ref(&mut marker.start_scene_id, from, to);
        swap_ref(&mut marker.end_scene_id, from, to);
    }
}

fn remap_connection(c: &mut Connection, from: EntityId, to: EntityId) {
    swap_ref(&mut c.id, from, to);
    swap_ref(&mut c.from_id, from, to);
    swap_ref(&mut c.to_id, from, to);
}

/// Swaps a confirmed id in for a temporary one, in place, and rewrites
/// every reference to it.
pub fn reconcile_id(project: &mut Project, from: EntityId, to: EntityId) {
    swap_ref(&mut project.id, from, to);
    for seq in &mut project.sequences {
        remap_sequence(seq, from, to);
    }
    for c in &mut project.connections {
        remap_connection(c, from, to);
    }
    for p in &mut project.prompts {
        swap_ref(&mut p.id, from, to);
    }
    for item in &mut project.moodboard {
        swap_ref(&mut item.id, from, to);
    }
}

fn remap_snapshot(snapshot: &mut Snapshot, from: EntityId, to: EntityId) {
    match &mut snapshot.entity {
        Entity::Sequence(seq) => remap_sequence(seq, from, to),
        Entity::Scene { sequence_id, scene } => {
            swap_ref(sequence_id, from, to);
            remap_scene(scene, from, to);
        }
        Entity::Connection(c) => remap_connection(c, from, to),
        Entity::Prompt(p) => swap_ref(&mut p.id, from, to),
        Entity::MoodBoardItem(i) => swap_ref(&mut i.id, from, to),
    }
    for (_, scene) in &mut snapshot.sub_scenes {
        remap_scene(scene, from, to);
    }
    for (_, c) in &mut snapshot.connections {
        remap_connection(c, from, to);
    }
}

/// Replays `writes` in order, each bounded by `timeout`. Returns the
/// `(temporary, confirmed)` id pairs for fresh inserts.
pub async fn persist(
    persistence: &dyn Persistence,
    mut writes: Vec<Write>,
    timeout: Duration,
) -> Result<Vec<(EntityId, EntityId)>, PersistError> {
    let mut swaps = Vec::new();
    let total = writes.len();
    for i in 0..total {
        let write = writes[i].clone();
        let result = match write {
            Write::Insert {
                table,
                record,
                local_id,
                fresh,
            } => bounded(timeout, persistence.insert(table, record))
                .await
                .map(|confirmed| {
                    if fresh && confirmed != local_id {
                        swaps.push((local_id, confirmed));
                        for later in &mut writes[i + 1..] {
                            later.remap(local_id, confirmed);
                        }
                    }
                }),
            Write::Update { table, id, record } => {
                bounded(timeout, persistence.update(table, id, record)).await
            }
            Write::Delete { table, id } => bounded(timeout, persistence.delete(table, id)).await,
        };
        if let Err(e) = result {
            if i > 0 {
                tracing::warn!(applied = i, total, "persistence failed after partial writes");
            }
            return Err(e);
        }
    }
    Ok(swaps)
}

/// Bounds a single persistence call; an elapsed timer is a failure.
pub(crate) async fn bounded<T>(
    timeout: Duration,
    fut: impl std::future::Future<Output = Result<T, PersistError>>,
) -> Result<T, PersistError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(PersistError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeKind, Point};
    use crate::patch::ScenePatch;

    fn project() -> (Project, EntityId, Vec<EntityId>) {
        let mut project = Project::new("p");
        let mut seq = Sequence::new("Act I", Point::ZERO);
        for i in 0..3 {
            seq.scenes.push(Scene::new(format!("s{i}"), Point::new(i as f32 * 10.0, 0.0)));
        }
        let ids = seq.scenes.iter().map(|s| s.id).collect();
        let seq_id = seq.id;
        project.sequences.push(seq);
        (project, seq_id, ids)
    }

    #[test]
    fn removing_a_scene_takes_sub_scenes_and_connections() {
        let (mut project, seq_id, ids) = project();
        project.sequences[0].scenes[2].parent_id = Some(ids[1]);
        project.connections.push(Connection {
            id: EntityId::temporary(),
            from_id: ids[0],
            from_type: NodeKind::Scene,
            to_id: ids[2],
            to_type: NodeKind::Scene,
        });
        let before = project.clone();

        let applied = apply(&mut project, &Operation::Remove(EntityRef::Scene(ids[1]))).unwrap();
        assert_eq!(project.sequence(seq_id).unwrap().scenes.len(), 1);
        assert!(project.connections.is_empty());
        let deletes = applied
            .writes
            .iter()
            .filter(|w| matches!(w, Write::Delete { .. }))
            .count();
        assert_eq!(deletes, 3);

        apply(&mut project, &applied.inverse).unwrap();
        assert_eq!(project, before);
    }

    #[test]
    fn removing_a_sequence_drops_connections_to_its_scenes() {
        let (mut project, seq_id, ids) = project();
        let other = Sequence::new("Act II", Point::new(400.0, 0.0));
        let other_id = other.id;
        project.sequences.push(other);
        project.connections.push(Connection {
            id: EntityId::temporary(),
            from_id: other_id,
            from_type: NodeKind::Sequence,
            to_id: ids[0],
            to_type: NodeKind::Scene,
        });
        let before = project.clone();
        let applied = apply(&mut project, &Operation::Remove(EntityRef::Sequence(seq_id))).unwrap();
        assert!(project.connections.is_empty());
        apply(&mut project, &applied.inverse).unwrap();
        assert_eq!(project, before);
    }

    #[test]
    fn fresh_inserts_omit_the_temporary_id_on_the_wire() {
        let (mut project, seq_id, _) = project();
        let scene = Scene::new("new", Point::ZERO);
        let op = Operation::Insert(Snapshot::fresh(Entity::Scene {
            sequence_id: seq_id,
            scene: scene.clone(),
        }));
        let applied = apply(&mut project, &op).unwrap();
        match &applied.writes[0] {
            Write::Insert { record, fresh, local_id, .. } => {
                assert!(*fresh);
                assert_eq!(*local_id, scene.id);
                assert!(!record.contains_key("id"));
                assert_eq!(record["order_index"], 3);
            }
            other => panic!("unexpected write {other:?}"),
        }
        assert_eq!(applied.inverse, Operation::Remove(EntityRef::Scene(scene.id)));
    }

    #[test]
    fn connections_need_existing_endpoints() {
        let (mut project, seq_id, ids) = project();
        let dangling = Connection {
            id: EntityId::temporary(),
            from_id: seq_id,
            from_type: NodeKind::Sequence,
            to_id: EntityId::temporary(),
            to_type: NodeKind::Scene,
        };
        let op = Operation::Insert(Snapshot::fresh(Entity::Connection(dangling)));
        assert!(apply(&mut project, &op).is_err());

        let mislabeled = Connection {
            id: EntityId::temporary(),
            from_id: seq_id,
            from_type: NodeKind::Scene,
            to_id: ids[0],
            to_type: NodeKind::Scene,
        };
        let op = Operation::Insert(Snapshot::fresh(Entity::Connection(mislabeled)));
        assert!(apply(&mut project, &op).is_err());
        assert!(project.connections.is_empty());
    }

    #[test]
    fn reconcile_rewrites_every_reference() {
        let (mut project, seq_id, ids) = project();
        project.sequences[0].scenes[1].parent_id = Some(ids[0]);
        project.connections.push(Connection {
            id: EntityId::temporary(),
            from_id: seq_id,
            from_type: NodeKind::Sequence,
            to_id: ids[0],
            to_type: NodeKind::Scene,
        });
        let confirmed = EntityId::temporary();
        reconcile_id(&mut project, ids[0], confirmed);
        let seq = &project.sequences[0];
        assert_eq!(seq.scenes[0].id, confirmed);
        assert_eq!(seq.scenes[1].parent_id, Some(confirmed));
        assert_eq!(project.connections[0].to_id, confirmed);
    }

    #[test]
    fn empty_edits_are_rejected() {
        let (mut project, _, ids) = project();
        let op = Operation::Edit(Edit::Scene(ids[0], ScenePatch::default()));
        assert!(matches!(apply(&mut project, &op), Err(StoreError::Validation(_))));
    }
}
