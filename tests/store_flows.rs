use std::sync::Arc;
use storyframe::graph::{MarkerEdge, Step};
use storyframe::model::{AspectRatio, EntityId, EntityKind, Point, Project, Selection};
use storyframe::patch::{ProjectPatch, SequencePatch};
use storyframe::persistence::{MemoryPersistence, Table};
use storyframe::spatial::Guide;
use storyframe::viewport::Surface;
use storyframe::{ProjectStore, StoreConfig, StoreError};

async fn fixture() -> (ProjectStore, Arc<MemoryPersistence>) {
    let persistence = Arc::new(MemoryPersistence::new());
    let mut store = ProjectStore::new(persistence.clone(), StoreConfig::default());
    store.create_project("Short film").await.unwrap();
    (store, persistence)
}

fn active(store: &ProjectStore) -> &Project {
    store.active_project().expect("active project")
}

fn retitle(title: &str) -> SequencePatch {
    SequencePatch {
        title: Some(title.to_string()),
        ..SequencePatch::default()
    }
}

fn row_ref(record: &storyframe::persistence::Record, key: &str) -> Option<EntityId> {
    record.get(key)?.as_str().and_then(EntityId::parse)
}

#[tokio::test]
async fn undo_restores_and_redo_reapplies() {
    let (mut store, _) = fixture().await;
    let seq = store.create_sequence("Act I", Point::ZERO).await.unwrap();
    let before = active(&store).clone();

    store.update_sequence(seq, retitle("Act One")).await.unwrap();
    let after = active(&store).clone();

    assert!(store.undo().await.unwrap());
    assert_eq!(active(&store), &before);
    assert!(store.redo().await.unwrap());
    assert_eq!(active(&store), &after);
}

#[tokio::test]
async fn undo_of_creation_removes_and_redo_keeps_the_id() {
    let (mut store, persistence) = fixture().await;
    let seq = store.create_sequence("Act I", Point::new(40.0, 80.0)).await.unwrap();

    assert!(store.undo().await.unwrap());
    assert!(active(&store).sequences.is_empty());
    assert!(persistence.row(Table::Sequences, seq).is_none());

    assert!(store.redo().await.unwrap());
    let restored = active(&store).sequence(seq).expect("same id after redo");
    assert_eq!(restored.position, Point::new(40.0, 80.0));
    assert!(persistence.row(Table::Sequences, seq).is_some());
}

#[tokio::test]
async fn new_tracked_mutation_clears_redo() {
    let (mut store, _) = fixture().await;
    let seq = store.create_sequence("Act I", Point::ZERO).await.unwrap();
    store.update_sequence(seq, retitle("Act One")).await.unwrap();

    store.undo().await.unwrap();
    assert!(store.can_redo());

    store.create_sequence("Act II", Point::new(400.0, 0.0)).await.unwrap();
    assert!(!store.can_redo());
    assert!(!store.redo().await.unwrap());
}

#[tokio::test]
async fn dragging_near_another_sequence_snaps_and_commits_once() {
    let (mut store, persistence) = fixture().await;
    let a = store.create_sequence("A", Point::ZERO).await.unwrap();
    let b = store.create_sequence("B", Point::new(500.0, 0.0)).await.unwrap();
    persistence.clear_calls();

    let target = Selection {
        id: a,
        kind: EntityKind::Sequence,
    };
    store.begin_drag(Surface::Main, target).unwrap();
    store.drag_to(eframe::egui::vec2(300.0, 40.0));
    let snapped = store.drag_to(eframe::egui::vec2(506.0, 40.0)).unwrap();

    assert_eq!(snapped, Point::new(500.0, 40.0));
    assert_eq!(store.viewports().guides(), &[Guide::Vertical(500.0)]);
    assert_eq!(active(&store).sequence(a).unwrap().position, Point::ZERO);
    assert!(persistence.calls().is_empty());

    assert!(store.end_drag().await.unwrap());
    assert!(store.viewports().guides().is_empty());
    assert_eq!(active(&store).sequence(a).unwrap().position, Point::new(500.0, 40.0));
    assert_eq!(persistence.calls().len(), 1);
    assert_eq!(active(&store).sequence(b).unwrap().position, Point::new(500.0, 0.0));

    store.undo().await.unwrap();
    assert_eq!(active(&store).sequence(a).unwrap().position, Point::ZERO);
}

#[tokio::test]
async fn drag_beyond_threshold_does_not_snap() {
    let (mut store, _) = fixture().await;
    let a = store.create_sequence("A", Point::ZERO).await.unwrap();
    store.create_sequence("B", Point::new(500.0, 0.0)).await.unwrap();

    let target = Selection {
        id: a,
        kind: EntityKind::Sequence,
    };
    store.begin_drag(Surface::Main, target).unwrap();
    let moved = store.drag_to(eframe::egui::vec2(520.0, 40.0)).unwrap();
    assert_eq!(moved, Point::new(520.0, 40.0));
    assert!(store.viewports().guides().is_empty());

    store.cancel_drag();
    assert!(!store.end_drag().await.unwrap());
    assert_eq!(active(&store).sequence(a).unwrap().position, Point::ZERO);
}

#[tokio::test]
async fn deleted_scene_comes_back_with_its_identity() {
    let (mut store, persistence) = fixture().await;
    let seq = store.create_sequence("Act I", Point::ZERO).await.unwrap();
    let scene = store.create_scene(seq, "Opening", None).await.unwrap();
    let original = active(&store).scene(scene).cloned().unwrap();

    store.delete_scene(scene).await.unwrap();
    assert!(active(&store).scene(scene).is_none());
    assert!(persistence.row(Table::Scenes, scene).is_none());

    store.undo().await.unwrap();
    assert_eq!(active(&store).scene(scene), Some(&original));
    assert!(persistence.row(Table::Scenes, scene).is_some());

    store.redo().await.unwrap();
    assert!(active(&store).scene(scene).is_none());
    assert!(persistence.row(Table::Scenes, scene).is_none());
}

#[tokio::test]
async fn markers_partition_scenes_until_none_are_free() {
    let (mut store, _) = fixture().await;
    let seq = store.create_sequence("Act I", Point::ZERO).await.unwrap();
    for title in ["One", "Two", "Three", "Four"] {
        store.create_scene(seq, title, None).await.unwrap();
    }

    let setup = store.create_marker(seq, "Setup").await.unwrap();
    store.create_marker(seq, "Payoff").await.unwrap();
    let err = store.create_marker(seq, "Coda").await.unwrap_err();
    assert!(matches!(err, StoreError::Invariant(_)));

    let sequence = active(&store).sequence(seq).unwrap();
    let marker = sequence.marker(setup).unwrap();
    assert_eq!(marker.start_scene_id, sequence.scenes[0].id);
    assert_eq!(marker.end_scene_id, sequence.scenes[1].id);

    let grew = store
        .update_marker_range(seq, setup, MarkerEdge::End, Step::Forward)
        .await
        .unwrap();
    assert!(!grew);
    let shrank = store
        .update_marker_range(seq, setup, MarkerEdge::End, Step::Backward)
        .await
        .unwrap();
    assert!(shrank);
    let sequence = active(&store).sequence(seq).unwrap();
    assert_eq!(sequence.marker(setup).unwrap().end_scene_id, sequence.scenes[0].id);
}

#[tokio::test]
async fn failed_scene_creation_is_rolled_back() {
    let (mut store, persistence) = fixture().await;
    let seq = store.create_sequence("Act I", Point::ZERO).await.unwrap();
    store.take_notices();

    persistence.fail_next(1);
    let err = store.create_scene(seq, "Opening", None).await.unwrap_err();

    assert!(err.is_persistence());
    assert!(active(&store).sequence(seq).unwrap().scenes.is_empty());
    assert_eq!(store.take_notices().len(), 1);
    assert_eq!(store.history().len(), 1);
    assert_eq!(store.history().undo_label(), Some("create sequence"));
}

#[tokio::test]
async fn confirmed_ids_replace_temporary_ones() {
    let (mut store, persistence) = fixture().await;
    let seq = store.create_sequence("Act I", Point::ZERO).await.unwrap();
    let parent = store.create_scene(seq, "Opening", None).await.unwrap();
    let child = store.create_scene(seq, "Insert shot", Some(parent)).await.unwrap();

    assert!(!store.is_pending(seq));
    let row = persistence.row(Table::Scenes, child).expect("child row");
    assert_eq!(row_ref(&row, "sequence_id"), Some(seq));
    assert_eq!(row_ref(&row, "parent_id"), Some(parent));
    assert_eq!(active(&store).scene(child).unwrap().parent_id, Some(parent));

    let project_id = active(&store).id;
    assert!(persistence.row(Table::Projects, project_id).is_some());
}

#[tokio::test]
async fn deleting_a_sequence_drops_and_restores_connections() {
    let (mut store, persistence) = fixture().await;
    let first = store.create_sequence("Act I", Point::ZERO).await.unwrap();
    let second = store.create_sequence("Act II", Point::new(600.0, 0.0)).await.unwrap();
    let scene = store.create_scene(first, "Cliffhanger", None).await.unwrap();
    let linked = store.create_connection(first, second).await.unwrap();
    let from_scene = store.create_connection(scene, second).await.unwrap();
    let before = active(&store).clone();

    store.delete_sequence(first).await.unwrap();
    assert!(active(&store).connections.is_empty());
    assert!(persistence.row(Table::Connections, linked).is_none());
    assert!(persistence.row(Table::Connections, from_scene).is_none());

    store.undo().await.unwrap();
    assert_eq!(active(&store), &before);
    assert!(persistence.row(Table::Connections, linked).is_some());
    assert!(persistence.row(Table::Scenes, scene).is_some());
}

#[tokio::test]
async fn sub_scenes_nest_only_one_level() {
    let (mut store, persistence) = fixture().await;
    let seq = store.create_sequence("Act I", Point::ZERO).await.unwrap();
    let parent = store.create_scene(seq, "Opening", None).await.unwrap();
    let child = store.create_scene(seq, "Insert", Some(parent)).await.unwrap();
    persistence.clear_calls();

    let err = store.create_scene(seq, "Too deep", Some(child)).await.unwrap_err();
    assert!(matches!(err, StoreError::Invariant(_)));
    assert!(persistence.calls().is_empty());
    assert_eq!(active(&store).sequence(seq).unwrap().scenes.len(), 2);
}

#[tokio::test]
async fn deleting_a_scene_takes_its_sub_scenes() {
    let (mut store, _) = fixture().await;
    let seq = store.create_sequence("Act I", Point::ZERO).await.unwrap();
    let parent = store.create_scene(seq, "Opening", None).await.unwrap();
    store.create_scene(seq, "Insert", Some(parent)).await.unwrap();
    let before = active(&store).clone();

    store.delete_scene(parent).await.unwrap();
    assert!(active(&store).sequence(seq).unwrap().scenes.is_empty());

    store.undo().await.unwrap();
    assert_eq!(active(&store), &before);
}

#[tokio::test]
async fn reordering_scenes_renumbers_rows() {
    let (mut store, persistence) = fixture().await;
    let seq = store.create_sequence("Act I", Point::ZERO).await.unwrap();
    let one = store.create_scene(seq, "One", None).await.unwrap();
    let two = store.create_scene(seq, "Two", None).await.unwrap();
    let three = store.create_scene(seq, "Three", None).await.unwrap();

    store.move_scene(three, 0).await.unwrap();

    let order: Vec<EntityId> = active(&store)
        .sequence(seq)
        .unwrap()
        .scenes
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(order, [three, one, two]);
    for (index, id) in order.iter().enumerate() {
        let row = persistence.row(Table::Scenes, *id).unwrap();
        assert_eq!(row.get("order_index").and_then(|v| v.as_u64()), Some(index as u64));
    }
}

#[tokio::test]
async fn reordering_across_marked_spans_is_refused() {
    let (mut store, persistence) = fixture().await;
    let seq = store.create_sequence("Act I", Point::ZERO).await.unwrap();
    let mut ids = Vec::new();
    for title in ["One", "Two", "Three", "Four"] {
        ids.push(store.create_scene(seq, title, None).await.unwrap());
    }
    store.create_marker(seq, "Setup").await.unwrap();
    store.create_marker(seq, "Payoff").await.unwrap();
    let before = active(&store).clone();
    let recorded = store.history().len();
    persistence.clear_calls();

    // Into the middle of the other span, and past the start of its own.
    let err = store.move_scene(ids[2], 1).await.unwrap_err();
    assert!(matches!(err, StoreError::Invariant(_)));
    let err = store.move_scene(ids[3], 0).await.unwrap_err();
    assert!(matches!(err, StoreError::Invariant(_)));

    assert_eq!(active(&store), &before);
    assert_eq!(store.history().len(), recorded);
    assert!(persistence.calls().is_empty());
}

#[tokio::test]
async fn reordering_unmarked_scenes_is_still_allowed() {
    let (mut store, _) = fixture().await;
    let seq = store.create_sequence("Act I", Point::ZERO).await.unwrap();
    let mut ids = Vec::new();
    for title in ["One", "Two", "Three", "Four"] {
        ids.push(store.create_scene(seq, title, None).await.unwrap());
    }
    store.create_marker(seq, "Setup").await.unwrap();

    store.move_scene(ids[3], 2).await.unwrap();

    let order: Vec<EntityId> = active(&store)
        .sequence(seq)
        .unwrap()
        .scenes
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(order, [ids[0], ids[1], ids[3], ids[2]]);
}

#[tokio::test]
async fn failed_scene_deletion_restores_the_project() {
    let (mut store, persistence) = fixture().await;
    let seq = store.create_sequence("Act I", Point::ZERO).await.unwrap();
    store.create_scene(seq, "One", None).await.unwrap();
    let middle = store.create_scene(seq, "Two", None).await.unwrap();
    store.create_scene(seq, "Three", None).await.unwrap();
    let before = active(&store).clone();
    let recorded = store.history().len();
    store.take_notices();

    persistence.fail_next(1);
    let err = store.delete_scene(middle).await.unwrap_err();

    assert!(err.is_persistence());
    assert_eq!(active(&store), &before);
    assert_eq!(store.take_notices().len(), 1);
    assert_eq!(store.history().len(), recorded);
    assert!(persistence.row(Table::Scenes, middle).is_some());
}

#[tokio::test]
async fn configured_aspect_ratio_applies_to_new_frames() {
    let persistence = Arc::new(MemoryPersistence::new());
    let config = StoreConfig {
        default_aspect_ratio: AspectRatio::Square,
        ..StoreConfig::default()
    };
    let mut store = ProjectStore::new(persistence, config);
    store.create_project("Short film").await.unwrap();
    let seq = store.create_sequence("Act I", Point::ZERO).await.unwrap();
    let scene = store.create_scene(seq, "Opening", None).await.unwrap();

    assert_eq!(
        active(&store).sequence(seq).unwrap().aspect_ratio,
        AspectRatio::Square
    );
    assert_eq!(active(&store).scene(scene).unwrap().aspect_ratio, AspectRatio::Square);
}

#[tokio::test]
async fn project_edits_keep_creation_stamps_and_undo_exactly() {
    let (mut store, _) = fixture().await;
    let before = active(&store).clone();

    let rename = ProjectPatch {
        name: Some("Feature".to_string()),
        ..ProjectPatch::default()
    };
    store.update_project(rename).await.unwrap();
    assert_eq!(active(&store).name, "Feature");
    assert_eq!(active(&store).updated_at, before.updated_at);

    store.undo().await.unwrap();
    assert_eq!(active(&store), &before);
}

#[tokio::test]
async fn category_in_use_cannot_be_deleted() {
    let (mut store, _) = fixture().await;
    store.add_category("Lighting").await.unwrap();
    let prompt = store
        .create_prompt("Noir", "hard shadows", Some("Lighting"))
        .await
        .unwrap();

    assert!(store.delete_category("Lighting").await.is_err());
    store.delete_prompt(prompt).await.unwrap();
    store.delete_category("Lighting").await.unwrap();
    assert!(active(&store).categories.is_empty());
}

#[tokio::test]
async fn switching_projects_resets_history_and_gestures() {
    let (mut store, _) = fixture().await;
    let first = active(&store).id;
    store.create_project("Music video").await.unwrap();
    let seq = store.create_sequence("Verse", Point::ZERO).await.unwrap();
    store
        .begin_drag(
            Surface::Main,
            Selection {
                id: seq,
                kind: EntityKind::Sequence,
            },
        )
        .unwrap();
    assert!(store.can_undo());

    store.switch_project(first).unwrap();
    assert!(!store.can_undo());
    assert!(!store.can_redo());
    assert!(store.viewports().drag().is_none());
    assert_eq!(store.active_project_id(), Some(first));
}

#[tokio::test]
async fn clipboard_round_trips_and_ignores_noise() {
    let (mut store, persistence) = fixture().await;
    let note = store.create_note("Warm palette", Point::ZERO).await.unwrap();
    let copied = store.copy_moodboard_item(note).unwrap();
    persistence.clear_calls();

    assert_eq!(
        store.paste(Some("just some text"), None, Point::ZERO).await.unwrap(),
        None
    );
    assert!(persistence.calls().is_empty());

    let pasted = store
        .paste(Some(copied.as_str()), None, Point::new(50.0, 60.0))
        .await
        .unwrap()
        .expect("pasted item");
    assert_ne!(pasted, note);
    let project = active(&store);
    let item = project.moodboard_item(pasted).unwrap();
    assert_eq!(item.content, "Warm palette");
    assert_eq!(item.position, Point::new(50.0, 60.0));
    assert!(item.z_index > project.moodboard_item(note).unwrap().z_index);
}

#[tokio::test]
async fn load_reads_back_what_was_persisted() {
    let (mut store, persistence) = fixture().await;
    let seq = store.create_sequence("Act I", Point::new(10.0, 20.0)).await.unwrap();
    let one = store.create_scene(seq, "One", None).await.unwrap();
    store.create_scene(seq, "Two", None).await.unwrap();
    store.move_scene(one, 1).await.unwrap();
    store.create_marker(seq, "Setup").await.unwrap();
    store.create_note("Warm palette", Point::ZERO).await.unwrap();
    store.add_category("Lighting").await.unwrap();
    let expected = active(&store).clone();

    let mut reloaded = ProjectStore::new(persistence, StoreConfig::default());
    reloaded.load().await.unwrap();
    assert_eq!(reloaded.active_project(), Some(&expected));
    assert!(!reloaded.can_undo());
}
