//! Read-side queries over the project tree: scene ordering, sub-scene
//! nesting, narrative-marker grouping and title search.

use crate::error::{StoreError, StoreResult};
use crate::model::{
    EntityId, MARKER_COLORS, NarrativeMarker, NodeKind, Project, Scene, Sequence,
};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

/// Top-level, visible scenes in sequence order. Marker indices refer to
/// positions in this list.
pub fn top_level_visible(sequence: &Sequence) -> Vec<&Scene> {
    sequence
        .scenes
        .iter()
        .filter(|s| s.is_top_level() && s.visible)
        .collect()
}

pub fn sub_scenes(sequence: &Sequence, parent: EntityId) -> Vec<&Scene> {
    sequence
        .scenes
        .iter()
        .filter(|s| s.parent_id == Some(parent))
        .collect()
}

/// Ids of `scene_id` and all of its sub-scenes.
pub fn scene_with_children(sequence: &Sequence, scene_id: EntityId) -> Vec<EntityId> {
    let mut ids = vec![scene_id];
    ids.extend(sub_scenes(sequence, scene_id).iter().map(|s| s.id));
    ids
}

/// Checks that `scene_id` may be given `parent` as its parent.
pub fn validate_nesting(
    sequence: &Sequence,
    scene_id: EntityId,
    parent: Option<EntityId>,
) -> StoreResult<()> {
    let Some(parent_id) = parent else {
        return Ok(());
    };
    if parent_id == scene_id {
        return Err(StoreError::invariant("a scene cannot be its own parent"));
    }
    let Some(parent) = sequence.scene(parent_id) else {
        return Err(StoreError::invariant(
            "sub-scenes must belong to the same sequence as their parent",
        ));
    };
    if !parent.is_top_level() {
        return Err(StoreError::invariant(
            "sub-scenes cannot be nested more than one level deep",
        ));
    }
    if sequence.scenes.iter().any(|s| s.parent_id == Some(scene_id)) {
        return Err(StoreError::invariant(
            "a scene with sub-scenes cannot become a sub-scene",
        ));
    }
    Ok(())
}

/// One entry of a sequence's rendered scene strip.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderNode<'a> {
    Scene {
        index: usize,
        scene: &'a Scene,
    },
    Group {
        marker: &'a NarrativeMarker,
        start: usize,
        end: usize,
        scenes: Vec<&'a Scene>,
    },
}

/// Interleaves plain scenes with marker-grouped runs, left to right.
pub fn render_order(sequence: &Sequence) -> Vec<RenderNode<'_>> {
    let order = top_level_visible(sequence);
    let mut nodes = Vec::new();
    let mut i = 0;
    while i < order.len() {
        let group = sequence
            .markers
            .iter()
            .find(|m| m.start_scene_id == order[i].id)
            .and_then(|m| {
                let end = index_of(&order, m.end_scene_id)?;
                (end >= i).then_some((m, end))
            });
        match group {
            Some((marker, end)) => {
                nodes.push(RenderNode::Group {
                    marker,
                    start: i,
                    end,
                    scenes: order[i..=end].to_vec(),
                });
                i = end + 1;
            }
            None => {
                nodes.push(RenderNode::Scene {
                    index: i,
                    scene: order[i],
                });
                i += 1;
            }
        }
    }
    nodes
}

fn index_of(order: &[&Scene], id: EntityId) -> Option<usize> {
    order.iter().position(|s| s.id == id)
}

/// Index span a marker claims in `order`. Inverted or dangling ends claim
/// only the start index; a marker whose start is not listed claims nothing.
pub fn marker_span(marker: &NarrativeMarker, order: &[&Scene]) -> Option<(usize, usize)> {
    let start = index_of(order, marker.start_scene_id)?;
    match index_of(order, marker.end_scene_id) {
        Some(end) if end >= start => Some((start, end)),
        _ => Some((start, start)),
    }
}

fn claimed(sequence: &Sequence, order: &[&Scene], skip: Option<EntityId>) -> Vec<bool> {
    let mut taken = vec![false; order.len()];
    for marker in &sequence.markers {
        if Some(marker.id) == skip {
            continue;
        }
        if let Some((start, end)) = marker_span(marker, order) {
            taken[start..=end].iter_mut().for_each(|t| *t = true);
        }
    }
    taken
}

/// Number of broken marker claims: inverted markers plus every index that
/// more than one marker claims.
pub fn marker_conflicts(sequence: &Sequence) -> usize {
    let order = top_level_visible(sequence);
    let mut claims = vec![0usize; order.len()];
    let mut inverted = 0;
    for marker in &sequence.markers {
        let start = index_of(&order, marker.start_scene_id);
        let end = index_of(&order, marker.end_scene_id);
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                inverted += 1;
            }
        }
        if let Some((start, end)) = marker_span(marker, &order) {
            claims[start..=end].iter_mut().for_each(|c| *c += 1);
        }
    }
    inverted + claims.iter().filter(|c| **c > 1).count()
}

/// First unclaimed index, extended by one when the next index is free too.
pub fn free_span(sequence: &Sequence) -> Option<(usize, usize)> {
    let order = top_level_visible(sequence);
    let taken = claimed(sequence, &order, None);
    let start = taken.iter().position(|t| !t)?;
    let end = if taken.get(start + 1) == Some(&false) {
        start + 1
    } else {
        start
    };
    Some((start, end))
}

/// Builds a marker over the next free span, or refuses when every scene is
/// already claimed.
pub fn new_marker(sequence: &Sequence, label: impl Into<String>) -> StoreResult<NarrativeMarker> {
    let order = top_level_visible(sequence);
    if order.is_empty() {
        return Err(StoreError::invariant(
            "add a visible scene before creating a marker",
        ));
    }
    let Some((start, end)) = free_span(sequence) else {
        return Err(StoreError::invariant(
            "every scene is already covered by a marker; adjust an existing marker first",
        ));
    };
    Ok(NarrativeMarker {
        id: EntityId::temporary(),
        label: label.into(),
        color: MARKER_COLORS[sequence.markers.len() % MARKER_COLORS.len()],
        start_scene_id: order[start].id,
        end_scene_id: order[end].id,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerEdge {
    Start,
    End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Backward,
    Forward,
}

/// Moves one edge of a marker by a single index. Returns `Ok(None)` when the
/// move is clamped away (list bounds, `start <= end`, or another marker's
/// span).
pub fn adjusted_marker(
    sequence: &Sequence,
    marker_id: EntityId,
    edge: MarkerEdge,
    step: Step,
) -> StoreResult<Option<NarrativeMarker>> {
    let marker = sequence
        .marker(marker_id)
        .ok_or_else(|| StoreError::not_found("marker", marker_id))?;
    let order = top_level_visible(sequence);
    let Some((start, end)) = marker_span(marker, &order) else {
        return Err(StoreError::invariant(
            "marker no longer starts on a visible scene",
        ));
    };
    let taken = claimed(sequence, &order, Some(marker_id));
    let free = |i: usize| taken.get(i) == Some(&false);

    let (start, end) = match (edge, step) {
        (MarkerEdge::Start, Step::Backward) if start > 0 && free(start - 1) => (start - 1, end),
        (MarkerEdge::Start, Step::Forward) if start < end => (start + 1, end),
        (MarkerEdge::End, Step::Backward) if end > start => (start, end - 1),
        (MarkerEdge::End, Step::Forward) if end + 1 < order.len() && free(end + 1) => {
            (start, end + 1)
        }
        _ => return Ok(None),
    };
    let mut updated = marker.clone();
    updated.start_scene_id = order[start].id;
    updated.end_scene_id = order[end].id;
    Ok(Some(updated))
}

/// Indices into `project.connections` touching any of `ids`.
pub fn connections_touching(project: &Project, ids: &[EntityId]) -> Vec<usize> {
    project
        .connections
        .iter()
        .enumerate()
        .filter(|(_, c)| ids.iter().any(|id| c.touches(*id)))
        .map(|(i, _)| i)
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchHit {
    pub id: EntityId,
    pub kind: NodeKind,
    pub sequence_id: EntityId,
    pub title: String,
    pub score: i64,
}

/// Fuzzy title search over sequences and scenes, best match first.
pub fn search(project: &Project, query: &str) -> Vec<SearchHit> {
    let q = query.trim();
    if q.is_empty() {
        return Vec::new();
    }
    let matcher = SkimMatcherV2::default();
    let mut hits = Vec::new();
    for seq in &project.sequences {
        if let Some(score) = matcher.fuzzy_match(&seq.title, q) {
            hits.push(SearchHit {
                id: seq.id,
                kind: NodeKind::Sequence,
                sequence_id: seq.id,
                title: seq.title.clone(),
                score,
            });
        }
        for scene in &seq.scenes {
            if let Some(score) = matcher.fuzzy_match(&scene.title, q) {
                hits.push(SearchHit {
                    id: scene.id,
                    kind: NodeKind::Scene,
                    sequence_id: seq.id,
                    title: scene.title.clone(),
                    score,
                });
            }
        }
    }
    hits.sort_by(|a, b| b.score.cmp(&a.score));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Point;

    fn sequence_with(n: usize) -> Sequence {
        let mut seq = Sequence::new("Act", Point::ZERO);
        for i in 0..n {
            seq.scenes.push(Scene::new(format!("Scene {i}"), Point::ZERO));
        }
        seq
    }

    fn marker(seq: &Sequence, start: usize, end: usize) -> NarrativeMarker {
        NarrativeMarker {
            id: EntityId::temporary(),
            label: "m".into(),
            color: MARKER_COLORS[0],
            start_scene_id: seq.scenes[start].id,
            end_scene_id: seq.scenes[end].id,
        }
    }

    fn spans(seq: &Sequence) -> Vec<(usize, usize)> {
        let order = top_level_visible(seq);
        seq.markers
            .iter()
            .filter_map(|m| marker_span(m, &order))
            .collect()
    }

    #[test]
    fn top_level_list_skips_hidden_and_nested_scenes() {
        let mut seq = sequence_with(4);
        seq.scenes[1].visible = false;
        seq.scenes[3].parent_id = Some(seq.scenes[0].id);
        let titles: Vec<_> = top_level_visible(&seq).iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["Scene 0", "Scene 2"]);
    }

    #[test]
    fn render_order_groups_marker_runs() {
        let mut seq = sequence_with(5);
        let m = marker(&seq, 1, 3);
        seq.markers.push(m);
        let nodes = render_order(&seq);
        assert_eq!(nodes.len(), 3);
        assert!(matches!(nodes[0], RenderNode::Scene { index: 0, .. }));
        match &nodes[1] {
            RenderNode::Group { start, end, scenes, .. } => {
                assert_eq!((*start, *end), (1, 3));
                assert_eq!(scenes.len(), 3);
            }
            other => panic!("expected group, got {other:?}"),
        }
        assert!(matches!(nodes[2], RenderNode::Scene { index: 4, .. }));
    }

    #[test]
    fn inverted_marker_renders_as_plain_scene_and_claims_its_start() {
        let mut seq = sequence_with(4);
        let m = marker(&seq, 2, 0);
        seq.markers.push(m);
        let nodes = render_order(&seq);
        assert_eq!(nodes.len(), 4);
        assert_eq!(spans(&seq), vec![(2, 2)]);
        assert_eq!(free_span(&seq), Some((0, 1)));
    }

    #[test]
    fn two_markers_partition_four_scenes_then_refuse() {
        let mut seq = sequence_with(4);
        for label in ["Setup", "Payoff"] {
            let m = new_marker(&seq, label).unwrap();
            seq.markers.push(m);
        }
        assert_eq!(spans(&seq), vec![(0, 1), (2, 3)]);
        let err = new_marker(&seq, "Extra").unwrap_err();
        assert!(matches!(err, StoreError::Invariant(_)));
    }

    #[test]
    fn creation_takes_single_index_when_neighbour_is_claimed() {
        let mut seq = sequence_with(3);
        let m = marker(&seq, 1, 2);
        seq.markers.push(m);
        assert_eq!(free_span(&seq), Some((0, 0)));
    }

    #[test]
    fn range_adjustment_clamps_at_bounds_and_order() {
        let mut seq = sequence_with(3);
        let m = marker(&seq, 0, 0);
        let id = m.id;
        seq.markers.push(m);

        assert_eq!(adjusted_marker(&seq, id, MarkerEdge::Start, Step::Backward).unwrap(), None);
        assert_eq!(adjusted_marker(&seq, id, MarkerEdge::Start, Step::Forward).unwrap(), None);
        assert_eq!(adjusted_marker(&seq, id, MarkerEdge::End, Step::Backward).unwrap(), None);

        let grown = adjusted_marker(&seq, id, MarkerEdge::End, Step::Forward)
            .unwrap()
            .unwrap();
        assert_eq!(grown.end_scene_id, seq.scenes[1].id);
    }

    #[test]
    fn range_adjustment_does_not_grow_into_another_marker() {
        let mut seq = sequence_with(4);
        let a = marker(&seq, 0, 1);
        let b = marker(&seq, 2, 3);
        let a_id = a.id;
        let b_id = b.id;
        seq.markers.push(a);
        seq.markers.push(b);
        assert_eq!(adjusted_marker(&seq, a_id, MarkerEdge::End, Step::Forward).unwrap(), None);
        assert_eq!(adjusted_marker(&seq, b_id, MarkerEdge::Start, Step::Backward).unwrap(), None);
    }

    #[test]
    fn random_adjustments_never_invert_or_overlap() {
        let mut seq = sequence_with(7);
        for _ in 0..3 {
            let m = new_marker(&seq, "m").unwrap();
            seq.markers.push(m);
        }
        let ids: Vec<_> = seq.markers.iter().map(|m| m.id).collect();
        let moves = [
            (MarkerEdge::End, Step::Forward),
            (MarkerEdge::Start, Step::Forward),
            (MarkerEdge::Start, Step::Backward),
            (MarkerEdge::End, Step::Backward),
        ];
        let mut seed = 7usize;
        for _ in 0..200 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345) % (1 << 31);
            let id = ids[seed % ids.len()];
            let (edge, step) = moves[(seed / 3) % moves.len()];
            if let Some(updated) = adjusted_marker(&seq, id, edge, step).unwrap() {
                let slot = seq.markers.iter_mut().find(|m| m.id == id).unwrap();
                *slot = updated;
            }
            let order = top_level_visible(&seq);
            let mut covered = vec![0; order.len()];
            for m in &seq.markers {
                let start = order.iter().position(|s| s.id == m.start_scene_id).unwrap();
                let end = order.iter().position(|s| s.id == m.end_scene_id).unwrap();
                assert!(start <= end);
                for c in &mut covered[start..=end] {
                    *c += 1;
                }
            }
            assert!(covered.iter().all(|c| *c <= 1));
        }
    }

    #[test]
    fn reordering_into_another_span_counts_as_conflict() {
        let mut seq = sequence_with(4);
        let a = marker(&seq, 0, 1);
        let b = marker(&seq, 2, 3);
        seq.markers.push(a);
        seq.markers.push(b);
        assert_eq!(marker_conflicts(&seq), 0);

        // [0, 2, 1, 3]: the first marker now runs over scene 2.
        seq.scenes.swap(1, 2);
        assert!(marker_conflicts(&seq) > 0);

        // [3, 0, 2, 1]: the second marker ends before it starts.
        let mut seq = sequence_with(4);
        let b = marker(&seq, 2, 3);
        seq.markers.push(b);
        let last = seq.scenes.remove(3);
        seq.scenes.insert(0, last);
        assert_eq!(marker_conflicts(&seq), 1);
    }

    #[test]
    fn nesting_is_limited_to_one_level() {
        let mut seq = sequence_with(3);
        let root = seq.scenes[0].id;
        let child = seq.scenes[1].id;
        let other = seq.scenes[2].id;
        seq.scenes[1].parent_id = Some(root);

        assert!(validate_nesting(&seq, other, Some(root)).is_ok());
        assert!(validate_nesting(&seq, other, Some(child)).is_err());
        assert!(validate_nesting(&seq, root, Some(other)).is_err());
        assert!(validate_nesting(&seq, other, Some(other)).is_err());
        assert!(validate_nesting(&seq, other, Some(EntityId::temporary())).is_err());
        assert!(validate_nesting(&seq, child, None).is_ok());
    }

    #[test]
    fn search_ranks_closer_titles_first() {
        let mut project = Project::new("p");
        let mut seq = Sequence::new("Heist", Point::ZERO);
        seq.scenes.push(Scene::new("Vault door", Point::ZERO));
        seq.scenes.push(Scene::new("Getaway van", Point::ZERO));
        project.sequences.push(seq);

        let hits = search(&project, "vault");
        assert_eq!(hits[0].title, "Vault door");
        assert_eq!(hits[0].kind, NodeKind::Scene);
        assert!(search(&project, "   ").is_empty());
    }
}
