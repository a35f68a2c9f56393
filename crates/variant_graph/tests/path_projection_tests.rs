//! Path projection and pinning behaviour of `BranchGraph`

use chat_core::{Direction, MessageNode, MessageRecord, NodeId, Role};
use variant_graph::{BranchGraph, NodeSeed, ProjectedPath};

fn id(s: &str) -> NodeId {
    NodeId::from(s)
}

fn user(id: &str, parent: Option<&str>) -> MessageNode {
    MessageNode::user(id, parent.map(NodeId::from), format!("user {id}"))
}

fn assistant(id: &str, parent: &str) -> MessageNode {
    MessageNode::assistant(id, Some(NodeId::from(parent)), format!("assistant {id}"))
}

fn seeds(nodes: Vec<MessageNode>) -> Vec<NodeSeed> {
    nodes.into_iter().map(NodeSeed::new).collect()
}

/// Builds:
/// ```text
/// u1 ─┬ a1 ─ u2 ─ a3
///     └ a2 ─ u4 ─┬ a4
///                └ a5
/// u5 (second root)
/// ```
fn branching_graph() -> BranchGraph {
    let mut graph = BranchGraph::new();
    graph.rebuild(seeds(vec![
        user("u1", None),
        assistant("a1", "u1"),
        user("u2", Some("a1")),
        assistant("a3", "u2"),
        assistant("a2", "u1"),
        user("u4", Some("a2")),
        assistant("a4", "u4"),
        assistant("a5", "u4"),
        user("u5", None),
    ]));
    graph
}

fn assert_well_formed(graph: &BranchGraph, path: &ProjectedPath) {
    let Some(first) = path.steps.first() else {
        return;
    };
    assert_eq!(first.role, Role::User, "path must start at a user node");
    assert!(graph.node(&first.node_id).unwrap().parent_id().is_none());

    for pair in path.steps.windows(2) {
        assert_ne!(pair[0].role, pair[1].role, "roles must alternate");
        let child = graph.node(&pair[1].node_id).unwrap();
        assert_eq!(child.parent_id(), Some(&pair[0].node_id));
    }
}

#[test]
fn test_default_selection_is_most_recent() {
    let graph = branching_graph();
    let path = graph.project_path();
    // The newest root is u5 and it has no children.
    assert_eq!(path.ids(), vec![id("u5")]);
    assert_well_formed(&graph, &path);
}

#[test]
fn test_pin_selects_full_chain() {
    let mut graph = branching_graph();
    assert!(graph.pin_path_to(&id("a3")));

    let path = graph.project_path();
    assert_eq!(path.ids(), vec![id("u1"), id("a1"), id("u2"), id("a3")]);
    assert_well_formed(&graph, &path);

    let a1 = &path.steps[1];
    assert_eq!((a1.variant_position, a1.variant_total), (1, 2));
}

#[test]
fn test_pin_to_interior_node_follows_active_descendants() {
    let mut graph = branching_graph();
    graph.pin_path_to(&id("u4"));

    let path = graph.project_path();
    assert_eq!(path.ids(), vec![id("u1"), id("a2"), id("u4"), id("a5")]);
    assert_well_formed(&graph, &path);
}

#[test]
fn test_pinning_is_idempotent() {
    let mut graph = branching_graph();
    graph.set_pinned_leaf(Some(&id("a4")));
    graph.apply_pin();
    let once: Vec<(String, usize)> = active_indices(&graph);

    graph.apply_pin();
    let twice = active_indices(&graph);
    assert_eq!(once, twice);
}

fn active_indices(graph: &BranchGraph) -> Vec<(String, usize)> {
    let mut out: Vec<(String, usize)> = graph
        .groups()
        .map(|(key, group)| (key.to_string(), group.active_index()))
        .collect();
    out.sort();
    out
}

#[test]
fn test_step_variant_wraps_around() {
    let mut graph = branching_graph();
    graph.pin_path_to(&id("a3"));

    let start = id("a1");
    let mut current = start.clone();
    for _ in 0..2 {
        current = graph.step_variant(&current, Direction::Next);
    }
    assert_eq!(current, start);
    assert_eq!(graph.project_path().ids()[1], start);
}

#[test]
fn test_step_variant_repins_to_new_sibling() {
    let mut graph = branching_graph();
    graph.pin_path_to(&id("a3"));

    let next = graph.step_variant(&id("a1"), Direction::Previous);
    assert_eq!(next, id("a2"));
    assert_eq!(graph.pinned_leaf(), Some(&id("a2")));

    let path = graph.project_path();
    assert_eq!(path.ids(), vec![id("u1"), id("a2"), id("u4"), id("a5")]);
    assert_well_formed(&graph, &path);
}

#[test]
fn test_step_variant_noops() {
    let mut graph = branching_graph();
    graph.pin_path_to(&id("a3"));

    assert_eq!(graph.step_variant(&id("ghost"), Direction::Next), id("ghost"));
    assert_eq!(graph.step_variant(&id("u2"), Direction::Next), id("u2"));
    assert_eq!(graph.pinned_leaf(), Some(&id("a3")));
}

#[test]
fn test_rebind_preserves_group_position_and_pin() {
    let mut graph = branching_graph();
    let temp = NodeId::temporary();
    graph.insert(MessageNode::user(temp.clone(), None, "edited")).unwrap();
    graph.pin_path_to(&temp);

    let root_key = variant_graph::GroupKey::root(Role::User);
    let before = graph.group(&root_key).unwrap().clone();
    let position = before
        .position_of(graph.index_of(&temp).unwrap())
        .unwrap();

    graph.rebind_id(&temp, &id("u9")).unwrap();

    let after = graph.group(&root_key).unwrap();
    assert_eq!(after.len(), before.len());
    assert_eq!(after.members()[position], graph.index_of(&id("u9")).unwrap());
    assert_eq!(graph.pinned_leaf(), Some(&id("u9")));
    assert_eq!(graph.project_path().ids(), vec![id("u9")]);
}

#[test]
fn test_rebuild_precedence_current_over_persisted_over_last() {
    let mut graph = BranchGraph::new();
    let mut persisted = NodeSeed::new(assistant("a1", "u1"));
    persisted.persisted_active = true;
    let mut current = NodeSeed::new(assistant("a2", "u1"));
    current.current = true;
    graph.rebuild(vec![
        NodeSeed::new(user("u1", None)),
        persisted.clone(),
        current,
        NodeSeed::new(assistant("a3", "u1")),
    ]);
    assert_eq!(graph.project_path().ids(), vec![id("u1"), id("a2")]);

    // Without a current marker the persisted flag wins over the default.
    graph.rebuild(vec![
        NodeSeed::new(user("u1", None)),
        persisted,
        NodeSeed::new(assistant("a2", "u1")),
        NodeSeed::new(assistant("a3", "u1")),
    ]);
    assert_eq!(graph.project_path().ids(), vec![id("u1"), id("a1")]);

    // With no flags the last sibling is active.
    graph.rebuild(seeds(vec![
        user("u1", None),
        assistant("a1", "u1"),
        assistant("a2", "u1"),
    ]));
    assert_eq!(graph.project_path().ids(), vec![id("u1"), id("a2")]);
}

#[test]
fn test_rebuild_later_flag_wins_within_tier() {
    let mut graph = BranchGraph::new();
    let flagged = |node| NodeSeed {
        node,
        persisted_active: true,
        current: false,
    };
    graph.rebuild(vec![
        NodeSeed::new(user("u1", None)),
        flagged(assistant("a1", "u1")),
        flagged(assistant("a2", "u1")),
        NodeSeed::new(assistant("a3", "u1")),
    ]);
    assert_eq!(graph.project_path().ids(), vec![id("u1"), id("a2")]);
}

#[test]
fn test_rebuild_reapplies_surviving_pin() {
    let mut graph = branching_graph();
    graph.pin_path_to(&id("a4"));
    graph.rebuild(seeds(vec![
        user("u1", None),
        assistant("a1", "u1"),
        assistant("a2", "u1"),
        user("u4", Some("a2")),
        assistant("a4", "u4"),
        assistant("a5", "u4"),
        user("u5", None),
    ]));
    assert_eq!(
        graph.project_path().ids(),
        vec![id("u1"), id("a2"), id("u4"), id("a4")]
    );
}

#[test]
fn test_rebuild_from_wire_records() {
    let records: Vec<MessageRecord> = serde_json::from_str(
        r#"[
            {"id": 1, "role": "user", "content": [{"value": "hi"}], "parent_id": null},
            {"id": 2, "role": "assistant", "content": [{"value": "first"}], "parent_id": 1, "is_active_variant": 1},
            {"id": 3, "role": "assistant", "content": [{"value": "second"}], "parent_id": 1, "is_active_variant": 0}
        ]"#,
    )
    .unwrap();

    let mut graph = BranchGraph::new();
    graph.rebuild(records.iter().map(NodeSeed::from));

    let path = graph.project_path();
    assert_eq!(path.ids(), vec![id("1"), id("2")]);
    assert_eq!(graph.node(&id("2")).unwrap().text(), "first");
}
