//! Linear path projection.
//!
//! Projection is a pure read of the graph: start at the active root user node
//! and keep following the active child of the opposite role until a node has
//! no children.

use chat_core::{NodeId, Role};
use serde::{Deserialize, Serialize};

use crate::graph::BranchGraph;
use crate::key::{GroupKey, ParentKey};

/// One visible position in the projected path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub node_id: NodeId,
    pub role: Role,
    /// 1-based index of the node among its siblings.
    pub variant_position: usize,
    pub variant_total: usize,
}

impl PathStep {
    pub fn has_variants(&self) -> bool {
        self.variant_total > 1
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectedPath {
    pub steps: Vec<PathStep>,
}

impl ProjectedPath {
    pub fn ids(&self) -> Vec<NodeId> {
        self.steps.iter().map(|step| step.node_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.steps.iter().any(|step| &step.node_id == id)
    }

    pub fn leaf(&self) -> Option<&PathStep> {
        self.steps.last()
    }

    pub fn last_of_role(&self, role: Role) -> Option<&NodeId> {
        self.steps
            .iter()
            .rev()
            .find(|step| step.role == role)
            .map(|step| &step.node_id)
    }

    /// First step whose node has siblings to navigate between.
    pub fn first_navigable(&self) -> Option<&PathStep> {
        self.steps.iter().find(|step| step.has_variants())
    }
}

/// What changed between two projections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathDiff {
    /// Number of leading steps identical in node and variant counters.
    pub common_prefix: usize,
    pub removed: Vec<NodeId>,
    pub added: Vec<NodeId>,
}

impl PathDiff {
    pub fn between(previous: &ProjectedPath, next: &ProjectedPath) -> Self {
        let common_prefix = previous
            .steps
            .iter()
            .zip(next.steps.iter())
            .take_while(|(a, b)| a == b)
            .count();
        Self {
            common_prefix,
            removed: previous.steps[common_prefix..]
                .iter()
                .map(|s| s.node_id.clone())
                .collect(),
            added: next.steps[common_prefix..]
                .iter()
                .map(|s| s.node_id.clone())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// Derives the visible path from a `BranchGraph`.
pub struct PathProjector;

impl PathProjector {
    pub fn project(graph: &BranchGraph) -> ProjectedPath {
        let mut steps = Vec::new();

        let Some(root_group) = graph.group(&GroupKey::root(Role::User)) else {
            return ProjectedPath { steps };
        };

        let mut current = root_group.active_member();
        // Every node has one parent, so a walk from the root visits each node at most once.
        for _ in 0..graph.len() {
            let node = graph.node_at(current);
            let (variant_position, variant_total) = node.variant_position();
            steps.push(PathStep {
                node_id: node.id().clone(),
                role: node.role(),
                variant_position,
                variant_total,
            });

            let child_key = GroupKey {
                parent: ParentKey::Node(current),
                role: node.role().opposite(),
            };
            match graph.group(&child_key) {
                Some(group) => current = group.active_member(),
                None => break,
            }
        }

        ProjectedPath { steps }
    }
}

impl BranchGraph {
    /// Shorthand for [`PathProjector::project`].
    pub fn project_path(&self) -> ProjectedPath {
        PathProjector::project(self)
    }
}
