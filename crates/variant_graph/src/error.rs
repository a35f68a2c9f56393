use chat_core::{NodeId, Role};
use thiserror::Error;

/// Errors raised while mutating a `BranchGraph`.
///
/// Plain lookups of unknown ids are not errors; they return `None` or leave the
/// graph untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node {0} already exists")]
    DuplicateId(NodeId),

    #[error("node {node} references unknown parent {parent}")]
    DanglingParent { node: NodeId, parent: NodeId },

    #[error("cannot rebind unknown node {0}")]
    UnknownNode(NodeId),

    #[error("cannot rebind {old} to {new}: id already owned by another node")]
    IdConflict { old: NodeId, new: NodeId },

    #[error("no variant group for parent {parent:?} and role {role}")]
    UnknownGroup { parent: Option<NodeId>, role: Role },

    #[error("variant index {index} out of range for group of {len}")]
    IndexOutOfRange { index: usize, len: usize },
}
