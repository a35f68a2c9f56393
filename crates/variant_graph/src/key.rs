//! Typed keys for the node arena and the variant group table.

use std::fmt;

use chat_core::Role;

/// Stable slot of a node in the graph arena. External ids map onto it, so a
/// rebind never moves a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub(crate) usize);

impl NodeIndex {
    pub fn get(self) -> usize {
        self.0
    }
}

/// The parent half of a group key; root-level nodes share the `Root` sentinel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParentKey {
    Root,
    Node(NodeIndex),
}

impl From<Option<NodeIndex>> for ParentKey {
    fn from(parent: Option<NodeIndex>) -> Self {
        match parent {
            Some(index) => ParentKey::Node(index),
            None => ParentKey::Root,
        }
    }
}

/// Identifies the sibling set sharing one parent and one role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub parent: ParentKey,
    pub role: Role,
}

impl GroupKey {
    pub fn new(parent: impl Into<ParentKey>, role: Role) -> Self {
        Self {
            parent: parent.into(),
            role,
        }
    }

    pub fn root(role: Role) -> Self {
        Self {
            parent: ParentKey::Root,
            role,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parent {
            ParentKey::Root => write!(f, "root|{}", self.role),
            ParentKey::Node(index) => write!(f, "#{}|{}", index.0, self.role),
        }
    }
}
