//! Message nodes - identifiers, roles and navigation directions

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TEMPORARY_PREFIX: &str = "t-";

/// External identifier of a message node.
///
/// Server-issued ids are usually numeric, locally created ids carry a `t-`
/// prefix until the server confirms them and they are rebound.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh optimistic id for a node the server has not seen yet.
    pub fn temporary() -> Self {
        Self(format!("{TEMPORARY_PREFIX}{}", Uuid::new_v4().simple()))
    }

    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read an id from a JSON payload field that may be a number, a string or
    /// null. Empty strings and the literal `"null"` count as absent.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => Some(Self(n.to_string())),
            serde_json::Value::String(s) if !s.is_empty() && s != "null" => Some(Self(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// Author of a message. Children always carry the opposite role of their parent.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// The role of this node's children.
    pub fn opposite(self) -> Self {
        match self {
            Role::User => Role::Assistant,
            Role::Assistant => Role::User,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step direction for variant navigation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Previous,
    Next,
}

impl Direction {
    /// Signed step (-1 or +1).
    pub fn step(self) -> isize {
        match self {
            Direction::Previous => -1,
            Direction::Next => 1,
        }
    }
}

/// A message as handed to the branch graph.
///
/// The graph assigns the insertion order itself; `parent_id == None` marks a
/// root node.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MessageNode {
    pub id: NodeId,
    pub role: Role,
    pub parent_id: Option<NodeId>,
    pub text: String,
}

impl MessageNode {
    pub fn new(id: impl Into<NodeId>, role: Role, parent_id: Option<NodeId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            parent_id,
            text: text.into(),
        }
    }

    pub fn user(id: impl Into<NodeId>, parent_id: Option<NodeId>, text: impl Into<String>) -> Self {
        Self::new(id, Role::User, parent_id, text)
    }

    pub fn assistant(id: impl Into<NodeId>, parent_id: Option<NodeId>, text: impl Into<String>) -> Self {
        Self::new(id, Role::Assistant, parent_id, text)
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
