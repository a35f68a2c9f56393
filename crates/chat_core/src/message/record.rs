//! MessageRecord - the flat message shape returned by the conversation endpoint

use serde::{Deserialize, Deserializer, Serialize};

use super::node::{MessageNode, NodeId, Role};

/// One entry of `GET /chats/{id}/messages`.
///
/// Ids arrive as numbers or strings; `parent_id` may be null, missing or the
/// literal string `"null"`; `is_active_variant` may be `0/1` or a boolean.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MessageRecord {
    #[serde(deserialize_with = "de_node_id")]
    pub id: NodeId,

    #[serde(default = "default_role")]
    pub role: Role,

    #[serde(default)]
    pub content: Vec<ContentValue>,

    #[serde(default, deserialize_with = "de_parent_id")]
    pub parent_id: Option<NodeId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_index: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_total: Option<u32>,

    #[serde(default, deserialize_with = "de_flag")]
    pub is_active_variant: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ContentValue {
    #[serde(default)]
    pub value: String,
}

fn default_role() -> Role {
    Role::User
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl From<RawId> for Option<NodeId> {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Number(n) => Some(NodeId::from(n)),
            RawId::Text(s) if s.is_empty() || s == "null" => None,
            RawId::Text(s) => Some(NodeId::from(s)),
        }
    }
}

fn de_node_id<'de, D>(deserializer: D) -> Result<NodeId, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = RawId::deserialize(deserializer)?;
    Option::<NodeId>::from(raw).ok_or_else(|| serde::de::Error::custom("message id cannot be empty"))
}

fn de_parent_id<'de, D>(deserializer: D) -> Result<Option<NodeId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawId>::deserialize(deserializer)?;
    Ok(raw.and_then(Option::<NodeId>::from))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Number(i64),
    Text(String),
}

fn de_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawFlag>::deserialize(deserializer)?;
    Ok(match raw {
        None => false,
        Some(RawFlag::Bool(b)) => b,
        Some(RawFlag::Number(n)) => n != 0,
        Some(RawFlag::Text(s)) => matches!(s.trim(), "1" | "true"),
    })
}

impl MessageRecord {
    /// Text of the first content part, empty when there is none.
    pub fn text(&self) -> &str {
        self.content.first().map(|c| c.value.as_str()).unwrap_or("")
    }

    pub fn to_node(&self) -> MessageNode {
        MessageNode::new(self.id.clone(), self.role, self.parent_id.clone(), self.text())
    }
}
