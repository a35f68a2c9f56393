//! What the rendering layer consumes.

use chat_core::{NodeId, Role};
use chat_state::TurnState;
use serde::{Deserialize, Serialize};
use variant_graph::PathDiff;

/// One visible message, in path order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleNode {
    pub node_id: NodeId,
    pub role: Role,
    pub display_text: String,
    pub markup: String,
    pub variant_position: usize,
    pub variant_total: usize,
    /// Assistant of the running turn, before finalization.
    pub streaming: bool,
    /// Assistant a running regeneration was started from.
    pub regenerating: bool,
    /// The assistant marked current by the user.
    pub current: bool,
}

impl VisibleNode {
    pub fn has_variants(&self) -> bool {
        self.variant_total > 1
    }
}

/// Pushed to the rendering layer as the session changes.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    PathChanged {
        nodes: Vec<VisibleNode>,
        diff: PathDiff,
    },
    TextFrame {
        node_id: Option<NodeId>,
        text: String,
        markup: String,
    },
    TurnFinished {
        state: TurnState,
        assistant_id: Option<NodeId>,
    },
}
