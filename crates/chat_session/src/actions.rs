//! UI-originated message actions.

use chat_core::{Direction, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    /// Make an assistant message the current one and the anchor for new turns.
    SetPivot { node_id: NodeId },
    VariantPrev { node_id: NodeId },
    VariantNext { node_id: NodeId },
    Regenerate { node_id: NodeId },
    Copy { node_id: NodeId },
    EditSave { node_id: NodeId, text: String },
    /// Arrow-key navigation of the first visible node that has variants.
    ArrowKey(Direction),
}

impl UiAction {
    /// Map a key press to an action. Presses with a modifier held are not
    /// navigation.
    pub fn from_key(key: &str, modifier_held: bool) -> Option<Self> {
        if modifier_held {
            return None;
        }
        match key {
            "ArrowLeft" => Some(UiAction::ArrowKey(Direction::Previous)),
            "ArrowRight" => Some(UiAction::ArrowKey(Direction::Next)),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            UiAction::SetPivot { .. } => "set-pivot",
            UiAction::VariantPrev { .. } => "variant-prev",
            UiAction::VariantNext { .. } => "variant-next",
            UiAction::Regenerate { .. } => "regenerate",
            UiAction::Copy { .. } => "copy",
            UiAction::EditSave { .. } => "edit-save",
            UiAction::ArrowKey(_) => "arrow-key",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Done,
    /// Variant navigation landed on this node.
    Switched(NodeId),
    /// Text for the host clipboard.
    Copied(String),
    /// The action does not apply to its target.
    Ignored,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrow_keys_map_to_navigation() {
        assert_eq!(
            UiAction::from_key("ArrowLeft", false),
            Some(UiAction::ArrowKey(Direction::Previous))
        );
        assert_eq!(UiAction::from_key("ArrowRight", true), None);
        assert_eq!(UiAction::from_key("Enter", false), None);
    }
}
