//! Turn states - Defines all possible states of a streamed turn

use serde::{Deserialize, Serialize};

/// Why a turn entered `Finalizing`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FinishReason {
    /// The server sent `done`.
    Done,
    /// The server sent an `error` event.
    ServerError { message: String },
    /// The channel failed to open or broke mid-stream.
    TransportError { message: String },
    /// The caller cancelled the turn.
    Cancelled,
}

impl FinishReason {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            FinishReason::ServerError { .. } | FinishReason::TransportError { .. }
        )
    }
}

/// Lifecycle of one request/response exchange.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TurnState {
    /// Nothing started yet.
    #[default]
    Idle,

    /// Channel open requested, no event classified yet.
    Opening,

    /// At least one inbound event was classified; text may be arriving.
    StreamingDelta,

    /// No more input will be accepted; waiting for the pacer to drain.
    Finalizing { reason: FinishReason },

    /// The stream closed normally and all text was displayed.
    Completed,

    /// Server or transport failure; partial text was displayed.
    Failed { error: String },

    /// The caller stopped the turn; visible text at that moment is final.
    Cancelled,
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TurnState::Completed | TurnState::Failed { .. } | TurnState::Cancelled
        )
    }

    /// Whether the turn still accepts inbound channel events.
    pub fn accepts_input(&self) -> bool {
        matches!(self, TurnState::Opening | TurnState::StreamingDelta)
    }

    pub fn is_finalizing(&self) -> bool {
        matches!(self, TurnState::Finalizing { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(TurnState::Completed.is_terminal());
        assert!(TurnState::Cancelled.is_terminal());
        assert!(TurnState::Failed {
            error: "x".to_string()
        }
        .is_terminal());
        assert!(!TurnState::Idle.is_terminal());
        assert!(!TurnState::Finalizing {
            reason: FinishReason::Done
        }
        .is_terminal());
    }

    #[test]
    fn serializes_with_state_tag() {
        let json = serde_json::to_value(TurnState::Finalizing {
            reason: FinishReason::ServerError {
                message: "quota".to_string(),
            },
        })
        .unwrap();
        assert_eq!(json["state"], "finalizing");
        assert_eq!(json["reason"]["kind"], "server_error");
    }
}
