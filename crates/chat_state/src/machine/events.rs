//! Turn events - Defines events that trigger state transitions

use serde::{Deserialize, Serialize};

/// Events that can move a turn through its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnEvent {
    /// `start()` was called and a channel open was requested.
    Started,

    /// An `init` or `delta` event was classified.
    EventReceived,

    /// A `done` event was classified.
    CompletionReceived,

    /// An `error` event was classified.
    ServerError { message: String },

    /// The channel reported a failure.
    TransportError { message: String },

    /// The caller cancelled the turn.
    CancelRequested,

    /// The pacer has shown every buffered character (or was stopped).
    PacerDrained,
}

impl TurnEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TurnEvent::Started => "started",
            TurnEvent::EventReceived => "event_received",
            TurnEvent::CompletionReceived => "completion_received",
            TurnEvent::ServerError { .. } => "server_error",
            TurnEvent::TransportError { .. } => "transport_error",
            TurnEvent::CancelRequested => "cancel_requested",
            TurnEvent::PacerDrained => "pacer_drained",
        }
    }
}
