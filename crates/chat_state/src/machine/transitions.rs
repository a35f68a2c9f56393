//! State transitions - FSM transition logic
//!
//! Implements the state machine that handles event-driven turn transitions.

use thiserror::Error;

use super::events::TurnEvent;
use super::states::{FinishReason, TurnState};

/// Error type for invalid state transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition from {from:?} with event {event}")]
    InvalidTransition { from: TurnState, event: String },

    #[error("State machine is in terminal state: {0:?}")]
    TerminalState(TurnState),
}

/// Represents a state transition result.
#[derive(Debug, Clone)]
pub struct StateTransition {
    /// The state before the transition.
    pub from: TurnState,
    /// The state after the transition.
    pub to: TurnState,
    /// The event that triggered the transition.
    pub event: TurnEvent,
    /// Whether the state actually changed.
    pub changed: bool,
}

/// State machine for one turn's lifecycle.
#[derive(Debug, Clone)]
pub struct StateMachine {
    /// Current state.
    current_state: TurnState,
    /// Transition history (limited).
    history: Vec<StateTransition>,
    /// Max history entries to keep.
    max_history: usize,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine in Idle state.
    pub fn new() -> Self {
        Self::with_state(TurnState::Idle)
    }

    /// Create a state machine with a specific initial state.
    pub fn with_state(state: TurnState) -> Self {
        Self {
            current_state: state,
            history: Vec::new(),
            max_history: 50,
        }
    }

    /// Get the current state.
    pub fn state(&self) -> &TurnState {
        &self.current_state
    }

    /// Get the transition history.
    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    /// Handle an event, staying put when it does not apply to the current state.
    pub fn handle_event(&mut self, event: TurnEvent) -> StateTransition {
        let old_state = self.current_state.clone();
        let new_state = Self::compute_next_state(&old_state, &event).unwrap_or_else(|| old_state.clone());
        let changed = old_state != new_state;

        if changed {
            tracing::info!(
                old_state = ?old_state,
                new_state = ?new_state,
                event = event.name(),
                "TurnFSM: State transition"
            );
        } else {
            tracing::debug!(
                state = ?old_state,
                event = event.name(),
                "TurnFSM: Event does not trigger state change"
            );
        }

        self.current_state = new_state.clone();

        let transition = StateTransition {
            from: old_state,
            to: new_state,
            event,
            changed,
        };

        self.history.push(transition.clone());
        if self.history.len() > self.max_history {
            self.history.remove(0);
        }

        transition
    }

    /// Handle an event, rejecting events that have no transition from the current state.
    pub fn try_handle_event(&mut self, event: TurnEvent) -> Result<StateTransition, TransitionError> {
        if self.current_state.is_terminal() {
            return Err(TransitionError::TerminalState(self.current_state.clone()));
        }
        if Self::compute_next_state(&self.current_state, &event).is_none() {
            return Err(TransitionError::InvalidTransition {
                from: self.current_state.clone(),
                event: event.name().to_string(),
            });
        }
        Ok(self.handle_event(event))
    }

    /// Compute the next state, or `None` when the event does not apply.
    fn compute_next_state(state: &TurnState, event: &TurnEvent) -> Option<TurnState> {
        use TurnEvent::*;
        use TurnState::*;

        let next = match (state, event) {
            // ========== Start ==========
            (Idle, Started) => Opening,

            // ========== Inbound events ==========
            (Opening | StreamingDelta, EventReceived) => StreamingDelta,
            (Opening | StreamingDelta, CompletionReceived) => Finalizing {
                reason: FinishReason::Done,
            },
            (Opening | StreamingDelta, ServerError { message }) => Finalizing {
                reason: FinishReason::ServerError {
                    message: message.clone(),
                },
            },
            (Opening | StreamingDelta, TransportError { message }) => Finalizing {
                reason: FinishReason::TransportError {
                    message: message.clone(),
                },
            },

            // ========== Cancellation ==========
            (Idle | Opening | StreamingDelta, CancelRequested) => Finalizing {
                reason: FinishReason::Cancelled,
            },
            // A cancel while draining stops the drain.
            (Finalizing { .. }, CancelRequested) => Finalizing {
                reason: FinishReason::Cancelled,
            },

            // ========== Drain ==========
            (Finalizing { reason }, PacerDrained) => match reason {
                FinishReason::Done => Completed,
                FinishReason::Cancelled => Cancelled,
                FinishReason::ServerError { message } | FinishReason::TransportError { message } => {
                    Failed {
                        error: message.clone(),
                    }
                }
            },

            // ========== Default: No transition ==========
            _ => return None,
        };
        Some(next)
    }

    /// Check if a transition is valid without executing it.
    pub fn can_transition(&self, event: &TurnEvent) -> bool {
        Self::compute_next_state(&self.current_state, event).is_some()
    }

    /// Reset to Idle state.
    pub fn reset(&mut self) {
        self.current_state = TurnState::Idle;
        self.history.clear();
    }
}
