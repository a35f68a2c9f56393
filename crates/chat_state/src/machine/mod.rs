//! State machine module
//!
//! Contains the FSM implementation for the turn lifecycle.

mod events;
mod states;
mod transitions;

pub use events::TurnEvent;
pub use states::{FinishReason, TurnState};
pub use transitions::{StateMachine, StateTransition, TransitionError};
