//! chat_state - Lifecycle state machine for streamed chat turns
//!
//! A turn moves `Idle → Opening → StreamingDelta → Finalizing → {Completed |
//! Failed | Cancelled}`. This crate only tracks the lifecycle; the effects of
//! each step live in `chat_stream`.

pub mod machine;

// Re-export commonly used types
pub use machine::{
    FinishReason, StateMachine, StateTransition, TransitionError, TurnEvent, TurnState,
};
