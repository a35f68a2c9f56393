//! Message module - Message node types
//!
//! Shared message types used across the system.

mod node;
mod record;

pub use node::{Direction, MessageNode, NodeId, Role};
pub use record::MessageRecord;
