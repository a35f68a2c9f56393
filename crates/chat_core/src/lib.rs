//! chat_core - Core types and configuration for the branching chat client
//!
//! This crate provides the foundational types used across all chat crates:
//! - `message` - node identifiers, roles, message nodes and the wire record shape
//! - `config` - client configuration (endpoint, credentials, pacing)

pub mod config;
pub mod message;

// Re-export commonly used types
pub use config::{ClientConfig, ConfigError, PacerConfig};
pub use message::{Direction, MessageNode, MessageRecord, NodeId, Role};
