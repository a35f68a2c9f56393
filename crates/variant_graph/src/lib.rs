//! `variant_graph` keeps a branching conversation as a tree of message nodes
//! partitioned into sibling variant groups, and derives the single linear path
//! that is visible under the current pin and variant selections.

pub mod error;
pub mod graph;
pub mod group;
pub mod key;
mod pin;
pub mod projection;

// Re-export the public API
pub use error::GraphError;
pub use graph::{BranchGraph, NodeRef, NodeSeed};
pub use group::VariantGroup;
pub use key::{GroupKey, NodeIndex, ParentKey};
pub use projection::{PathDiff, PathProjector, PathStep, ProjectedPath};
