//! Pinned-leaf handling for `BranchGraph`.

use chat_core::NodeId;

use crate::graph::BranchGraph;
use crate::key::GroupKey;

impl BranchGraph {
    /// Record the leaf the visible path must reach. `None` clears the pin.
    ///
    /// Pinning an unknown id is ignored and returns `false`; stale ids are
    /// normal while a stream is switching ids.
    pub fn set_pinned_leaf(&mut self, leaf: Option<&NodeId>) -> bool {
        match leaf {
            None => {
                self.pinned = None;
                true
            }
            Some(id) => match self.index_of(id) {
                Some(index) => {
                    self.pinned = Some(index);
                    true
                }
                None => {
                    tracing::debug!(node_id = %id, "BranchGraph: ignoring pin to unknown node");
                    false
                }
            },
        }
    }

    /// Current id of the pinned leaf, following any rebind.
    pub fn pinned_leaf(&self) -> Option<&NodeId> {
        self.pinned.map(|index| self.node_at(index).id())
    }

    /// Force every group on the chain from the pinned leaf up to its root to
    /// select the node on that chain, including the root-level group.
    pub fn apply_pin(&mut self) {
        let Some(mut current) = self.pinned else {
            return;
        };

        // The arena only grows, so the chain cannot be longer than the arena.
        for _ in 0..self.len() {
            let node = self.node_at(current);
            let key: GroupKey = node.group_key();
            let parent = self.parent_of(current);

            if let Some(group) = self.group_mut(&key) {
                if let Some(position) = group.position_of(current) {
                    group.set_active(position);
                }
            }

            match parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
    }

    /// Set and immediately apply a pin. Returns `false` if the id is unknown.
    pub fn pin_path_to(&mut self, leaf: &NodeId) -> bool {
        if self.set_pinned_leaf(Some(leaf)) {
            self.apply_pin();
            true
        } else {
            false
        }
    }
}
