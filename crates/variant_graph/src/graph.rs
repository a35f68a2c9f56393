use std::collections::HashMap;

use chat_core::{Direction, MessageNode, MessageRecord, NodeId, Role};

use crate::error::GraphError;
use crate::group::VariantGroup;
use crate::key::{GroupKey, NodeIndex};

/// A node handed to [`BranchGraph::rebuild`], with the flags that decide which
/// sibling starts out active.
///
/// Precedence inside one group: `current` > `persisted_active` > the most
/// recently inserted sibling. Within a tier the later node wins.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeSeed {
    pub node: MessageNode,
    pub persisted_active: bool,
    pub current: bool,
}

impl NodeSeed {
    pub fn new(node: MessageNode) -> Self {
        Self {
            node,
            persisted_active: false,
            current: false,
        }
    }
}

impl From<&MessageRecord> for NodeSeed {
    fn from(record: &MessageRecord) -> Self {
        Self {
            node: record.to_node(),
            persisted_active: record.is_active_variant,
            current: false,
        }
    }
}

#[derive(Clone, Debug)]
struct Slot {
    id: NodeId,
    role: Role,
    parent: Option<NodeIndex>,
    text: String,
    created_order: u64,
}

/// Arena of message nodes plus the variant group table and the pinned leaf.
///
/// Nodes are never removed. External ids resolve through a lookup table onto
/// stable arena slots, so rebinding an optimistic id touches only that table.
#[derive(Clone, Debug, Default)]
pub struct BranchGraph {
    slots: Vec<Slot>,
    ids: HashMap<NodeId, NodeIndex>,
    groups: HashMap<GroupKey, VariantGroup>,
    pub(crate) pinned: Option<NodeIndex>,
    next_order: u64,
}

/// Borrowed view of one node.
#[derive(Clone, Copy, Debug)]
pub struct NodeRef<'a> {
    graph: &'a BranchGraph,
    index: NodeIndex,
}

impl<'a> NodeRef<'a> {
    fn slot(&self) -> &'a Slot {
        &self.graph.slots[self.index.0]
    }

    pub fn index(&self) -> NodeIndex {
        self.index
    }

    pub fn id(&self) -> &'a NodeId {
        &self.slot().id
    }

    pub fn role(&self) -> Role {
        self.slot().role
    }

    /// Current id of the parent, reflecting any rebind.
    pub fn parent_id(&self) -> Option<&'a NodeId> {
        self.slot().parent.map(|p| &self.graph.slots[p.0].id)
    }

    pub fn text(&self) -> &'a str {
        &self.slot().text
    }

    pub fn created_order(&self) -> u64 {
        self.slot().created_order
    }

    pub fn group_key(&self) -> GroupKey {
        GroupKey::new(self.slot().parent, self.slot().role)
    }

    /// 1-based position among its siblings and the sibling count.
    pub fn variant_position(&self) -> (usize, usize) {
        let key = self.group_key();
        self.graph
            .groups
            .get(&key)
            .and_then(|group| group.position_of(self.index).map(|pos| (pos + 1, group.len())))
            .unwrap_or((1, 1))
    }

    pub fn to_message(&self) -> MessageNode {
        MessageNode::new(
            self.id().clone(),
            self.role(),
            self.parent_id().cloned(),
            self.text(),
        )
    }
}

impl BranchGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.ids.contains_key(id)
    }

    pub fn index_of(&self, id: &NodeId) -> Option<NodeIndex> {
        self.ids.get(id).copied()
    }

    pub fn node(&self, id: &NodeId) -> Option<NodeRef<'_>> {
        self.index_of(id).map(|index| self.node_at(index))
    }

    pub(crate) fn node_at(&self, index: NodeIndex) -> NodeRef<'_> {
        NodeRef { graph: self, index }
    }

    pub(crate) fn parent_of(&self, index: NodeIndex) -> Option<NodeIndex> {
        self.slots[index.0].parent
    }

    pub fn group(&self, key: &GroupKey) -> Option<&VariantGroup> {
        self.groups.get(key)
    }

    pub(crate) fn group_mut(&mut self, key: &GroupKey) -> Option<&mut VariantGroup> {
        self.groups.get_mut(key)
    }

    pub fn groups(&self) -> impl Iterator<Item = (&GroupKey, &VariantGroup)> {
        self.groups.iter()
    }

    /// The group holding the children of `parent` (root when `None`) with `role`.
    pub fn group_for(&self, parent: Option<&NodeId>, role: Role) -> Option<&VariantGroup> {
        let key = self.key_for(parent, role)?;
        self.groups.get(&key)
    }

    fn key_for(&self, parent: Option<&NodeId>, role: Role) -> Option<GroupKey> {
        match parent {
            None => Some(GroupKey::root(role)),
            Some(id) => self.index_of(id).map(|index| GroupKey::new(Some(index), role)),
        }
    }

    /// Active child of `parent` with the given role.
    pub fn active_child(&self, parent: Option<&NodeId>, role: Role) -> Option<NodeRef<'_>> {
        self.group_for(parent, role)
            .map(|group| self.node_at(group.active_member()))
    }

    /// Replace all state from a flat node list.
    ///
    /// Nodes whose parent never appears in the list are skipped with a warning.
    /// A pin that still names a node after the rebuild is re-applied.
    pub fn rebuild<I>(&mut self, seeds: I)
    where
        I: IntoIterator<Item = NodeSeed>,
    {
        let pinned_id = self.pinned.map(|index| self.slots[index.0].id.clone());

        self.slots.clear();
        self.ids.clear();
        self.groups.clear();
        self.pinned = None;
        self.next_order = 0;

        // Parents may be listed after their children, so insert in waves.
        let mut pending: Vec<NodeSeed> = seeds.into_iter().collect();
        let mut current_marks: HashMap<GroupKey, usize> = HashMap::new();
        let mut persisted_marks: HashMap<GroupKey, usize> = HashMap::new();

        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();

            for seed in pending {
                let parent_ready = seed
                    .node
                    .parent_id
                    .as_ref()
                    .map_or(true, |parent| self.ids.contains_key(parent));
                if !parent_ready {
                    deferred.push(seed);
                    continue;
                }

                match self.insert_slot(seed.node) {
                    Ok(index) => {
                        let key = self.node_at(index).group_key();
                        let position = self.groups[&key].len() - 1;
                        if seed.current {
                            current_marks.insert(key, position);
                        }
                        if seed.persisted_active {
                            persisted_marks.insert(key, position);
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%error, "BranchGraph: skipping node during rebuild");
                    }
                }
            }

            if deferred.len() == before {
                for seed in &deferred {
                    tracing::warn!(
                        node_id = %seed.node.id,
                        parent_id = ?seed.node.parent_id,
                        "BranchGraph: skipping node with unknown parent"
                    );
                }
                break;
            }
            pending = deferred;
        }

        for (key, group) in self.groups.iter_mut() {
            let chosen = current_marks
                .get(key)
                .or_else(|| persisted_marks.get(key))
                .copied()
                .unwrap_or(group.len() - 1);
            group.set_active(chosen);
        }

        tracing::debug!(
            nodes = self.slots.len(),
            groups = self.groups.len(),
            "BranchGraph: rebuilt"
        );

        if let Some(id) = pinned_id {
            if self.set_pinned_leaf(Some(&id)) {
                self.apply_pin();
            }
        }
    }

    /// Append a node to its variant group (creating the group if needed) and
    /// make it the active sibling.
    pub fn insert(&mut self, node: MessageNode) -> Result<NodeIndex, GraphError> {
        let index = self.insert_slot(node)?;
        let node = self.node_at(index);
        tracing::debug!(
            node_id = %node.id(),
            role = %node.role(),
            parent_id = ?node.parent_id(),
            variant = ?node.variant_position(),
            "BranchGraph: inserted node"
        );
        Ok(index)
    }

    fn insert_slot(&mut self, node: MessageNode) -> Result<NodeIndex, GraphError> {
        if self.ids.contains_key(&node.id) {
            return Err(GraphError::DuplicateId(node.id));
        }
        let parent = match &node.parent_id {
            None => None,
            Some(parent_id) => match self.ids.get(parent_id) {
                Some(index) => Some(*index),
                None => {
                    return Err(GraphError::DanglingParent {
                        node: node.id,
                        parent: parent_id.clone(),
                    })
                }
            },
        };

        let index = NodeIndex(self.slots.len());
        let key = GroupKey::new(parent, node.role);
        self.slots.push(Slot {
            id: node.id.clone(),
            role: node.role,
            parent,
            text: node.text,
            created_order: self.next_order,
        });
        self.next_order += 1;
        self.ids.insert(node.id, index);

        match self.groups.get_mut(&key) {
            Some(group) => group.push(index),
            None => {
                self.groups.insert(key, VariantGroup::new(index));
            }
        }
        Ok(index)
    }

    /// Rename a node in place. Group membership, children and the pin follow
    /// automatically because they reference the arena slot.
    ///
    /// Returns `Ok(false)` when there is nothing to do: the ids are equal, or
    /// `old_id` is gone while `new_id` exists (already rebound).
    pub fn rebind_id(&mut self, old_id: &NodeId, new_id: &NodeId) -> Result<bool, GraphError> {
        if old_id == new_id {
            return Ok(false);
        }
        let Some(index) = self.ids.get(old_id).copied() else {
            if self.ids.contains_key(new_id) {
                tracing::debug!(%old_id, %new_id, "BranchGraph: rebind already applied");
                return Ok(false);
            }
            return Err(GraphError::UnknownNode(old_id.clone()));
        };
        if self.ids.contains_key(new_id) {
            return Err(GraphError::IdConflict {
                old: old_id.clone(),
                new: new_id.clone(),
            });
        }

        self.ids.remove(old_id);
        self.ids.insert(new_id.clone(), index);
        self.slots[index.0].id = new_id.clone();

        tracing::info!(%old_id, %new_id, "BranchGraph: rebound node id");
        Ok(true)
    }

    /// Replace a node's text. Returns `false` for unknown ids.
    pub fn set_text(&mut self, id: &NodeId, text: impl Into<String>) -> bool {
        match self.index_of(id) {
            Some(index) => {
                self.slots[index.0].text = text.into();
                true
            }
            None => false,
        }
    }

    pub fn set_active_index_for_group(
        &mut self,
        parent: Option<&NodeId>,
        role: Role,
        index: usize,
    ) -> Result<(), GraphError> {
        let unknown = || GraphError::UnknownGroup {
            parent: parent.cloned(),
            role,
        };
        let key = self.key_for(parent, role).ok_or_else(unknown)?;
        let group = self.groups.get_mut(&key).ok_or_else(unknown)?;
        if group.set_active(index) {
            Ok(())
        } else {
            Err(GraphError::IndexOutOfRange {
                index,
                len: group.len(),
            })
        }
    }

    /// Advance the active sibling of `id`'s group (wrapping) and pin the newly
    /// active sibling. Unknown ids and single-member groups return `id` as-is.
    pub fn step_variant(&mut self, id: &NodeId, direction: Direction) -> NodeId {
        let Some(index) = self.index_of(id) else {
            tracing::debug!(node_id = %id, "BranchGraph: step_variant on unknown node");
            return id.clone();
        };
        let key = self.node_at(index).group_key();
        let Some(group) = self.groups.get_mut(&key) else {
            return id.clone();
        };
        if group.len() < 2 {
            return id.clone();
        }

        let next = group.step(direction.step());
        let next_id = self.slots[next.0].id.clone();
        self.pinned = Some(next);
        self.apply_pin();

        tracing::debug!(
            from = %id,
            to = %next_id,
            group = %key,
            "BranchGraph: switched variant"
        );
        next_id
    }
}
