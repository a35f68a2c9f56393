use crate::key::NodeIndex;

/// Ordered siblings (insertion order) with exactly one active member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantGroup {
    members: Vec<NodeIndex>,
    active: usize,
}

impl VariantGroup {
    pub(crate) fn new(first: NodeIndex) -> Self {
        Self {
            members: vec![first],
            active: 0,
        }
    }

    /// Append a sibling and make it active.
    pub(crate) fn push(&mut self, member: NodeIndex) {
        self.members.push(member);
        self.active = self.members.len() - 1;
    }

    pub(crate) fn set_active(&mut self, index: usize) -> bool {
        if index < self.members.len() {
            self.active = index;
            true
        } else {
            false
        }
    }

    /// Move the active index by `step`, wrapping at both ends.
    pub(crate) fn step(&mut self, step: isize) -> NodeIndex {
        let len = self.members.len() as isize;
        self.active = (self.active as isize + step).rem_euclid(len) as usize;
        self.members[self.active]
    }

    pub fn members(&self) -> &[NodeIndex] {
        &self.members
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active_member(&self) -> NodeIndex {
        self.members[self.active]
    }

    pub fn position_of(&self, member: NodeIndex) -> Option<usize> {
        self.members.iter().position(|m| *m == member)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_activates_newest() {
        let mut group = VariantGroup::new(NodeIndex(0));
        group.push(NodeIndex(3));
        assert_eq!(group.active_index(), 1);
        assert_eq!(group.active_member(), NodeIndex(3));
    }

    #[test]
    fn step_wraps_both_ways() {
        let mut group = VariantGroup::new(NodeIndex(0));
        group.push(NodeIndex(1));
        group.push(NodeIndex(2));
        assert_eq!(group.step(1), NodeIndex(0));
        assert_eq!(group.step(-1), NodeIndex(2));
        assert_eq!(group.step(-1), NodeIndex(1));
    }

    #[test]
    fn set_active_rejects_out_of_range() {
        let mut group = VariantGroup::new(NodeIndex(0));
        assert!(!group.set_active(1));
        assert_eq!(group.active_index(), 0);
    }
}
