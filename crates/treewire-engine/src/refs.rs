//! Reference table
//!
//! Transaction-scoped mapping from small integer IDs to node sets, with a
//! parallel content-flag map. Slot 0 is pre-bound to the transaction root.
//! Entries may contain `NodeId::NONE` placeholders: a single-result query
//! keeps one slot per parent even when a parent had no match.

use std::collections::HashMap;

use treewire_dom::NodeId;
use treewire_proto::RefId;

/// Per-transaction reference state. Created fresh for every transaction and
/// dropped at its end; never shared.
#[derive(Debug)]
pub(crate) struct RefTable {
    nodes: HashMap<RefId, Vec<NodeId>>,
    content: HashMap<RefId, bool>,
}

impl RefTable {
    pub fn new(root: NodeId) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(0, vec![root]);
        Self {
            nodes,
            content: HashMap::new(),
        }
    }

    /// Resolve a slot. Unbound IDs resolve to the empty set: every
    /// operation over an empty set is a no-op, by policy.
    pub fn get(&self, id: RefId) -> &[NodeId] {
        self.nodes.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Bind (or rebind) a slot.
    pub fn bind(&mut self, id: RefId, nodes: Vec<NodeId>) {
        self.nodes.insert(id, nodes);
    }

    /// Whether a slot holds content-slot placeholders rather than the
    /// nodes themselves.
    pub fn is_content(&self, id: RefId) -> bool {
        self.content.get(&id).copied().unwrap_or(false)
    }

    pub fn mark_content(&mut self, id: RefId) {
        self.content.insert(id, true);
    }

    /// Propagate the content flag from one slot to another (clone inherits).
    pub fn inherit_content(&mut self, from: RefId, to: RefId) {
        if self.is_content(from) {
            self.content.insert(to, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_prebound() {
        let root = NodeId::NONE; // identity is irrelevant here
        let refs = RefTable::new(root);
        assert_eq!(refs.get(0), &[root]);
    }

    #[test]
    fn test_unbound_id_is_empty_set() {
        let refs = RefTable::new(NodeId::NONE);
        assert!(refs.get(42).is_empty());
        assert!(!refs.is_content(42));
    }

    #[test]
    fn test_rebind_replaces() {
        let mut refs = RefTable::new(NodeId::NONE);
        refs.bind(1, vec![NodeId::NONE]);
        refs.bind(1, vec![]);
        assert!(refs.get(1).is_empty());
    }

    #[test]
    fn test_content_flag_inheritance() {
        let mut refs = RefTable::new(NodeId::NONE);
        refs.mark_content(1);
        refs.inherit_content(1, 2);
        refs.inherit_content(3, 4);
        assert!(refs.is_content(2));
        assert!(!refs.is_content(4));
    }
}
