//! Event listeners
//!
//! Per-(node, event-name) listener lists with one-shot support. There is no
//! bubbling: the engine only ever listens on explicit target nodes, and
//! tests dispatch on those same nodes.

use std::collections::HashMap;
use std::fmt;

use crate::NodeId;

/// Handle for deregistering a listener.
pub type ListenerId = u64;

struct Listener {
    id: ListenerId,
    once: bool,
    callback: Box<dyn FnMut()>,
}

/// Listener table, owned by the tree.
#[derive(Default)]
pub(crate) struct EventRegistry {
    table: HashMap<(NodeId, String), Vec<Listener>>,
    next_id: ListenerId,
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count: usize = self.table.values().map(Vec::len).sum();
        f.debug_struct("EventRegistry")
            .field("listeners", &count)
            .finish()
    }
}

impl EventRegistry {
    pub(crate) fn add(
        &mut self,
        node: NodeId,
        event: &str,
        once: bool,
        callback: Box<dyn FnMut()>,
    ) -> ListenerId {
        self.next_id += 1;
        let id = self.next_id;
        self.table
            .entry((node, event.to_string()))
            .or_default()
            .push(Listener { id, once, callback });
        id
    }

    pub(crate) fn remove(&mut self, node: NodeId, event: &str, listener: ListenerId) {
        if let Some(list) = self.table.get_mut(&(node, event.to_string())) {
            list.retain(|l| l.id != listener);
        }
    }

    /// Run all listeners registered for (node, event); one-shot listeners
    /// are deregistered before their callback runs.
    pub(crate) fn dispatch(&mut self, node: NodeId, event: &str) -> usize {
        let key = (node, event.to_string());
        let Some(mut list) = self.table.remove(&key) else {
            return 0;
        };
        let fired = list.len();
        let mut keep = Vec::new();
        for mut listener in list.drain(..) {
            (listener.callback)();
            if !listener.once {
                keep.push(listener);
            }
        }
        if !keep.is_empty() {
            self.table.insert(key, keep);
        }
        fired
    }
}
