//! Session
//!
//! Owns the shared tree and the once-registry, and is the entry point for
//! applying decoded command streams. One session per scope: the once
//! guarantee and routine lane numbering both live at this level.

use std::cell::RefCell;
use std::rc::Rc;

use treewire_dom::{DomTree, NodeId};
use treewire_proto::{Command, Transaction};

use crate::once::OnceRegistry;
use crate::{interpreter, scheduler};

pub struct Session {
    tree: Rc<RefCell<DomTree>>,
    once: Rc<RefCell<OnceRegistry>>,
}

impl Session {
    pub fn new(tree: DomTree) -> Self {
        Self::from_shared(Rc::new(RefCell::new(tree)))
    }

    /// Build a session over a tree that is also held elsewhere, e.g. by
    /// test code that inspects the document between executions.
    pub fn from_shared(tree: Rc<RefCell<DomTree>>) -> Self {
        Self {
            tree,
            once: Rc::new(RefCell::new(OnceRegistry::new())),
        }
    }

    pub fn tree(&self) -> Rc<RefCell<DomTree>> {
        self.tree.clone()
    }

    /// Apply a full command stream against `root`. Transactions are fanned
    /// out to routine lanes and run concurrently; the future resolves when
    /// every lane has drained.
    pub async fn execute(&self, root: NodeId, commands: Vec<Command>) {
        scheduler::execute(&self.tree, &self.once, root, commands).await;
    }

    /// Apply a single transaction against `root`, outside any routine.
    pub async fn run_transaction(&self, root: NodeId, transaction: Transaction) {
        interpreter::run_transaction(&self.tree, &self.once, root, transaction).await;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}
