//! treewire DOM - the node collaborator
//!
//! Memory-efficient arena tree with the capability surface the command
//! engine needs: container content slots (`<template>`), parent/sibling
//! navigation, attributes, text and markup payloads, deep clone, detach,
//! and one-shot event listeners.
//!
//! Nodes are `NodeId` indices into a `Vec` arena; detached subtrees live in
//! the same arena as the document they will eventually be inserted into.

mod events;
mod node;
mod parser;
mod selector;
mod serialize;
mod tree;

pub use events::ListenerId;
pub use node::{Attr, ElementData, Node, NodeData, ScriptState};
pub use parser::MarkupParser;
pub use selector::{SelectorError, SelectorList};
pub use serialize::{inner_html, outer_html};
pub use tree::{DomError, DomResult, DomTree};

/// Node identifier (index into the arena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Sentinel for "no node" (absent parent, empty query slot, ...).
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Check that this is a real node reference, not the sentinel.
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::NONE
    }
}
