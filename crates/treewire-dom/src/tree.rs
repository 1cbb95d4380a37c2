//! Arena tree and structural operations
//!
//! appendChild/insertBefore/replaceChild/detach with live-DOM semantics:
//! inserting a node that already has a parent moves it, inserting a fragment
//! splices its children, and runnable scripts execute when they become
//! connected to the document.

use std::fmt;

use crate::events::{EventRegistry, ListenerId};
use crate::node::{ElementData, Node, NodeData};
use crate::NodeId;

/// Result type for structural operations
pub type DomResult<T> = Result<T, DomError>;

/// Structural operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("node not found")]
    NotFound,
    #[error("hierarchy request error")]
    HierarchyRequest,
    #[error("node cannot contain children")]
    InvalidNodeType,
    #[error("anchor is not a child of the parent")]
    NotAChild,
}

/// Arena-based tree.
#[derive(Default)]
pub struct DomTree {
    nodes: Vec<Node>,
    events: EventRegistry,
    script_log: Vec<NodeId>,
}

impl fmt::Debug for DomTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomTree")
            .field("nodes", &self.nodes.len())
            .field("scripts_run", &self.script_log.len())
            .finish()
    }
}

impl DomTree {
    /// Create a new empty tree
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(data));
        id
    }

    /// Create a detached document root
    pub fn create_document(&mut self) -> NodeId {
        self.alloc(NodeData::Document)
    }

    /// Create a detached grouping node
    pub fn create_fragment(&mut self) -> NodeId {
        self.alloc(NodeData::Fragment)
    }

    /// Create a detached element. Scripts created this way are runnable;
    /// `<template>` elements get an empty content fragment.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let id = self.alloc_element_parsed(tag);
        if let Some(state) = self.nodes[id.0 as usize]
            .as_element_mut()
            .and_then(|e| e.script.as_mut())
        {
            state.runnable = true;
        }
        id
    }

    /// Element factory used by the markup parser: scripts stay inert.
    pub(crate) fn alloc_element_parsed(&mut self, tag: &str) -> NodeId {
        let id = self.alloc(NodeData::Element(ElementData::new(tag)));
        if self.tag_name(id) == Some("template") {
            let content = self.create_fragment();
            if let Some(el) = self.nodes[id.0 as usize].as_element_mut() {
                el.template_content = Some(content);
            }
        }
        id
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Text(text.to_string()))
    }

    /// Create a detached comment node
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Comment(text.to_string()))
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    /// Number of nodes ever allocated in this arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ---- navigation ----

    /// Raw structural parent (element, fragment, or document)
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).map(|n| n.parent).filter(NodeId::is_valid)
    }

    /// Parent, only when it is an element (`parentElement` semantics:
    /// children of fragments and of the document have no parent element)
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent_of(id)
            .filter(|p| self.get(*p).is_some_and(Node::is_element))
    }

    /// Child nodes in order
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(
            self.get(id).map(|n| n.first_child).filter(NodeId::is_valid),
            move |c| self.get(*c).map(|n| n.next_sibling).filter(NodeId::is_valid),
        )
    }

    /// First child that is an element
    pub fn first_element_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id)
            .find(|c| self.get(*c).is_some_and(Node::is_element))
    }

    /// Last child that is an element
    pub fn last_element_child(&self, id: NodeId) -> Option<NodeId> {
        let mut cursor = self.get(id).map(|n| n.last_child).filter(NodeId::is_valid);
        while let Some(c) = cursor {
            if self.get(c).is_some_and(Node::is_element) {
                return Some(c);
            }
            cursor = self.get(c).map(|n| n.prev_sibling).filter(NodeId::is_valid);
        }
        None
    }

    /// Next sibling that is an element. Only child-capable node kinds
    /// (elements, text, comments) support sibling navigation.
    pub fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.element_sibling(id, |n| n.next_sibling)
    }

    /// Previous sibling that is an element
    pub fn prev_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.element_sibling(id, |n| n.prev_sibling)
    }

    fn element_sibling(&self, id: NodeId, step: fn(&Node) -> NodeId) -> Option<NodeId> {
        let node = self.get(id)?;
        if matches!(node.data, NodeData::Document | NodeData::Fragment) {
            return None;
        }
        let mut cursor = Some(step(node)).filter(NodeId::is_valid);
        while let Some(c) = cursor {
            let n = self.get(c)?;
            if n.is_element() {
                return Some(c);
            }
            cursor = Some(step(n)).filter(NodeId::is_valid);
        }
        None
    }

    /// Lowercase tag name, if `id` is an element
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.get(id)?.as_element().map(|e| e.tag.as_str())
    }

    /// Check if `id` is an element
    pub fn is_element(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(Node::is_element)
    }

    /// Walk up to the root; connected means the root is the document
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut cursor = id;
        loop {
            let Some(node) = self.get(cursor) else {
                return false;
            };
            if !node.parent.is_valid() {
                return matches!(node.data, NodeData::Document);
            }
            cursor = node.parent;
        }
    }

    fn is_ancestor(&self, ancestor: NodeId, mut of: NodeId) -> bool {
        while let Some(p) = self.parent_of(of) {
            if p == ancestor {
                return true;
            }
            of = p;
        }
        false
    }

    // ---- container capability ----

    /// Resolve the node whose children are the "real" content: a template
    /// element resolves to its content fragment, everything else to itself.
    pub fn container_of(&self, id: NodeId) -> NodeId {
        self.get(id)
            .and_then(Node::as_element)
            .and_then(|e| e.template_content)
            .unwrap_or(id)
    }

    /// Unwrap a node to its content: a template yields its content fragment;
    /// any other node yields a fresh fragment its children are moved into.
    pub fn extract_content(&mut self, id: NodeId) -> NodeId {
        if let Some(content) = self.get(id).and_then(Node::as_element).and_then(|e| e.template_content) {
            return content;
        }
        let fragment = self.create_fragment();
        let kids: Vec<NodeId> = self.children(id).collect();
        for kid in kids {
            let _ = self.insert_before(fragment, kid, None);
        }
        fragment
    }

    // ---- mutation ----

    /// Append `child` at the end of `parent`'s children. Moves the child if
    /// it is attached elsewhere; splices fragments.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `anchor` (append when `anchor` is `None`).
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        anchor: Option<NodeId>,
    ) -> DomResult<()> {
        let parent_node = self.get(parent).ok_or(DomError::NotFound)?;
        if !matches!(
            parent_node.data,
            NodeData::Document | NodeData::Fragment | NodeData::Element(_)
        ) {
            return Err(DomError::InvalidNodeType);
        }
        let child_node = self.get(child).ok_or(DomError::NotFound)?;
        if let Some(a) = anchor {
            if self.parent_of(a) != Some(parent) {
                return Err(DomError::NotAChild);
            }
        }

        if matches!(child_node.data, NodeData::Fragment) {
            let kids: Vec<NodeId> = self.children(child).collect();
            for kid in kids {
                self.insert_before(parent, kid, anchor)?;
            }
            return Ok(());
        }

        if child == parent || self.is_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest);
        }
        if anchor == Some(child) {
            return Ok(());
        }

        self.detach(child);
        match anchor {
            Some(a) => {
                let prev = self.nodes[a.0 as usize].prev_sibling;
                self.node_mut(child).prev_sibling = prev;
                self.node_mut(child).next_sibling = a;
                self.node_mut(a).prev_sibling = child;
                if prev.is_valid() {
                    self.node_mut(prev).next_sibling = child;
                } else {
                    self.node_mut(parent).first_child = child;
                }
            }
            None => {
                let last = self.nodes[parent.0 as usize].last_child;
                self.node_mut(child).prev_sibling = last;
                if last.is_valid() {
                    self.node_mut(last).next_sibling = child;
                } else {
                    self.node_mut(parent).first_child = child;
                }
                self.node_mut(parent).last_child = child;
            }
        }
        self.node_mut(child).parent = parent;

        if self.is_connected(parent) {
            self.activate_scripts(child);
        }
        Ok(())
    }

    /// Replace `old` with `new` under `parent`.
    pub fn replace_child(&mut self, parent: NodeId, new: NodeId, old: NodeId) -> DomResult<()> {
        if new == old {
            return Ok(());
        }
        self.insert_before(parent, new, Some(old))?;
        self.detach(old);
        Ok(())
    }

    /// Unlink a node from its parent. No-op when already detached.
    pub fn detach(&mut self, id: NodeId) {
        let Some(node) = self.get(id) else { return };
        let (parent, prev, next) = (node.parent, node.prev_sibling, node.next_sibling);
        if !parent.is_valid() {
            return;
        }
        if prev.is_valid() {
            self.node_mut(prev).next_sibling = next;
        } else {
            self.node_mut(parent).first_child = next;
        }
        if next.is_valid() {
            self.node_mut(next).prev_sibling = prev;
        } else {
            self.node_mut(parent).last_child = prev;
        }
        let node = self.node_mut(id);
        node.parent = NodeId::NONE;
        node.prev_sibling = NodeId::NONE;
        node.next_sibling = NodeId::NONE;
    }

    /// Detach all children of `id`.
    pub fn clear_children(&mut self, id: NodeId) {
        let kids: Vec<NodeId> = self.children(id).collect();
        for kid in kids {
            self.detach(kid);
        }
    }

    /// Deep-clone a subtree (template content included), returning the
    /// detached clone root. Script run-state is copied verbatim, so a clone
    /// of an already-run or inert script does not run again.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let data = match self.get(id).map(|n| n.data.clone()) {
            Some(NodeData::Element(mut el)) => {
                el.template_content = el.template_content.map(|c| self.clone_subtree(c));
                NodeData::Element(el)
            }
            Some(other) => other,
            None => NodeData::Fragment,
        };
        let clone = self.alloc(data);
        let kids: Vec<NodeId> = self.children(id).collect();
        for kid in kids {
            let kid_clone = self.clone_subtree(kid);
            let _ = self.insert_before(clone, kid_clone, None);
        }
        clone
    }

    // ---- payloads ----

    /// Set the text payload: replaces children of elements and fragments
    /// with a single text node, rewrites text/comment data, and is a no-op
    /// on documents.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        let rebuild = match self.get(id).map(|n| &n.data) {
            Some(NodeData::Element(_) | NodeData::Fragment) => true,
            Some(NodeData::Text(_) | NodeData::Comment(_)) => false,
            Some(NodeData::Document) | None => return,
        };
        if rebuild {
            self.clear_children(id);
            if !text.is_empty() {
                let t = self.create_text(text);
                let _ = self.insert_before(id, t, None);
            }
        } else if let Some(node) = self.get_mut(id) {
            if let NodeData::Text(s) | NodeData::Comment(s) = &mut node.data {
                *s = text.to_string();
            }
        }
    }

    /// Concatenated text of the subtree (template content excluded)
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.get(id).map(|n| &n.data) {
            Some(NodeData::Text(s)) => out.push_str(s),
            Some(_) => {
                for kid in self.children(id).collect::<Vec<_>>() {
                    self.collect_text(kid, out);
                }
            }
            None => {}
        }
    }

    /// Get an attribute value (elements only)
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.get(id)?.as_element()?.attr(name)
    }

    /// Set an attribute; returns false for nodes without attribute support
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        match self.get_mut(id).and_then(Node::as_element_mut) {
            Some(el) => {
                el.set_attr(name, value);
                true
            }
            None => false,
        }
    }

    /// Remove an attribute; returns false for nodes without attribute support
    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> bool {
        match self.get_mut(id).and_then(Node::as_element_mut) {
            Some(el) => el.remove_attr(name),
            None => false,
        }
    }

    // ---- scripts ----

    fn activate_scripts(&mut self, root: NodeId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(state) = self
                .get_mut(id)
                .and_then(Node::as_element_mut)
                .and_then(|e| e.script.as_mut())
            {
                if state.runnable && !state.executed {
                    state.executed = true;
                    self.script_log.push(id);
                    tracing::debug!(?id, "script executed");
                }
            }
            // template content stays inert: do not descend into it
            stack.extend(self.children(id));
        }
    }

    /// Scripts that have executed, in execution order
    pub fn executed_scripts(&self) -> &[NodeId] {
        &self.script_log
    }

    // ---- events ----

    /// Register a listener; `once` listeners deregister when fired
    pub fn add_listener(
        &mut self,
        node: NodeId,
        event: &str,
        once: bool,
        callback: Box<dyn FnMut()>,
    ) -> ListenerId {
        self.events.add(node, event, once, callback)
    }

    /// Remove a listener; no-op when it already fired or was removed
    pub fn remove_listener(&mut self, node: NodeId, event: &str, listener: ListenerId) {
        self.events.remove(node, event, listener);
    }

    /// Fire an event at a node, returning how many listeners ran
    pub fn dispatch(&mut self, node: NodeId, event: &str) -> usize {
        self.events.dispatch(node, event)
    }
}
