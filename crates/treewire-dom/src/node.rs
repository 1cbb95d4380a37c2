//! Tree nodes
//!
//! Sibling-linked node records stored in the arena. `NodeData` carries the
//! per-kind payload; capability checks are pattern matches on it.

use crate::NodeId;

/// A single tree node.
#[derive(Debug)]
pub struct Node {
    /// Parent node (NONE if detached or root)
    pub parent: NodeId,
    /// First child
    pub first_child: NodeId,
    /// Last child (for O(1) append)
    pub last_child: NodeId,
    /// Previous sibling
    pub prev_sibling: NodeId,
    /// Next sibling
    pub next_sibling: NodeId,
    /// Node-specific data
    pub data: NodeData,
}

impl Node {
    pub(crate) fn new(data: NodeData) -> Self {
        Self {
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
            data,
        }
    }

    /// Check if this is an element
    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    /// Get element data if this is an element
    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get mutable element data
    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }
}

/// Node-specific data
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Document root
    Document,
    /// Anonymous grouping node; inserting it splices its children
    Fragment,
    /// Element
    Element(ElementData),
    /// Text content
    Text(String),
    /// Comment
    Comment(String),
}

/// Element payload: tag, attributes, and the optional content slot.
#[derive(Debug, Clone)]
pub struct ElementData {
    /// Lowercase tag name
    pub tag: String,
    /// Attributes in document order
    pub attrs: Vec<Attr>,
    /// Content slot for `<template>` elements: a detached fragment holding
    /// the real children (the element itself stays childless when parsed)
    pub template_content: Option<NodeId>,
    /// Run-state for `<script>` elements, `None` for everything else
    pub script: Option<ScriptState>,
}

impl ElementData {
    /// Create element data; `<script>` starts inert (parser semantics).
    pub fn new(tag: &str) -> Self {
        let tag = tag.to_ascii_lowercase();
        let script = (tag == "script").then(ScriptState::default);
        Self {
            tag,
            attrs: Vec::new(),
            template_content: None,
            script,
        }
    }

    /// Get an attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing any existing value
    pub fn set_attr(&mut self, name: &str, value: &str) {
        if let Some(attr) = self.attrs.iter_mut().find(|a| a.name == name) {
            attr.value = value.to_string();
        } else {
            self.attrs.push(Attr {
                name: name.to_string(),
                value: value.to_string(),
            });
        }
    }

    /// Remove an attribute, returning whether it was present
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|a| a.name != name);
        self.attrs.len() != before
    }
}

/// A named string attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub name: String,
    pub value: String,
}

/// Script run-state.
///
/// Parser-inserted scripts are inert: assigning markup never makes embedded
/// scripts run. Programmatically created scripts are runnable and execute
/// once when they become connected to the document.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptState {
    pub runnable: bool,
    pub executed: bool,
}
