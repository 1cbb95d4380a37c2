//! Markup parsing
//!
//! Uses html5ever's built-in RcDom and converts into our arena. This is
//! simpler and more reliable than implementing TreeSink directly.
//!
//! Fragments ride the same pipeline: html5ever wraps loose markup in
//! html/head/body, so a fragment parse is a document parse whose body
//! children are re-homed under a detached grouping node.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

use crate::{DomTree, NodeId};

/// Markup-to-arena parser.
pub struct MarkupParser;

impl MarkupParser {
    /// Parse a complete document into a fresh tree. Returns the tree and
    /// its document root.
    pub fn parse_document(html: &str) -> (DomTree, NodeId) {
        let mut tree = DomTree::new();
        let root = tree.create_document();
        let dom = Self::parse_rcdom(html);
        convert_children(&dom.document, &mut tree, root);
        tracing::debug!(nodes = tree.len(), "parsed document");
        (tree, root)
    }

    /// Parse markup into a detached grouping node inside an existing tree
    /// (the "parse markup string into a detached node list" factory).
    pub fn parse_into(tree: &mut DomTree, html: &str) -> NodeId {
        let fragment = tree.create_fragment();
        // Force body context so head-eligible content (scripts, styles)
        // stays with the fragment instead of drifting into <head>.
        let dom = Self::parse_rcdom(&format!("<body>{html}"));
        if let Some(body) = find_body(&dom.document) {
            convert_children(&body, tree, fragment);
        }
        tracing::trace!(nodes = tree.len(), "parsed fragment");
        fragment
    }

    fn parse_rcdom(html: &str) -> RcDom {
        parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut html.as_bytes())
            .expect("HTML parsing should not fail")
    }
}

fn find_body(document: &Handle) -> Option<Handle> {
    let html = find_element(document, "html")?;
    find_element(&html, "body")
}

fn find_element(handle: &Handle, tag: &str) -> Option<Handle> {
    handle
        .children
        .borrow()
        .iter()
        .find(|child| match &child.data {
            RcNodeData::Element { name, .. } => name.local.as_ref() == tag,
            _ => false,
        })
        .cloned()
}

fn convert_children(handle: &Handle, tree: &mut DomTree, parent: NodeId) {
    for child in handle.children.borrow().iter() {
        convert_node(child, tree, parent);
    }
}

fn convert_node(handle: &Handle, tree: &mut DomTree, parent: NodeId) {
    match &handle.data {
        RcNodeData::Document => convert_children(handle, tree, parent),
        RcNodeData::Doctype { .. } | RcNodeData::ProcessingInstruction { .. } => {}
        RcNodeData::Text { contents } => {
            let text = contents.borrow().to_string();
            if !text.trim().is_empty() {
                let id = tree.create_text(&text);
                let _ = tree.append_child(parent, id);
            }
        }
        RcNodeData::Comment { contents } => {
            let id = tree.create_comment(&contents.to_string());
            let _ = tree.append_child(parent, id);
        }
        RcNodeData::Element {
            name,
            attrs,
            template_contents,
            ..
        } => {
            // Parser-inserted scripts stay inert.
            let id = tree.alloc_element_parsed(name.local.as_ref());
            for attr in attrs.borrow().iter() {
                tree.set_attr(id, attr.name.local.as_ref(), &attr.value);
            }
            let _ = tree.append_child(parent, id);

            if let Some(contents) = template_contents.borrow().as_ref() {
                let slot = tree.container_of(id);
                convert_children(contents, tree, slot);
            } else {
                convert_children(handle, tree, id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document_builds_structure() {
        let (tree, root) = MarkupParser::parse_document(
            "<html><body><div id=\"a\"><p>Hello</p></div></body></html>",
        );
        assert!(tree.len() > 3);
        let html = tree.first_element_child(root).unwrap();
        assert_eq!(tree.tag_name(html), Some("html"));
        assert!(tree.is_connected(html));
    }

    #[test]
    fn test_parse_into_yields_detached_fragment() {
        let (mut tree, root) = MarkupParser::parse_document("<body></body>");
        let frag = MarkupParser::parse_into(&mut tree, "<span>a</span><span>b</span>");
        assert!(tree.parent_of(frag).is_none());
        assert!(!tree.is_connected(frag));
        let kids: Vec<NodeId> = tree.children(frag).collect();
        assert_eq!(kids.len(), 2);
        assert_eq!(tree.tag_name(kids[0]), Some("span"));
        let _ = root;
    }

    #[test]
    fn test_parsed_scripts_are_inert() {
        let (mut tree, _) = MarkupParser::parse_document("<body></body>");
        let frag = MarkupParser::parse_into(&mut tree, "<script>boom()</script>");
        let script = tree.children(frag).next().unwrap();
        assert_eq!(tree.tag_name(script), Some("script"));
        let state = tree.get(script).unwrap().as_element().unwrap().script.unwrap();
        assert!(!state.runnable);
        assert_eq!(tree.text_content(script), "boom()");
    }

    #[test]
    fn test_template_content_parses_into_slot() {
        let (mut tree, _) = MarkupParser::parse_document("<body></body>");
        let frag = MarkupParser::parse_into(&mut tree, "<template><li>x</li></template>");
        let template = tree.children(frag).next().unwrap();
        assert_eq!(tree.tag_name(template), Some("template"));
        assert_eq!(tree.children(template).count(), 0);
        let slot = tree.container_of(template);
        let li = tree.first_element_child(slot).unwrap();
        assert_eq!(tree.tag_name(li), Some("li"));
    }

    #[test]
    fn test_attributes_carry_over() {
        let (mut tree, _) = MarkupParser::parse_document("<body></body>");
        let frag = MarkupParser::parse_into(&mut tree, r#"<a href="/x" class="btn">go</a>"#);
        let a = tree.children(frag).next().unwrap();
        assert_eq!(tree.attr(a, "href"), Some("/x"));
        assert_eq!(tree.attr(a, "class"), Some("btn"));
    }
}
