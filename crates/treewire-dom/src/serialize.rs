//! HTML serialization
//!
//! `inner_html`/`outer_html` with proper escaping, void-element and
//! raw-text-element handling. Template elements serialize their content
//! slot between the tags.

use crate::node::NodeData;
use crate::{DomTree, NodeId};

/// Void elements (self-closing, no end tag)
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Raw text elements (no escaping for content)
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Serialize the children of a node.
pub fn inner_html(tree: &DomTree, id: NodeId) -> String {
    let mut out = String::new();
    serialize_children(tree, tree.container_of(id), &mut out, false);
    out
}

/// Serialize a node including itself.
pub fn outer_html(tree: &DomTree, id: NodeId) -> String {
    let mut out = String::new();
    serialize_node(tree, id, &mut out, false);
    out
}

fn serialize_children(tree: &DomTree, id: NodeId, out: &mut String, raw: bool) {
    for child in tree.children(id) {
        serialize_node(tree, child, out, raw);
    }
}

fn serialize_node(tree: &DomTree, id: NodeId, out: &mut String, raw: bool) {
    let Some(node) = tree.get(id) else { return };
    match &node.data {
        NodeData::Document | NodeData::Fragment => serialize_children(tree, id, out, raw),
        NodeData::Text(text) => {
            if raw {
                out.push_str(text);
            } else {
                escape_text(text, out);
            }
        }
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeData::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for attr in &el.attrs {
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                escape_attribute(&attr.value, out);
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&el.tag.as_str()) {
                return;
            }
            let raw_content = RAW_TEXT_ELEMENTS.contains(&el.tag.as_str());
            serialize_children(tree, tree.container_of(id), out, raw_content);
            out.push_str("</");
            out.push_str(&el.tag);
            out.push('>');
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MarkupParser;

    #[test]
    fn test_roundtrip_simple_fragment() {
        let (mut tree, _) = MarkupParser::parse_document("<body></body>");
        let frag = MarkupParser::parse_into(&mut tree, r#"<ul><li class="a">x</li><li>y</li></ul>"#);
        assert_eq!(
            outer_html(&tree, frag),
            r#"<ul><li class="a">x</li><li>y</li></ul>"#
        );
    }

    #[test]
    fn test_escaping() {
        let mut tree = DomTree::new();
        let div = tree.create_element("div");
        tree.set_attr(div, "title", "a\"b<c");
        tree.set_text(div, "1 < 2 & 3");
        assert_eq!(
            outer_html(&tree, div),
            r#"<div title="a&quot;b&lt;c">1 &lt; 2 &amp; 3</div>"#
        );
    }

    #[test]
    fn test_script_content_is_raw() {
        let mut tree = DomTree::new();
        let script = tree.create_element("script");
        tree.set_text(script, "if (a < b) go()");
        assert_eq!(outer_html(&tree, script), "<script>if (a < b) go()</script>");
    }

    #[test]
    fn test_void_elements_have_no_end_tag() {
        let (mut tree, _) = MarkupParser::parse_document("<body></body>");
        let frag = MarkupParser::parse_into(&mut tree, r#"<br><img src="x.png">"#);
        assert_eq!(outer_html(&tree, frag), r#"<br><img src="x.png">"#);
    }

    #[test]
    fn test_template_serializes_content_slot() {
        let (mut tree, _) = MarkupParser::parse_document("<body></body>");
        let frag = MarkupParser::parse_into(&mut tree, "<template><b>t</b></template>");
        assert_eq!(outer_html(&tree, frag), "<template><b>t</b></template>");
    }
}
