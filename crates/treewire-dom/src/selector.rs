//! Structural queries
//!
//! The CSS selector subset command producers actually use: type/universal
//! selectors, `#id`, `.class`, attribute selectors, compounds, the four
//! combinators, and comma-separated groups. Matching runs right-to-left
//! against a candidate element, the way engines do it.

use crate::{DomTree, NodeId};

/// Selector parse failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid selector {selector:?} at byte {position}")]
pub struct SelectorError {
    pub selector: String,
    pub position: usize,
}

/// A parsed, matchable selector group (`"ul > li.done, p"`).
#[derive(Debug, Clone)]
pub struct SelectorList {
    groups: Vec<ComplexSelector>,
}

#[derive(Debug, Clone)]
struct ComplexSelector {
    /// Compounds left-to-right; each carries the combinator that links it
    /// to the compound before it (the first one's combinator is unused).
    sequence: Vec<(Combinator, Compound)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    NextSibling,
    SubsequentSibling,
}

#[derive(Debug, Clone, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }
}

#[derive(Debug, Clone)]
struct AttrSelector {
    name: String,
    op: AttrOp,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    /// `[attr]`
    Exists,
    /// `[attr=v]`
    Equals,
    /// `[attr~=v]` whitespace-token match
    Includes,
    /// `[attr|=v]`
    DashMatch,
    /// `[attr^=v]`
    Prefix,
    /// `[attr$=v]`
    Suffix,
    /// `[attr*=v]`
    Substring,
}

impl SelectorList {
    /// Parse a selector group.
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        Parser::new(input).parse_list()
    }

    /// Check whether `node` matches any selector in the group.
    pub fn matches(&self, tree: &DomTree, node: NodeId) -> bool {
        self.groups
            .iter()
            .any(|g| match_sequence(tree, node, &g.sequence))
    }

    /// All matching elements in the subtree of `scope`, in tree order.
    /// The scope itself is never returned; template content is not entered.
    pub fn query_all(&self, tree: &DomTree, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = tree.children(scope).collect();
        stack.reverse();
        while let Some(id) = stack.pop() {
            if tree.is_element(id) && self.matches(tree, id) {
                out.push(id);
            }
            let mut kids: Vec<NodeId> = tree.children(id).collect();
            kids.reverse();
            stack.extend(kids);
        }
        out
    }

    /// First matching element in tree order.
    pub fn query_one(&self, tree: &DomTree, scope: NodeId) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = tree.children(scope).collect();
        stack.reverse();
        while let Some(id) = stack.pop() {
            if tree.is_element(id) && self.matches(tree, id) {
                return Some(id);
            }
            let mut kids: Vec<NodeId> = tree.children(id).collect();
            kids.reverse();
            stack.extend(kids);
        }
        None
    }
}

fn match_sequence(tree: &DomTree, node: NodeId, sequence: &[(Combinator, Compound)]) -> bool {
    let Some(((combinator, compound), rest)) = sequence.split_last() else {
        return true;
    };
    if !compound_matches(tree, node, compound) {
        return false;
    }
    if rest.is_empty() {
        return true;
    }
    match combinator {
        Combinator::Child => tree
            .parent_element(node)
            .is_some_and(|p| match_sequence(tree, p, rest)),
        Combinator::Descendant => {
            let mut cursor = tree.parent_element(node);
            while let Some(p) = cursor {
                if match_sequence(tree, p, rest) {
                    return true;
                }
                cursor = tree.parent_element(p);
            }
            false
        }
        Combinator::NextSibling => tree
            .prev_element_sibling(node)
            .is_some_and(|s| match_sequence(tree, s, rest)),
        Combinator::SubsequentSibling => {
            let mut cursor = tree.prev_element_sibling(node);
            while let Some(s) = cursor {
                if match_sequence(tree, s, rest) {
                    return true;
                }
                cursor = tree.prev_element_sibling(s);
            }
            false
        }
    }
}

fn compound_matches(tree: &DomTree, node: NodeId, compound: &Compound) -> bool {
    let Some(tag) = tree.tag_name(node) else {
        return false;
    };
    if let Some(want) = &compound.tag {
        if want != tag {
            return false;
        }
    }
    if let Some(want) = &compound.id {
        if tree.attr(node, "id") != Some(want.as_str()) {
            return false;
        }
    }
    if !compound.classes.is_empty() {
        let class_attr = tree.attr(node, "class").unwrap_or("");
        for class in &compound.classes {
            if !class_attr.split_whitespace().any(|t| t == class) {
                return false;
            }
        }
    }
    for attr in &compound.attrs {
        let value = tree.attr(node, &attr.name);
        let ok = match (attr.op, value) {
            (AttrOp::Exists, v) => v.is_some(),
            (_, None) => false,
            (AttrOp::Equals, Some(v)) => v == attr.value,
            (AttrOp::Includes, Some(v)) => v.split_whitespace().any(|t| t == attr.value),
            (AttrOp::DashMatch, Some(v)) => {
                v == attr.value || v.starts_with(&format!("{}-", attr.value))
            }
            (AttrOp::Prefix, Some(v)) => !attr.value.is_empty() && v.starts_with(&attr.value),
            (AttrOp::Suffix, Some(v)) => !attr.value.is_empty() && v.ends_with(&attr.value),
            (AttrOp::Substring, Some(v)) => !attr.value.is_empty() && v.contains(&attr.value),
        };
        if !ok {
            return false;
        }
    }
    true
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self) -> SelectorError {
        SelectorError {
            selector: self.input.to_string(),
            position: self.pos,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
        self.pos != start
    }

    fn parse_list(mut self) -> Result<SelectorList, SelectorError> {
        let mut groups = Vec::new();
        loop {
            groups.push(self.parse_complex()?);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                }
                None => break,
                Some(_) => return Err(self.error()),
            }
        }
        Ok(SelectorList { groups })
    }

    fn parse_complex(&mut self) -> Result<ComplexSelector, SelectorError> {
        self.skip_whitespace();
        let mut sequence = vec![(Combinator::Descendant, self.parse_compound()?)];
        loop {
            let had_space = self.skip_whitespace();
            let combinator = match self.peek() {
                Some(b'>') => {
                    self.pos += 1;
                    Combinator::Child
                }
                Some(b'+') => {
                    self.pos += 1;
                    Combinator::NextSibling
                }
                Some(b'~') => {
                    self.pos += 1;
                    Combinator::SubsequentSibling
                }
                Some(b',') | None => break,
                Some(_) if had_space => Combinator::Descendant,
                Some(_) => return Err(self.error()),
            };
            self.skip_whitespace();
            sequence.push((combinator, self.parse_compound()?));
        }
        Ok(ComplexSelector { sequence })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let mut saw_universal = false;
        loop {
            match self.peek() {
                Some(b'*') if compound.is_empty() && !saw_universal => {
                    self.pos += 1;
                    saw_universal = true;
                }
                Some(b'#') => {
                    self.pos += 1;
                    compound.id = Some(self.parse_identifier()?);
                }
                Some(b'.') => {
                    self.pos += 1;
                    compound.classes.push(self.parse_identifier()?);
                }
                Some(b'[') => {
                    self.pos += 1;
                    compound.attrs.push(self.parse_attr()?);
                }
                Some(c) if is_ident_byte(c) && compound.tag.is_none() && compound.is_empty() => {
                    compound.tag = Some(self.parse_identifier()?.to_ascii_lowercase());
                }
                _ => break,
            }
        }
        if compound.is_empty() && !saw_universal {
            return Err(self.error());
        }
        Ok(compound)
    }

    fn parse_identifier(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_byte) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error());
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_attr(&mut self) -> Result<AttrSelector, SelectorError> {
        self.skip_whitespace();
        let name = self.parse_identifier()?;
        self.skip_whitespace();
        let op = match self.peek() {
            Some(b']') => {
                self.pos += 1;
                return Ok(AttrSelector {
                    name,
                    op: AttrOp::Exists,
                    value: String::new(),
                });
            }
            Some(b'=') => {
                self.pos += 1;
                AttrOp::Equals
            }
            Some(b'~') => self.two_byte_op(AttrOp::Includes)?,
            Some(b'|') => self.two_byte_op(AttrOp::DashMatch)?,
            Some(b'^') => self.two_byte_op(AttrOp::Prefix)?,
            Some(b'$') => self.two_byte_op(AttrOp::Suffix)?,
            Some(b'*') => self.two_byte_op(AttrOp::Substring)?,
            _ => return Err(self.error()),
        };
        self.skip_whitespace();
        let value = self.parse_attr_value()?;
        self.skip_whitespace();
        if self.bump() != Some(b']') {
            return Err(self.error());
        }
        Ok(AttrSelector { name, op, value })
    }

    fn two_byte_op(&mut self, op: AttrOp) -> Result<AttrOp, SelectorError> {
        self.pos += 1;
        if self.bump() != Some(b'=') {
            return Err(self.error());
        }
        Ok(op)
    }

    fn parse_attr_value(&mut self) -> Result<String, SelectorError> {
        match self.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                self.pos += 1;
                let start = self.pos;
                while let Some(b) = self.peek() {
                    if b == quote {
                        let value = self.input[start..self.pos].to_string();
                        self.pos += 1;
                        return Ok(value);
                    }
                    self.pos += 1;
                }
                Err(self.error())
            }
            _ => self.parse_identifier(),
        }
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}
