//! Transaction interpreter
//!
//! Executes one transaction's sub-commands against a root node, maintaining
//! the per-transaction reference table. Execution is best-effort throughout:
//! unresolvable references act as empty sets, nodes lacking a capability are
//! skipped, and unrecognized sub-command shapes are ignored. The only
//! suspension point is the `wait` sub-command.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use smol::Timer;
use treewire_dom::{DomTree, MarkupParser, NodeData, NodeId, SelectorList};
use treewire_proto::{RefId, SubCommand, Transaction};

use crate::once::OnceRegistry;
use crate::refs::RefTable;

pub(crate) async fn run_transaction(
    tree: &Rc<RefCell<DomTree>>,
    registry: &Rc<RefCell<OnceRegistry>>,
    root: NodeId,
    transaction: Transaction,
) {
    if transaction.once && !registry.borrow_mut().mark(&transaction.hash) {
        tracing::debug!(hash = %transaction.hash, "transaction already applied, skipping");
        return;
    }
    let mut refs = RefTable::new(root);
    for step in transaction.tx {
        match step {
            SubCommand::Wait {
                target,
                wait,
                timeout,
            } => wait_for(tree, &refs, target, &wait, timeout).await,
            other => apply(&mut tree.borrow_mut(), &mut refs, other),
        }
    }
}

/// Execute one non-suspending sub-command.
fn apply(tree: &mut DomTree, refs: &mut RefTable, step: SubCommand) {
    match step {
        SubCommand::QueryOne {
            selector,
            id,
            parent,
        } => {
            let parents = refs.get(parent.unwrap_or(0)).to_vec();
            let list = parse_selector(&selector);
            // One slot per parent, in parent order; misses stay as
            // placeholders so multiplicity is preserved downstream.
            let mut result = Vec::with_capacity(parents.len());
            for p in parents {
                let found = list.as_ref().and_then(|l| {
                    live(tree, p).and_then(|p| l.query_one(tree, tree.container_of(p)))
                });
                result.push(found.unwrap_or(NodeId::NONE));
            }
            refs.bind(id, result);
        }

        SubCommand::QueryAll {
            selector_all,
            id,
            parent,
        } => {
            let parents = refs.get(parent.unwrap_or(0)).to_vec();
            let list = parse_selector(&selector_all);
            let mut result = Vec::new();
            if let Some(list) = list {
                for p in parents {
                    if let Some(p) = live(tree, p) {
                        result.extend(list.query_all(tree, tree.container_of(p)));
                    }
                }
            }
            refs.bind(id, result);
        }

        SubCommand::Fragment { fragment, id } => {
            let group = MarkupParser::parse_into(tree, &fragment);
            refs.bind(id, vec![group]);
        }

        SubCommand::Content { content, id } => {
            let set = refs.get(content).to_vec();
            refs.bind(id, set);
            refs.mark_content(id);
        }

        SubCommand::Parent { target, parent } => {
            // A content-flagged target aliases 1:1 onto the new slot; the
            // flag itself does not travel.
            if refs.is_content(target) {
                let set = refs.get(target).to_vec();
                refs.bind(parent, set);
            } else {
                let set = refs.get(target).to_vec();
                let result = set
                    .into_iter()
                    .filter_map(|n| tree.parent_element(n))
                    .collect();
                refs.bind(parent, result);
            }
        }

        SubCommand::FirstChild { target, first_child } => {
            let result = navigate(tree, refs, target, |tree, n| {
                tree.first_element_child(tree.container_of(n))
            });
            refs.bind(first_child, result);
        }

        SubCommand::LastChild { target, last_child } => {
            let result = navigate(tree, refs, target, |tree, n| {
                tree.last_element_child(tree.container_of(n))
            });
            refs.bind(last_child, result);
        }

        SubCommand::NextSibling {
            target,
            next_sibling,
        } => {
            let result = navigate(tree, refs, target, DomTree::next_element_sibling);
            refs.bind(next_sibling, result);
        }

        SubCommand::PrevSibling {
            target,
            prev_sibling,
        } => {
            let result = navigate(tree, refs, target, DomTree::prev_element_sibling);
            refs.bind(prev_sibling, result);
        }

        SubCommand::Text { target, text } => {
            for n in refs.get(target).to_vec() {
                tree.set_text(n, &text);
            }
        }

        SubCommand::Html { target, html } => {
            for n in refs.get(target).to_vec() {
                let settable = matches!(
                    tree.get(n).map(|node| &node.data),
                    Some(NodeData::Element(_) | NodeData::Fragment)
                );
                if settable {
                    let container = tree.container_of(n);
                    tree.clear_children(container);
                    let parsed = MarkupParser::parse_into(tree, &html);
                    if let Err(error) = tree.append_child(container, parsed) {
                        tracing::debug!(%error, "skipping markup assignment");
                    }
                    // Assigning markup never runs embedded scripts; replace
                    // them with fresh equivalents so they execute.
                    mend_scripts(tree, n);
                }
            }
        }

        SubCommand::Attr {
            target,
            attr,
            value,
        } => {
            for n in refs.get(target).to_vec() {
                tree.set_attr(n, &attr, &value);
            }
        }

        SubCommand::RemoveAttr {
            target,
            remove_attr,
        } => {
            for n in refs.get(target).to_vec() {
                tree.remove_attr(n, &remove_attr);
            }
        }

        SubCommand::AddToAttr {
            target,
            add_to_attr,
            value,
        } => {
            for n in refs.get(target).to_vec() {
                if !tree.is_element(n) {
                    continue;
                }
                let joined = {
                    let current = tree.attr(n, &add_to_attr).unwrap_or("");
                    let mut tokens: Vec<&str> = current.split_whitespace().collect();
                    if !tokens.contains(&value.as_str()) {
                        tokens.push(&value);
                    }
                    tokens.join(" ")
                };
                tree.set_attr(n, &add_to_attr, &joined);
            }
        }

        SubCommand::RemoveFromAttr {
            target,
            remove_from_attr,
            value,
        } => {
            for n in refs.get(target).to_vec() {
                if !tree.is_element(n) {
                    continue;
                }
                let joined = tree
                    .attr(n, &remove_from_attr)
                    .unwrap_or("")
                    .split_whitespace()
                    .filter(|t| *t != value)
                    .collect::<Vec<_>>()
                    .join(" ");
                tree.set_attr(n, &remove_from_attr, &joined);
            }
        }

        SubCommand::Clone { clone, id } => {
            let set = refs.get(clone).to_vec();
            let mut result = Vec::with_capacity(set.len());
            for n in set {
                result.push(match live(tree, n) {
                    Some(n) => tree.clone_subtree(n),
                    None => NodeId::NONE,
                });
            }
            refs.bind(id, result);
            refs.inherit_content(clone, id);
        }

        SubCommand::Remove { remove } => {
            for n in refs.get(remove).to_vec() {
                if tree.parent_element(n).is_some() {
                    tree.detach(n);
                }
            }
        }

        SubCommand::InsertNodeBefore {
            insert_node_before,
            parent,
            reference,
        } => insert_nodes(tree, refs, insert_node_before, parent, Some(reference)),

        SubCommand::AppendNode { append_node, parent } => {
            insert_nodes(tree, refs, append_node, parent, None);
        }

        SubCommand::InsertBefore {
            insert_before,
            parent,
            reference,
        } => insert_markup(tree, refs, &insert_before, parent, Some(reference)),

        SubCommand::Append { append, parent } => {
            insert_markup(tree, refs, &append, parent, None);
        }

        SubCommand::Wait { .. } => unreachable!("wait is handled by the caller"),

        SubCommand::Unknown(value) => {
            tracing::trace!(%value, "ignoring unrecognized sub-command");
        }
    }
}

/// Filter out placeholders and stale references.
fn live(tree: &DomTree, id: NodeId) -> Option<NodeId> {
    tree.get(id).map(|_| id)
}

fn parse_selector(selector: &str) -> Option<SelectorList> {
    match SelectorList::parse(selector) {
        Ok(list) => Some(list),
        Err(error) => {
            tracing::debug!(%error, "unparsable selector yields no matches");
            None
        }
    }
}

fn navigate(
    tree: &DomTree,
    refs: &RefTable,
    target: RefId,
    step: impl Fn(&DomTree, NodeId) -> Option<NodeId>,
) -> Vec<NodeId> {
    refs.get(target)
        .iter()
        .filter_map(|n| step(tree, *n))
        .collect()
}

/// Insert the node set bound at `source` into every parent, before the
/// matching `reference` entry when given, appending otherwise.
///
/// Fan-out rule: with more than one parent every inserted node is
/// deep-cloned per parent so the originals never move; with a single parent
/// the originals are moved. Content-flagged sources unwrap to their content
/// before insertion.
fn insert_nodes(
    tree: &mut DomTree,
    refs: &RefTable,
    source: RefId,
    parent: RefId,
    reference: Option<RefId>,
) {
    let parents = refs.get(parent).to_vec();
    let anchors = reference.map(|r| refs.get(r).to_vec());
    let sources = refs.get(source).to_vec();
    let fan_out = parents.len() > 1;
    let content = refs.is_content(source);

    for p in parents {
        if live(tree, p).is_none() {
            continue;
        }
        let anchor = match &anchors {
            Some(candidates) => {
                match candidates
                    .iter()
                    .copied()
                    .find(|r| tree.parent_element(*r) == Some(p))
                {
                    Some(a) => Some(a),
                    // No reference entry under this parent: skip it.
                    None => continue,
                }
            }
            None => None,
        };
        let container = tree.container_of(p);
        for n in &sources {
            let Some(mut node) = live(tree, *n) else {
                continue;
            };
            if fan_out {
                node = tree.clone_subtree(node);
            }
            if content {
                node = tree.extract_content(node);
            }
            if let Err(error) = tree.insert_before(container, node, anchor) {
                tracing::debug!(%error, "skipping node insertion");
            }
        }
    }
}

/// Insert freshly parsed markup into every parent. The markup is parsed
/// once; fan-out parents receive deep clones. Scripts are re-instantiated
/// per inserted copy.
fn insert_markup(
    tree: &mut DomTree,
    refs: &RefTable,
    markup: &str,
    parent: RefId,
    reference: Option<RefId>,
) {
    let parents = refs.get(parent).to_vec();
    let anchors = reference.map(|r| refs.get(r).to_vec());
    let fragment = MarkupParser::parse_into(tree, markup);
    let fan_out = parents.len() > 1;

    for p in parents {
        if live(tree, p).is_none() {
            continue;
        }
        let anchor = match &anchors {
            Some(candidates) => {
                match candidates
                    .iter()
                    .copied()
                    .find(|r| tree.parent_element(*r) == Some(p))
                {
                    Some(a) => Some(a),
                    None => continue,
                }
            }
            None => None,
        };
        let copy = if fan_out {
            tree.clone_subtree(fragment)
        } else {
            fragment
        };
        mend_scripts(tree, copy);
        let container = tree.container_of(p);
        if let Err(error) = tree.insert_before(container, copy, anchor) {
            tracing::debug!(%error, "skipping markup insertion");
        }
    }
}

/// Replace every script under `scope`'s container with a freshly created
/// equivalent (same attributes, same text). Parser-inserted scripts are
/// inert; the replacements are runnable and execute on connection.
fn mend_scripts(tree: &mut DomTree, scope: NodeId) {
    let Ok(selector) = SelectorList::parse("script") else {
        return;
    };
    let container = tree.container_of(scope);
    for script in selector.query_all(tree, container) {
        let attrs: Vec<(String, String)> = tree
            .get(script)
            .and_then(|n| n.as_element())
            .map(|el| {
                el.attrs
                    .iter()
                    .map(|a| (a.name.clone(), a.value.clone()))
                    .collect()
            })
            .unwrap_or_default();
        let text = tree.text_content(script);

        let fresh = tree.create_element("script");
        for (name, value) in attrs {
            tree.set_attr(fresh, &name, &value);
        }
        tree.set_text(fresh, &text);

        if let Some(parent) = tree.parent_of(script) {
            if let Err(error) = tree.replace_child(parent, fresh, script) {
                tracing::debug!(%error, "skipping script replacement");
            }
        }
    }
}

async fn wait_for(
    tree: &Rc<RefCell<DomTree>>,
    refs: &RefTable,
    target: RefId,
    event: &str,
    timeout: Option<u64>,
) {
    let mut registered = Vec::new();
    let targets: Vec<NodeId>;
    let receiver;
    {
        let mut t = tree.borrow_mut();
        targets = refs
            .get(target)
            .iter()
            .copied()
            .filter(|n| t.get(*n).is_some())
            .collect();
        let (sender, r) = smol::channel::unbounded::<()>();
        receiver = r;
        for node in &targets {
            let s = sender.clone();
            let id = t.add_listener(
                *node,
                event,
                true,
                Box::new(move || {
                    let _ = s.try_send(());
                }),
            );
            registered.push((*node, id));
        }
    }

    let all_fired = async {
        let mut remaining = targets.len();
        while remaining > 0 {
            if receiver.recv().await.is_err() {
                break;
            }
            remaining -= 1;
        }
    };
    match timeout {
        Some(ms) => {
            let expired = async {
                Timer::after(Duration::from_millis(ms)).await;
                tracing::trace!(event, ms, "wait timed out");
            };
            smol::future::or(all_fired, expired).await;
        }
        None => all_fired.await,
    }

    // Settled either way: deregister whatever has not fired so no listener
    // outlives the wait.
    let mut t = tree.borrow_mut();
    for (node, id) in registered {
        t.remove_listener(node, event, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (DomTree, NodeId) {
        MarkupParser::parse_document(
            "<div id=\"a\"><span>1</span></div><div id=\"b\"></div><div id=\"c\"><span>2</span></div>",
        )
    }

    #[test]
    fn test_query_one_keeps_one_slot_per_parent() {
        let (mut tree, root) = fixture();
        let mut refs = RefTable::new(root);
        apply(
            &mut tree,
            &mut refs,
            SubCommand::QueryAll {
                selector_all: "div".into(),
                id: 1,
                parent: None,
            },
        );
        assert_eq!(refs.get(1).len(), 3);
        apply(
            &mut tree,
            &mut refs,
            SubCommand::QueryOne {
                selector: "span".into(),
                id: 2,
                parent: Some(1),
            },
        );
        let slots = refs.get(2);
        assert_eq!(slots.len(), 3);
        assert!(slots[0].is_valid());
        assert!(!slots[1].is_valid());
        assert!(slots[2].is_valid());
    }

    #[test]
    fn test_placeholder_slots_are_skipped_by_mutations() {
        let (mut tree, root) = fixture();
        let mut refs = RefTable::new(root);
        apply(
            &mut tree,
            &mut refs,
            SubCommand::QueryAll {
                selector_all: "div".into(),
                id: 1,
                parent: None,
            },
        );
        apply(
            &mut tree,
            &mut refs,
            SubCommand::QueryOne {
                selector: "span".into(),
                id: 2,
                parent: Some(1),
            },
        );
        apply(
            &mut tree,
            &mut refs,
            SubCommand::Attr {
                target: 2,
                attr: "marked".into(),
                value: "y".into(),
            },
        );
        let sel = SelectorList::parse("[marked]").unwrap();
        assert_eq!(sel.query_all(&tree, root).len(), 2);
    }

    #[test]
    fn test_unbound_reference_is_a_no_op() {
        let (mut tree, root) = fixture();
        let before = treewire_dom::outer_html(&tree, root);
        let mut refs = RefTable::new(root);
        apply(&mut tree, &mut refs, SubCommand::Remove { remove: 42 });
        apply(
            &mut tree,
            &mut refs,
            SubCommand::Text {
                target: 9,
                text: "x".into(),
            },
        );
        assert_eq!(treewire_dom::outer_html(&tree, root), before);
    }

    #[test]
    fn test_unknown_subcommand_is_ignored() {
        let (mut tree, root) = fixture();
        let mut refs = RefTable::new(root);
        apply(
            &mut tree,
            &mut refs,
            SubCommand::Unknown(serde_json::json!({"frobnicate": true})),
        );
    }
}
