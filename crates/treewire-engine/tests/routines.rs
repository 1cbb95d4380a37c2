//! Routine lane scheduling: ordering within a lane, fork barriers,
//! concurrency between lanes. Interleavings are made observable with
//! timed waits that suspend one lane while another proceeds.

use treewire_dom::{MarkupParser, NodeId, SelectorList, inner_html};
use treewire_engine::Session;
use treewire_proto::decode_commands;

/// Parse a document and scope the session to its body.
fn session_with(html: &str) -> (Session, NodeId) {
    let (tree, root) = MarkupParser::parse_document(html);
    let body = SelectorList::parse("body")
        .unwrap()
        .query_one(&tree, root)
        .expect("parsed documents always have a body");
    (Session::new(tree), body)
}

fn run(session: &Session, root: NodeId, payload: &str) {
    let commands = decode_commands(payload).expect("payload decodes");
    smol::block_on(session.execute(root, commands));
}

fn html_of(session: &Session, root: NodeId) -> String {
    inner_html(&session.tree().borrow(), root)
}

#[test]
fn test_same_lane_transactions_run_in_order() {
    let (session, root) = session_with("");
    let payload = r#"[
        {"tx":[{"append":"<i>a</i>","parent":0}]},
        {"tx":[{"append":"<i>b</i>","parent":0}]},
        {"tx":[{"append":"<i>c</i>","parent":0}]}
    ]"#;
    run(&session, root, payload);
    assert_eq!(html_of(&session, root), "<i>a</i><i>b</i><i>c</i>");
}

#[test]
fn test_forked_lane_interleaves_with_suspended_parent() {
    let (session, root) = session_with("");
    // The fork point is before any parent transaction, so the forked lane
    // may start immediately; it runs while the parent is suspended.
    let payload = r#"[
        {"startRoutine":1},
        {"tx":[
            {"append":"<i>a1</i>","parent":0},
            {"target":0,"wait":"never","timeout":20},
            {"append":"<i>a2</i>","parent":0}
        ]},
        {"routine":1,"tx":[{"append":"<i>b</i>","parent":0}]}
    ]"#;
    run(&session, root, payload);
    assert_eq!(html_of(&session, root), "<i>a1</i><i>b</i><i>a2</i>");
}

#[test]
fn test_fork_point_captures_prior_transaction_count() {
    let (session, root) = session_with("");
    // One parent transaction precedes the fork, so the forked lane starts
    // only after it completes, then interleaves with the second.
    let payload = r#"[
        {"tx":[{"append":"<i>x</i>","parent":0}]},
        {"startRoutine":1},
        {"tx":[
            {"target":0,"wait":"never","timeout":20},
            {"append":"<i>a2</i>","parent":0}
        ]},
        {"routine":1,"tx":[{"append":"<i>b</i>","parent":0}]}
    ]"#;
    run(&session, root, payload);
    assert_eq!(html_of(&session, root), "<i>x</i><i>b</i><i>a2</i>");
}

#[test]
fn test_independent_lanes_run_concurrently() {
    let (session, root) = session_with("");
    // Lane 1 is declared first but suspends; lane 2 finishes during the
    // suspension.
    let payload = r#"[
        {"startRoutine":1},
        {"startRoutine":2},
        {"routine":1,"tx":[
            {"target":0,"wait":"never","timeout":20},
            {"append":"<i>one</i>","parent":0}
        ]},
        {"routine":2,"tx":[{"append":"<i>two</i>","parent":0}]}
    ]"#;
    run(&session, root, payload);
    assert_eq!(html_of(&session, root), "<i>two</i><i>one</i>");
}

#[test]
fn test_redeclared_routine_runs_both_segments() {
    let (session, root) = session_with("");
    let payload = r#"[
        {"startRoutine":1},
        {"routine":1,"tx":[{"append":"<i class=\"s\">s1</i>","parent":0}]},
        {"startRoutine":1},
        {"routine":1,"tx":[{"append":"<i class=\"s\">s2</i>","parent":0}]}
    ]"#;
    run(&session, root, payload);
    // Relative order of the two segments is unspecified; both complete.
    let html = html_of(&session, root);
    assert!(html.contains("s1"), "orphaned segment still ran: {html}");
    assert!(html.contains("s2"), "fresh segment ran: {html}");
}

#[test]
fn test_nested_fork_waits_for_its_parent_lane() {
    let (session, root) = session_with("");
    let payload = r#"[
        {"startRoutine":1},
        {"routine":1,"tx":[
            {"target":0,"wait":"never","timeout":20},
            {"append":"<i>p</i>","parent":0}
        ]},
        {"routine":1,"startRoutine":2},
        {"routine":2,"tx":[{"append":"<i>c</i>","parent":0}]}
    ]"#;
    run(&session, root, payload);
    // Routine 2 forks off routine 1 after its only transaction, so it
    // cannot run during routine 1's suspension.
    assert_eq!(html_of(&session, root), "<i>p</i><i>c</i>");
}

#[test]
fn test_undeclared_routine_gets_its_own_lane() {
    let (session, root) = session_with("");
    // Routine 7 was never declared via a fork; it still runs, unordered
    // relative to lane 0.
    let payload = r#"[
        {"routine":7,"tx":[{"append":"<i>r7</i>","parent":0}]},
        {"tx":[{"append":"<i>r0</i>","parent":0}]}
    ]"#;
    run(&session, root, payload);
    let html = html_of(&session, root);
    assert!(html.contains("r7"));
    assert!(html.contains("r0"));
}

#[test]
fn test_concurrent_once_duplicates_apply_once() {
    let (session, root) = session_with("");
    let payload = r#"[
        {"startRoutine":1},
        {"tx":[{"append":"<i>z</i>","parent":0}],"once":true,"hash":"dup"},
        {"routine":1,"tx":[{"append":"<i>z</i>","parent":0}],"once":true,"hash":"dup"}
    ]"#;
    run(&session, root, payload);
    assert_eq!(html_of(&session, root), "<i>z</i>");
}
