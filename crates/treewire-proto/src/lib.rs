//! treewire wire protocol
//!
//! Typed command stream exchanged with a remote producer. Commands are plain
//! JSON objects discriminated by field presence (there is no tag field), so
//! every shape here deserializes through `serde(untagged)` with variants
//! ordered the way producers are specified to be matched.
//!
//! The field names and shapes are the compatibility surface: changing them
//! breaks existing producers.

use serde::{Deserialize, Serialize};

/// Reference-table slot index, scoped to one transaction. Slot 0 is the root.
pub type RefId = u32;

/// Routine (execution lane) identifier. Lane 0 is the implicit default lane.
pub type RoutineId = u32;

/// Protocol decode/encode failures.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed command payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A top-level command: either a routine fork declaration or a transaction
/// appended to a routine.
///
/// Shapes that match neither known form decode into [`Command::Unknown`] so a
/// single unrecognized entry cannot poison the rest of the stream; the engine
/// skips them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    Start(StartRoutine),
    Transaction(Transaction),
    Unknown(serde_json::Value),
}

/// `{startRoutine, routine?}` — fork a new lane off a parent lane.
///
/// The fork captures the parent lane's chain as it stands when this command
/// is processed; transactions appended to the parent afterwards do not gate
/// the new lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRoutine {
    pub start_routine: RoutineId,
    /// Parent lane; defaults to lane 0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routine: Option<RoutineId>,
}

/// `{routine?, tx, once?, hash?}` — one transaction: an ordered list of
/// sub-commands executed against a fresh reference table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Target lane; defaults to lane 0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routine: Option<RoutineId>,
    pub tx: Vec<SubCommand>,
    /// Execute at most once per scope, keyed by `hash`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub once: bool,
    /// Content hash identifying this transaction for the once-registry.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// One step of a transaction.
///
/// Binding steps write a node set into the reference table under `id` (or
/// under the value of `parent`/`firstChild`/... for navigation steps);
/// mutation steps apply to the set bound at `target`/`parent`. Variant order
/// mirrors the producer contract's field-presence checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubCommand {
    /// One structural query per parent node; absent matches keep their slot.
    QueryOne {
        selector: String,
        id: RefId,
        #[serde(skip_serializing_if = "Option::is_none")]
        parent: Option<RefId>,
    },
    /// Zero-or-more matches per parent node, flattened.
    #[serde(rename_all = "camelCase")]
    QueryAll {
        selector_all: String,
        id: RefId,
        #[serde(skip_serializing_if = "Option::is_none")]
        parent: Option<RefId>,
    },
    /// Parse markup into a detached node group bound under `id`.
    Fragment { fragment: String, id: RefId },
    /// Mark `id` as a content-slot alias of the set bound at `content`.
    Content { content: RefId, id: RefId },
    /// Bind each target's structural parent under the `parent` slot.
    Parent { target: RefId, parent: RefId },
    #[serde(rename_all = "camelCase")]
    FirstChild { target: RefId, first_child: RefId },
    #[serde(rename_all = "camelCase")]
    LastChild { target: RefId, last_child: RefId },
    #[serde(rename_all = "camelCase")]
    NextSibling { target: RefId, next_sibling: RefId },
    #[serde(rename_all = "camelCase")]
    PrevSibling { target: RefId, prev_sibling: RefId },
    /// Set the text payload of every target node.
    Text { target: RefId, text: String },
    /// Set the markup payload of every target node, re-instantiating scripts.
    Html { target: RefId, html: String },
    /// Set a named attribute.
    Attr {
        target: RefId,
        attr: String,
        value: String,
    },
    #[serde(rename_all = "camelCase")]
    RemoveAttr { target: RefId, remove_attr: String },
    /// Add a token to a whitespace-separated attribute value, if absent.
    #[serde(rename_all = "camelCase")]
    AddToAttr {
        target: RefId,
        add_to_attr: String,
        value: String,
    },
    #[serde(rename_all = "camelCase")]
    RemoveFromAttr {
        target: RefId,
        remove_from_attr: String,
        value: String,
    },
    /// Suspend until every target has fired the event once, or until
    /// `timeout` milliseconds elapse.
    Wait {
        target: RefId,
        wait: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    /// Deep-clone the referenced set under `id`.
    Clone { clone: RefId, id: RefId },
    /// Detach the referenced set from its structural parents.
    Remove { remove: RefId },
    /// Insert bound nodes before `ref` within each parent.
    #[serde(rename_all = "camelCase")]
    InsertNodeBefore {
        insert_node_before: RefId,
        parent: RefId,
        #[serde(rename = "ref")]
        reference: RefId,
    },
    /// Insert freshly parsed markup before `ref` within each parent.
    #[serde(rename_all = "camelCase")]
    InsertBefore {
        insert_before: String,
        parent: RefId,
        #[serde(rename = "ref")]
        reference: RefId,
    },
    /// Append bound nodes at the end of each parent's container.
    #[serde(rename_all = "camelCase")]
    AppendNode { append_node: RefId, parent: RefId },
    /// Append freshly parsed markup at the end of each parent's container.
    Append { append: String, parent: RefId },
    /// Unrecognized shape; carried through decode and ignored by the engine.
    Unknown(serde_json::Value),
}

/// Decode a JSON array of commands.
pub fn decode_commands(payload: &str) -> Result<Vec<Command>, ProtocolError> {
    Ok(serde_json::from_str(payload)?)
}

/// Encode a command list back to JSON, omitting absent optional fields so the
/// output matches what a producer would have sent.
pub fn encode_commands(commands: &[Command]) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(commands)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_one(json: &str) -> SubCommand {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_decode_query_commands() {
        assert_eq!(
            decode_one(r##"{"selector":"#main","id":1}"##),
            SubCommand::QueryOne {
                selector: "#main".into(),
                id: 1,
                parent: None
            }
        );
        assert_eq!(
            decode_one(r#"{"selectorAll":"li","id":2,"parent":1}"#),
            SubCommand::QueryAll {
                selector_all: "li".into(),
                id: 2,
                parent: Some(1)
            }
        );
    }

    #[test]
    fn test_decode_navigation_binds_under_named_field() {
        // The navigation field's value is the new slot id, not a flag.
        assert_eq!(
            decode_one(r#"{"target":1,"firstChild":3}"#),
            SubCommand::FirstChild {
                target: 1,
                first_child: 3
            }
        );
        assert_eq!(
            decode_one(r#"{"target":1,"parent":4}"#),
            SubCommand::Parent {
                target: 1,
                parent: 4
            }
        );
    }

    #[test]
    fn test_decode_mutations() {
        assert_eq!(
            decode_one(r#"{"target":2,"addToAttr":"class","value":"done"}"#),
            SubCommand::AddToAttr {
                target: 2,
                add_to_attr: "class".into(),
                value: "done".into()
            }
        );
        assert_eq!(
            decode_one(r#"{"target":2,"wait":"load","timeout":500}"#),
            SubCommand::Wait {
                target: 2,
                wait: "load".into(),
                timeout: Some(500)
            }
        );
        assert_eq!(
            decode_one(r#"{"insertNodeBefore":5,"parent":1,"ref":2}"#),
            SubCommand::InsertNodeBefore {
                insert_node_before: 5,
                parent: 1,
                reference: 2
            }
        );
    }

    #[test]
    fn test_unknown_subcommand_shape_survives_decode() {
        let cmd = decode_one(r#"{"frobnicate":true}"#);
        assert!(matches!(cmd, SubCommand::Unknown(_)));
    }

    #[test]
    fn test_decode_command_stream() {
        let payload = r#"[
            {"startRoutine":1},
            {"routine":1,"tx":[{"selector":"p","id":1}],"once":true,"hash":"abc"},
            {"tx":[{"target":0,"text":"hi"}]}
        ]"#;
        let commands = decode_commands(payload).unwrap();
        assert_eq!(commands.len(), 3);
        assert!(matches!(commands[0], Command::Start(_)));
        match &commands[1] {
            Command::Transaction(t) => {
                assert_eq!(t.routine, Some(1));
                assert!(t.once);
                assert_eq!(t.hash, "abc");
            }
            other => panic!("expected transaction, got {other:?}"),
        }
        match &commands[2] {
            Command::Transaction(t) => assert_eq!(t.routine, None),
            other => panic!("expected transaction, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_is_byte_stable() {
        let samples = [
            r#"[{"startRoutine":2,"routine":1}]"#,
            r##"[{"tx":[{"selector":"#a","id":1},{"target":1,"html":"<b>x</b>"}]}]"##,
            r#"[{"tx":[{"target":1,"wait":"load"}],"once":true,"hash":"h1"}]"#,
            r#"[{"tx":[{"insertBefore":"<i>y</i>","parent":1,"ref":2}]}]"#,
        ];
        for sample in samples {
            let commands = decode_commands(sample).unwrap();
            assert_eq!(encode_commands(&commands).unwrap(), sample);
        }
    }
}
