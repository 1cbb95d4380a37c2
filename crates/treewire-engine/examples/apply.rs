//! Decode a command stream and apply it to a document.
//!
//! ```sh
//! cargo run --example apply
//! RUST_LOG=treewire_engine=debug cargo run --example apply
//! ```

use treewire_dom::{MarkupParser, outer_html};
use treewire_engine::Session;
use treewire_proto::decode_commands;

const DOCUMENT: &str = r#"
<main>
  <template id="row"><li class="row">placeholder</li></template>
  <ul id="list"><li class="end">end</li></ul>
</main>
"#;

const PAYLOAD: &str = r##"[
  {"tx":[
    {"selector":"#row","id":1},
    {"content":1,"id":2},
    {"clone":2,"id":3},
    {"selector":"#list","id":4},
    {"selectorAll":".end","id":5},
    {"insertNodeBefore":3,"parent":4,"ref":5}
  ],"once":true,"hash":"seed-row"},
  {"startRoutine":1},
  {"routine":1,"tx":[
    {"selectorAll":".row","id":1},
    {"target":1,"addToAttr":"class","value":"fresh"}
  ]}
]"##;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (tree, root) = MarkupParser::parse_document(DOCUMENT);
    let session = Session::new(tree);
    let commands = decode_commands(PAYLOAD)?;
    smol::block_on(session.execute(root, commands));

    println!("{}", outer_html(&session.tree().borrow(), root));
    Ok(())
}
