//! Transaction interpreter and routine scheduler.
//!
//! This crate turns decoded command streams (`treewire-proto`) into
//! mutations of a document tree (`treewire-dom`). A [`Session`] scopes the
//! shared tree, the once-registry and routine lane numbering; its
//! [`Session::execute`] entry point plans the stream into lanes and runs
//! them concurrently on a local executor.
//!
//! All execution is best-effort: malformed selectors, unbound references
//! and capability mismatches degrade to no-ops with a debug log rather
//! than failing the stream.

mod interpreter;
mod once;
mod refs;
mod scheduler;
mod session;

pub use once::OnceRegistry;
pub use session::Session;

pub use treewire_dom as dom;
pub use treewire_proto as proto;
