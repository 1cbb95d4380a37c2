//! Once-registry
//!
//! Session-scoped record of transaction hashes that have already run.
//! Transactions flagged `once` consult it so re-delivered command streams
//! apply at most once per scope. The hash is recorded before the
//! transaction body executes, so a concurrent duplicate in another lane
//! sees the mark and skips.

use std::collections::HashSet;

/// Executed-transaction hashes for one scope.
#[derive(Debug, Default)]
pub struct OnceRegistry {
    seen: HashSet<String>,
}

impl OnceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a hash. Returns `true` when it was not seen before (the
    /// caller should proceed), `false` when already recorded (skip).
    pub fn mark(&mut self, hash: &str) -> bool {
        self.seen.insert(hash.to_string())
    }

    /// Check without recording.
    pub fn contains(&self, hash: &str) -> bool {
        self.seen.contains(hash)
    }
}
