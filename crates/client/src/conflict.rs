//! Conflict resolution port.
//!
//! The driver stays UI-free: anything needing a human decision goes
//! through [`ConflictPrompt`]. Hosts plug in a modal; tests plug in the
//! deterministic resolvers below.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use common::ConflictRegion;

/// What the user chose for one conflicted path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Keep the local file and push it over the server's version.
    UseLocal,
    /// Adopt the server's version, overwriting the local file.
    UseRemote,
    /// Leave everything untouched; the cursor stops before this change.
    Cancel,
    /// Wipe client-side sync state and start over against the server.
    FullReset,
}

/// Everything a prompt needs to render one conflict.
#[derive(Debug, Clone)]
pub struct ConflictRequest {
    pub path: String,
    pub local_content: Option<String>,
    pub remote_content: Option<String>,
    /// The remote side is a deletion (delete-vs-edit conflict).
    pub remote_deleted: bool,
    /// Line regions when a three-way merge ran and failed.
    pub merge_conflicts: Option<Vec<ConflictRegion>>,
    /// The server lost the shared history; only a reset can reconcile.
    pub requires_full_sync: bool,
}

#[async_trait]
pub trait ConflictPrompt: Send + Sync {
    async fn resolve(&self, request: ConflictRequest) -> Resolution;
}

/// Always answers the same way. `AlwaysResolve(Resolution::Cancel)` is the
/// safe default for unattended runs.
#[derive(Debug, Clone, Copy)]
pub struct AlwaysResolve(pub Resolution);

#[async_trait]
impl ConflictPrompt for AlwaysResolve {
    async fn resolve(&self, _request: ConflictRequest) -> Resolution {
        self.0
    }
}

/// Replays a scripted sequence of answers and records what it was asked.
/// Runs out of script → `Cancel`.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<Resolution>>,
    seen: Mutex<Vec<ConflictRequest>>,
}

impl ScriptedPrompt {
    pub fn new(answers: impl IntoIterator<Item = Resolution>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Requests the prompt has been shown, in order.
    pub fn requests(&self) -> Vec<ConflictRequest> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl ConflictPrompt for ScriptedPrompt {
    async fn resolve(&self, request: ConflictRequest) -> Resolution {
        self.seen.lock().push(request);
        self.answers.lock().pop_front().unwrap_or(Resolution::Cancel)
    }
}
