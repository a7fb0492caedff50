//! Document synchronization with the analysis service.
//!
//! The first change for a document goes out immediately as `didOpen`;
//! later changes are coalesced behind a resettable debounce timer and sent
//! as full-text `didChange`. Completion correctness sometimes needs the
//! service to see the newest text *now* — [`DocumentSync::flush_now`]
//! bypasses the window for that.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use liaison_protocol::payloads::{did_change_params, did_open_params};

use crate::rpc::RpcConnection;

/// Window during which consecutive edits are coalesced into one
/// `didChange`.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Default)]
struct SyncState {
    /// Newest unsent text; `None` when the service is up to date.
    pending: Option<String>,
    version: i32,
}

/// Keeps one remote document in step with the editor buffer.
pub struct DocumentSync {
    rpc: RpcConnection,
    uri: String,
    language_id: String,
    debounce: Duration,
    opened: bool,
    state: Arc<Mutex<SyncState>>,
    timer: Option<tokio::task::JoinHandle<()>>,
}

impl DocumentSync {
    #[must_use]
    pub fn new(rpc: RpcConnection, uri: String, language_id: String, debounce: Duration) -> Self {
        Self {
            rpc,
            uri,
            language_id,
            debounce,
            opened: false,
            state: Arc::new(Mutex::new(SyncState::default())),
            timer: None,
        }
    }

    /// Record an edit. Opens the document on first use, otherwise re-arms
    /// the debounce timer with this text as the newest candidate.
    pub fn document_changed(&mut self, text: &str) {
        if !self.opened {
            self.open(text);
            return;
        }

        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.pending = Some(text.to_string());
        }

        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        let rpc = self.rpc.clone();
        let state = self.state.clone();
        let uri = self.uri.clone();
        let debounce = self.debounce;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            flush(&rpc, &state, &uri);
        }));
    }

    /// Send any pending text immediately, cancelling the timer.
    pub fn flush_now(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        flush(&self.rpc, &self.state, &self.uri);
    }

    /// Whether the remote document has been opened.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// Current synchronized version.
    #[must_use]
    pub fn version(&self) -> i32 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .version
    }

    fn open(&mut self, text: &str) {
        self.opened = true;
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.version = 1;
            state.pending = None;
        }
        self.rpc.notify(
            "textDocument/didOpen",
            Some(did_open_params(&self.uri, &self.language_id, 1, text)),
        );
    }
}

fn flush(rpc: &RpcConnection, state: &Mutex<SyncState>, uri: &str) {
    let (text, version) = {
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(text) = state.pending.take() else {
            return;
        };
        state.version += 1;
        (text, state.version)
    };
    rpc.notify(
        "textDocument/didChange",
        Some(did_change_params(uri, version, &text)),
    );
}

impl Drop for DocumentSync {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
