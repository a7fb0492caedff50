//! The editor session: one document, one service connection.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use liaison_completion::{CompletionEngine, Completions, EditOutcome};
use liaison_protocol::payloads::{
    CompletionItem, CompletionTriggerKind, PublishDiagnosticsParams, completion_items_from_result,
    completion_params, initialize_params,
};
use liaison_protocol::offset_to_position;
use liaison_session::channel::MessageChannel;
use liaison_session::diagnostics::{DiagnosticSpan, DiagnosticsStore};
use liaison_session::socket::connect_socket;
use liaison_session::sync::DocumentSync;
use liaison_session::{
    Endpoint, RpcConnection, RpcError, SessionConfig, TransportHandle, spawn_dispatcher,
};
use tokio::sync::mpsc;

/// Something the editor UI should react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Completions ready to show (possibly empty: "no completions").
    Completions(Completions),
    /// The diagnostic set for a URI changed; read it via
    /// [`EditorSession::diagnostic_spans`].
    DiagnosticsUpdated { uri: String },
}

struct FetchOutcome {
    ticket_id: u64,
    result: std::result::Result<Vec<CompletionItem>, RpcError>,
}

/// One editing session against the analysis service.
///
/// Single-document by design: the interactive editor holds one expression
/// buffer at a time.
pub struct EditorSession {
    rpc: RpcConnection,
    transport: TransportHandle,
    config: SessionConfig,
    engine: CompletionEngine,
    sync: Option<DocumentSync>,
    uri: Option<String>,
    text: String,
    caret: usize,
    diagnostics: Arc<Mutex<DiagnosticsStore>>,
    diag_rx: mpsc::UnboundedReceiver<String>,
    fetch_tx: mpsc::UnboundedSender<FetchOutcome>,
    fetch_rx: mpsc::UnboundedReceiver<FetchOutcome>,
    pending_events: std::collections::VecDeque<SessionEvent>,
}

impl EditorSession {
    /// Connect per the configured endpoint and run the initialize
    /// handshake.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let transport = match &config.endpoint {
            Endpoint::Process { command, args } => {
                TransportHandle::spawn_process(command, args).await?
            }
            Endpoint::Socket { url } => connect_socket(url).await?,
        };
        Self::with_transport(transport, config).await
    }

    /// Build a session over an already-established transport.
    pub async fn with_transport(transport: TransportHandle, config: SessionConfig) -> Result<Self> {
        let rpc = RpcConnection::new(transport.channel(), config.request_timeout());
        let _dispatcher = spawn_dispatcher(&rpc);

        let diagnostics = Arc::new(Mutex::new(DiagnosticsStore::new()));
        let (diag_tx, diag_rx) = mpsc::unbounded_channel();
        {
            let diagnostics = diagnostics.clone();
            rpc.on_notification("textDocument/publishDiagnostics", move |params| {
                let Some(params) = params else { return };
                match serde_json::from_value::<PublishDiagnosticsParams>(params.clone()) {
                    Ok(parsed) => {
                        let uri = parsed.uri.clone();
                        diagnostics
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .apply(parsed);
                        let _ = diag_tx.send(uri);
                    }
                    Err(e) => {
                        // Leave the previous set untouched.
                        tracing::debug!("ignoring malformed diagnostics: {e}");
                    }
                }
            });
        }

        rpc.request("initialize", Some(initialize_params(None)))
            .await
            .context("initialize handshake failed")?;
        rpc.notify("initialized", Some(serde_json::json!({})));

        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        Ok(Self {
            rpc,
            transport,
            config,
            engine: CompletionEngine::new(),
            sync: None,
            uri: None,
            text: String::new(),
            caret: 0,
            diagnostics,
            diag_rx,
            fetch_tx,
            fetch_rx,
            pending_events: std::collections::VecDeque::new(),
        })
    }

    /// Open the document. Must precede [`Self::edit`].
    pub fn open(&mut self, uri: &str, text: &str) {
        let mut sync = DocumentSync::new(
            self.rpc.clone(),
            uri.to_string(),
            self.config.language_id.clone(),
            self.config.debounce(),
        );
        sync.document_changed(text);
        self.sync = Some(sync);
        self.uri = Some(uri.to_string());
        self.text = text.to_string();
        self.caret = text.len();
    }

    /// Feed an edit: the full current text, the caret offset, and whether
    /// this was an explicit completion invocation.
    ///
    /// Synchronous — remote fetches are spawned and surface later through
    /// [`Self::poll_events`].
    pub fn edit(&mut self, text: &str, caret: usize, explicit: bool) {
        let (Some(sync), Some(uri)) = (&mut self.sync, &self.uri) else {
            tracing::warn!("edit before open, ignoring");
            return;
        };
        self.text = text.to_string();
        self.caret = caret;
        sync.document_changed(text);

        match self.engine.on_edit(text, caret, explicit) {
            EditOutcome::Quiet => {}
            EditOutcome::Continuation(completions) => {
                self.pending_events
                    .push_back(SessionEvent::Completions(completions));
            }
            EditOutcome::Fetch(ticket) => {
                // The service must see this text before the completion
                // request lands — trigger characters jump the debounce.
                if ticket.context.kind == CompletionTriggerKind::TriggerCharacter {
                    sync.flush_now();
                }
                let params = completion_params(
                    uri,
                    offset_to_position(text, ticket.context.caret),
                    ticket.context.kind,
                    ticket.context.trigger,
                );
                let rpc = self.rpc.clone();
                let fetch_tx = self.fetch_tx.clone();
                tokio::spawn(async move {
                    let result = rpc
                        .request("textDocument/completion", Some(params))
                        .await
                        .map(|value| completion_items_from_result(&value));
                    let _ = fetch_tx.send(FetchOutcome {
                        ticket_id: ticket.id,
                        result,
                    });
                });
            }
        }
    }

    /// Drain up to `budget` ready events. Non-blocking.
    ///
    /// Completed fetches pass the engine's staleness guard here, against
    /// the document as it is *now* — a result whose anchor moved is
    /// silently discarded.
    pub fn poll_events(&mut self, budget: usize) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while events.len() < budget {
            if let Some(event) = self.pending_events.pop_front() {
                events.push(event);
                continue;
            }
            if let Ok(uri) = self.diag_rx.try_recv() {
                events.push(SessionEvent::DiagnosticsUpdated { uri });
                continue;
            }
            match self.fetch_rx.try_recv() {
                Ok(outcome) => match outcome.result {
                    Ok(items) => {
                        if let Some(completions) = self.engine.accept_result(
                            outcome.ticket_id,
                            items,
                            &self.text,
                            self.caret,
                        ) {
                            events.push(SessionEvent::Completions(completions));
                        }
                    }
                    Err(e) => {
                        // A timed-out fetch degrades to "no completions";
                        // typing is never blocked on the service.
                        tracing::debug!("completion fetch failed: {e}");
                        self.engine.fetch_failed(outcome.ticket_id);
                        events.push(SessionEvent::Completions(Completions {
                            items: Vec::new(),
                            replace: self.caret..self.caret,
                        }));
                    }
                },
                Err(_) => break,
            }
        }
        events
    }

    /// Current diagnostics for the open document, resolved to byte offsets
    /// against the current text.
    #[must_use]
    pub fn diagnostic_spans(&self) -> Vec<DiagnosticSpan> {
        let Some(uri) = &self.uri else {
            return Vec::new();
        };
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .spans_for(uri, &self.text)
    }

    /// Raw access to the message channel (tests, introspection).
    #[must_use]
    pub fn channel(&self) -> MessageChannel {
        self.transport.channel()
    }

    /// Graceful teardown: `shutdown` request, `exit` notification, then
    /// transport disposal. Runs to completion even if the service is gone.
    pub async fn shutdown(mut self) {
        if self.rpc.request("shutdown", None).await.is_ok() {
            self.rpc.notify("exit", None);
        }
        self.transport.dispose();
    }
}
