//! End-to-end session tests against a scripted analysis service speaking
//! length-prefixed frames over an in-memory duplex pipe.

use std::time::Duration;

use liaison_client::{EditorSession, SessionEvent};
use liaison_protocol::codec::{FrameReader, FrameWriter};
use liaison_protocol::message::Request;
use liaison_protocol::Message;
use liaison_session::{SessionConfig, TransportHandle};
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

struct MockService {
    reader: FrameReader<ReadHalf<DuplexStream>>,
    writer: FrameWriter<WriteHalf<DuplexStream>>,
}

impl MockService {
    fn new(io: DuplexStream) -> Self {
        let (read, write) = tokio::io::split(io);
        Self {
            reader: FrameReader::new(read),
            writer: FrameWriter::new(write),
        }
    }

    async fn next_message(&mut self) -> Message {
        self.reader
            .next_message()
            .await
            .expect("service read")
            .expect("editor closed the stream")
    }

    /// Read until a request for `method` arrives. Notifications pass by;
    /// any other request is a test failure.
    async fn expect_request(&mut self, method: &str) -> Request {
        loop {
            match self.next_message().await {
                Message::Request(req) if req.method == method => return req,
                Message::Request(req) => panic!("unexpected request: {}", req.method),
                Message::Notification(_) | Message::Response(_) => {}
            }
        }
    }

    /// Read until a notification for `method` arrives, returning its params.
    async fn expect_notification(&mut self, method: &str) -> Option<serde_json::Value> {
        loop {
            match self.next_message().await {
                Message::Notification(notif) if notif.method == method => return notif.params,
                Message::Notification(_) | Message::Response(_) => {}
                Message::Request(req) => panic!("unexpected request: {}", req.method),
            }
        }
    }

    async fn respond(&mut self, id: u64, result: serde_json::Value) {
        let message = Message::from_value(&serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result
        }))
        .expect("well-formed response");
        self.writer.write_message(&message).await.expect("service write");
    }

    async fn notify(&mut self, method: &str, params: serde_json::Value) {
        self.writer
            .write_message(&Message::notification(method, Some(params)))
            .await
            .expect("service write");
    }

    async fn handle_initialize(&mut self) {
        let req = self.expect_request("initialize").await;
        assert!(req.params.is_some(), "initialize carries capabilities");
        self.respond(req.id, serde_json::json!({ "capabilities": {} }))
            .await;
    }
}

fn test_config(request_timeout_ms: u64) -> SessionConfig {
    serde_json::from_value(serde_json::json!({
        "endpoint": { "command": "unused-in-tests" },
        "language_id": "fhirpath",
        "request_timeout_ms": request_timeout_ms,
        "debounce_ms": 30
    }))
    .expect("config")
}

async fn start_session(config: SessionConfig) -> (EditorSession, MockService) {
    let (editor_io, service_io) = tokio::io::duplex(64 * 1024);
    let (read, write) = tokio::io::split(editor_io);
    let transport = TransportHandle::from_io(read, write);
    let mut service = MockService::new(service_io);

    let (session, ()) = tokio::join!(
        EditorSession::with_transport(transport, config),
        service.handle_initialize(),
    );
    (session.expect("session established"), service)
}

/// Poll until at least one event is ready.
async fn next_events(session: &mut EditorSession) -> Vec<SessionEvent> {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let events = session.poll_events(16);
            if !events.is_empty() {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("events before deadline")
}

fn completion_labels(event: &SessionEvent) -> Vec<String> {
    match event {
        SessionEvent::Completions(completions) => completions
            .items
            .iter()
            .map(|item| item.label.clone())
            .collect(),
        other => panic!("expected completions, got {other:?}"),
    }
}

#[tokio::test]
async fn test_dot_trigger_fetches_then_word_continues_locally() {
    let (mut session, mut service) = start_session(test_config(5_000)).await;

    session.open("inmemory://expr", "Patient");
    let opened = service
        .expect_notification("textDocument/didOpen")
        .await
        .expect("params");
    assert_eq!(opened["textDocument"]["text"], "Patient");
    assert_eq!(opened["textDocument"]["languageId"], "fhirpath");

    // Typing `.` forces the pending text out ahead of the completion
    // request, debounce window or not.
    session.edit("Patient.", 8, false);
    let changed = service
        .expect_notification("textDocument/didChange")
        .await
        .expect("params");
    assert_eq!(changed["contentChanges"][0]["text"], "Patient.");

    let req = service.expect_request("textDocument/completion").await;
    let params = req.params.clone().expect("completion params");
    assert_eq!(params["position"]["line"], 0);
    assert_eq!(params["position"]["character"], 8);
    assert_eq!(params["context"]["triggerKind"], 2);
    assert_eq!(params["context"]["triggerCharacter"], ".");

    service
        .respond(
            req.id,
            serde_json::json!([
                { "label": "name", "kind": 5 },
                { "label": "birthDate", "kind": 5 },
                { "label": "active", "kind": 5 }
            ]),
        )
        .await;

    let events = next_events(&mut session).await;
    assert_eq!(events.len(), 1);
    assert_eq!(completion_labels(&events[0]), ["name", "birthDate", "active"]);
    match &events[0] {
        SessionEvent::Completions(completions) => assert_eq!(completions.replace, 8..8),
        other => panic!("expected completions, got {other:?}"),
    }

    // The narrowing keystroke filters the cached set locally.
    session.edit("Patient.n", 9, false);
    let events = session.poll_events(16);
    assert_eq!(events.len(), 1);
    assert_eq!(completion_labels(&events[0]), ["name"]);
    match &events[0] {
        SessionEvent::Completions(completions) => assert_eq!(completions.replace, 7..9),
        other => panic!("expected completions, got {other:?}"),
    }

    // Graceful teardown. The very next request on the wire must be
    // `shutdown` — the continuation issued no completion request.
    let service_side = async {
        let req = service.expect_request("shutdown").await;
        service.respond(req.id, serde_json::json!(null)).await;
        assert_eq!(service.expect_notification("exit").await, None);
    };
    tokio::join!(session.shutdown(), service_side);
}

#[tokio::test]
async fn test_result_for_an_abandoned_anchor_is_discarded() {
    let (mut session, mut service) = start_session(test_config(5_000)).await;

    session.open("inmemory://expr", "Patient");
    session.edit("Patient.", 8, false);
    let req = service.expect_request("textDocument/completion").await;

    // The user moved on before the service answered; there is no anchor at
    // the old offset any more.
    session.edit("Patient ", 8, false);
    service
        .respond(req.id, serde_json::json!([{ "label": "name" }]))
        .await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(
        session.poll_events(16).is_empty(),
        "stale completion result must never surface"
    );
}

#[tokio::test]
async fn test_timed_out_fetch_degrades_to_no_completions() {
    let (mut session, mut service) = start_session(test_config(40)).await;

    session.open("inmemory://expr", "Patient");
    session.edit("Patient.", 8, false);
    // Read the request but never answer it.
    let _req = service.expect_request("textDocument/completion").await;

    let events = next_events(&mut session).await;
    assert_eq!(events.len(), 1);
    assert_eq!(completion_labels(&events[0]), Vec::<String>::new());
}

#[tokio::test]
async fn test_diagnostics_surface_as_offset_spans() {
    let (mut session, mut service) = start_session(test_config(5_000)).await;

    session.open("inmemory://expr", "Patiant.name");
    let _ = service.expect_notification("textDocument/didOpen").await;

    service
        .notify(
            "textDocument/publishDiagnostics",
            serde_json::json!({
                "uri": "inmemory://expr",
                "diagnostics": [{
                    "range": {
                        "start": { "line": 0, "character": 0 },
                        "end": { "line": 0, "character": 7 }
                    },
                    "severity": 1,
                    "message": "unknown name 'Patiant'"
                }]
            }),
        )
        .await;

    let events = next_events(&mut session).await;
    assert_eq!(
        events,
        vec![SessionEvent::DiagnosticsUpdated {
            uri: "inmemory://expr".to_string()
        }]
    );

    let spans = session.diagnostic_spans();
    assert_eq!(spans.len(), 1);
    assert_eq!((spans[0].start, spans[0].end), (0, 7));
    assert!(spans[0].severity.is_error());
    assert!(spans[0].message.contains("Patiant"));

    // A clearing publish empties the set.
    service
        .notify(
            "textDocument/publishDiagnostics",
            serde_json::json!({ "uri": "inmemory://expr", "diagnostics": [] }),
        )
        .await;
    let _ = next_events(&mut session).await;
    assert!(session.diagnostic_spans().is_empty());
}

#[tokio::test]
async fn test_quiet_keystrokes_produce_no_wire_traffic_beyond_sync() {
    let (mut session, mut service) = start_session(test_config(5_000)).await;

    session.open("inmemory://expr", "");
    let _ = service.expect_notification("textDocument/didOpen").await;

    // Ordinary prose keystrokes: no trigger, no anchor.
    session.edit("1 ", 2, false);
    session.edit("1 +", 3, false);
    session.edit("1 + ", 4, false);
    assert!(session.poll_events(16).is_empty());

    // Only the debounced didChange reaches the service; prove it by
    // shutting down and checking nothing but `shutdown` was pending.
    let service_side = async {
        let req = service.expect_request("shutdown").await;
        service.respond(req.id, serde_json::json!(null)).await;
        assert_eq!(service.expect_notification("exit").await, None);
    };
    tokio::join!(session.shutdown(), service_side);
}

#[tokio::test]
async fn test_explicit_invocation_fetches_with_invoked_kind() {
    let (mut session, mut service) = start_session(test_config(5_000)).await;

    session.open("inmemory://expr", "");
    session.edit("where( ", 7, false);
    let req = service.expect_request("textDocument/completion").await;
    let params = req.params.clone().expect("params");
    assert_eq!(params["context"]["triggerKind"], 2);
    assert_eq!(params["context"]["triggerCharacter"], "( ");
    service.respond(req.id, serde_json::json!([])).await;
    let _ = next_events(&mut session).await;

    // Manual invocation outside any match context.
    session.edit("where( ) ", 9, true);
    let req = service.expect_request("textDocument/completion").await;
    let params = req.params.clone().expect("params");
    assert_eq!(params["context"]["triggerKind"], 1);
    assert!(params["context"].get("triggerCharacter").is_none());
}
