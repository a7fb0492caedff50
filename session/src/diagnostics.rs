//! Diagnostics store — accumulates published diagnostics per document URI.
//!
//! Positions are kept as the service sent them and translated to byte
//! offsets against the caller's *current* text at read time, since the
//! buffer may have changed since the publish. Rendering is someone else's
//! job; this is bookkeeping plus position mapping only.

use std::collections::HashMap;

use liaison_protocol::payloads::{Diagnostic, PublishDiagnosticsParams, Severity};
use liaison_protocol::position_to_offset;

/// One diagnostic resolved to byte offsets in the current text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticSpan {
    pub severity: Severity,
    pub message: String,
    pub start: usize,
    pub end: usize,
}

/// Per-URI diagnostic sets, each replaced wholesale on publish.
#[derive(Debug, Default)]
pub struct DiagnosticsStore {
    data: HashMap<String, Vec<Diagnostic>>,
}

impl DiagnosticsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a publish: replaces the URI's previous set; an empty list
    /// clears it.
    pub fn apply(&mut self, params: PublishDiagnosticsParams) {
        if params.diagnostics.is_empty() {
            self.data.remove(&params.uri);
        } else {
            self.data.insert(params.uri, params.diagnostics);
        }
    }

    /// Resolve the stored set for `uri` against `text`.
    #[must_use]
    pub fn spans_for(&self, uri: &str, text: &str) -> Vec<DiagnosticSpan> {
        let Some(diagnostics) = self.data.get(uri) else {
            return Vec::new();
        };
        diagnostics
            .iter()
            .map(|diag| DiagnosticSpan {
                severity: diag
                    .severity
                    .and_then(Severity::from_wire)
                    .unwrap_or(Severity::Warning),
                message: diag.message.clone(),
                start: position_to_offset(text, &diag.range.start),
                end: position_to_offset(text, &diag.range.end),
            })
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publish(uri: &str, diags: serde_json::Value) -> PublishDiagnosticsParams {
        serde_json::from_value(serde_json::json!({ "uri": uri, "diagnostics": diags }))
            .expect("params")
    }

    #[test]
    fn test_publish_resolves_to_offsets() {
        let mut store = DiagnosticsStore::new();
        store.apply(publish(
            "inmemory://expr",
            serde_json::json!([{
                "range": {
                    "start": { "line": 1, "character": 2 },
                    "end": { "line": 1, "character": 5 }
                },
                "severity": 1,
                "message": "unknown name"
            }]),
        ));

        let spans = store.spans_for("inmemory://expr", "ab\ncdefg");
        assert_eq!(
            spans,
            vec![DiagnosticSpan {
                severity: Severity::Error,
                message: "unknown name".to_string(),
                start: 5,
                end: 8,
            }]
        );
    }

    #[test]
    fn test_missing_severity_defaults_to_warning() {
        let mut store = DiagnosticsStore::new();
        store.apply(publish(
            "inmemory://expr",
            serde_json::json!([{
                "range": {
                    "start": { "line": 0, "character": 0 },
                    "end": { "line": 0, "character": 1 }
                },
                "message": "hm"
            }]),
        ));
        assert_eq!(
            store.spans_for("inmemory://expr", "x")[0].severity,
            Severity::Warning
        );
    }

    #[test]
    fn test_publish_replaces_previous_set() {
        let mut store = DiagnosticsStore::new();
        let range = serde_json::json!({
            "start": { "line": 0, "character": 0 },
            "end": { "line": 0, "character": 1 }
        });
        store.apply(publish(
            "inmemory://expr",
            serde_json::json!([
                { "range": range, "severity": 1, "message": "first" },
                { "range": range, "severity": 1, "message": "second" }
            ]),
        ));
        store.apply(publish(
            "inmemory://expr",
            serde_json::json!([{ "range": range, "severity": 2, "message": "only" }]),
        ));

        let spans = store.spans_for("inmemory://expr", "x");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].message, "only");
    }

    #[test]
    fn test_empty_publish_clears_the_uri() {
        let mut store = DiagnosticsStore::new();
        let range = serde_json::json!({
            "start": { "line": 0, "character": 0 },
            "end": { "line": 0, "character": 1 }
        });
        store.apply(publish(
            "inmemory://expr",
            serde_json::json!([{ "range": range, "severity": 1, "message": "gone soon" }]),
        ));
        store.apply(publish("inmemory://expr", serde_json::json!([])));

        assert!(store.is_empty());
        assert!(store.spans_for("inmemory://expr", "x").is_empty());
    }

    #[test]
    fn test_stale_positions_clamp_to_shrunk_text() {
        let mut store = DiagnosticsStore::new();
        store.apply(publish(
            "inmemory://expr",
            serde_json::json!([{
                "range": {
                    "start": { "line": 0, "character": 4 },
                    "end": { "line": 3, "character": 10 }
                },
                "severity": 1,
                "message": "was further out"
            }]),
        ));

        // The buffer shrank since the publish; spans degrade, not panic.
        let spans = store.spans_for("inmemory://expr", "ab");
        assert_eq!(spans[0].start, 2);
        assert_eq!(spans[0].end, 2);
    }

    #[test]
    fn test_unknown_uri_is_empty() {
        let store = DiagnosticsStore::new();
        assert!(store.spans_for("inmemory://other", "x").is_empty());
    }
}
