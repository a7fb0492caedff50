//! Params builders and typed payloads for the analysis-service methods.
//!
//! Outbound params are built as raw JSON; inbound payloads cross into typed
//! structs here, at the boundary, so nothing downstream touches loose
//! records.

use serde::Deserialize;
use serde_json::Value;

use crate::position::Position;

/// How a completion request came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionTriggerKind {
    /// Explicitly requested (manual invocation, or an anchor match with no
    /// trigger character involved).
    Invoked,
    /// Caused by typing a trigger character.
    TriggerCharacter,
}

impl CompletionTriggerKind {
    fn as_wire(self) -> u64 {
        match self {
            Self::Invoked => 1,
            Self::TriggerCharacter => 2,
        }
    }
}

pub fn initialize_params(root_uri: Option<&str>) -> Value {
    let mut params = serde_json::json!({
        "processId": std::process::id(),
        "capabilities": {
            "textDocument": {
                "synchronization": {
                    "dynamicRegistration": false,
                    "willSave": false,
                    "willSaveWaitUntil": false,
                    "didSave": false
                },
                "completion": {
                    "completionItem": {
                        "snippetSupport": false
                    }
                },
                "publishDiagnostics": {
                    "relatedInformation": false
                }
            }
        }
    });
    if let Some(uri) = root_uri {
        params["rootUri"] = Value::String(uri.to_string());
        params["workspaceFolders"] = serde_json::json!([{ "uri": uri, "name": "workspace" }]);
    }
    params
}

pub fn did_open_params(uri: &str, language_id: &str, version: i32, text: &str) -> Value {
    serde_json::json!({
        "textDocument": {
            "uri": uri,
            "languageId": language_id,
            "version": version,
            "text": text
        }
    })
}

/// Full-text replacement; the service never sees incremental edits.
pub fn did_change_params(uri: &str, version: i32, text: &str) -> Value {
    serde_json::json!({
        "textDocument": {
            "uri": uri,
            "version": version
        },
        "contentChanges": [{
            "text": text
        }]
    })
}

pub fn completion_params(
    uri: &str,
    position: Position,
    kind: CompletionTriggerKind,
    trigger_character: Option<&str>,
) -> Value {
    let mut context = serde_json::json!({ "triggerKind": kind.as_wire() });
    if let Some(character) = trigger_character {
        context["triggerCharacter"] = Value::String(character.to_string());
    }
    serde_json::json!({
        "textDocument": { "uri": uri },
        "position": position,
        "context": context
    })
}

/// One entry of a completion result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompletionItem {
    pub label: String,
    #[serde(default)]
    pub kind: Option<u64>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default, rename = "insertText")]
    pub insert_text: Option<String>,
}

impl CompletionItem {
    /// The text to splice into the document: `insertText` when the service
    /// provides it, the label otherwise.
    #[must_use]
    pub fn text_to_insert(&self) -> &str {
        self.insert_text.as_deref().unwrap_or(&self.label)
    }
}

/// Parse a completion result, which may be a bare item array or a
/// `{items: [...]}` list. Unparseable items are dropped individually.
#[must_use]
pub fn completion_items_from_result(result: &Value) -> Vec<CompletionItem> {
    let items = match result {
        Value::Array(items) => items.as_slice(),
        Value::Object(obj) => match obj.get("items").and_then(Value::as_array) {
            Some(items) => items.as_slice(),
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    items
        .iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect()
}

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error = 1,
    Warning = 2,
    Information = 3,
    Hint = 4,
}

impl Severity {
    /// Convert from the wire's numeric severity (1=Error .. 4=Hint).
    ///
    /// Returns `None` outside the defined range; boundary code picks the
    /// fallback.
    #[must_use]
    pub fn from_wire(value: u64) -> Option<Self> {
        match value {
            1 => Some(Self::Error),
            2 => Some(Self::Warning),
            3 => Some(Self::Information),
            4 => Some(Self::Hint),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_error(self) -> bool {
        self == Self::Error
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Information => "info",
            Self::Hint => "hint",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Diagnostic {
    pub range: Range,
    pub severity: Option<u64>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct PublishDiagnosticsParams {
    pub uri: String,
    pub diagnostics: Vec<Diagnostic>,
}
