//! JSON-RPC message model.
//!
//! Inbound traffic arrives as loosely-typed JSON; [`Message::from_value`]
//! classifies it into a discriminated union at the transport boundary by
//! field presence (`id`/`method`/`result`/`error`), so the rest of the
//! crate never pattern-matches on raw records.

use serde_json::Value;

/// A single protocol message, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Response(Response),
    Notification(Notification),
}

/// A call expecting a correlated [`Response`].
///
/// Ids are allocated by the sender from a monotonic counter and are never
/// reused within a connection, even after the request resolves.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: u64,
    pub method: String,
    pub params: Option<Value>,
}

/// The reply to a [`Request`], carrying either `result` or `error`.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: u64,
    pub result: Option<Value>,
    pub error: Option<ResponseError>,
}

/// The `error` member of a failed response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
}

/// A fire-and-forget message: no id, no reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub method: String,
    pub params: Option<Value>,
}

impl Message {
    pub fn request(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self::Request(Request {
            id,
            method: method.into(),
            params,
        })
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self::Notification(Notification {
            method: method.into(),
            params,
        })
    }

    /// Build the standard "method not found" error reply for an inbound
    /// request this side does not serve.
    #[must_use]
    pub fn method_not_found(id: u64, method: &str) -> Self {
        Self::Response(Response {
            id,
            result: None,
            error: Some(ResponseError {
                code: -32601,
                message: format!("Method not found: {method}"),
            }),
        })
    }

    /// Classify a raw JSON document into a message variant.
    ///
    /// Returns `None` for anything that fits no variant (missing method and
    /// id, non-numeric id, ...). Malformed traffic is the caller's problem
    /// to drop and log; classification itself never fails loudly.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = value.get("id");
        let method = value
            .get("method")
            .and_then(|m| m.as_str())
            .map(String::from);
        let has_result_or_error = value.get("result").is_some() || value.get("error").is_some();

        match (id, method, has_result_or_error) {
            (Some(id_val), None, true) => Some(Self::Response(Response {
                id: id_val.as_u64()?,
                result: value.get("result").cloned(),
                error: value.get("error").map(|e| ResponseError {
                    code: e.get("code").and_then(Value::as_i64).unwrap_or(0),
                    message: e
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_string(),
                }),
            })),
            (Some(id_val), Some(method), _) => Some(Self::Request(Request {
                id: id_val.as_u64()?,
                method,
                params: value.get("params").cloned(),
            })),
            (None, Some(method), _) => Some(Self::Notification(Notification {
                method,
                params: value.get("params").cloned(),
            })),
            _ => None,
        }
    }

    /// Serialize to the wire shape. `params` is omitted (not `null`) when
    /// absent.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Request(req) => {
                let mut obj = serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": req.id,
                    "method": req.method,
                });
                if let Some(params) = &req.params {
                    obj["params"] = params.clone();
                }
                obj
            }
            Self::Response(resp) => {
                let mut obj = serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": resp.id,
                });
                if let Some(error) = &resp.error {
                    obj["error"] = serde_json::json!({
                        "code": error.code,
                        "message": error.message,
                    });
                } else {
                    obj["result"] = resp.result.clone().unwrap_or(Value::Null);
                }
                obj
            }
            Self::Notification(notif) => {
                let mut obj = serde_json::json!({
                    "jsonrpc": "2.0",
                    "method": notif.method,
                });
                if let Some(params) = &notif.params {
                    obj["params"] = params.clone();
                }
                obj
            }
        }
    }

    /// The method name, for requests and notifications.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(req) => Some(&req.method),
            Self::Notification(notif) => Some(&notif.method),
            Self::Response(_) => None,
        }
    }
}
