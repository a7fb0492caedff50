//! Session configuration, deserialized at the boundary.

use std::time::Duration;

use serde::Deserialize;

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_debounce_ms() -> u64 {
    500
}

/// Where the analysis service lives.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Endpoint {
    /// Connect over WebSocket.
    Socket { url: String },
    /// Spawn a child process and speak frames over its stdio.
    Process {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

/// Configuration for one editor session.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub endpoint: Endpoint,
    /// Language identifier reported in `didOpen` (e.g. "fhirpath").
    pub language_id: String,
    /// Deadline for outstanding requests.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Quiescence window for coalescing `didChange` notifications.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl SessionConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
