//! Liaison CLI — connect to an analysis service, open a document, ask for
//! one completion, print the results.
//!
//! ```text
//! liaison <command | ws-url> <file> [language-id]
//! ```
//!
//! The first argument selects the transport: a `ws://`/`wss://` URL
//! connects over the socket-frame channel, anything else is spawned as a
//! child process speaking length-prefixed frames over stdio.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use liaison_client::{EditorSession, SessionEvent};
use liaison_session::{Endpoint, SessionConfig};
use tracing_subscriber::EnvFilter;

const COMPLETION_WAIT: Duration = Duration::from_secs(10);

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    // Stderr only: stdout is the result surface.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn endpoint_for(target: &str, args: Vec<String>) -> Endpoint {
    if target.starts_with("ws://") || target.starts_with("wss://") {
        Endpoint::Socket {
            url: target.to_string(),
        }
    } else {
        Endpoint::Process {
            command: target.to_string(),
            args,
        }
    }
}

fn document_uri(path: &Path) -> String {
    url::Url::from_file_path(path)
        .map(|u| u.to_string())
        .unwrap_or_else(|()| format!("inmemory://{}", path.display()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let Some(target) = args.next() else {
        bail!("usage: liaison <command | ws-url> <file> [language-id]");
    };
    let Some(file) = args.next() else {
        bail!("usage: liaison <command | ws-url> <file> [language-id]");
    };
    let language_id = args.next().unwrap_or_else(|| "plaintext".to_string());

    let path = Path::new(&file);
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {file}"))?;

    let config = SessionConfig {
        endpoint: endpoint_for(&target, args.collect()),
        language_id,
        request_timeout_ms: 5_000,
        debounce_ms: 500,
    };

    tracing::info!(target = %target, "connecting to analysis service");
    let mut session = EditorSession::connect(config)
        .await
        .context("establishing session")?;

    session.open(&document_uri(path), &text);
    session.edit(&text, text.len(), true);

    let completions = tokio::time::timeout(COMPLETION_WAIT, async {
        loop {
            for event in session.poll_events(16) {
                if let SessionEvent::Completions(completions) = event {
                    return completions;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .context("no completion result within the deadline")?;

    if completions.items.is_empty() {
        println!("(no completions)");
    } else {
        for item in &completions.items {
            match &item.detail {
                Some(detail) => println!("{}\t{detail}", item.label),
                None => println!("{}", item.label),
            }
        }
    }

    for span in session.diagnostic_spans() {
        println!(
            "{}: {}..{}: {}",
            span.severity.label(),
            span.start,
            span.end,
            span.message
        );
    }

    session.shutdown().await;
    Ok(())
}
