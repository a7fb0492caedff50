//! Length-prefixed stream transport: any `AsyncRead`/`AsyncWrite` pair, or
//! a spawned analysis-service process speaking frames over stdio.

use std::process::Stdio;

use anyhow::{Context, Result};
use liaison_protocol::codec::{FrameReader, FrameWriter};
use liaison_protocol::Message;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::channel::MessageChannel;

/// Owns one live transport: the channel, the IO tasks, and (for a spawned
/// service) the child process.
pub struct TransportHandle {
    channel: MessageChannel,
    tasks: Vec<tokio::task::JoinHandle<()>>,
    child: Option<Child>,
    disposed: bool,
}

impl TransportHandle {
    /// Wire a raw byte pair through the framing codec.
    ///
    /// Reader EOF or a read error closes the channel; writer errors stop
    /// the writer task and later sends fall back to the channel's
    /// silent-drop policy.
    pub fn from_io(
        reader: impl AsyncRead + Unpin + Send + 'static,
        writer: impl AsyncWrite + Unpin + Send + 'static,
    ) -> Self {
        let channel = MessageChannel::new();

        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Message>();
        channel.bind_writer(writer_tx);
        let writer_task = tokio::spawn(async move {
            let mut frames = FrameWriter::new(writer);
            while let Some(message) = writer_rx.recv().await {
                if let Err(e) = frames.write_message(&message).await {
                    tracing::warn!("transport write error: {e:#}");
                    break;
                }
            }
        });

        let reader_channel = channel.clone();
        let reader_task = tokio::spawn(async move {
            let mut frames = FrameReader::new(reader);
            loop {
                match frames.next_message().await {
                    Ok(Some(message)) => reader_channel.publish(message),
                    Ok(None) => {
                        tracing::info!("transport stream ended");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("transport read error: {e:#}");
                        break;
                    }
                }
            }
            reader_channel.close();
        });

        Self {
            channel,
            tasks: vec![writer_task, reader_task],
            child: None,
            disposed: false,
        }
    }

    /// Spawn the analysis service as a child process and frame its stdio.
    pub async fn spawn_process(command: &str, args: &[String]) -> Result<Self> {
        let resolved = which::which(command)
            .with_context(|| format!("{command} not found in PATH"))?;
        let mut child = Command::new(&resolved)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning {command}"))?;

        let stdout = child.stdout.take().context("no stdout from child")?;
        let stdin = child.stdin.take().context("no stdin from child")?;

        let mut handle = Self::from_io(stdout, stdin);
        handle.child = Some(child);
        Ok(handle)
    }

    pub(crate) fn from_parts(
        channel: MessageChannel,
        tasks: Vec<tokio::task::JoinHandle<()>>,
    ) -> Self {
        Self {
            channel,
            tasks,
            child: None,
            disposed: false,
        }
    }

    /// A handle to the transport's message channel.
    #[must_use]
    pub fn channel(&self) -> MessageChannel {
        self.channel.clone()
    }

    /// Tear the transport down: close the channel, stop the IO tasks, and
    /// kill a spawned child. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.channel.close();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(child) = &mut self.child {
            if let Err(e) = child.start_kill() {
                tracing::debug!("killing analysis service: {e}");
            }
        }
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}
