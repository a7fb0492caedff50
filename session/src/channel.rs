//! Message-level duplex channel between a transport and its consumer.
//!
//! Decouples the RPC layer from any concrete transport: transports call
//! [`MessageChannel::publish`] and drain the writer queue; consumers call
//! [`MessageChannel::subscribe`] and [`MessageChannel::send`].
//!
//! Two deliberate policies live here. Inbound messages that arrive before
//! anyone subscribes (the bootstrap race) are buffered and flushed in
//! arrival order on subscribe. Outbound sends while no transport writer is
//! bound are silently dropped — callers that need the reply find out
//! through the RPC deadline, not an exception.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use liaison_protocol::Message;
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct ChannelState {
    writer: Option<mpsc::UnboundedSender<Message>>,
    listener: Option<mpsc::UnboundedSender<Message>>,
    backlog: VecDeque<Message>,
    closed: bool,
}

/// Cheaply cloneable handle to one duplex message channel.
#[derive(Debug, Clone, Default)]
pub struct MessageChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl MessageChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind the outbound side. The transport is "ready" from here on.
    pub fn bind_writer(&self, writer: mpsc::UnboundedSender<Message>) {
        let mut state = self.state();
        if state.closed {
            return;
        }
        state.writer = Some(writer);
    }

    /// Queue a message for the transport. Dropped silently when no writer
    /// is bound, the writer is gone, or the channel is closed.
    pub fn send(&self, message: Message) {
        let mut state = self.state();
        if state.closed {
            tracing::debug!("dropping outbound message on closed channel");
            return;
        }
        match &state.writer {
            Some(writer) => {
                if writer.send(message).is_err() {
                    tracing::debug!("transport writer gone, dropping outbound message");
                    state.writer = None;
                }
            }
            None => tracing::debug!("transport not ready, dropping outbound message"),
        }
    }

    /// Deliver an inbound message: directly to the listener when one is
    /// attached, into the backlog otherwise.
    pub fn publish(&self, message: Message) {
        let mut state = self.state();
        if state.closed {
            return;
        }
        if let Some(listener) = &state.listener {
            match listener.send(message) {
                Ok(()) => return,
                Err(mpsc::error::SendError(message)) => {
                    // Listener receiver dropped; fall back to buffering for
                    // the next subscriber.
                    state.listener = None;
                    state.backlog.push_back(message);
                }
            }
        } else {
            state.backlog.push_back(message);
        }
    }

    /// Attach a listener, flushing any backlog in arrival order first.
    ///
    /// A second subscribe replaces the previous listener. Subscribing to a
    /// closed channel yields a receiver that terminates immediately.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state();
        if state.closed {
            return rx;
        }
        while let Some(message) = state.backlog.pop_front() {
            if tx.send(message).is_err() {
                break;
            }
        }
        state.listener = Some(tx);
        rx
    }

    /// Close the channel, releasing the listener, the writer binding, and
    /// the backlog. Idempotent.
    pub fn close(&self) {
        let mut state = self.state();
        state.closed = true;
        state.writer = None;
        state.listener = None;
        state.backlog.clear();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}
