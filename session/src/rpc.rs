//! Request/response correlation over one [`MessageChannel`].
//!
//! Many requests may be outstanding at once; responses resolve strictly by
//! id match, never by arrival order. Every pending request resolves exactly
//! once — by its response or by its deadline, whichever lands first. A
//! response whose id has no pending entry (stale, duplicate, never issued)
//! is dropped with a debug log and nothing else happens.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use liaison_protocol::Message;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::channel::MessageChannel;
use crate::history::{Direction, HistoryEntry, MessageHistory};

/// Deadline for an outstanding request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// How a request can fail. Timeouts and remote errors arrive as values;
/// nothing here tears the session down.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    #[error("request timed out")]
    Timeout,
    #[error("connection closed before the response arrived")]
    Closed,
    #[error("service error {code}: {message}")]
    Remote { code: i64, message: String },
}

type PendingResolver = oneshot::Sender<Result<Value, RpcError>>;
type NotificationHandler = Arc<dyn Fn(Option<&Value>) + Send + Sync>;

struct RpcShared {
    channel: MessageChannel,
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, PendingResolver>>,
    handlers: Mutex<HashMap<String, Vec<NotificationHandler>>>,
    history: Mutex<MessageHistory>,
    request_timeout: Duration,
}

/// Cheaply cloneable handle to one RPC connection.
#[derive(Clone)]
pub struct RpcConnection {
    shared: Arc<RpcShared>,
}

impl RpcConnection {
    #[must_use]
    pub fn new(channel: MessageChannel, request_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(RpcShared {
                channel,
                // Ids start at 1 and are never reset or reused.
                next_id: AtomicU64::new(1),
                pending: Mutex::new(HashMap::new()),
                handlers: Mutex::new(HashMap::new()),
                history: Mutex::new(MessageHistory::default()),
                request_timeout,
            }),
        }
    }

    #[must_use]
    pub fn channel(&self) -> &MessageChannel {
        &self.shared.channel
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<u64, PendingResolver>> {
        self.shared
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, direction: Direction, message: &Message) {
        self.shared
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(direction, message);
    }

    /// Send a request and wait for its response or deadline.
    ///
    /// If the transport is not ready the write is silently dropped and this
    /// resolves with [`RpcError::Timeout`] once the deadline elapses — that
    /// is the only failure signal the channel policy allows.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending().insert(id, tx);

        let message = Message::request(id, method, params);
        self.record(Direction::Outbound, &message);
        self.shared.channel.send(message);

        match tokio::time::timeout(self.shared.request_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                // Resolver dropped without sending: dispatcher died.
                self.pending().remove(&id);
                Err(RpcError::Closed)
            }
            Err(_) => {
                // Deadline. Remove the entry so a late response finds
                // nothing to resolve and is dropped as unmatched.
                self.pending().remove(&id);
                tracing::debug!(id, method, "request timed out");
                Err(RpcError::Timeout)
            }
        }
    }

    /// Fire-and-forget: no id, no pending entry, no reply.
    pub fn notify(&self, method: &str, params: Option<Value>) {
        let message = Message::notification(method, params);
        self.record(Direction::Outbound, &message);
        self.shared.channel.send(message);
    }

    /// Register a handler for a notification method. Every handler
    /// registered for the method runs on dispatch, in registration order.
    pub fn on_notification(
        &self,
        method: &str,
        handler: impl Fn(Option<&Value>) + Send + Sync + 'static,
    ) {
        self.shared
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(method.to_string())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Route one inbound message.
    pub fn dispatch(&self, message: Message) {
        self.record(Direction::Inbound, &message);
        match message {
            Message::Response(response) => {
                let resolver = self.pending().remove(&response.id);
                match resolver {
                    Some(tx) => {
                        let outcome = match response.error {
                            Some(error) => Err(RpcError::Remote {
                                code: error.code,
                                message: error.message,
                            }),
                            None => Ok(response.result.unwrap_or(Value::Null)),
                        };
                        // The caller may have timed out this very moment;
                        // a dead receiver is fine.
                        let _ = tx.send(outcome);
                    }
                    None => {
                        tracing::debug!(id = response.id, "dropping response with no pending request");
                    }
                }
            }
            Message::Notification(notification) => {
                let handlers: Vec<NotificationHandler> = self
                    .shared
                    .handlers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(&notification.method)
                    .map(|list| list.clone())
                    .unwrap_or_default();
                if handlers.is_empty() {
                    tracing::trace!(method = %notification.method, "ignoring notification");
                }
                for handler in handlers {
                    handler(notification.params.as_ref());
                }
            }
            Message::Request(request) => {
                // The service occasionally calls back (capability
                // registration and the like). Answer, or it may block.
                tracing::debug!(
                    method = %request.method,
                    "service sent a request; replying method not found"
                );
                let reply = Message::method_not_found(request.id, &request.method);
                self.record(Direction::Outbound, &reply);
                self.shared.channel.send(reply);
            }
        }
    }

    /// Oldest-first copy of recent traffic.
    #[must_use]
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.shared
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }
}

/// Subscribe to the channel and route every inbound message until it
/// closes.
pub fn spawn_dispatcher(rpc: &RpcConnection) -> tokio::task::JoinHandle<()> {
    let mut inbound = rpc.channel().subscribe();
    let rpc = rpc.clone();
    tokio::spawn(async move {
        while let Some(message) = inbound.recv().await {
            rpc.dispatch(message);
        }
        tracing::debug!("message channel closed, dispatcher exiting");
    })
}
