//! Session layer: transports, message channel, RPC correlation, and
//! document synchronization against the analysis service.
//!
//! The flow is `transport → MessageChannel → RpcConnection`: transports
//! move framed bytes (or socket frames) in and out, the channel decouples
//! them from consumers, and the RPC connection correlates responses to
//! requests by id and fans notifications out to handlers.

pub mod channel;
pub mod config;
pub mod diagnostics;
pub mod history;
pub mod rpc;
pub mod socket;
pub mod sync;
pub mod transport;

pub use channel::MessageChannel;
pub use config::{Endpoint, SessionConfig};
pub use rpc::{RpcConnection, RpcError, spawn_dispatcher};
pub use transport::TransportHandle;
