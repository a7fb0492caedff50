//! Wire-level protocol support: message model, framing codecs, position
//! mapping, and payload builders for the analysis-service methods.
//!
//! Everything in this crate is IO-free except the async framing adapters in
//! [`codec`], which wrap the sans-IO decoder for stream endpoints.

pub mod codec;
pub mod message;
pub mod payloads;
pub mod position;

pub use message::{Message, Notification, Request, Response, ResponseError};
pub use position::{Position, offset_to_position, position_to_offset};
