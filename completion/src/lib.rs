//! Completion trigger engine.
//!
//! On every edit the engine classifies the keystroke and decides between
//! three outcomes: reuse the cached completion set (filtered locally), issue
//! exactly one remote fetch, or stay quiet. It owns the cache exclusively
//! and guards acceptance of late results against caret movement, so a slow
//! response can never surface completions for an anchor the user has left.
//!
//! Everything here is pure and synchronous; issuing the actual request is
//! the caller's job.

mod cache;
mod engine;
mod trigger;

pub use cache::CachedCompletionSet;
pub use engine::{CompletionEngine, Completions, EditOutcome, FetchTicket};
pub use trigger::{AnchorKind, AnchorMatch, TriggerContext, find_anchor, replacement_span};
