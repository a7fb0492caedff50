//! Editor session facade.
//!
//! Ties the session layer (transport, RPC, document sync) to the
//! completion engine behind one explicit lifecycle value: create with
//! [`EditorSession::connect`], feed it edits, drain its events, dispose
//! with [`EditorSession::shutdown`].

mod session;

pub use session::{EditorSession, SessionEvent};
