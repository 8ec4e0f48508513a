//! Session memory for switchyard.
//!
//! Volatile, process-lifetime conversation history: each session keeps its
//! most recent turns and is forgotten after sitting idle for the TTL.

pub mod session;

pub use session::{SessionStats, SessionStore};
