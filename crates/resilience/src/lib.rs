//! Failure-tolerance building blocks shared by the dispatch layer.
//!
//! - [`TtlCache`]: bounded key/value store with per-entry expiry and LRU eviction
//! - [`CircuitBreaker`] / [`BreakerRegistry`]: per-destination admission gate
//! - [`RetryPolicy`]: bounded retries with deterministic exponential backoff
//!
//! All time is measured with `tokio::time::Instant`; a paused test clock
//! drives every expiry and delay here.

pub mod breaker;
pub mod cache;
pub mod retry;

pub use breaker::{
    Admission, AdmissionGate, BreakerRegistry, BreakerSnapshot, BreakerState, CircuitBreaker, Unguarded,
};
pub use cache::TtlCache;
pub use retry::{AttemptError, RetryError, RetryPolicy};
