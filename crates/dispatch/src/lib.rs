//! # Switchyard Dispatch
//!
//! The per-turn pipeline. A [`Dispatcher`] takes a validated turn through
//! session memory, business context, the classifier and (optionally) a
//! capability, and always leaves the caller with a reply or a typed error.
//!
//! ```text
//! Start → MemoryLoaded → ContextResolved → Classified
//!       → (Delegating → Delegated | DelegationFailed) → Responded
//! ```
//!
//! Context lookups go through a [`ContextFetcher`], which caches per tenant
//! and stops calling a tenant's endpoint after repeated failures.

pub mod context;
pub mod dispatcher;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::ContextFetcher;
pub use dispatcher::Dispatcher;
