//! # Switchyard Core
//!
//! Domain types, collaborator traits, and error definitions for the
//! switchyard turn router. This crate has **zero framework dependencies**:
//! it defines the model that every other crate implements against.
//!
//! ## Collaborators
//!
//! The dispatch layer only talks to the outside world through three traits
//! defined here:
//! - [`Classifier`] decides whether a turn is answered directly or delegated
//! - [`CapabilityInvoker`] runs a delegated turn against a specialised service
//! - [`ContextSource`] looks up the business context string for a tenant
//!
//! Implementations live in `switchyard-providers`; tests use hand-written mocks.

pub mod capability;
pub mod classifier;
pub mod context;
pub mod error;
pub mod invoker;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use capability::Capability;
pub use classifier::{Classifier, ClassifierRequest, Decision, DecisionAction};
pub use context::ContextSource;
pub use error::{ClassifierError, ContextError, DispatchError, InputError, InvokeError};
pub use invoker::{
    CapabilityInvoker, CapabilityOutput, CapabilityRequest, ContentBlock, InvokerKind,
};
pub use turn::{
    SessionId, TenantConfig, TenantId, Turn, TurnAction, TurnRequest, TurnResponse, ValidatedTurn,
};
