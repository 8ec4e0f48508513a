//! Collaborator implementations for switchyard.
//!
//! The dispatcher only sees the core traits (`Classifier`, `ContextSource`,
//! `CapabilityInvoker`); this crate provides the HTTP-backed versions and
//! the in-process handler registry, plus builders that pick them from config.

pub mod context_source;
pub mod local;
pub mod openai_compat;
pub mod prompt;
pub mod remote;
pub mod router;

pub use context_source::HttpContextSource;
pub use local::{CapabilityHandler, LocalInvoker};
pub use openai_compat::OpenAiCompatClassifier;
pub use prompt::build_system_prompt;
pub use remote::RemoteInvoker;
pub use router::{build_classifier, build_context_source, build_invoker};
