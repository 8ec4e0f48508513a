//! Classifier trait: the abstraction over the intent-classification backend.
//!
//! A Classifier reads the conversation so far plus the new message and
//! decides whether to answer directly or hand the turn to a capability.
//! Its choice of capability is advisory: the dispatcher may override it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::error::ClassifierError;
use crate::turn::{TenantConfig, Turn};

/// Everything the classifier gets to see for one turn.
#[derive(Debug, Clone)]
pub struct ClassifierRequest {
    pub tenant: TenantConfig,

    /// Recent turns of the session, oldest first.
    pub history: Vec<Turn>,

    /// Capability of the most recent delegated turn, if any.
    pub active_capability: Option<Capability>,

    /// Business context for the tenant; `None` when unknown or unavailable.
    pub business_context: Option<String>,

    pub message: String,
}

/// Whether the classifier wants to delegate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Delegate,
    Respond,
}

/// The classifier's verdict for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: DecisionAction,

    #[serde(default)]
    pub capability: Option<Capability>,

    /// Reply text. A transitional message when delegating, the final
    /// answer otherwise.
    #[serde(alias = "response")]
    pub reply: String,
}

impl Decision {
    pub fn respond(reply: impl Into<String>) -> Self {
        Self {
            action: DecisionAction::Respond,
            capability: None,
            reply: reply.into(),
        }
    }

    pub fn delegate(capability: Capability, reply: impl Into<String>) -> Self {
        Self {
            action: DecisionAction::Delegate,
            capability: Some(capability),
            reply: reply.into(),
        }
    }

    /// The capability to delegate to, or `None` when answering directly.
    ///
    /// A capability named alongside `respond` is ignored.
    pub fn delegation_target(&self) -> Option<Capability> {
        match self.action {
            DecisionAction::Delegate => self.capability,
            DecisionAction::Respond => None,
        }
    }
}

/// The core Classifier trait.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// A human-readable name for this backend (e.g., "openai").
    fn name(&self) -> &str;

    /// Classify one turn.
    async fn classify(&self, request: ClassifierRequest) -> Result<Decision, ClassifierError>;
}
