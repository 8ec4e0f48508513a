//! CapabilityInvoker trait: how a delegated turn reaches a capability.
//!
//! There are exactly two transports, picked once at startup:
//! an in-process handler registry ([`InvokerKind::Local`]) and a remote
//! tool call over HTTP ([`InvokerKind::Remote`]). The dispatcher never
//! inspects which one it holds.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::error::InvokeError;
use crate::turn::SessionId;

/// Arguments passed to a capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityRequest {
    pub message: String,
    pub session_id: SessionId,

    /// `{ "session_id": .., "config": <tenant config> }`
    #[serde(default)]
    pub context: serde_json::Value,
}

/// One tagged block of a block-shaped capability result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type", default = "default_block_kind")]
    pub kind: String,

    #[serde(default)]
    pub text: String,
}

fn default_block_kind() -> String {
    "text".into()
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: default_block_kind(),
            text: text.into(),
        }
    }
}

/// What a capability hands back.
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityOutput {
    PlainText(String),
    Blocks(Vec<ContentBlock>),
}

impl CapabilityOutput {
    /// Normalise to a single reply string.
    ///
    /// Blocks are trimmed, blank ones dropped, and the rest joined with
    /// newlines. Non-text blocks contribute their `text` field if present.
    pub fn into_text(self) -> String {
        match self {
            CapabilityOutput::PlainText(text) => text.trim().to_string(),
            CapabilityOutput::Blocks(blocks) => blocks
                .iter()
                .map(|b| b.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Which transport an invoker uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvokerKind {
    Local,
    Remote,
}

impl InvokerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvokerKind::Local => "local",
            InvokerKind::Remote => "remote",
        }
    }
}

/// The core CapabilityInvoker trait.
#[async_trait]
pub trait CapabilityInvoker: Send + Sync {
    fn kind(&self) -> InvokerKind;

    /// Invoke `capability` once. Retries and breaker checks are the caller's job.
    async fn invoke(
        &self,
        capability: Capability,
        request: CapabilityRequest,
    ) -> Result<CapabilityOutput, InvokeError>;
}
