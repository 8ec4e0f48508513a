//! Turn domain types: the inbound request, the recorded turn, and the reply.
//!
//! These are the value objects that flow through the whole pipeline:
//! client sends a [`TurnRequest`] → dispatcher validates it into a
//! [`ValidatedTurn`] → a [`Turn`] is appended to session memory → a
//! [`TurnResponse`] goes back to the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::capability::Capability;
use crate::error::InputError;

/// Conversation identifier (validated to be non-negative).
pub type SessionId = u64;

/// Tenant (business) identifier (validated to be strictly positive).
pub type TenantId = u64;

/// One user message plus the resulting reply and routing outcome.
///
/// Immutable once created; owned by the session it was appended to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub user_message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegated_capability: Option<Capability>,

    pub response: String,

    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(
        user_message: impl Into<String>,
        delegated_capability: Option<Capability>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            user_message: user_message.into(),
            delegated_capability,
            response: response.into(),
            created_at: Utc::now(),
        }
    }
}

/// Per-tenant bot configuration sent along with every turn.
///
/// Only `tenant_id` and `modality` influence routing; the remaining fields
/// feed the classifier prompt and are forwarded to delegated capabilities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: i64,
    pub bot_name: String,
    pub role: String,
    #[serde(rename = "type")]
    pub bot_type: String,
    pub primary_goal: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modality: Option<String>,

    // Display / phrasing fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greeting: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farewell_phrase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unknown_answer_phrase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_phrase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_topics: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_date: Option<String>,

    // Scheduling fields, forwarded untouched to capabilities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub schedule_by_user: Option<bool>,
    #[serde(
        default,
        deserialize_with = "lenient_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub schedule_by_branch: Option<bool>,
}

impl TenantConfig {
    /// The capability this tenant's modality allows delegation to.
    pub fn derived_capability(&self) -> Capability {
        Capability::from_modality(self.modality.as_deref().unwrap_or_default())
    }
}

/// Accepts `true/false`, `1/0`, `"1"/"0"`, `"true"/"false"`, and treats
/// `null`, `""` and `"null"` as absent.
fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Bool(b)) => Ok(Some(b)),
        Some(serde_json::Value::Number(n)) => match n.as_i64() {
            Some(1) => Ok(Some(true)),
            Some(0) => Ok(Some(false)),
            _ => Err(serde::de::Error::custom(format!(
                "expected 0 or 1, got {n}"
            ))),
        },
        Some(serde_json::Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "" | "null" => Ok(None),
            "1" | "true" => Ok(Some(true)),
            "0" | "false" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean flag, got '{other}'"
            ))),
        },
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a boolean flag, got {other}"
        ))),
    }
}

/// The inbound turn request, as received from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    pub message: String,
    pub session_id: i64,
    #[serde(alias = "config")]
    pub tenant_config: TenantConfig,
}

impl TurnRequest {
    /// Check the request and narrow its identifiers.
    ///
    /// Runs before any side effect; a rejected request touches no state.
    pub fn validate(self) -> Result<ValidatedTurn, InputError> {
        if self.message.trim().is_empty() {
            return Err(InputError::EmptyMessage);
        }
        let session_id = u64::try_from(self.session_id)
            .map_err(|_| InputError::InvalidSessionId(self.session_id))?;
        let tenant_id = match u64::try_from(self.tenant_config.tenant_id) {
            Ok(id) if id > 0 => id,
            _ => return Err(InputError::InvalidTenantId(self.tenant_config.tenant_id)),
        };

        Ok(ValidatedTurn {
            message: self.message,
            session_id,
            tenant_id,
            tenant: self.tenant_config,
        })
    }
}

/// A turn request whose identifiers have been checked.
#[derive(Debug, Clone)]
pub struct ValidatedTurn {
    pub message: String,
    pub session_id: SessionId,
    pub tenant_id: TenantId,
    pub tenant: TenantConfig,
}

/// What the pipeline did with a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnAction {
    /// A capability produced the reply.
    Delegate,
    /// The classifier's own text is the reply (including delegation fallback).
    Respond,
    /// The overall turn deadline passed.
    Timeout,
    /// The caller went away before the turn finished.
    Cancelled,
}

impl TurnAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnAction::Delegate => "delegate",
            TurnAction::Respond => "respond",
            TurnAction::Timeout => "timeout",
            TurnAction::Cancelled => "cancelled",
        }
    }
}

/// The outbound reply for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResponse {
    pub reply: String,
    pub session_id: SessionId,
    pub delegated_capability: Option<Capability>,
    pub action: TurnAction,
}

impl TurnResponse {
    /// Reply sent when the overall turn deadline passes.
    pub const TIMEOUT_REPLY: &'static str =
        "The assistant took too long to respond. Please try again.";

    pub fn timed_out(session_id: SessionId) -> Self {
        Self {
            reply: Self::TIMEOUT_REPLY.into(),
            session_id,
            delegated_capability: None,
            action: TurnAction::Timeout,
        }
    }
}
