//! The turn dispatcher, the heart of switchyard.
//!
//! One call to [`Dispatcher::handle_turn`] runs a whole turn:
//! 1. Validate the request (no side effects on failure)
//! 2. Load recent turns and the active capability from session memory
//! 3. Resolve business context (best effort, bounded)
//! 4. Ask the classifier whether to answer or delegate
//! 5. Pin the capability to the one the tenant's modality allows
//! 6. Delegate through the capability's circuit breaker, falling back to
//!    the classifier's reply when that fails
//! 7. Record the turn in session memory and answer
//!
//! The whole sequence runs under one overall deadline.

use std::sync::Arc;
use std::time::Duration;

use switchyard_config::AppConfig;
use switchyard_core::{
    Capability, CapabilityInvoker, CapabilityRequest, Classifier, ClassifierError,
    ClassifierRequest, ContextSource, Decision, DispatchError, InvokeError,
    InvokerKind, SessionId, TenantConfig, Turn, TurnAction, TurnRequest, TurnResponse,
    ValidatedTurn,
};
use switchyard_memory::SessionStore;
use switchyard_resilience::{BreakerRegistry, RetryPolicy};
use switchyard_telemetry::Metrics;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::context::ContextFetcher;

/// Routes turns between the classifier and the capabilities.
///
/// Shared across requests behind an `Arc`; every piece of mutable state it
/// owns (session memory, breakers, context cache) synchronizes internally.
pub struct Dispatcher {
    classifier: Arc<dyn Classifier>,
    invoker: Arc<dyn CapabilityInvoker>,
    context: ContextFetcher,
    sessions: Arc<SessionStore>,
    breakers: Arc<BreakerRegistry>,
    delegation: RetryPolicy,
    classifier_timeout: Duration,
    context_timeout: Duration,
    turn_timeout: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl Dispatcher {
    pub fn new(
        config: &AppConfig,
        classifier: Arc<dyn Classifier>,
        invoker: Arc<dyn CapabilityInvoker>,
        context_source: Arc<dyn ContextSource>,
    ) -> Self {
        let delegation = &config.delegation;
        let session = &config.session;
        Self {
            classifier,
            invoker,
            context: ContextFetcher::new(context_source, &config.context),
            sessions: Arc::new(SessionStore::new(
                session.max_sessions,
                Duration::from_secs(session.ttl_secs),
                session.max_turns,
            )),
            breakers: Arc::new(BreakerRegistry::new(
                delegation.failure_threshold,
                Duration::from_secs(delegation.reset_timeout_secs),
            )),
            delegation: RetryPolicy::new(
                delegation.max_retries,
                Duration::from_millis(delegation.backoff_unit_ms),
                Duration::from_secs(delegation.timeout_secs),
            ),
            classifier_timeout: Duration::from_secs(config.classifier.timeout_secs),
            context_timeout: config.context.outer_timeout(),
            turn_timeout: config.turn_timeout(),
            metrics: None,
        }
    }

    pub fn with_telemetry(mut self, metrics: Arc<Metrics>) -> Self {
        self.context = self.context.with_telemetry(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    pub fn metrics(&self) -> Option<&Arc<Metrics>> {
        self.metrics.as_ref()
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    pub fn invoker_kind(&self) -> InvokerKind {
        self.invoker.kind()
    }

    /// Run one turn end to end.
    ///
    /// Dropping the returned future abandons the turn; it is then counted as
    /// cancelled and nothing is written to session memory.
    pub async fn handle_turn(&self, request: TurnRequest) -> Result<TurnResponse, DispatchError> {
        let started = Instant::now();

        let turn = match request.validate() {
            Ok(turn) => turn,
            Err(e) => {
                warn!(error = %e, "Rejected turn request");
                self.record_failure(started);
                return Err(e.into());
            }
        };

        let session_id = turn.session_id;
        let span = info_span!(
            "turn",
            turn_id = %Uuid::new_v4(),
            session_id,
            tenant_id = turn.tenant_id,
        );

        let mut watch = CancelWatch {
            metrics: self.metrics.as_deref(),
            started,
            armed: true,
        };
        let outcome = tokio::time::timeout(self.turn_timeout, self.process(turn))
            .instrument(span)
            .await;
        watch.armed = false;

        match outcome {
            Ok(Ok(response)) => {
                self.record_turn(response.action, started);
                Ok(response)
            }
            Ok(Err(e)) => {
                error!(session_id, error = %e, "Turn failed");
                self.record_failure(started);
                Err(e)
            }
            Err(_) => {
                error!(
                    session_id,
                    timeout_secs = self.turn_timeout.as_secs(),
                    "Turn timed out"
                );
                self.record_turn(TurnAction::Timeout, started);
                Err(DispatchError::Timeout {
                    session_id,
                    after_secs: self.turn_timeout.as_secs(),
                })
            }
        }
    }

    async fn process(&self, turn: ValidatedTurn) -> Result<TurnResponse, DispatchError> {
        let ValidatedTurn {
            message,
            session_id,
            tenant_id,
            tenant,
        } = turn;

        info!(
            message_len = message.len(),
            modality = tenant.modality.as_deref().unwrap_or_default(),
            "Turn received"
        );

        let history = self
            .sessions
            .get_turns(session_id, self.sessions.max_turns())
            .await;
        let active_capability = self.sessions.get_active_capability(session_id).await;
        debug!(turns = history.len(), active_capability = ?active_capability, "Memory loaded");

        let business_context = self
            .context
            .fetch_within(tenant_id, self.context_timeout)
            .await;
        debug!(has_context = business_context.is_some(), "Context resolved");

        let request = ClassifierRequest {
            tenant: tenant.clone(),
            history,
            active_capability,
            business_context,
            message: message.clone(),
        };
        let decision =
            match tokio::time::timeout(self.classifier_timeout, self.classifier.classify(request))
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(ClassifierError::Timeout {
                        timeout_secs: self.classifier_timeout.as_secs(),
                    }
                    .into());
                }
            };
        info!(
            action = ?decision.action,
            capability = ?decision.capability,
            classifier = self.classifier.name(),
            "Classifier decided"
        );

        let (reply, delegated_capability, action) = match self.route(&tenant, &decision) {
            None => (decision.reply, None, TurnAction::Respond),
            Some(capability) => {
                match self.delegate(capability, &message, session_id, &tenant).await {
                    Some(text) => (text, Some(capability), TurnAction::Delegate),
                    None => {
                        if let Some(metrics) = &self.metrics {
                            metrics.record_delegation_fallback(capability);
                        }
                        (decision.reply, None, TurnAction::Respond)
                    }
                }
            }
        };

        self.sessions
            .append_turn(
                session_id,
                Turn::new(message, delegated_capability, reply.clone()),
            )
            .await;

        info!(
            action = action.as_str(),
            delegated_capability = ?delegated_capability,
            "Turn answered"
        );

        Ok(TurnResponse {
            reply,
            session_id,
            delegated_capability,
            action,
        })
    }

    /// The capability to delegate to, if the classifier named one.
    ///
    /// The classifier decides *whether* to delegate. *Where* is fixed by the
    /// tenant's modality; a disagreeing choice is overridden.
    fn route(&self, tenant: &TenantConfig, decision: &Decision) -> Option<Capability> {
        let chosen = decision.delegation_target()?;
        let derived = tenant.derived_capability();
        if chosen != derived {
            let modality = tenant.modality.as_deref().unwrap_or_default();
            warn!(
                classifier_capability = %chosen,
                modality,
                corrected_capability = %derived,
                "Classifier picked a capability outside the tenant's modality; corrected"
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_correction(modality, chosen);
            }
        }
        Some(derived)
    }

    /// Invoke `capability` with retries behind its breaker.
    /// `None` means every path failed and the caller should fall back.
    async fn delegate(
        &self,
        capability: Capability,
        message: &str,
        session_id: SessionId,
        tenant: &TenantConfig,
    ) -> Option<String> {
        let breaker = self.breakers.get(capability.as_str());
        let context = serde_json::json!({
            "session_id": session_id,
            "config": serde_json::to_value(tenant).unwrap_or_default(),
        });

        info!(capability = %capability, "Delegating turn");

        let invoker = &self.invoker;
        let result = self
            .delegation
            .execute(&*breaker, |attempt| {
                let request = CapabilityRequest {
                    message: message.to_string(),
                    session_id,
                    context: context.clone(),
                };
                async move {
                    debug!(capability = %capability, attempt = attempt + 1, "Invoking capability");
                    let text = invoker.invoke(capability, request).await?.into_text();
                    Ok::<_, InvokeError>((!text.is_empty()).then_some(text))
                }
            })
            .await;

        match result {
            Ok(text) => {
                debug!(capability = %capability, reply_len = text.len(), "Capability answered");
                Some(text)
            }
            Err(e) => {
                warn!(
                    capability = %capability,
                    attempts = e.attempts(),
                    error = %e,
                    "Delegation failed, using classifier reply"
                );
                None
            }
        }
    }

    fn record_turn(&self, action: TurnAction, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_turn(action, started.elapsed());
        }
    }

    fn record_failure(&self, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_failure(started.elapsed());
        }
    }
}

/// Counts the turn as cancelled if it is dropped before finishing.
struct CancelWatch<'a> {
    metrics: Option<&'a Metrics>,
    started: Instant,
    armed: bool,
}

impl Drop for CancelWatch<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        debug!("Turn cancelled by caller");
        if let Some(metrics) = self.metrics {
            metrics.record_turn(TurnAction::Cancelled, self.started.elapsed());
        }
    }
}
