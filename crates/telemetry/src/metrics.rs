//! Prometheus metrics registry for turn processing.

use std::time::Duration;

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};
use switchyard_core::{Capability, TurnAction};

use crate::TelemetryError;

const LATENCY_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.0, 5.0, 10.0];

/// Longest label value kept for free-text inputs such as modality.
const MAX_LABEL_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }
}

/// How a business-context lookup was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextFetchOutcome {
    CacheHit,
    Fetched,
    GuardOpen,
    Failed,
    TimedOut,
}

impl ContextFetchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextFetchOutcome::CacheHit => "cache_hit",
            ContextFetchOutcome::Fetched => "fetched",
            ContextFetchOutcome::GuardOpen => "guard_open",
            ContextFetchOutcome::Failed => "failed",
            ContextFetchOutcome::TimedOut => "timeout",
        }
    }
}

/// All switchyard metrics, registered in their own [`Registry`].
pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    requests_by_action: IntCounterVec,
    duration: Histogram,
    corrections: IntCounterVec,
    delegation_fallbacks: IntCounterVec,
    context_fetches: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, TelemetryError> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("switchyard_requests_total", "Turns received, by outcome status"),
            &["status"],
        )?;
        let requests_by_action = IntCounterVec::new(
            Opts::new(
                "switchyard_requests_by_action_total",
                "Turns completed, by the action taken",
            ),
            &["action"],
        )?;
        let duration = Histogram::with_opts(
            HistogramOpts::new(
                "switchyard_request_duration_seconds",
                "Wall-clock time spent on a turn",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
        )?;
        let corrections = IntCounterVec::new(
            Opts::new(
                "switchyard_classifier_corrections_total",
                "Classifier capability choices overridden by the tenant modality",
            ),
            &["modality", "classifier_capability"],
        )?;
        let delegation_fallbacks = IntCounterVec::new(
            Opts::new(
                "switchyard_delegation_fallbacks_total",
                "Delegations that failed and fell back to the classifier reply",
            ),
            &["capability"],
        )?;
        let context_fetches = IntCounterVec::new(
            Opts::new(
                "switchyard_context_fetch_total",
                "Business context lookups, by how they were resolved",
            ),
            &["outcome"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(requests_by_action.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(corrections.clone()))?;
        registry.register(Box::new(delegation_fallbacks.clone()))?;
        registry.register(Box::new(context_fetches.clone()))?;

        Ok(Self {
            registry,
            requests,
            requests_by_action,
            duration,
            corrections,
            delegation_fallbacks,
            context_fetches,
        })
    }

    /// A turn that ended with an action. Timeouts and cancellations count as errors.
    pub fn record_turn(&self, action: TurnAction, elapsed: Duration) {
        let status = match action {
            TurnAction::Delegate | TurnAction::Respond => RequestStatus::Success,
            TurnAction::Timeout | TurnAction::Cancelled => RequestStatus::Error,
        };
        self.requests.with_label_values(&[status.as_str()]).inc();
        self.requests_by_action
            .with_label_values(&[action.as_str()])
            .inc();
        self.duration.observe(elapsed.as_secs_f64());
    }

    /// A turn that failed before producing an action (bad input or classifier failure).
    pub fn record_failure(&self, elapsed: Duration) {
        self.requests
            .with_label_values(&[RequestStatus::Error.as_str()])
            .inc();
        self.duration.observe(elapsed.as_secs_f64());
    }

    pub fn record_correction(&self, modality: &str, classifier_capability: Capability) {
        let modality = normalize_label(modality);
        self.corrections
            .with_label_values(&[modality.as_str(), classifier_capability.as_str()])
            .inc();
    }

    pub fn record_delegation_fallback(&self, capability: Capability) {
        self.delegation_fallbacks
            .with_label_values(&[capability.as_str()])
            .inc();
    }

    pub fn record_context_fetch(&self, outcome: ContextFetchOutcome) {
        self.context_fetches
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    pub fn requests_total(&self, status: RequestStatus) -> u64 {
        self.requests.with_label_values(&[status.as_str()]).get()
    }

    pub fn requests_by_action(&self, action: TurnAction) -> u64 {
        self.requests_by_action
            .with_label_values(&[action.as_str()])
            .get()
    }

    pub fn corrections_total(&self, modality: &str, classifier_capability: Capability) -> u64 {
        let modality = normalize_label(modality);
        self.corrections
            .with_label_values(&[modality.as_str(), classifier_capability.as_str()])
            .get()
    }

    pub fn delegation_fallbacks(&self, capability: Capability) -> u64 {
        self.delegation_fallbacks
            .with_label_values(&[capability.as_str()])
            .get()
    }

    pub fn context_fetches(&self, outcome: ContextFetchOutcome) -> u64 {
        self.context_fetches
            .with_label_values(&[outcome.as_str()])
            .get()
    }

    /// Render every metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String, TelemetryError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|_| TelemetryError::Encoding)
    }

    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }
}

fn normalize_label(value: &str) -> String {
    let value = value.trim().to_lowercase();
    if value.is_empty() {
        return "unset".into();
    }
    value.chars().take(MAX_LABEL_LEN).collect()
}
