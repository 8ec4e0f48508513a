//! Per-destination circuit breaker.
//!
//! ```text
//!            failures >= threshold
//!   Closed ───────────────────────► Open
//!     ▲                              │ reset_timeout elapsed,
//!     │ trial succeeds               │ first caller only
//!     │                              ▼
//!     └────────────────────────── HalfOpen ──► Open (trial fails)
//! ```
//!
//! While HalfOpen exactly one trial is outstanding; every other caller is
//! refused until that trial reports back.
//!
//! Every admission carries the epoch it was granted in, and each state
//! transition starts a new epoch. Outcomes from an older epoch are ignored,
//! so an attempt admitted while Closed cannot settle a later trial.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Ticket for one admitted attempt, handed back with its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Admission {
    epoch: u64,
}

/// Anything that can admit or refuse an attempt and learn from its outcome.
pub trait AdmissionGate: Send + Sync {
    /// `None` refuses the attempt.
    fn can_attempt(&self) -> Option<Admission>;
    fn record_success(&self, admission: Admission);
    fn record_failure(&self, admission: Admission);

    /// The admitted attempt was dropped before it reported an outcome.
    fn abandon_trial(&self, _admission: Admission) {}

    /// Whether a retry could be admitted right now. `false` once the gate has
    /// opened, so callers can stop instead of backing off first.
    fn is_closed(&self) -> bool {
        true
    }
}

/// A gate that admits everything and remembers nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unguarded;

impl AdmissionGate for Unguarded {
    fn can_attempt(&self) -> Option<Admission> {
        Some(Admission::default())
    }
    fn record_success(&self, _admission: Admission) {}
    fn record_failure(&self, _admission: Admission) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Read-only view of a breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub failure_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secs_since_last_failure: Option<u64>,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    epoch: u64,
}

impl Inner {
    fn transition(&mut self, to: BreakerState) {
        self.state = to;
        self.epoch = self.epoch.wrapping_add(1);
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure_at: None,
                epoch: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get_state(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            secs_since_last_failure: inner
                .last_failure_at
                .map(|at| Instant::now().saturating_duration_since(at).as_secs()),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }
}

impl AdmissionGate for CircuitBreaker {
    fn can_attempt(&self) -> Option<Admission> {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => Some(Admission { epoch: inner.epoch }),
            BreakerState::HalfOpen => None,
            BreakerState::Open => {
                let cooled = inner
                    .last_failure_at
                    .is_none_or(|at| Instant::now().saturating_duration_since(at) >= self.reset_timeout);
                if !cooled {
                    return None;
                }
                inner.transition(BreakerState::HalfOpen);
                info!(breaker = %self.name, "Circuit half-open, admitting one trial");
                Some(Admission { epoch: inner.epoch })
            }
        }
    }

    fn record_success(&self, admission: Admission) {
        let mut inner = self.lock();
        if admission.epoch != inner.epoch {
            debug!(breaker = %self.name, "Ignoring success from a stale attempt");
            return;
        }
        if inner.state != BreakerState::Closed {
            inner.transition(BreakerState::Closed);
            info!(breaker = %self.name, "Circuit closed");
        }
        inner.failure_count = 0;
        inner.last_failure_at = None;
    }

    fn record_failure(&self, admission: Admission) {
        let mut inner = self.lock();
        if admission.epoch != inner.epoch {
            debug!(breaker = %self.name, "Ignoring failure from a stale attempt");
            return;
        }
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_at = Some(Instant::now());

        match inner.state {
            BreakerState::HalfOpen => {
                inner.transition(BreakerState::Open);
                warn!(breaker = %self.name, failure_count = inner.failure_count, "Trial failed, circuit re-opened");
            }
            BreakerState::Closed if inner.failure_count >= self.failure_threshold => {
                inner.transition(BreakerState::Open);
                warn!(
                    breaker = %self.name,
                    failure_count = inner.failure_count,
                    threshold = self.failure_threshold,
                    "Circuit opened"
                );
            }
            _ => {}
        }
    }

    fn abandon_trial(&self, admission: Admission) {
        let mut inner = self.lock();
        if admission.epoch == inner.epoch && inner.state == BreakerState::HalfOpen {
            inner.transition(BreakerState::Open);
            inner.last_failure_at = Some(Instant::now());
            warn!(breaker = %self.name, "Trial abandoned, circuit re-opened");
        }
    }

    fn is_closed(&self) -> bool {
        self.lock().state == BreakerState::Closed
    }
}

/// Lazily created breakers, one per destination name, kept for the process lifetime.
#[derive(Debug)]
pub struct BreakerRegistry {
    failure_threshold: u32,
    reset_timeout: Duration,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// The breaker for `name`, created on first use.
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(breaker) = breakers.get(name) {
            return breaker.clone();
        }
        let breaker = Arc::new(CircuitBreaker::new(
            name,
            self.failure_threshold,
            self.reset_timeout,
        ));
        breakers.insert(name.to_string(), breaker.clone());
        breaker
    }

    /// State of every breaker created so far, ordered by name.
    pub fn snapshot(&self) -> BTreeMap<String, BreakerSnapshot> {
        let breakers: Vec<Arc<CircuitBreaker>> = self
            .breakers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        breakers
            .into_iter()
            .map(|b| (b.name().to_string(), b.get_state()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("sales", 3, Duration::from_secs(60))
    }

    fn admit(b: &CircuitBreaker) -> Admission {
        b.can_attempt().expect("breaker refused")
    }

    fn fail(b: &CircuitBreaker) {
        b.record_failure(admit(b));
    }

    fn trip(b: &CircuitBreaker) {
        for _ in 0..3 {
            fail(b);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn opens_after_threshold_failures() {
        let b = breaker();
        fail(&b);
        fail(&b);
        assert!(b.can_attempt().is_some());
        assert_eq!(b.state(), BreakerState::Closed);

        fail(&b);
        assert_eq!(b.state(), BreakerState::Open);
        assert!(b.can_attempt().is_none());
        assert_eq!(b.get_state().failure_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stays_open_until_reset_timeout() {
        let b = breaker();
        trip(&b);
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(b.can_attempt().is_none());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(b.can_attempt().is_some());
        assert_eq!(b.state(), BreakerState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_admits_exactly_one_trial() {
        let b = Arc::new(breaker());
        trip(&b);
        tokio::time::advance(Duration::from_secs(60)).await;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let b = b.clone();
                tokio::spawn(async move { b.can_attempt() })
            })
            .collect();
        let admitted = futures::future::join_all(handles)
            .await
            .into_iter()
            .filter(|r| r.as_ref().unwrap().is_some())
            .count();
        assert_eq!(admitted, 1);
        assert!(b.can_attempt().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn successful_trial_closes_and_resets() {
        let b = breaker();
        trip(&b);
        tokio::time::advance(Duration::from_secs(60)).await;
        let trial = admit(&b);
        b.record_success(trial);

        let snap = b.get_state();
        assert_eq!(snap.state, BreakerState::Closed);
        assert_eq!(snap.failure_count, 0);
        assert!(b.can_attempt().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_trial_reopens() {
        let b = breaker();
        trip(&b);
        tokio::time::advance(Duration::from_secs(60)).await;
        let trial = admit(&b);
        b.record_failure(trial);

        assert_eq!(b.state(), BreakerState::Open);
        assert!(b.can_attempt().is_none());
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(b.can_attempt().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_trial_reopens() {
        let b = breaker();
        trip(&b);
        tokio::time::advance(Duration::from_secs(60)).await;
        let trial = admit(&b);
        b.abandon_trial(trial);
        assert_eq!(b.state(), BreakerState::Open);
        assert!(b.can_attempt().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn outcomes_from_before_opening_do_not_settle_the_trial() {
        let b = CircuitBreaker::new("sales", 1, Duration::from_secs(10));
        let early_success = admit(&b);
        let early_failure = admit(&b);
        fail(&b);
        assert_eq!(b.state(), BreakerState::Open);

        tokio::time::advance(Duration::from_secs(10)).await;
        let trial = admit(&b);
        assert_eq!(b.state(), BreakerState::HalfOpen);

        b.record_success(early_success);
        b.record_failure(early_failure);
        b.abandon_trial(early_success);
        assert_eq!(b.state(), BreakerState::HalfOpen);
        assert!(b.can_attempt().is_none());

        b.record_success(trial);
        assert_eq!(b.state(), BreakerState::Closed);
        assert!(b.can_attempt().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoning_a_closed_attempt_changes_nothing() {
        let b = breaker();
        let attempt = admit(&b);
        b.abandon_trial(attempt);
        assert_eq!(b.state(), BreakerState::Closed);
        assert_eq!(b.get_state().failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn success_in_closed_resets_count() {
        let b = breaker();
        fail(&b);
        fail(&b);
        b.record_success(admit(&b));
        fail(&b);
        assert_eq!(b.state(), BreakerState::Closed);
        assert_eq!(b.get_state().failure_count, 1);
    }

    #[test]
    fn registry_reuses_breakers() {
        let registry = BreakerRegistry::new(2, Duration::from_secs(60));
        let a = registry.get("booking");
        fail(&a);
        fail(&a);

        let again = registry.get("booking");
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(again.state(), BreakerState::Open);

        registry.get("sales");
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["booking"].state, BreakerState::Open);
        assert_eq!(snapshot["sales"].state, BreakerState::Closed);
    }

    #[test]
    fn snapshot_serializes_snake_case() {
        let snap = BreakerSnapshot {
            state: BreakerState::HalfOpen,
            failure_count: 2,
            secs_since_last_failure: None,
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json, serde_json::json!({"state": "half_open", "failure_count": 2}));
    }
}
