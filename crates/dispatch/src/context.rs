//! Business context fetcher: a cached, guarded front for a [`ContextSource`].

use std::sync::Arc;
use std::time::Duration;

use switchyard_config::ContextConfig;
use switchyard_core::{ContextSource, TenantId};
use switchyard_resilience::{RetryPolicy, TtlCache, Unguarded};
use switchyard_telemetry::{ContextFetchOutcome, Metrics};
use tracing::{debug, warn};

/// Tenants tracked by the failure guard at once.
const GUARD_ENTRIES: usize = 1000;

/// Resolves a tenant's business context, or `None` when there is none to use.
///
/// Lookups are answered from a TTL cache first. Successful answers are cached
/// even when empty, so tenants without context cost one remote call per TTL.
/// Each tenant has a failure counter that expires after the configured reset
/// window; once it reaches the threshold, lookups for that tenant return
/// `None` without touching the network until the window passes.
pub struct ContextFetcher {
    source: Arc<dyn ContextSource>,
    cache: TtlCache<TenantId, String>,
    failures: TtlCache<TenantId, u32>,
    failure_threshold: u32,
    retry: RetryPolicy,
    metrics: Option<Arc<Metrics>>,
}

impl ContextFetcher {
    pub fn new(source: Arc<dyn ContextSource>, config: &ContextConfig) -> Self {
        Self {
            source,
            cache: TtlCache::new(
                config.cache_max_entries,
                Duration::from_secs(config.cache_ttl_secs),
            ),
            failures: TtlCache::new(GUARD_ENTRIES, Duration::from_secs(config.failure_reset_secs)),
            failure_threshold: config.failure_threshold.max(1),
            retry: RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.backoff_unit_ms),
                Duration::from_secs(config.timeout_secs),
            ),
            metrics: None,
        }
    }

    pub fn with_telemetry(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn fetch(&self, tenant_id: TenantId) -> Option<String> {
        if let Some(cached) = self.cache.get(&tenant_id) {
            debug!(tenant_id, "Business context served from cache");
            self.record(ContextFetchOutcome::CacheHit);
            return non_empty(cached);
        }

        let failures = self.failures.get(&tenant_id).unwrap_or(0);
        if failures >= self.failure_threshold {
            debug!(tenant_id, failures, "Business context guard open, skipping lookup");
            self.record(ContextFetchOutcome::GuardOpen);
            return None;
        }

        let source = &self.source;
        let result = self
            .retry
            .execute(&Unguarded, |_| async move { source.fetch(tenant_id).await.map(Some) })
            .await;

        match result {
            Ok(context) => {
                self.cache.set(tenant_id, context.clone());
                self.failures.remove(&tenant_id);
                self.record(ContextFetchOutcome::Fetched);
                non_empty(context)
            }
            Err(e) => {
                warn!(tenant_id, attempts = e.attempts(), error = %e, "Business context lookup failed");
                self.record_failure(tenant_id);
                self.record(ContextFetchOutcome::Failed);
                None
            }
        }
    }

    /// [`fetch`](Self::fetch) under an outer deadline. Running out of time
    /// counts against the tenant's guard like any other failure.
    pub async fn fetch_within(&self, tenant_id: TenantId, limit: Duration) -> Option<String> {
        match tokio::time::timeout(limit, self.fetch(tenant_id)).await {
            Ok(context) => context,
            Err(_) => {
                warn!(
                    tenant_id,
                    timeout_ms = limit.as_millis() as u64,
                    "Business context lookup timed out"
                );
                self.record_failure(tenant_id);
                self.record(ContextFetchOutcome::TimedOut);
                None
            }
        }
    }

    /// Bump the tenant's failure counter. Refreshes the reset window.
    pub fn record_failure(&self, tenant_id: TenantId) {
        let failures = self
            .failures
            .update(tenant_id, |current| current.copied().unwrap_or(0).saturating_add(1));
        if failures == self.failure_threshold {
            warn!(
                tenant_id,
                failures,
                reset_secs = self.failures.ttl().as_secs(),
                "Business context guard tripped"
            );
        }
    }

    /// Cached tenants, for diagnostics.
    pub fn cached_tenants(&self) -> usize {
        self.cache.size()
    }

    fn record(&self, outcome: ContextFetchOutcome) {
        if let Some(metrics) = &self.metrics {
            metrics.record_context_fetch(outcome);
        }
    }
}

fn non_empty(context: String) -> Option<String> {
    if context.trim().is_empty() {
        None
    } else {
        Some(context)
    }
}
