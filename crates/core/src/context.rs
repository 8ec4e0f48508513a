//! ContextSource trait: the remote lookup behind the business-context fetcher.

use async_trait::async_trait;

use crate::error::ContextError;
use crate::turn::TenantId;

/// Looks up the business context string for a tenant.
///
/// `Ok("")` means the lookup succeeded and the tenant has no context; the
/// fetcher caches that answer like any other.
#[async_trait]
pub trait ContextSource: Send + Sync {
    async fn fetch(&self, tenant_id: TenantId) -> Result<String, ContextError>;
}
