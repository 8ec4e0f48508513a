//! HTTP lookup of a tenant's business context.
//!
//! The endpoint is a legacy operations API: every call is a POST naming the
//! operation in `codOpe`, and the answer carries a `success` flag.

use async_trait::async_trait;
use serde::Deserialize;
use switchyard_core::{ContextError, ContextSource, TenantId};
use tracing::debug;

const OPERATION: &str = "OBTENER_CONTEXTO_NEGOCIO";

pub struct HttpContextSource {
    endpoint: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl HttpContextSource {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            endpoint: endpoint.into(),
            timeout_secs,
            client,
        }
    }

    fn map_error(&self, e: reqwest::Error) -> ContextError {
        if e.is_timeout() {
            ContextError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else if e.is_decode() {
            ContextError::Decode(e.to_string())
        } else {
            ContextError::Network(e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContextResponse {
    #[serde(default)]
    success: bool,
    #[serde(default, alias = "business_context")]
    contexto_negocio: Option<String>,
}

#[async_trait]
impl ContextSource for HttpContextSource {
    async fn fetch(&self, tenant_id: TenantId) -> Result<String, ContextError> {
        let body = serde_json::json!({ "codOpe": OPERATION, "id_empresa": tenant_id });

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContextError::Status(status.as_u16()));
        }

        let parsed: ContextResponse = response.json().await.map_err(|e| self.map_error(e))?;
        if !parsed.success {
            return Err(ContextError::Rejected);
        }

        let context = parsed.contexto_negocio.unwrap_or_default();
        debug!(tenant_id, empty = context.trim().is_empty(), "Business context fetched");
        Ok(context)
    }
}
