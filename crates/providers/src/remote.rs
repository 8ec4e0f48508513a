//! Remote capability invoker: one JSON-RPC 2.0 `tools/call` per delegation.
//!
//! Each capability is a tool server at its own URL exposing a `chat` tool
//! that takes `{message, session_id, context}`. Servers may answer with a
//! plain JSON body or a single-event `text/event-stream`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use switchyard_config::DelegationConfig;
use switchyard_core::{
    Capability, CapabilityInvoker, CapabilityOutput, CapabilityRequest, ContentBlock, InvokeError,
    InvokerKind,
};
use tracing::debug;

const TOOL_NAME: &str = "chat";

pub struct RemoteInvoker {
    endpoints: HashMap<Capability, String>,
    timeout_secs: u64,
    next_id: AtomicU64,
    client: reqwest::Client,
}

impl RemoteInvoker {
    pub fn new(timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            endpoints: HashMap::new(),
            timeout_secs,
            next_id: AtomicU64::new(1),
            client,
        }
    }

    /// Only enabled capabilities with a non-empty URL are registered.
    pub fn from_config(config: &DelegationConfig) -> Self {
        let caps = &config.capabilities;
        [
            (Capability::Sales, &caps.sales),
            (Capability::Appointment, &caps.appointment),
            (Capability::Booking, &caps.booking),
        ]
        .into_iter()
        .filter(|(_, endpoint)| endpoint.is_usable())
        .fold(Self::new(config.timeout_secs), |invoker, (cap, endpoint)| {
            invoker.with_endpoint(cap, endpoint.url.clone())
        })
    }

    pub fn with_endpoint(mut self, capability: Capability, url: impl Into<String>) -> Self {
        self.endpoints.insert(capability, url.into());
        self
    }

    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.endpoints.contains_key(&capability)
    }

    fn map_error(&self, e: reqwest::Error) -> InvokeError {
        if e.is_timeout() {
            InvokeError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            InvokeError::Remote(e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Pull the JSON-RPC message out of an event stream: the first `data:`
/// payload that parses as JSON.
fn parse_event_stream(body: &str) -> Option<RpcResponse> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .find_map(|data| serde_json::from_str(data.trim()).ok())
}

/// Map a `tools/call` result into capability output.
fn output_from_result(result: serde_json::Value) -> Result<CapabilityOutput, InvokeError> {
    match result {
        serde_json::Value::String(text) => Ok(CapabilityOutput::PlainText(text)),
        serde_json::Value::Object(mut map) => {
            let is_error = map
                .get("isError")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false);
            let blocks: Vec<ContentBlock> = match map.remove("content") {
                Some(serde_json::Value::String(text)) => vec![ContentBlock::text(text)],
                Some(content @ serde_json::Value::Array(_)) => serde_json::from_value(content)
                    .map_err(|e| InvokeError::Remote(format!("malformed content blocks: {e}")))?,
                _ => Vec::new(),
            };
            let output = CapabilityOutput::Blocks(blocks);
            if is_error {
                return Err(InvokeError::Remote(output.into_text()));
            }
            Ok(output)
        }
        serde_json::Value::Null => Err(InvokeError::Empty),
        other => Err(InvokeError::Remote(format!("unexpected tool result: {other}"))),
    }
}

#[async_trait]
impl CapabilityInvoker for RemoteInvoker {
    fn kind(&self) -> InvokerKind {
        InvokerKind::Remote
    }

    async fn invoke(
        &self,
        capability: Capability,
        request: CapabilityRequest,
    ) -> Result<CapabilityOutput, InvokeError> {
        let url = self
            .endpoints
            .get(&capability)
            .ok_or_else(|| InvokeError::Disabled(capability.to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": {
                "name": TOOL_NAME,
                "arguments": {
                    "message": request.message,
                    "session_id": request.session_id,
                    "context": request.context,
                }
            }
        });

        debug!(capability = %capability, rpc_id = id, "Calling remote capability");

        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json, text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InvokeError::Remote(format!("HTTP {}", status.as_u16())));
        }

        let is_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        let text = response.text().await.map_err(|e| self.map_error(e))?;

        let rpc: RpcResponse = if is_stream {
            parse_event_stream(&text)
                .ok_or_else(|| InvokeError::Remote("no JSON-RPC message in event stream".into()))?
        } else {
            serde_json::from_str(&text)
                .map_err(|e| InvokeError::Remote(format!("invalid JSON-RPC response: {e}")))?
        };

        if let Some(err) = rpc.error {
            return Err(InvokeError::Remote(format!("{} (code {})", err.message, err.code)));
        }
        output_from_result(rpc.result.unwrap_or(serde_json::Value::Null))
    }
}
