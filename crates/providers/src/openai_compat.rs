//! OpenAI-compatible routing classifier.
//!
//! Sends the system prompt and the customer message to a
//! `/chat/completions` endpoint with a strict JSON-schema response format
//! and parses the reply into a [`Decision`]. Works with OpenAI and any
//! endpoint that honours `response_format: json_schema`.

use async_trait::async_trait;
use serde::Deserialize;
use switchyard_core::{Classifier, ClassifierError, ClassifierRequest, Decision};
use tracing::{debug, warn};

use crate::prompt::build_system_prompt;

pub struct OpenAiCompatClassifier {
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl OpenAiCompatClassifier {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            temperature: 0.4,
            max_tokens: 4096,
            timeout_secs,
            client,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn response_format() -> serde_json::Value {
        serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": "routing_decision",
                "strict": true,
                "schema": {
                    "type": "object",
                    "properties": {
                        "action": { "type": "string", "enum": ["delegate", "respond"] },
                        "capability": {
                            "type": ["string", "null"],
                            "enum": ["sales", "appointment", "booking", null]
                        },
                        "response": { "type": "string" }
                    },
                    "required": ["action", "capability", "response"],
                    "additionalProperties": false
                }
            }
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> ClassifierError {
        if e.is_timeout() {
            ClassifierError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            ClassifierError::Connectivity(e.to_string())
        }
    }
}

/// Parse the assistant message content into a decision.
fn parse_decision(content: Option<&str>) -> Result<Decision, ClassifierError> {
    let content = content
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ClassifierError::MalformedOutput("empty message content".into()))?;
    serde_json::from_str(content).map_err(|e| ClassifierError::MalformedOutput(e.to_string()))
}

#[async_trait]
impl Classifier for OpenAiCompatClassifier {
    fn name(&self) -> &str {
        "openai"
    }

    async fn classify(&self, request: ClassifierRequest) -> Result<Decision, ClassifierError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ClassifierError::NotConfigured("no classifier API key (set OPENAI_API_KEY)".into())
        })?;

        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": build_system_prompt(&request) },
                { "role": "user", "content": request.message },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "response_format": Self::response_format(),
        });

        debug!(model = %self.model, history = request.history.len(), "Sending classification request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(5);
            return Err(ClassifierError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ClassifierError::Authentication(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Classifier returned error");
            return Err(ClassifierError::Api {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.map_send_error(e)
            } else {
                ClassifierError::MalformedOutput(format!("Failed to parse response: {e}"))
            }
        })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ClassifierError::MalformedOutput("No choices in response".into()))?;

        if let Some(refusal) = choice.message.refusal {
            return Err(ClassifierError::MalformedOutput(format!(
                "classifier refused: {refusal}"
            )));
        }

        let decision = parse_decision(choice.message.content.as_deref())?;
        debug!(
            action = ?decision.action,
            capability = ?decision.capability,
            "Classifier decision"
        );
        Ok(decision)
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}
