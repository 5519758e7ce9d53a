use crate::inference::{Inference, InferenceError};
use crate::prompt::{ChatMessage, PromptPayload};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";
pub const DEFAULT_MODEL: &str = "@cf/mistral/mistral-7b-instruct-v0.2-lora";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    messages: &'a [ChatMessage],
    max_tokens: u32,
}

#[derive(Debug, Default, Deserialize)]
struct RunResult {
    #[serde(default)]
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiMessage {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct RunEnvelope {
    #[serde(default)]
    result: Option<RunResult>,
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

fn default_success() -> bool { true }

pub(crate) fn join_api_messages(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "request was not successful".to_string();
    }
    errors
        .iter()
        .map(|e| match e.code {
            Some(code) => format!("{} (code {code})", e.message),
            None => e.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Cloudflare Workers AI `ai/run` endpoint.
pub struct WorkersAiClient {
    client: Client,
    base_url: String,
    account_id: String,
    api_token: String,
    model: String,
    max_tokens: u32,
}

impl WorkersAiClient {
    pub fn new(account_id: &str, api_token: &str, timeout: Duration) -> Result<Self, InferenceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            account_id: account_id.to_string(),
            api_token: api_token.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    // Model ids contain '/' and '@' and are sent unescaped.
    fn run_url(&self) -> String {
        format!("{}/accounts/{}/ai/run/{}", self.base_url, self.account_id, self.model)
    }
}

#[async_trait]
impl Inference for WorkersAiClient {
    fn name(&self) -> &'static str { "workers-ai" }

    async fn run(&self, payload: &PromptPayload) -> Result<String, InferenceError> {
        let url = self.run_url();
        debug!(model = %self.model, messages = payload.messages.len(), "workers ai request");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&RunRequest { messages: &payload.messages, max_tokens: self.max_tokens })
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        let envelope: Option<RunEnvelope> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let message = match &envelope {
                Some(env) if !env.errors.is_empty() => join_api_messages(&env.errors),
                _ => body,
            };
            return Err(InferenceError::Status { status: status.as_u16(), message });
        }

        let envelope = envelope.ok_or_else(|| InferenceError::InvalidResponse(body.clone()))?;
        if !envelope.success {
            return Err(InferenceError::Api(join_api_messages(&envelope.errors)));
        }
        envelope
            .result
            .and_then(|r| r.response)
            .ok_or_else(|| InferenceError::InvalidResponse("missing result.response".to_string()))
    }
}
