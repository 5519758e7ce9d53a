use crate::prompt::PromptPayload;
use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference request failed: {0}")]
    Http(String),
    #[error("inference service returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("inference service error: {0}")]
    Api(String),
    #[error("unexpected inference response: {0}")]
    InvalidResponse(String),
    #[error("inference request timed out")]
    Timeout,
    #[error("inference request was cancelled")]
    Cancelled,
    #[error("inference is not configured: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for InferenceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            InferenceError::Timeout
        } else if e.is_decode() {
            InferenceError::InvalidResponse(e.to_string())
        } else {
            InferenceError::Http(e.to_string())
        }
    }
}

/// Text-in/text-out model capability.
#[async_trait]
pub trait Inference: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, payload: &PromptPayload) -> Result<String, InferenceError>;
}

/// Runs `inference` until it finishes or `cancel` fires, whichever is first.
pub async fn run_cancellable(
    inference: &dyn Inference,
    payload: &PromptPayload,
    cancel: &CancellationToken,
) -> Result<String, InferenceError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(InferenceError::Cancelled),
        res = inference.run(payload) => res,
    }
}

/// Stand-in used when no backend is configured; the AI section reports why.
pub struct DisabledInference {
    reason: String,
}

impl DisabledInference {
    pub fn new(reason: impl Into<String>) -> Self { Self { reason: reason.into() } }
}

#[async_trait]
impl Inference for DisabledInference {
    fn name(&self) -> &'static str { "disabled" }

    async fn run(&self, _payload: &PromptPayload) -> Result<String, InferenceError> {
        Err(InferenceError::Unavailable(self.reason.clone()))
    }
}
