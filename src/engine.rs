use crate::inference::{run_cancellable, Inference};
use crate::matcher::{match_lines, split_lines};
use crate::prompt::{build_prompt, DomainKnowledge, PromptPayload};
use crate::report::{assemble, AnalysisReport};
use crate::snapshot::PatternSnapshot;
use crate::store::{fetch_snapshot, PatternStore};
use crate::window::WindowSelector;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("no log content provided")]
    NoLogContent,
}

/// Runs one analysis per call: snapshot, match, window, prompt, inference,
/// report. Nothing is kept between calls.
pub struct LogAnalyzer {
    store: Box<dyn PatternStore>,
    inference: Box<dyn Inference>,
    window: WindowSelector,
    knowledge: DomainKnowledge,
}

impl LogAnalyzer {
    pub fn new(store: Box<dyn PatternStore>, inference: Box<dyn Inference>) -> Self {
        Self { store, inference, window: WindowSelector::default(), knowledge: DomainKnowledge::default() }
    }

    pub fn with_window(mut self, window: WindowSelector) -> Self {
        self.window = window;
        self
    }

    pub fn with_knowledge(mut self, knowledge: DomainKnowledge) -> Self {
        self.knowledge = knowledge;
        self
    }

    /// Builds the payload that `analyze` would send, without calling inference.
    pub async fn prepare_prompt(&self, log: &str, user_context: Option<&str>) -> Result<PromptPayload, AnalysisError> {
        if log.is_empty() { return Err(AnalysisError::NoLogContent); }
        let snapshot = fetch_snapshot(self.store.as_ref()).await;
        let excerpt = self.window.select(log);
        Ok(build_prompt(&self.knowledge, &excerpt, &snapshot, user_context))
    }

    pub async fn analyze(&self, log: &str, user_context: Option<&str>) -> Result<AnalysisReport, AnalysisError> {
        self.analyze_with_cancel(log, user_context, &CancellationToken::new()).await
    }

    /// Only an empty log is an error. Store and inference failures degrade
    /// their own part of the report. Cancelling while the snapshot is being
    /// taken proceeds without known patterns.
    pub async fn analyze_with_cancel(
        &self,
        log: &str,
        user_context: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<AnalysisReport, AnalysisError> {
        if log.is_empty() { return Err(AnalysisError::NoLogContent); }

        let snapshot = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("cancelled while reading patterns; continuing without known patterns");
                PatternSnapshot::empty()
            }
            s = fetch_snapshot(self.store.as_ref()) => s,
        };
        Ok(self.analyze_snapshot(log, user_context, &snapshot, cancel).await)
    }

    /// Analysis against an already-taken snapshot.
    pub async fn analyze_snapshot(
        &self,
        log: &str,
        user_context: Option<&str>,
        snapshot: &PatternSnapshot,
        cancel: &CancellationToken,
    ) -> AnalysisReport {
        let lines = split_lines(log);
        let matches = match_lines(&lines, snapshot);
        info!(lines = lines.len(), patterns = snapshot.len(), matches = matches.len(), "pattern pass done");

        let excerpt = self.window.select(log);
        debug!(chars = excerpt.text.chars().count(), truncated = excerpt.truncated, "excerpt selected");

        let payload = build_prompt(&self.knowledge, &excerpt, snapshot, user_context);
        let ai = run_cancellable(self.inference.as_ref(), &payload, cancel).await;
        if let Err(e) = &ai {
            warn!(backend = self.inference.name(), error = %e, "inference failed; reporting inline");
        }

        assemble(&self.knowledge.title, matches, ai, excerpt.truncated)
    }
}
