use crate::snapshot::{ErrorPattern, PatternSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("pattern store request failed: {0}")]
    Http(String),
    #[error("pattern store returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("failed to read pattern file {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse pattern file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid pattern store configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self { StoreError::Http(e.to_string()) }
}

/// Key/value dictionary of known error substrings.
#[async_trait]
pub trait PatternStore: Send + Sync {
    async fn list(&self) -> Result<Vec<String>, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Every pattern in enumeration order. Keys whose value cannot be read are
    /// skipped; only a failed enumeration is an error.
    async fn fetch_all(&self) -> Result<Vec<ErrorPattern>, StoreError> {
        let keys = self.list().await?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            match self.get(&key).await {
                Ok(Some(interpretation)) => out.push(ErrorPattern { pattern: key, interpretation }),
                Ok(None) => warn!(key = %key, "pattern listed but has no value; skipping"),
                Err(e) => warn!(key = %key, error = %e, "failed to read pattern; skipping"),
            }
        }
        Ok(out)
    }
}

/// Takes the per-analysis snapshot. An unreachable store gives an empty
/// snapshot rather than an error.
pub async fn fetch_snapshot(store: &dyn PatternStore) -> PatternSnapshot {
    match store.fetch_all().await {
        Ok(patterns) => {
            let snapshot = PatternSnapshot::from_patterns(patterns);
            debug!(patterns = snapshot.len(), "pattern snapshot taken");
            snapshot
        }
        Err(e) => {
            warn!(error = %e, "pattern store unavailable; continuing without known patterns");
            PatternSnapshot::empty()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPatternStore {
    patterns: Vec<ErrorPattern>,
}

impl MemoryPatternStore {
    pub fn new() -> Self { Self::default() }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut store = Self::new();
        for (k, v) in pairs { store.insert(k, v); }
        store
    }

    /// Replaces the value of an existing key in place, otherwise appends.
    pub fn insert(&mut self, pattern: impl Into<String>, interpretation: impl Into<String>) {
        let pattern = pattern.into();
        let interpretation = interpretation.into();
        match self.patterns.iter_mut().find(|p| p.pattern == pattern) {
            Some(p) => p.interpretation = interpretation,
            None => self.patterns.push(ErrorPattern { pattern, interpretation }),
        }
    }
}

#[async_trait]
impl PatternStore for MemoryPatternStore {
    async fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.patterns.iter().map(|p| p.pattern.clone()).collect())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.patterns.iter().find(|p| p.pattern == key).map(|p| p.interpretation.clone()))
    }

    async fn fetch_all(&self) -> Result<Vec<ErrorPattern>, StoreError> {
        Ok(self.patterns.clone())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PatternFile {
    #[serde(default, rename = "pattern")]
    pub patterns: Vec<ErrorPattern>,
}

impl PatternFile {
    pub fn parse(text: &str, path: &Path) -> Result<Self, StoreError> {
        toml::from_str(text).map_err(|e| StoreError::Parse { path: path.to_path_buf(), message: e.to_string() })
    }
}

/// TOML file of `[[pattern]]` tables, re-read on every fetch so edits are
/// picked up by the next analysis.
#[derive(Debug, Clone)]
pub struct FilePatternStore {
    path: PathBuf,
}

impl FilePatternStore {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    pub fn path(&self) -> &Path { &self.path }

    async fn load(&self) -> Result<PatternFile, StoreError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| StoreError::Io { path: self.path.clone(), source })?;
        PatternFile::parse(&text, &self.path)
    }
}

#[async_trait]
impl PatternStore for FilePatternStore {
    async fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.load().await?.patterns.into_iter().map(|p| p.pattern).collect())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .load()
            .await?
            .patterns
            .into_iter()
            .find(|p| p.pattern == key)
            .map(|p| p.interpretation))
    }

    // one read instead of one per key
    async fn fetch_all(&self) -> Result<Vec<ErrorPattern>, StoreError> {
        Ok(self.load().await?.patterns)
    }
}
