use crate::engine::LogAnalyzer;
use crate::inference::{DisabledInference, Inference};
use crate::kv::WorkersKvStore;
use crate::openai_compat::OpenAiCompatClient;
use crate::prompt::DomainKnowledge;
use crate::store::{FilePatternStore, MemoryPatternStore, PatternStore};
use crate::window::{WindowPolicy, WindowSelector, DEFAULT_ANCHOR, DEFAULT_BUDGET, TRUNCATION_MARKER};
use crate::workers_ai::WorkersAiClient;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub store: StoreConfig,
    pub inference: InferenceConfig,
    pub domain: DomainConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowPolicyKind {
    #[default]
    Anchored,
    Prefix,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub policy: WindowPolicyKind,
    pub anchor: String,
    pub budget: usize,
    pub truncation_marker: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            policy: WindowPolicyKind::Anchored,
            anchor: DEFAULT_ANCHOR.to_string(),
            budget: DEFAULT_BUDGET,
            truncation_marker: TRUNCATION_MARKER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreKind {
    #[default]
    None,
    File,
    WorkersKv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub path: Option<PathBuf>,
    pub account_id: Option<String>,
    pub namespace_id: Option<String>,
    pub api_token_env: String,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::None,
            path: None,
            account_id: None,
            namespace_id: None,
            api_token_env: "CLOUDFLARE_API_TOKEN".to_string(),
            base_url: None,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InferenceBackend {
    #[default]
    WorkersAi,
    OpenaiCompat,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub backend: InferenceBackend,
    pub model: Option<String>,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub base_url: Option<String>,
    pub account_id: Option<String>,
    pub api_token_env: String,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            backend: InferenceBackend::WorkersAi,
            model: None,
            max_tokens: crate::workers_ai::DEFAULT_MAX_TOKENS,
            timeout_secs: 60,
            base_url: None,
            account_id: None,
            api_token_env: "CLOUDFLARE_API_TOKEN".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    pub title: Option<String>,
    pub assistant_role: Option<String>,
    pub preamble_file: Option<PathBuf>,
    pub instructions_file: Option<PathBuf>,
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })
}

impl Config {
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse { path: path.to_path_buf(), message: e.to_string() })
    }

    /// No path means built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::parse(&read_file(p)?, p),
            None => Ok(Self::default()),
        }
    }

    pub fn window_selector(&self) -> Result<WindowSelector, ConfigError> {
        let w = &self.window;
        if w.budget == 0 {
            return Err(ConfigError::Invalid("window.budget must be greater than zero".into()));
        }
        let policy = match w.policy {
            WindowPolicyKind::Anchored => {
                if w.anchor.is_empty() {
                    return Err(ConfigError::Invalid("window.anchor must not be empty".into()));
                }
                WindowPolicy::Anchored { anchor: w.anchor.clone() }
            }
            WindowPolicyKind::Prefix => WindowPolicy::Prefix,
        };
        Ok(WindowSelector { policy, budget: w.budget, truncation_marker: w.truncation_marker.clone() })
    }

    pub fn domain_knowledge(&self) -> Result<DomainKnowledge, ConfigError> {
        let mut k = DomainKnowledge::default();
        let d = &self.domain;
        if let Some(t) = &d.title { k.title = t.clone(); }
        if let Some(r) = &d.assistant_role { k.assistant_role = r.clone(); }
        if let Some(p) = &d.preamble_file { k.preamble = read_file(p)?; }
        if let Some(p) = &d.instructions_file { k.instructions = read_file(p)?; }
        Ok(k)
    }

    pub fn pattern_store<F>(&self, env: F) -> Result<Box<dyn PatternStore>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let s = &self.store;
        match s.kind {
            StoreKind::None => Ok(Box::new(MemoryPatternStore::new())),
            StoreKind::File => {
                let path = s.path.clone().ok_or_else(|| ConfigError::Invalid("store.path is required for a file store".into()))?;
                Ok(Box::new(FilePatternStore::new(path)))
            }
            StoreKind::WorkersKv => {
                let account = s.account_id.as_deref().ok_or_else(|| ConfigError::Invalid("store.account_id is required".into()))?;
                let namespace = s.namespace_id.as_deref().ok_or_else(|| ConfigError::Invalid("store.namespace_id is required".into()))?;
                let token = env(&s.api_token_env)
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| ConfigError::Invalid(format!("environment variable {} is not set", s.api_token_env)))?;
                let mut kv = WorkersKvStore::new(account, namespace, &token, Duration::from_secs(s.timeout_secs))
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?;
                if let Some(base) = &s.base_url { kv = kv.with_base_url(base); }
                Ok(Box::new(kv))
            }
        }
    }

    /// A missing credential yields a disabled backend instead of an error, so
    /// the report still carries the known-pattern section.
    pub fn inference<F>(&self, env: F) -> Result<Box<dyn Inference>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let c = &self.inference;
        let timeout = Duration::from_secs(c.timeout_secs);
        let token = env(&c.api_token_env).filter(|t| !t.is_empty());
        match c.backend {
            InferenceBackend::Disabled => Ok(Box::new(DisabledInference::new("inference backend is disabled"))),
            InferenceBackend::WorkersAi => {
                let Some(account) = c.account_id.as_deref() else {
                    return Ok(Box::new(DisabledInference::new("inference.account_id is not set")));
                };
                let Some(token) = token else {
                    return Ok(Box::new(DisabledInference::new(format!("environment variable {} is not set", c.api_token_env))));
                };
                let mut client = WorkersAiClient::new(account, &token, timeout)
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?
                    .with_max_tokens(c.max_tokens);
                if let Some(m) = &c.model { client = client.with_model(m); }
                if let Some(b) = &c.base_url { client = client.with_base_url(b); }
                Ok(Box::new(client))
            }
            InferenceBackend::OpenaiCompat => {
                let mut client = OpenAiCompatClient::new(token.as_deref().unwrap_or_default(), timeout)
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?
                    .with_max_tokens(c.max_tokens);
                if let Some(m) = &c.model { client = client.with_model(m); }
                if let Some(b) = &c.base_url { client = client.with_base_url(b); }
                Ok(Box::new(client))
            }
        }
    }

    /// `patterns_override` replaces the configured store with a pattern file.
    pub fn build_analyzer<F>(&self, patterns_override: Option<&Path>, env: F) -> Result<LogAnalyzer, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store: Box<dyn PatternStore> = match patterns_override {
            Some(p) => Box::new(FilePatternStore::new(p)),
            None => self.pattern_store(&env)?,
        };
        let inference = self.inference(&env)?;
        Ok(LogAnalyzer::new(store, inference)
            .with_window(self.window_selector()?)
            .with_knowledge(self.domain_knowledge()?))
    }
}
