use serde::{Deserialize, Serialize};

/// Marks the start of the most recent connection attempt in a client log.
pub const DEFAULT_ANCHOR: &str = "Initiate WARP connection protocol";
pub const DEFAULT_BUDGET: usize = 10_000;
pub const TRUNCATION_MARKER: &str = "\n... [truncated]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Excerpt {
    pub text: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowPolicy {
    /// Start at the last occurrence of `anchor`; fall back to the log's tail.
    Anchored { anchor: String },
    /// First `budget` characters of the whole log.
    Prefix,
}

impl Default for WindowPolicy {
    fn default() -> Self { WindowPolicy::Anchored { anchor: DEFAULT_ANCHOR.to_string() } }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSelector {
    pub policy: WindowPolicy,
    /// Budget in characters, not bytes.
    pub budget: usize,
    pub truncation_marker: String,
}

impl Default for WindowSelector {
    fn default() -> Self {
        Self {
            policy: WindowPolicy::default(),
            budget: DEFAULT_BUDGET,
            truncation_marker: TRUNCATION_MARKER.to_string(),
        }
    }
}

impl WindowSelector {
    pub fn anchored(anchor: impl Into<String>, budget: usize) -> Self {
        Self { policy: WindowPolicy::Anchored { anchor: anchor.into() }, budget, ..Default::default() }
    }

    pub fn prefix(budget: usize) -> Self {
        Self { policy: WindowPolicy::Prefix, budget, ..Default::default() }
    }

    pub fn select(&self, log: &str) -> Excerpt {
        let candidate = match &self.policy {
            WindowPolicy::Anchored { anchor } if !anchor.is_empty() => match log.rfind(anchor.as_str()) {
                Some(pos) => &log[pos..],
                None => char_suffix(log, self.budget),
            },
            WindowPolicy::Anchored { .. } => char_suffix(log, self.budget),
            WindowPolicy::Prefix => log,
        };
        self.bound(candidate)
    }

    fn bound(&self, candidate: &str) -> Excerpt {
        let head = char_prefix(candidate, self.budget);
        if head.len() == candidate.len() {
            return Excerpt { text: candidate.to_string(), truncated: false };
        }
        let mut text = String::with_capacity(head.len() + self.truncation_marker.len());
        text.push_str(head);
        text.push_str(&self.truncation_marker);
        Excerpt { text, truncated: true }
    }
}

/// Longest prefix of `s` holding at most `n` characters.
pub fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Longest suffix of `s` holding at most `n` characters.
pub fn char_suffix(s: &str, n: usize) -> &str {
    if n == 0 { return &s[s.len()..]; }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
