use ahash::AHashSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPattern {
    pub pattern: String,
    pub interpretation: String,
}

impl ErrorPattern {
    pub fn new(pattern: impl Into<String>, interpretation: impl Into<String>) -> Self {
        Self { pattern: pattern.into(), interpretation: interpretation.into() }
    }
}

/// Read-only view of the pattern store taken once per analysis.
///
/// Order is the store's enumeration order and decides which pattern wins
/// when a line contains several of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSnapshot {
    patterns: Vec<ErrorPattern>,
}

impl PatternSnapshot {
    pub fn empty() -> Self { Self::default() }

    /// Builds a snapshot, dropping empty keys and repeated keys (first one wins).
    pub fn from_patterns<I>(patterns: I) -> Self
    where
        I: IntoIterator<Item = ErrorPattern>,
    {
        let mut seen: AHashSet<String> = AHashSet::new();
        let mut out = Vec::new();
        for p in patterns {
            // an empty substring would match every line
            if p.pattern.is_empty() { continue; }
            if !seen.insert(p.pattern.clone()) { continue; }
            out.push(p);
        }
        Self { patterns: out }
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::from_patterns(pairs.into_iter().map(|(k, v)| ErrorPattern::new(k, v)))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ErrorPattern> { self.patterns.iter() }

    pub fn len(&self) -> usize { self.patterns.len() }

    pub fn is_empty(&self) -> bool { self.patterns.is_empty() }

    pub fn at(&self, index: usize) -> Option<&ErrorPattern> { self.patterns.get(index) }

    pub fn get(&self, pattern: &str) -> Option<&ErrorPattern> {
        self.patterns.iter().find(|p| p.pattern == pattern)
    }
}

impl<'a> IntoIterator for &'a PatternSnapshot {
    type Item = &'a ErrorPattern;
    type IntoIter = std::slice::Iter<'a, ErrorPattern>;

    fn into_iter(self) -> Self::IntoIter { self.patterns.iter() }
}
