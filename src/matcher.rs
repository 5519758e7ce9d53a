use crate::snapshot::PatternSnapshot;
use ahash::AHashMap;
use rayon::prelude::*;
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub pattern: String,
    pub line: String,
    pub interpretation: String,
}

/// Pattern -> latest matching line, kept in first-match order.
///
/// Overwriting an existing pattern replaces its record in place, so the
/// position always reflects where the pattern was first seen while the content
/// reflects where it was last seen.
#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    records: Vec<MatchRecord>,
    index: AHashMap<String, usize>,
}

impl MatchResult {
    pub fn new() -> Self { Self::default() }

    pub fn upsert(&mut self, record: MatchRecord) {
        match self.index.get(&record.pattern) {
            Some(&pos) => self.records[pos] = record,
            None => {
                self.index.insert(record.pattern.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    pub fn get(&self, pattern: &str) -> Option<&MatchRecord> {
        self.index.get(pattern).map(|&pos| &self.records[pos])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MatchRecord> { self.records.iter() }

    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    pub fn patterns(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.pattern.as_str()).collect()
    }
}

// the index is derived from `records`
impl PartialEq for MatchResult {
    fn eq(&self, other: &Self) -> bool { self.records == other.records }
}

impl Eq for MatchResult {}

impl<'a> IntoIterator for &'a MatchResult {
    type Item = &'a MatchRecord;
    type IntoIter = std::slice::Iter<'a, MatchRecord>;

    fn into_iter(self) -> Self::IntoIter { self.records.iter() }
}

impl Serialize for MatchResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.records.serialize(serializer)
    }
}

/// Splits raw log text into lines. Only `\n` separates lines; a trailing `\r`
/// stays on the line and is dropped when the report trims it.
pub fn split_lines(log: &str) -> Vec<&str> {
    log.split('\n').collect()
}

/// Index of the first pattern (in snapshot order) contained in `line`.
pub fn first_match(line: &str, snapshot: &PatternSnapshot) -> Option<usize> {
    snapshot.iter().position(|p| line.contains(p.pattern.as_str()))
}

pub fn match_lines<S: AsRef<str> + Sync>(lines: &[S], snapshot: &PatternSnapshot) -> MatchResult {
    let mut out = MatchResult::new();
    if snapshot.is_empty() { return out; }

    // Attribution of each line is independent, so it runs in parallel; the
    // upserts below still happen in line order.
    let hits: Vec<Option<usize>> = lines
        .par_iter()
        .map(|l| first_match(l.as_ref(), snapshot))
        .collect();

    for (line, hit) in lines.iter().zip(hits) {
        if let Some(p) = hit.and_then(|i| snapshot.at(i)) {
            out.upsert(MatchRecord {
                pattern: p.pattern.clone(),
                line: line.as_ref().to_string(),
                interpretation: p.interpretation.clone(),
            });
        }
    }
    out
}
