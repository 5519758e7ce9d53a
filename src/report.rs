use crate::inference::InferenceError;
use crate::matcher::MatchResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;

/// Splits the rendered report into its two sections. Downstream consumers
/// rely on this exact string.
pub const AI_SECTION_MARKER: &str = "## Insights from AI";
pub const KNOWN_SECTION_HEADER: &str = "## Interpretations from Known Patterns";
pub const AI_ERROR_PREFIX: &str = "Error getting AI insights: ";

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub title: String,
    pub matches: MatchResult,
    pub ai_insights: String,
    pub inference_failed: bool,
    pub excerpt_truncated: bool,
    pub generated_at: DateTime<Utc>,
}

pub fn inference_failure_message(err: &InferenceError) -> String {
    format!("{AI_ERROR_PREFIX}{err}")
}

pub fn assemble(
    title: &str,
    matches: MatchResult,
    ai_result: Result<String, InferenceError>,
    excerpt_truncated: bool,
) -> AnalysisReport {
    let (ai_insights, inference_failed) = match ai_result {
        Ok(text) => (text, false),
        Err(e) => (inference_failure_message(&e), true),
    };
    AnalysisReport {
        title: title.to_string(),
        matches,
        ai_insights,
        inference_failed,
        excerpt_truncated,
        generated_at: Utc::now(),
    }
}

impl AnalysisReport {
    /// Header plus the known-pattern section, up to (not including) the marker.
    pub fn render_known_section(&self) -> String {
        let mut out = format!("# {}\n\n{KNOWN_SECTION_HEADER}\n\n", self.title);
        for rec in &self.matches {
            let _ = write!(out, "Log: {}\nInterpretation: {}\n\n", rec.line.trim(), rec.interpretation);
        }
        out
    }

    pub fn render(&self) -> String {
        let mut out = self.render_known_section();
        out.push_str(AI_SECTION_MARKER);
        out.push_str("\n\n");
        out.push_str(&self.ai_insights);
        out
    }
}

impl std::fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSections<'a> {
    pub known: &'a str,
    pub ai: Option<&'a str>,
}

/// Splits a rendered report at the first marker. The known-pattern body has
/// its section header removed; both bodies are trimmed of surrounding blank
/// lines.
pub fn split_sections(rendered: &str) -> ReportSections<'_> {
    let (head, ai) = match rendered.split_once(AI_SECTION_MARKER) {
        Some((h, a)) => (h, Some(a.trim_matches('\n'))),
        None => (rendered, None),
    };
    let known = match head.find(KNOWN_SECTION_HEADER) {
        Some(pos) => &head[pos + KNOWN_SECTION_HEADER.len()..],
        None => head,
    };
    ReportSections { known: known.trim_matches('\n'), ai }
}
