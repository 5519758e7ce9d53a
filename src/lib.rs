pub mod snapshot;
pub mod store;
pub mod kv;
pub mod matcher;
pub mod window;
pub mod prompt;
pub mod inference;
pub mod workers_ai;
pub mod openai_compat;
pub mod report;
pub mod engine;
pub mod config;

pub use engine::{AnalysisError, LogAnalyzer};
pub use report::{AnalysisReport, AI_SECTION_MARKER};
