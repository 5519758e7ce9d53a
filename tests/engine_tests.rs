use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use warpscope::inference::{Inference, InferenceError};
use warpscope::prompt::PromptPayload;
use warpscope::store::{MemoryPatternStore, PatternStore, StoreError};
use warpscope::window::WindowSelector;
use warpscope::{AnalysisError, LogAnalyzer};

struct Canned {
    reply: Result<String, String>,
    seen: Arc<Mutex<Vec<PromptPayload>>>,
}

#[async_trait]
impl Inference for Canned {
    fn name(&self) -> &'static str { "canned" }

    async fn run(&self, payload: &PromptPayload) -> Result<String, InferenceError> {
        self.seen.lock().unwrap().push(payload.clone());
        self.reply.clone().map_err(InferenceError::Api)
    }
}

struct Hangs;

#[async_trait]
impl Inference for Hangs {
    fn name(&self) -> &'static str { "hangs" }

    async fn run(&self, _payload: &PromptPayload) -> Result<String, InferenceError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("never".into())
    }
}

struct Unreachable;

#[async_trait]
impl PatternStore for Unreachable {
    async fn list(&self) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Http("connection refused".into()))
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Http("connection refused".into()))
    }
}

/// Lists a key whose value cannot be read.
struct Flaky;

#[async_trait]
impl PatternStore for Flaky {
    async fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(vec!["broken".into(), "error1".into(), "gone".into()])
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match key {
            "error1" => Ok(Some("E1 means X".into())),
            "gone" => Ok(None),
            _ => Err(StoreError::Status { status: 500, message: "boom".into() }),
        }
    }
}

struct SlowStore;

#[async_trait]
impl PatternStore for SlowStore {
    async fn list(&self) -> Result<Vec<String>, StoreError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(vec![])
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> { Ok(None) }
}

/// Serves a different pattern set on every enumeration.
struct Shifting {
    lists: Arc<AtomicUsize>,
}

#[async_trait]
impl PatternStore for Shifting {
    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let n = self.lists.fetch_add(1, Ordering::SeqCst);
        Ok(vec![if n == 0 { "error1".into() } else { "warn".into() }])
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(Some(format!("{key} explained")))
    }
}

const LOG: &str = "a error1 b\nInitiate WARP connection protocol\nc warn d";

fn canned(reply: Result<&str, &str>) -> (Box<Canned>, Arc<Mutex<Vec<PromptPayload>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let c = Canned { reply: reply.map(String::from).map_err(String::from), seen: seen.clone() };
    (Box::new(c), seen)
}

#[tokio::test]
async fn end_to_end_report_with_stub_inference() {
    let store = MemoryPatternStore::from_pairs([("error1", "E1 means X")]);
    let (ai, seen) = canned(Ok("AI says fine"));
    let analyzer = LogAnalyzer::new(Box::new(store), ai).with_window(WindowSelector::anchored("Initiate WARP connection protocol", 42));

    let report = analyzer.analyze(LOG, Some("cannot connect")).await.unwrap();
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches.get("error1").unwrap().line, "a error1 b");
    assert_eq!(report.ai_insights, "AI says fine");
    assert!(report.render().contains("Log: a error1 b\nInterpretation: E1 means X"));

    let payloads = seen.lock().unwrap();
    assert_eq!(payloads.len(), 1, "exactly one inference call per analysis");
    let user = &payloads[0].messages[1].content;
    assert!(user.contains("Initiate WARP connection protocol\nc warn d"));
    assert!(!user.contains("a error1 b"));
    assert!(user.contains("User-reported issue: cannot connect"));
    assert!(payloads[0].messages[0].content.contains("- error1: E1 means X"));
}

#[tokio::test]
async fn empty_log_is_rejected_before_any_call() {
    let (ai, seen) = canned(Ok("unused"));
    let analyzer = LogAnalyzer::new(Box::new(MemoryPatternStore::new()), ai);
    let err = analyzer.analyze("", None).await.unwrap_err();
    assert_eq!(err, AnalysisError::NoLogContent);
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_store_degrades_to_empty_snapshot() {
    let (ai, seen) = canned(Ok("ok"));
    let analyzer = LogAnalyzer::new(Box::new(Unreachable), ai);
    let report = analyzer.analyze(LOG, None).await.unwrap();
    assert!(report.matches.is_empty());
    assert!(report.render().starts_with(
        "# WARP Log Analysis\n\n## Interpretations from Known Patterns\n\n## Insights from AI"
    ));
    assert!(seen.lock().unwrap()[0].messages[0].content.contains("No known error patterns available."));
}

#[tokio::test]
async fn unreadable_keys_are_skipped() {
    let (ai, _) = canned(Ok("ok"));
    let analyzer = LogAnalyzer::new(Box::new(Flaky), ai);
    let report = analyzer.analyze("gone broken error1", None).await.unwrap();
    assert_eq!(report.matches.patterns(), vec!["error1"]);
}

#[tokio::test]
async fn inference_failure_is_folded_into_report() {
    let store = MemoryPatternStore::from_pairs([("error1", "E1 means X")]);
    let (ok_ai, _) = canned(Ok("fine"));
    let (bad_ai, _) = canned(Err("model exploded"));
    let ok = LogAnalyzer::new(Box::new(store.clone()), ok_ai).analyze(LOG, None).await.unwrap();
    let bad = LogAnalyzer::new(Box::new(store), bad_ai).analyze(LOG, None).await.unwrap();

    assert_eq!(ok.render_known_section(), bad.render_known_section());
    assert!(bad.inference_failed);
    assert_eq!(bad.ai_insights, "Error getting AI insights: inference service error: model exploded");
}

#[tokio::test]
async fn cancellation_surfaces_as_inference_error() {
    let store = MemoryPatternStore::from_pairs([("error1", "E1 means X")]);
    let analyzer = LogAnalyzer::new(Box::new(store), Box::new(Hangs));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let report = analyzer.analyze_with_cancel(LOG, None, &cancel).await.unwrap();
    assert!(report.inference_failed);
    assert_eq!(report.ai_insights, "Error getting AI insights: inference request was cancelled");
    assert_eq!(report.matches.len(), 1);
}

#[tokio::test]
async fn prepare_prompt_does_not_call_inference() {
    let (ai, seen) = canned(Ok("unused"));
    let analyzer = LogAnalyzer::new(Box::new(MemoryPatternStore::new()), ai);
    let payload = analyzer.prepare_prompt(LOG, None).await.unwrap();
    assert_eq!(payload.messages.len(), 2);
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cancellation_interrupts_a_hung_store() {
    let (ai, seen) = canned(Ok("unused"));
    let analyzer = LogAnalyzer::new(Box::new(SlowStore), ai);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = tokio::time::timeout(Duration::from_millis(500), analyzer.analyze_with_cancel(LOG, None, &cancel))
        .await
        .expect("analysis should stop once cancelled")
        .unwrap();
    assert!(report.matches.is_empty());
    assert!(report.inference_failed);
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn store_is_enumerated_once_per_analysis() {
    let lists = Arc::new(AtomicUsize::new(0));
    let (ai, seen) = canned(Ok("ok"));
    let analyzer = LogAnalyzer::new(Box::new(Shifting { lists: lists.clone() }), ai);

    let report = analyzer.analyze(LOG, None).await.unwrap();
    assert_eq!(lists.load(Ordering::SeqCst), 1);
    assert_eq!(report.matches.patterns(), vec!["error1"]);

    let system = seen.lock().unwrap()[0].messages[0].content.clone();
    assert!(system.contains("- error1: error1 explained"));
    assert!(!system.contains("- warn:"));

    let second = analyzer.analyze(LOG, None).await.unwrap();
    assert_eq!(lists.load(Ordering::SeqCst), 2);
    assert_eq!(second.matches.patterns(), vec!["warn"]);
}
