use serde_json::json;
use std::time::Duration;
use warpscope::inference::{Inference, InferenceError};
use warpscope::kv::WorkersKvStore;
use warpscope::openai_compat::OpenAiCompatClient;
use warpscope::prompt::{build_prompt, DomainKnowledge, PromptPayload};
use warpscope::snapshot::PatternSnapshot;
use warpscope::store::{fetch_snapshot, PatternStore, StoreError};
use warpscope::window::Excerpt;
use warpscope::workers_ai::WorkersAiClient;
use wiremock::matchers::{body_partial_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn payload() -> PromptPayload {
    let ex = Excerpt { text: "Initiate WARP connection protocol\nok".into(), truncated: false };
    build_prompt(&DomainKnowledge::default(), &ex, &PatternSnapshot::empty(), None)
}

fn workers_ai(server: &MockServer) -> WorkersAiClient {
    WorkersAiClient::new("acc", "tok", Duration::from_secs(5))
        .unwrap()
        .with_base_url(&format!("{}/client/v4", server.uri()))
}

#[tokio::test]
async fn workers_ai_returns_response_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/client/v4/accounts/acc/ai/run/@cf/mistral/mistral-7b-instruct-v0.2-lora"))
        .and(header("authorization", "Bearer tok"))
        .and(body_partial_json(json!({"max_tokens": 1000})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"response": "## Findings\nAll good"},
            "success": true,
            "errors": [],
            "messages": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let out = workers_ai(&server).run(&payload()).await.unwrap();
    assert_eq!(out, "## Findings\nAll good");
}

#[tokio::test]
async fn workers_ai_sends_system_and_user_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"response": "ok"}, "success": true})))
        .mount(&server)
        .await;

    assert_eq!(workers_ai(&server).with_max_tokens(200).run(&payload()).await.unwrap(), "ok");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["max_tokens"], 200);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["role"], "user");
    assert!(body["messages"][1]["content"].as_str().unwrap().contains("Initiate WARP connection protocol\nok"));
}

#[tokio::test]
async fn workers_ai_unsuccessful_envelope_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": null,
            "success": false,
            "errors": [{"code": 5007, "message": "No such model"}]
        })))
        .mount(&server)
        .await;

    match workers_ai(&server).run(&payload()).await {
        Err(InferenceError::Api(msg)) => assert_eq!(msg, "No such model (code 5007)"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn workers_ai_http_error_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "errors": [{"code": 10000, "message": "Authentication error"}]
        })))
        .mount(&server)
        .await;

    match workers_ai(&server).run(&payload()).await {
        Err(InferenceError::Status { status, message }) => {
            assert_eq!(status, 401);
            assert!(message.contains("Authentication error"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn slow_inference_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)).set_body_json(json!({"result": {"response": "late"}})))
        .mount(&server)
        .await;

    let client = WorkersAiClient::new("acc", "tok", Duration::from_millis(100))
        .unwrap()
        .with_base_url(&format!("{}/client/v4", server.uri()));
    assert!(matches!(client.run(&payload()).await, Err(InferenceError::Timeout)));
}

#[tokio::test]
async fn openai_compat_reads_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "local-model"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "analysis"}, "finish_reason": "stop"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiCompatClient::new("sk-test", Duration::from_secs(5))
        .unwrap()
        .with_base_url(&format!("{}/v1/", server.uri()))
        .with_model("local-model");
    assert_eq!(client.run(&payload()).await.unwrap(), "analysis");
}

#[tokio::test]
async fn openai_compat_empty_choices_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let client = OpenAiCompatClient::new("", Duration::from_secs(5)).unwrap().with_base_url(&server.uri());
    assert!(matches!(client.run(&payload()).await, Err(InferenceError::InvalidResponse(_))));
}

fn kv(server: &MockServer) -> WorkersKvStore {
    WorkersKvStore::new("acc", "ns", "tok", Duration::from_secs(5))
        .unwrap()
        .with_base_url(&format!("{}/client/v4", server.uri()))
}

const KEYS_PATH: &str = "/client/v4/accounts/acc/storage/kv/namespaces/ns/keys";

#[tokio::test]
async fn kv_lists_across_pages_and_reads_values() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(KEYS_PATH))
        .and(query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{"name": "err_dns"}],
            "result_info": {"count": 1, "cursor": "page2"},
            "success": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(KEYS_PATH))
        .and(query_param("cursor", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{"name": "err_tunnel"}],
            "result_info": {"count": 1, "cursor": ""},
            "success": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/client/v4/accounts/acc/storage/kv/namespaces/ns/values/err_dns"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("DNS proxy failed"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/client/v4/accounts/acc/storage/kv/namespaces/ns/values/err_tunnel"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Tunnel handshake failed"))
        .mount(&server)
        .await;

    let store = kv(&server);
    assert_eq!(store.list().await.unwrap(), vec!["err_dns", "err_tunnel"]);

    let snapshot = fetch_snapshot(&store).await;
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.get("err_tunnel").unwrap().interpretation, "Tunnel handshake failed");
}

#[tokio::test]
async fn kv_missing_value_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/client/v4/accounts/acc/storage/kv/namespaces/ns/values/nope"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"success": false, "errors": [{"code": 10009, "message": "key not found"}]})))
        .mount(&server)
        .await;

    assert_eq!(kv(&server).get("nope").await.unwrap(), None);
}

#[tokio::test]
async fn kv_list_failure_is_status_error_and_empty_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(KEYS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = kv(&server);
    assert!(matches!(store.list().await, Err(StoreError::Status { status: 503, .. })));
    assert!(fetch_snapshot(&store).await.is_empty());
}
