// Full-chain tests: orchestrator → HTTP client → mocked remote service.
// Each test drives one document through parse and extraction and checks
// both the normalized result and which remote calls were made.

use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::client::{LlamaCloudClient, RemoteConfig, ORGANIZATION_HEADER, PROJECT_HEADER};
use super::orchestrator::ExtractionOrchestrator;
use super::types::PollConfig;
use super::ExtractionError;

fn orchestrator_for(server: &MockServer, poll: PollConfig) -> ExtractionOrchestrator {
    let config = RemoteConfig::new(&server.uri(), Some("llx-test".into()))
        .with_tenant(Some("org-7".into()), Some("proj-7".into()));
    let client = LlamaCloudClient::new(config).unwrap();
    ExtractionOrchestrator::new(Arc::new(client), poll, poll)
}

fn fast_poll() -> PollConfig {
    PollConfig::from_secs(5.0, 0.01)
}

fn document() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("claim.txt");
    std::fs::write(&path, "Claim 42 for policy P-9").unwrap();
    (dir, path)
}

fn schema() -> Value {
    json!({"type": "object", "properties": {"claim_number": {"type": "string"}}})
}

fn json_response(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

async fn mount_upload_and_async_extraction(server: &MockServer, result: Value) {
    Mock::given(method("POST"))
        .and(path("/api/v1/files"))
        .respond_with(json_response(json!({"file": {"id": "file-9"}})))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/extraction/run"))
        .respond_with(json_response(json!({"job_id": "ext-9", "status": "PENDING"})))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/extraction/jobs/ext-9"))
        .respond_with(json_response(json!({"status": "COMPLETED"})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/extraction/jobs/ext-9/result"))
        .respond_with(json_response(result))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn parse_service_failure_still_yields_extraction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/parsing/upload"))
        .respond_with(ResponseTemplate::new(500).set_body_string("parser down"))
        .expect(1)
        .mount(&server)
        .await;
    mount_upload_and_async_extraction(&server, json!({"result": {"claim_number": "42"}})).await;

    let (_dir, doc) = document();
    let result = orchestrator_for(&server, fast_poll())
        .process_document(&doc, "text/plain", &schema())
        .await
        .unwrap();

    assert_eq!(Value::Object(result), json!({"claim_number": "42"}));
}

#[tokio::test]
async fn synchronous_extraction_skips_poll_and_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/files"))
        .respond_with(json_response(json!({"id": "file-1"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/extraction/run"))
        .respond_with(json_response(json!({
            "status": "SUCCESS",
            "records": [{"claim_number": "42"}, {"claim_number": "43"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(json_response(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let (_dir, doc) = document();
    let result = orchestrator_for(&server, fast_poll())
        .with_parse_enabled(false)
        .process_document(&doc, "text/plain", &schema())
        .await
        .unwrap();

    assert_eq!(
        Value::Object(result),
        json!({"records": [{"claim_number": "42"}, {"claim_number": "43"}]})
    );
}

#[tokio::test]
async fn tenant_headers_reach_every_endpoint() {
    let server = MockServer::start().await;
    // Only requests carrying all three headers match; anything else 404s.
    let scoped = |m: &str, p: &str| {
        Mock::given(method(m))
            .and(path(p.to_string()))
            .and(header("authorization", "Bearer llx-test"))
            .and(header(ORGANIZATION_HEADER, "org-7"))
            .and(header(PROJECT_HEADER, "proj-7"))
    };
    scoped("POST", "/api/v1/parsing/upload")
        .respond_with(json_response(json!({"id": "parse-1"})))
        .expect(1)
        .mount(&server)
        .await;
    scoped("GET", "/api/v1/parsing/job/parse-1")
        .respond_with(json_response(json!({"status": "SUCCESS"})))
        .expect(1)
        .mount(&server)
        .await;
    scoped("POST", "/api/v1/files")
        .respond_with(json_response(json!({"id": "file-1"})))
        .expect(1)
        .mount(&server)
        .await;
    scoped("POST", "/api/v1/extraction/run")
        .respond_with(json_response(json!({"id": "ext-1"})))
        .expect(1)
        .mount(&server)
        .await;
    scoped("GET", "/api/v1/extraction/jobs/ext-1")
        .respond_with(json_response(json!({"status": "SUCCESS"})))
        .expect(1)
        .mount(&server)
        .await;
    scoped("GET", "/api/v1/extraction/jobs/ext-1/result")
        .respond_with(json_response(json!({"data": {"claim_number": "42"}})))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, doc) = document();
    let result = orchestrator_for(&server, fast_poll())
        .process_document(&doc, "text/plain", &schema())
        .await
        .unwrap();
    assert_eq!(result["claim_number"], "42");
}

#[tokio::test]
async fn extraction_that_never_finishes_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/files"))
        .respond_with(json_response(json!({"id": "file-1"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/extraction/run"))
        .respond_with(json_response(json!({"id": "ext-slow"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/extraction/jobs/ext-slow"))
        .respond_with(json_response(json!({"status": "RUNNING"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/extraction/jobs/ext-slow/result"))
        .respond_with(json_response(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let (_dir, doc) = document();
    let err = orchestrator_for(&server, PollConfig::from_secs(0.2, 0.05))
        .with_parse_enabled(false)
        .process_document(&doc, "text/plain", &schema())
        .await
        .unwrap_err();

    match err {
        ExtractionError::Timeout { job_id, .. } => assert_eq!(job_id, "ext-slow"),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn unexpected_result_shape_is_kept_raw() {
    let server = MockServer::start().await;
    mount_upload_and_async_extraction(&server, json!({"download_url": "https://files/x.json"})).await;

    let (_dir, doc) = document();
    let result = orchestrator_for(&server, fast_poll())
        .with_parse_enabled(false)
        .process_document(&doc, "text/plain", &schema())
        .await
        .unwrap();

    assert_eq!(
        Value::Object(result),
        json!({"_raw": {"download_url": "https://files/x.json"}})
    );
}
