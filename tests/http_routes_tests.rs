// Integration tests for the HTTP routes, driven through the router without a socket

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{multipart_body, test_config, FakeClient, BOUNDARY};
use http_body_util::BodyExt;
use parent_finder_lib::lookup::{CompletionClient, UnavailableClient};
use parent_finder_lib::server::{build_router, ServerAppState};
use parent_finder_lib::shutdown::ShutdownState;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestServer {
    state: ServerAppState,
    _root: TempDir,
}

impl TestServer {
    fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self::with_upload_cap(client, None)
    }

    fn with_upload_cap(client: Arc<dyn CompletionClient>, cap: Option<u64>) -> Self {
        let root = tempfile::tempdir().unwrap();
        let mut config = test_config(root.path());
        if let Some(cap) = cap {
            config.max_upload_bytes = cap;
        }
        let state = ServerAppState::new(config, client, ShutdownState::new());
        state.staging.reset_areas().unwrap();
        Self { state, _root: root }
    }

    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
        let response = self.router().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec(), headers)
    }

    async fn send_json(&self, req: Request<Body>) -> (StatusCode, Value) {
        let (status, bytes, _) = self.send(req).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn upload(&self, filename: &str, contents: &[u8]) -> (StatusCode, Value) {
        self.send_json(upload_request("file", filename, contents)).await
    }

    fn upload_dir_entries(&self) -> usize {
        std::fs::read_dir(self.state.staging.upload_dir())
            .unwrap()
            .count()
    }
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn upload_request(field: &str, filename: &str, contents: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(field, filename, contents)))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn fake_server() -> TestServer {
    TestServer::new(Arc::new(FakeClient::with_defaults()))
}

#[tokio::test]
async fn health_returns_ok() {
    let server = fake_server();
    let (status, body, _) = server.send(get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn index_serves_html_page() {
    let server = fake_server();
    let (status, body, headers) = server.send(get("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let page = String::from_utf8(body).unwrap();
    assert!(page.contains("/lookup"));
    assert!(page.contains("/upload"));
}

#[tokio::test]
async fn lookup_returns_parent_and_description() {
    let server = fake_server();
    let (status, body) = server
        .send_json(json_request("/lookup", json!({ "company_name": "YouTube" })))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["parent_company"], "Google");
    assert_eq!(body["description"], "A short description.");
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn lookup_self_match_reports_no_parent() {
    let server = fake_server();
    let (status, body) = server
        .send_json(json_request("/lookup", json!({ "company_name": "Acme Corp" })))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["parent_company"], "No parent company");
    assert_eq!(body["description"], "A short description.");
}

#[tokio::test]
async fn lookup_rejects_blank_name() {
    let server = fake_server();
    let (status, body) = server
        .send_json(json_request("/lookup", json!({ "company_name": "   " })))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please enter a company name");
}

#[tokio::test]
async fn lookup_rejects_missing_body() {
    let server = fake_server();
    let req = Request::builder()
        .method("POST")
        .uri("/lookup")
        .body(Body::empty())
        .unwrap();
    let (status, body) = server.send_json(req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn lookup_without_api_key_is_server_error() {
    let server = TestServer::new(Arc::new(UnavailableClient));
    let (status, body) = server
        .send_json(json_request("/lookup", json!({ "company_name": "YouTube" })))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["error"],
        "API client not initialized. Check your GROQ_API_KEY."
    );
    assert!(body["parent_company"].is_null());
}

#[tokio::test]
async fn upload_previews_first_five_companies() {
    let server = fake_server();
    let csv = "Company,Country\nYouTube,US\nInstagram,US\n,DE\nWhatsApp,US\nAcme Corp,US\nLinkedIn,US\nGitHub,US\n";
    let (status, body) = server.upload("my companies.csv", csv.as_bytes()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filename"], "my_companies.csv");
    assert_eq!(body["total_companies"], 6);
    assert_eq!(
        body["companies"],
        json!(["YouTube", "Instagram", "WhatsApp", "Acme Corp", "LinkedIn"])
    );
}

#[tokio::test]
async fn upload_rejects_disallowed_extension() {
    let server = fake_server();
    let (status, body) = server.upload("notes.txt", b"YouTube\n").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("notes.txt"));
    assert_eq!(server.upload_dir_entries(), 0);
}

#[tokio::test]
async fn upload_rejects_sheet_without_rows() {
    let server = fake_server();
    let (status, body) = server.upload("empty.csv", b"Company,Country\n").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "The uploaded file is empty");
    assert_eq!(server.upload_dir_entries(), 0);
}

#[tokio::test]
async fn upload_requires_file_field() {
    let server = fake_server();
    let (status, body) = server
        .send_json(upload_request("attachment", "list.csv", b"Company\nYouTube\n"))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn upload_over_cap_is_payload_too_large() {
    let server = TestServer::with_upload_cap(Arc::new(FakeClient::with_defaults()), Some(16));
    let (status, body) = server
        .upload("big.csv", b"Company\nYouTube\nInstagram\nWhatsApp\n")
        .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].as_str().unwrap().contains("too large"));
    assert_eq!(server.upload_dir_entries(), 0);
}

#[tokio::test]
async fn upload_process_download_round_trip() {
    let server = fake_server();
    let csv = "Company,Country\nYouTube,US\n,DE\nAcme Corp,US\nUnknown Co,FR\n";
    let (status, upload) = server.upload("companies.csv", csv.as_bytes()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, processed) = server
        .send_json(json_request(
            "/process",
            json!({ "filename": upload["filename"] }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(processed["output_filename"], "processed_companies.csv");
    assert_eq!(processed["summary"]["total_rows"], 4);
    assert_eq!(processed["summary"]["looked_up"], 3);
    assert_eq!(processed["summary"]["skipped"], 1);
    assert_eq!(processed["summary"]["failed"], 1);

    let (status, body, headers) = server
        .send(get("/download/processed_companies.csv"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"processed_companies.csv\""
    );

    let text = String::from_utf8(body).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Company,Country,Parent Company",
            "YouTube,US,Google",
            ",DE,",
            "Acme Corp,US,No parent company",
            "Unknown Co,FR,API Error",
        ]
    );
}

#[tokio::test]
async fn process_requires_filename() {
    let server = fake_server();
    let (status, body) = server
        .send_json(json_request("/process", json!({})))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No filename provided");
}

#[tokio::test]
async fn process_unknown_upload_is_not_found() {
    let server = fake_server();
    let (status, body) = server
        .send_json(json_request("/process", json!({ "filename": "ghost.csv" })))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("ghost.csv"));
}

#[tokio::test]
async fn download_refuses_unknown_and_traversal_names() {
    let server = fake_server();
    std::fs::write(
        server.state.staging.upload_dir().join("secret.csv"),
        "Company\nYouTube\n",
    )
    .unwrap();

    for uri in [
        "/download/missing.csv",
        "/download/..%2Fuploads%2Fsecret.csv",
        "/download/%2E%2E",
    ] {
        let (status, body) = server.send_json(get(uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn near_limit_upload_name_can_be_downloaded_after_processing() {
    let server = fake_server();
    let long_name = format!("{}.csv", "a".repeat(116));
    let (status, upload) = server.upload(&long_name, b"Company\nYouTube\n").await;
    assert_eq!(status, StatusCode::OK);
    let stored = upload["filename"].as_str().unwrap().to_string();
    assert!(stored.ends_with(".csv"));
    assert!(stored.len() < long_name.len());

    let (status, processed) = server
        .send_json(json_request("/process", json!({ "filename": stored })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let output = processed["output_filename"].as_str().unwrap();
    assert_eq!(output, format!("processed_{}", stored));

    let (status, body, _) = server.send(get(&format!("/download/{}", output))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "Company,Parent Company\nYouTube,Google\n"
    );
}
