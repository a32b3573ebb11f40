// Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parent_finder_lib::config::AppConfig;
use parent_finder_lib::lookup::{CompletionClient, LookupError};
use std::path::Path;
use std::sync::Mutex;

/// Fake completion client answering from a fixed table of companies.
///
/// Parent prompts for a known company get its parent; description prompts get
/// a canned sentence; anything else fails like an upstream outage.
pub struct FakeClient {
    parents: Vec<(&'static str, &'static str)>,
    prompts: Mutex<Vec<String>>,
}

impl FakeClient {
    pub fn new(parents: Vec<(&'static str, &'static str)>) -> Self {
        Self {
            parents,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(vec![
            ("YouTube", "Google"),
            ("Instagram", "Meta Platforms"),
            ("WhatsApp", "Meta Platforms"),
            ("Acme Corp", "Acme Corp"),
            ("LinkedIn", "Microsoft"),
            ("GitHub", "Microsoft"),
            ("Beats", "Apple"),
        ])
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionClient for FakeClient {
    async fn complete(&self, prompt: &str) -> Result<String, LookupError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        if prompt.starts_with("Provide a brief") {
            return Ok("A short description.".to_string());
        }
        for (company, parent) in &self.parents {
            if prompt.starts_with(&format!("What is the parent company of {}?", company)) {
                return Ok(parent.to_string());
            }
        }
        Err(LookupError::Upstream("service unavailable".to_string()))
    }
}

/// Configuration with staging under `root` and no delay between calls
pub fn test_config(root: &Path) -> AppConfig {
    AppConfig {
        api_key: Some("test-key".to_string()),
        upload_dir: root.join("uploads"),
        output_dir: root.join("outputs"),
        request_delay: std::time::Duration::ZERO,
        ..AppConfig::default()
    }
}

pub const BOUNDARY: &str = "parent-finder-test-boundary";

/// A multipart body with a single part
pub fn multipart_body(field: &str, filename: &str, contents: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}
