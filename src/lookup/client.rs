//! Upstream chat-completion client
//!
//! One prompt in, one trimmed reply out. No retries and no backoff: a failed
//! call is reported to the caller as a `LookupError` and nothing else happens.

use super::LookupError;
use crate::config::AppConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A text-completion backend.
///
/// The resolver and the batch pipeline only see this trait, so tests can
/// swap in a scripted fake.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send `prompt` as a single user message and return the trimmed text of
    /// the first reply.
    async fn complete(&self, prompt: &str) -> Result<String, LookupError>;
}

/// Installed when no API key was configured; every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableClient;

#[async_trait]
impl CompletionClient for UnavailableClient {
    async fn complete(&self, _prompt: &str) -> Result<String, LookupError> {
        Err(LookupError::ClientUnavailable)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// OpenAI-compatible `/chat/completions` client (Groq by default)
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatCompletionClient {
    /// Create a client for `{base_url}/chat/completions`
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, LookupError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| LookupError::Upstream(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Create a client from the app configuration.
    /// Returns `Ok(None)` when no API key is configured.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>, LookupError> {
        match &config.api_key {
            Some(key) => Self::new(
                &config.base_url,
                key.clone(),
                config.model.clone(),
                config.request_timeout,
            )
            .map(Some),
            None => Ok(None),
        }
    }

    /// The model identifier sent with each request
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The full completion endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, LookupError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LookupError::Upstream(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or(text);
            return Err(LookupError::Upstream(format!(
                "API error ({}): {}",
                status, message
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Upstream(format!("Failed to parse response: {}", e)))?;

        let reply = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LookupError::Upstream("Completion returned no choices".to_string()))?
            .message
            .content
            .unwrap_or_default();

        Ok(reply.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })
    }

    #[tokio::test]
    async fn test_complete_returns_trimmed_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama-3.1-8b-instant",
                "messages": [{ "role": "user", "content": "Who owns YouTube?" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("  Google\n")))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            ChatCompletionClient::new(&server.uri(), "test-key", "llama-3.1-8b-instant", None)
                .unwrap();
        let reply = client.complete("Who owns YouTube?").await.unwrap();
        assert_eq!(reply, "Google");
    }

    #[tokio::test]
    async fn test_error_status_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": { "message": "Invalid API Key", "type": "invalid_request_error" }
            })))
            .mount(&server)
            .await;

        let client = ChatCompletionClient::new(&server.uri(), "bad", "m", None).unwrap();
        let err = client.complete("hi").await.unwrap_err();
        match err {
            LookupError::Upstream(msg) => {
                assert!(msg.contains("401"));
                assert!(msg.contains("Invalid API Key"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_choices_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let client = ChatCompletionClient::new(&server.uri(), "k", "m", None).unwrap();
        assert!(matches!(
            client.complete("hi").await,
            Err(LookupError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_upstream_error() {
        // Port 9 (discard) is not serving HTTP on test machines
        let client = ChatCompletionClient::new(
            "http://127.0.0.1:9",
            "k",
            "m",
            Some(Duration::from_secs(2)),
        )
        .unwrap();
        assert!(matches!(
            client.complete("hi").await,
            Err(LookupError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_client_always_fails() {
        let client = UnavailableClient;
        assert!(matches!(
            client.complete("anything").await,
            Err(LookupError::ClientUnavailable)
        ));
    }

    #[test]
    fn test_from_config_without_key() {
        let config = AppConfig::default();
        assert!(ChatCompletionClient::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_from_config_with_key() {
        let mut config = AppConfig::default();
        config.api_key = Some("gsk".to_string());
        config.base_url = "https://example.test/v1/".to_string();
        let client = ChatCompletionClient::from_config(&config).unwrap().unwrap();
        assert_eq!(client.endpoint(), "https://example.test/v1/chat/completions");
        assert_eq!(client.model(), "llama-3.1-8b-instant");
    }
}
