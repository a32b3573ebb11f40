//! Parent-company lookups through a chat-completion API
//!
//! - `client`: the single upstream call (`CompletionClient` and its implementations)
//! - `prompts`: the two prompts sent per full lookup
//! - `resolver`: turns model replies into `LookupResult`s

pub mod client;
pub mod prompts;
pub mod resolver;

pub use client::{ChatCompletionClient, CompletionClient, UnavailableClient};
pub use resolver::{LookupResult, ParentResolver, API_ERROR_SENTINEL, NO_PARENT_SENTINEL};

use crate::config::AppConfig;
use std::sync::Arc;

/// Errors from a single upstream completion call
#[derive(Debug, Clone, thiserror::Error)]
pub enum LookupError {
    /// No API key was configured at startup
    #[error("API client not initialized. Check your GROQ_API_KEY.")]
    ClientUnavailable,

    /// The upstream call failed (network, auth, quota, malformed reply)
    #[error("{0}")]
    Upstream(String),
}

/// Build the completion client for this process.
///
/// Without an API key every call fails with `ClientUnavailable`; there is no
/// way to recover without restarting.
pub fn build_client(config: &AppConfig) -> Arc<dyn CompletionClient> {
    match ChatCompletionClient::from_config(config) {
        Ok(Some(client)) => {
            log::info!(
                "Lookup client ready (provider: {}, model: {})",
                config.provider_id,
                config.model
            );
            Arc::new(client)
        }
        Ok(None) => {
            log::error!("No API key configured; lookups are disabled for this run");
            Arc::new(UnavailableClient)
        }
        Err(e) => {
            log::error!("Failed to initialize lookup client: {}", e);
            Arc::new(UnavailableClient)
        }
    }
}
