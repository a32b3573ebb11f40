//! Parent-company resolution
//!
//! Two modes share the same first prompt:
//! - `resolve_full` also asks for a short description (two upstream calls)
//! - `resolve_parent_only` stops after the parent (one call), for batches
//!
//! A reply is judged self-referential when it equals the queried name
//! ignoring case. Nothing else is normalized: "Acme Corp." does not match
//! "Acme Corp". The model's output has no guaranteed format, so this match is
//! best-effort.

use super::prompts;
use super::{CompletionClient, LookupError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Parent value used when the model names the company itself
pub const NO_PARENT_SENTINEL: &str = "No parent company";

/// Parent value recorded for a batch row whose lookup failed
pub const API_ERROR_SENTINEL: &str = "API Error";

/// Outcome of a full lookup.
///
/// Either `parent_company` and `description` are set, or `error` is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResult {
    pub parent_company: Option<String>,
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LookupResult {
    pub fn found(parent_company: String, description: String) -> Self {
        Self {
            parent_company: Some(parent_company),
            description: Some(description),
            error: None,
        }
    }

    pub fn failed(error: &LookupError) -> Self {
        Self {
            parent_company: None,
            description: None,
            error: Some(describe_error(error)),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Whether the company was judged to have no parent
    pub fn has_no_parent(&self) -> bool {
        self.parent_company.as_deref() == Some(NO_PARENT_SENTINEL)
    }
}

/// User-facing message for a lookup failure
pub fn describe_error(error: &LookupError) -> String {
    match error {
        LookupError::ClientUnavailable => error.to_string(),
        LookupError::Upstream(msg) => format!("An error occurred: {}", msg),
    }
}

/// Map a parent reply to the sentinel when it names the company itself
pub fn normalize_parent(reply: &str, company_name: &str) -> String {
    let reply = reply.trim();
    if reply.to_lowercase() == company_name.trim().to_lowercase() {
        NO_PARENT_SENTINEL.to_string()
    } else {
        reply.to_string()
    }
}

/// Resolves parent companies through a `CompletionClient`
#[derive(Clone)]
pub struct ParentResolver {
    client: Arc<dyn CompletionClient>,
}

impl ParentResolver {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// Parent plus description. Errors are folded into the result.
    pub async fn resolve_full(&self, company_name: &str) -> LookupResult {
        match self.try_resolve_full(company_name).await {
            Ok(result) => result,
            Err(e) => {
                log::warn!("Lookup for '{}' failed: {}", company_name, e);
                LookupResult::failed(&e)
            }
        }
    }

    async fn try_resolve_full(&self, company_name: &str) -> Result<LookupResult, LookupError> {
        let parent = self.try_resolve_parent(company_name).await?;

        let desc_prompt = if parent == NO_PARENT_SENTINEL {
            prompts::standalone_description_prompt(company_name)
        } else {
            prompts::relationship_description_prompt(&parent, company_name)
        };
        log::debug!("Description prompt: {}", desc_prompt);

        let description = self.client.complete(&desc_prompt).await?;
        Ok(LookupResult::found(parent, description.trim().to_string()))
    }

    /// Parent only; failures become `API_ERROR_SENTINEL`.
    pub async fn resolve_parent_only(&self, company_name: &str) -> String {
        match self.try_resolve_parent(company_name).await {
            Ok(parent) => parent,
            Err(e) => {
                log::warn!("Parent lookup for '{}' failed: {}", company_name, e);
                API_ERROR_SENTINEL.to_string()
            }
        }
    }

    /// Parent only, with the failure surfaced
    pub async fn try_resolve_parent(&self, company_name: &str) -> Result<String, LookupError> {
        let prompt = prompts::parent_prompt(company_name);
        log::debug!("Parent prompt: {}", prompt);

        let reply = self.client.complete(&prompt).await?;
        log::debug!("Parent reply for '{}': {}", company_name, reply);

        Ok(normalize_parent(&reply, company_name))
    }
}
