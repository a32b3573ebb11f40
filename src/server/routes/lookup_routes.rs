//! Single-name lookup

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::server::error::ApiError;
use crate::server::ServerAppState;

#[derive(Debug, Deserialize)]
pub struct LookupRequest {
    #[serde(default)]
    pub company_name: String,
}

/// `POST /lookup`
///
/// 200 with `{parent_company, description}`, or 500 with the same shape plus
/// `error` when the upstream call failed.
pub async fn lookup_handler(
    State(state): State<ServerAppState>,
    payload: Result<Json<LookupRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let company_name = req.company_name.trim();
    if company_name.is_empty() {
        return Err(ApiError::bad_request("Please enter a company name"));
    }

    log::info!("Lookup requested for '{}'", company_name);
    let result = state.resolver.resolve_full(company_name).await;

    let status = if result.is_error() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    Ok((status, Json(result)).into_response())
}
