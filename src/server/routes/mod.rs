//! Route handlers, grouped by concern:
//! - lookup_routes: single company lookups
//! - file_routes: spreadsheet upload, processing and download

pub mod file_routes;
pub mod lookup_routes;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use super::ServerAppState;

/// All API routes with the upload body limit applied
pub fn api_router(state: ServerAppState) -> Router {
    let body_limit = state.body_limit();

    Router::new()
        .route("/lookup", post(lookup_routes::lookup_handler))
        .route("/upload", post(file_routes::upload_handler))
        .route("/process", post(file_routes::process_handler))
        .route("/download/:filename", get(file_routes::download_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
