//! HTTP server for browser-based lookups and spreadsheet batches

mod error;
pub mod routes;
pub mod state;
mod static_files;

pub use error::{ApiError, ErrorResponse};
pub use state::ServerAppState;

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Router with every route and no CORS layer
pub fn build_router(state: ServerAppState) -> Router {
    Router::new()
        .route("/", get(static_files::index_handler))
        .route("/health", get(health_handler))
        .merge(routes::api_router(state))
}

/// Run the HTTP server until the shutdown flag is set
pub async fn run_server(
    port: u16,
    bind: &str,
    state: ServerAppState,
    cors_origins: Option<Vec<String>>,
) -> Result<(), String> {
    let cors = match &cors_origins {
        Some(origins) if !origins.is_empty() => {
            let allowed_origins: Vec<HeaderValue> =
                origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods(Any)
                .allow_headers([CONTENT_TYPE])
        }
        _ => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers([CONTENT_TYPE]),
    };

    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let cors_display = match &cors_origins {
        Some(origins) if !origins.is_empty() => origins.join(", "),
        _ => "*".to_string(),
    };
    let lookups_status = if state.config.has_api_key() {
        format!("{} ({})", state.config.provider_id, state.config.model)
    } else {
        "disabled (no API key)".to_string()
    };

    let shutdown_state = state.shutdown_state.clone();
    let app = build_router(state).layer(cors);

    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                    Parent Company Finder                     ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║                                                              ║");
    println!("║  Server URL: http://{}:{:<24} ║", bind, port);
    println!("║  CORS Origins: {:<45} ║", cors_display);
    println!("║  Lookups: {:<50} ║", lookups_status);
    println!("║                                                              ║");
    println!("║  Endpoints:                                                  ║");
    println!("║    GET  /                    - Lookup and upload page        ║");
    println!("║    POST /lookup              - Single company lookup         ║");
    println!("║    POST /upload              - Stage a spreadsheet           ║");
    println!("║    POST /process             - Look up every row             ║");
    println!("║    GET  /download/:filename  - Processed spreadsheet         ║");
    println!("║    GET  /health              - Health check                  ║");
    println!("║                                                              ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    log::info!("Server listening on http://{}", addr);

    let shutdown_signal = async move {
        shutdown_state.wait_for_shutdown().await;
        log::info!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| format!("Server error: {}", e))
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}
