//! Spreadsheet upload, processing and download

use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::batch::BatchSummary;
use crate::server::error::ApiError;
use crate::server::ServerAppState;
use crate::staging::{self, StagingError};

/// How many names the upload response previews
const PREVIEW_COUNT: usize = 5;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub filename: String,
    pub total_companies: usize,
    pub companies: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    #[serde(default)]
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub output_filename: String,
    pub summary: BatchSummary,
}

/// `POST /upload` with the spreadsheet in multipart field `file`
pub async fn upload_handler(
    State(state): State<ServerAppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(ApiError::bad_request("No file selected"));
        }
        if !staging::is_allowed_filename(&filename) {
            return Err(StagingError::InvalidExtension(filename).into());
        }

        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some((filename, bytes.to_vec()));
        break;
    }

    let (filename, bytes) = upload.ok_or_else(|| ApiError::bad_request("No file part"))?;

    let areas = state.staging.clone();
    let uploaded = tokio::task::spawn_blocking(move || areas.stage_upload(&filename, &bytes))
        .await
        .map_err(|e| ApiError::internal(format!("Upload task failed: {}", e)))??;

    log::info!(
        "Upload {} staged with {} company names",
        uploaded.stored_filename,
        uploaded.company_names.len()
    );

    Ok(Json(UploadResponse {
        total_companies: uploaded.company_names.len(),
        companies: uploaded
            .company_names
            .into_iter()
            .take(PREVIEW_COUNT)
            .collect(),
        filename: uploaded.stored_filename,
    }))
}

/// `POST /process` with `{filename}` of a staged upload
pub async fn process_handler(
    State(state): State<ServerAppState>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let filename = req.filename.trim();
    if filename.is_empty() {
        return Err(ApiError::bad_request("No filename provided"));
    }

    let input = state.staging.locate_upload(filename)?;
    let outcome = state
        .pipeline
        .run(&input, state.staging.output_dir())
        .await?;

    Ok(Json(ProcessResponse {
        output_filename: outcome.file.output_filename,
        summary: outcome.summary,
    }))
}

/// `GET /download/:filename` for a processed output
pub async fn download_handler(
    State(state): State<ServerAppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let path = state.staging.locate_output(&filename)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to read {}: {}", path.display(), e)))?;

    let content_type = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .to_string();
    let disposition = format!("attachment; filename=\"{}\"", filename);

    log::info!("Serving download {} ({} bytes)", filename, bytes.len());
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "File too large")
    } else {
        ApiError::bad_request(format!("Invalid upload: {}", e.body_text()))
    }
}
