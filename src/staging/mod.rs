//! Upload and output staging directories
//!
//! Uploaded spreadsheets live in the upload directory and processed copies in
//! the output directory. Both are wiped and recreated when the server starts,
//! so nothing survives a restart. Files are addressed by plain file name only;
//! a name that would escape its directory simply does not resolve.

use crate::batch::{self, BatchError};
use crate::config::AppConfig;
use crate::spreadsheet::ALLOWED_EXTENSIONS;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const MAX_FILENAME_LEN: usize = 120;

/// Longest stored upload name. Leaves room for the output prefix and for an
/// output extension one character longer than the input's (`ods` to `xlsx`).
const MAX_STORED_LEN: usize = MAX_FILENAME_LEN - batch::OUTPUT_PREFIX.len() - 1;

/// Staging failures
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("File type not allowed: '{0}'. Allowed types: csv, xlsx, xlsm, xls, ods")]
    InvalidExtension(String),

    #[error("File too large ({size} bytes). Maximum is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Io(String),

    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// A spreadsheet accepted into the upload directory
#[derive(Debug, Clone, Serialize)]
pub struct UploadedFile {
    pub stored_filename: String,
    pub source_path: PathBuf,
    /// Usable company names from the first column, in row order
    pub company_names: Vec<String>,
    pub total_rows: usize,
    pub uploaded_at: DateTime<Utc>,
}

/// Make an uploaded file name safe to store.
///
/// Path separators, NUL and `..` are dropped, whitespace becomes `_`, any
/// other character outside `[A-Za-z0-9._-]` is removed, and leading dots or
/// underscores are stripped. May return an empty string.
pub fn sanitize_filename(name: &str) -> String {
    // Only the last path component is considered
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let sanitized: String = base
        .chars()
        .filter(|c| *c != '\0')
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();

    let mut sanitized = sanitized.replace("..", "");
    while sanitized.starts_with(['.', '_']) {
        sanitized.remove(0);
    }
    fit_length(&sanitized, MAX_FILENAME_LEN)
}

/// Shorten an already sanitized name to `max` characters, cutting the stem
/// rather than the extension when there is one.
fn fit_length(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }

    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() + 2 <= max => {
            let stem = stem[..max - ext.len() - 1].trim_end_matches('.');
            format!("{}.{}", stem, ext)
        }
        _ => name[..max].trim_end_matches('.').to_string(),
    }
}

/// Lower-cased extension of a file name, if it is an allowed spreadsheet type
fn allowed_extension(name: &str) -> Result<String, StagingError> {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(StagingError::InvalidExtension(name.to_string()))
    }
}

/// The upload and output directories plus the upload size cap
#[derive(Debug, Clone)]
pub struct StagingAreas {
    upload_dir: PathBuf,
    output_dir: PathBuf,
    max_upload_bytes: u64,
}

impl StagingAreas {
    pub fn new(
        upload_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
            max_upload_bytes,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.upload_dir.clone(),
            config.output_dir.clone(),
            config.max_upload_bytes,
        )
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Delete and recreate both directories. Safe to call repeatedly.
    pub fn reset_areas(&self) -> Result<(), StagingError> {
        for dir in [&self.upload_dir, &self.output_dir] {
            if dir.exists() {
                fs::remove_dir_all(dir).map_err(|e| {
                    StagingError::Io(format!("Failed to clear {}: {}", dir.display(), e))
                })?;
            }
            fs::create_dir_all(dir).map_err(|e| {
                StagingError::Io(format!("Failed to create {}: {}", dir.display(), e))
            })?;
            log::info!("Staging directory ready: {}", dir.display());
        }
        Ok(())
    }

    /// Validate, store and parse an uploaded spreadsheet.
    ///
    /// Extension and size are checked before anything touches the disk. If the
    /// stored file does not parse, it is removed again.
    pub fn stage_upload(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<UploadedFile, StagingError> {
        let ext = allowed_extension(original_name)?;

        let size = bytes.len() as u64;
        if size > self.max_upload_bytes {
            return Err(StagingError::TooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }

        let mut stored_filename =
            fit_length(&sanitize_filename(original_name), MAX_STORED_LEN);
        if allowed_extension(&stored_filename).is_err() {
            stored_filename = format!("upload-{}.{}", uuid::Uuid::new_v4(), ext);
        }

        fs::create_dir_all(&self.upload_dir)
            .map_err(|e| StagingError::Io(format!("Failed to create upload directory: {}", e)))?;
        let source_path = self.upload_dir.join(&stored_filename);
        fs::write(&source_path, bytes).map_err(|e| {
            StagingError::Io(format!("Failed to write {}: {}", source_path.display(), e))
        })?;
        log::info!("Stored upload {} ({} bytes)", source_path.display(), size);

        let parsed = match batch::parse_sheet(&source_path) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Rejecting upload {}: {}", stored_filename, e);
                let _ = fs::remove_file(&source_path);
                return Err(e.into());
            }
        };

        Ok(UploadedFile {
            stored_filename,
            source_path,
            company_names: parsed.company_names(),
            total_rows: parsed.row_count(),
            uploaded_at: Utc::now(),
        })
    }

    /// Path of a previously staged upload
    pub fn locate_upload(&self, filename: &str) -> Result<PathBuf, StagingError> {
        locate_in(&self.upload_dir, filename)
    }

    /// Path of a processed output file
    pub fn locate_output(&self, filename: &str) -> Result<PathBuf, StagingError> {
        locate_in(&self.output_dir, filename)
    }

    /// Where the processed copy of an upload is written
    pub fn output_path_for(&self, upload_filename: &str) -> Result<PathBuf, StagingError> {
        let name = batch::output_filename(upload_filename)?;
        Ok(self.output_dir.join(name))
    }
}

/// Resolve a plain file name inside `dir`, refusing anything that is not
/// already a safe name of an existing regular file there.
fn locate_in(dir: &Path, filename: &str) -> Result<PathBuf, StagingError> {
    let not_found = || StagingError::NotFound(filename.to_string());

    if filename.is_empty() || sanitize_filename(filename) != filename {
        return Err(not_found());
    }

    let path = dir.join(filename);
    if path.is_file() {
        Ok(path)
    } else {
        Err(not_found())
    }
}

/// Extension check exposed for request validation before reading a body
pub fn is_allowed_filename(name: &str) -> bool {
    allowed_extension(name).is_ok()
}
