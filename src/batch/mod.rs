//! Batch pipeline: spreadsheet of company names in, annotated spreadsheet out
//!
//! `Uploaded → Parsed → Processing → Completed | Failed`
//!
//! Rows are processed strictly in order, one upstream call at a time, with a
//! fixed pause between consecutive calls. Nothing is checkpointed: a batch that
//! fails part-way discards every row it already resolved.

use crate::config::AppConfig;
use crate::lookup::{LookupError, ParentResolver, API_ERROR_SENTINEL};
use crate::spreadsheet::{self, Cell, SpreadsheetError, SpreadsheetFormat, Table};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Header of the appended column
pub const PARENT_COLUMN_HEADER: &str = "Parent Company";

/// Prefix added to the input file name to name the output
pub const OUTPUT_PREFIX: &str = "processed_";

/// Cell texts treated as missing data, on top of blank cells
pub const MISSING_MARKERS: &[&str] = &[
    "nan", "NaN", "NA", "N/A", "n/a", "#N/A", "NULL", "null", "None", "<NA>",
];

/// What happens when one row's lookup fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowFailurePolicy {
    /// Record `API_ERROR_SENTINEL` in the row and keep going
    #[default]
    Record,
    /// Abort the whole batch on the first failed row
    Abort,
}

/// Lifecycle of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Uploaded,
    Parsed,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uploaded => "uploaded",
            Self::Parsed => "parsed",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Batch failures
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("The uploaded file is empty")]
    EmptySheet,

    #[error("No company names found in the first column")]
    NoCompanyNames,

    #[error("Lookup failed at row {row} ('{company}'): {source}")]
    Upstream {
        row: usize,
        company: String,
        #[source]
        source: LookupError,
    },

    #[error("{0}")]
    Read(String),

    #[error("{0}")]
    Write(String),
}

impl From<SpreadsheetError> for BatchError {
    fn from(err: SpreadsheetError) -> Self {
        match err {
            SpreadsheetError::Write(_) => BatchError::Write(err.to_string()),
            _ => BatchError::Read(err.to_string()),
        }
    }
}

/// Company name held by a cell, if it is usable for a lookup
pub fn company_name(cell: &Cell) -> Option<String> {
    let text = match cell {
        Cell::Empty => return None,
        Cell::Text(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if text.is_empty() || MISSING_MARKERS.contains(&text.as_str()) {
        None
    } else {
        Some(text)
    }
}

/// A spreadsheet that passed the Uploaded → Parsed transition
#[derive(Debug, Clone)]
pub struct ParsedSheet {
    pub source_path: PathBuf,
    pub table: Table,
    /// One entry per data row; `None` where the first column is unusable
    pub row_names: Vec<Option<String>>,
}

impl ParsedSheet {
    /// Usable company names, in row order
    pub fn company_names(&self) -> Vec<String> {
        self.row_names.iter().flatten().cloned().collect()
    }

    pub fn row_count(&self) -> usize {
        self.row_names.len()
    }
}

/// Read a spreadsheet and take its first column as the company names
pub fn parse_sheet(path: &Path) -> Result<ParsedSheet, BatchError> {
    let table = spreadsheet::read_table(path)?;

    if table.row_count() == 0 || table.column_count() == 0 {
        return Err(BatchError::EmptySheet);
    }

    let row_names: Vec<Option<String>> = table.column(0).map(company_name).collect();
    if row_names.iter().all(Option::is_none) {
        return Err(BatchError::NoCompanyNames);
    }

    log::info!(
        "Parsed {}: {} rows, {} company names",
        path.display(),
        row_names.len(),
        row_names.iter().flatten().count()
    );

    Ok(ParsedSheet {
        source_path: path.to_path_buf(),
        table,
        row_names,
    })
}

/// Output file name for an input file name: `processed_<stem>.<csv|xlsx>`
pub fn output_filename(input_filename: &str) -> Result<String, BatchError> {
    let path = Path::new(input_filename);
    let format = SpreadsheetFormat::from_path(path)?.output_format();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("upload");
    Ok(format!("{}{}.{}", OUTPUT_PREFIX, stem, format.extension()))
}

/// One output row: the input row and the value appended to it
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedRow {
    pub original_row: Vec<Cell>,
    pub parent_company: String,
}

/// A written output spreadsheet
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedFile {
    pub output_filename: String,
    pub path: PathBuf,
    pub rows: Vec<ProcessedRow>,
    pub completed_at: DateTime<Utc>,
}

/// Counters for a finished batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total_rows: usize,
    pub looked_up: usize,
    pub skipped: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
}

/// Result of a completed batch
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub file: ProcessedFile,
    pub summary: BatchSummary,
}

/// Write the annotated table, creating its directory first
fn write_output(table: &Table, output_path: &Path) -> Result<(), BatchError> {
    if let Some(dir) = output_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| {
            BatchError::Write(format!("Failed to create {}: {}", dir.display(), e))
        })?;
    }
    spreadsheet::write_table(table, output_path)?;
    Ok(())
}

/// Runs batches against a `ParentResolver`
#[derive(Clone)]
pub struct BatchPipeline {
    resolver: ParentResolver,
    delay: Duration,
    policy: RowFailurePolicy,
}

impl BatchPipeline {
    pub fn new(resolver: ParentResolver, delay: Duration, policy: RowFailurePolicy) -> Self {
        Self {
            resolver,
            delay,
            policy,
        }
    }

    pub fn from_config(resolver: ParentResolver, config: &AppConfig) -> Self {
        Self::new(resolver, config.request_delay, config.row_failure_policy)
    }

    pub fn policy(&self) -> RowFailurePolicy {
        self.policy
    }

    /// Parse `input` and write the annotated copy into `output_dir`
    pub async fn run(&self, input: &Path, output_dir: &Path) -> Result<BatchOutcome, BatchError> {
        let input_name = input
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| BatchError::Read(format!("Invalid input path: {}", input.display())))?;
        let output_path = output_dir.join(output_filename(input_name)?);

        log::info!("Batch {}: {}", input.display(), BatchState::Uploaded);
        let source = input.to_path_buf();
        let parsed = tokio::task::spawn_blocking(move || parse_sheet(&source))
            .await
            .map_err(|e| BatchError::Read(format!("Read task failed: {}", e)))??;
        log::info!("Batch {}: {}", input.display(), BatchState::Parsed);

        self.process(parsed, &output_path).await
    }

    /// Processing → Completed | Failed for an already parsed sheet
    pub async fn process(
        &self,
        parsed: ParsedSheet,
        output_path: &Path,
    ) -> Result<BatchOutcome, BatchError> {
        let label = parsed.source_path.display().to_string();
        log::info!("Batch {}: {}", label, BatchState::Processing);

        let result = self.process_inner(parsed, output_path).await;
        match &result {
            Ok(outcome) => log::info!(
                "Batch {}: {} ({} rows, {} looked up, {} skipped, {} failed, {} ms)",
                label,
                BatchState::Completed,
                outcome.summary.total_rows,
                outcome.summary.looked_up,
                outcome.summary.skipped,
                outcome.summary.failed,
                outcome.summary.elapsed_ms
            ),
            Err(e) => log::error!("Batch {}: {}: {}", label, BatchState::Failed, e),
        }
        result
    }

    async fn process_inner(
        &self,
        parsed: ParsedSheet,
        output_path: &Path,
    ) -> Result<BatchOutcome, BatchError> {
        let started = Instant::now();
        let (parents, mut summary) = self.resolve_rows(&parsed.row_names).await?;

        let ParsedSheet { mut table, .. } = parsed;
        let original_rows = table.rows.clone();
        table.append_column(
            PARENT_COLUMN_HEADER,
            parents.iter().map(|p| Cell::from(p.as_str())).collect(),
        );
        let destination = output_path.to_path_buf();
        tokio::task::spawn_blocking(move || write_output(&table, &destination))
            .await
            .map_err(|e| BatchError::Write(format!("Write task failed: {}", e)))??;

        summary.elapsed_ms = started.elapsed().as_millis() as u64;

        let rows = original_rows
            .into_iter()
            .zip(parents)
            .map(|(original_row, parent_company)| ProcessedRow {
                original_row,
                parent_company,
            })
            .collect();

        let output_filename = output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(BatchOutcome {
            file: ProcessedFile {
                output_filename,
                path: output_path.to_path_buf(),
                rows,
                completed_at: Utc::now(),
            },
            summary,
        })
    }

    /// One parent string per row; unusable rows get "".
    async fn resolve_rows(
        &self,
        row_names: &[Option<String>],
    ) -> Result<(Vec<String>, BatchSummary), BatchError> {
        let mut parents = Vec::with_capacity(row_names.len());
        let mut summary = BatchSummary {
            total_rows: row_names.len(),
            ..Default::default()
        };
        let total_names = row_names.iter().flatten().count();

        for (index, name) in row_names.iter().enumerate() {
            let Some(name) = name else {
                summary.skipped += 1;
                parents.push(String::new());
                continue;
            };

            if summary.looked_up > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            summary.looked_up += 1;
            log::info!(
                "Looking up parent company for {} ({}/{})",
                name,
                summary.looked_up,
                total_names
            );

            match self.resolver.try_resolve_parent(name).await {
                Ok(parent) => parents.push(parent),
                Err(source) => match self.policy {
                    RowFailurePolicy::Record => {
                        log::warn!("Row {} ('{}') failed: {}", index + 1, name, source);
                        summary.failed += 1;
                        parents.push(API_ERROR_SENTINEL.to_string());
                    }
                    RowFailurePolicy::Abort => {
                        return Err(BatchError::Upstream {
                            row: index + 1,
                            company: name.clone(),
                            source,
                        });
                    }
                },
            }
        }

        Ok((parents, summary))
    }
}
