// Clippy allows for reasonable defaults
#![allow(clippy::new_without_default)] // Default not always appropriate for stateful types
#![allow(clippy::needless_borrows_for_generic_args)] // Explicit borrows clarify intent

// Module declarations
pub mod batch;
pub mod commands;
pub mod config;
pub mod lookup;
pub mod server;
pub mod shutdown;
pub mod spreadsheet;
pub mod staging;

pub use batch::{BatchPipeline, BatchSummary, RowFailurePolicy};
pub use config::AppConfig;
pub use lookup::{build_client, CompletionClient, LookupError, LookupResult, ParentResolver};
pub use staging::StagingAreas;
