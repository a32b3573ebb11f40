//! Server application state shared across handlers

use crate::batch::BatchPipeline;
use crate::config::AppConfig;
use crate::lookup::{CompletionClient, ParentResolver};
use crate::shutdown::ShutdownState;
use crate::staging::StagingAreas;
use std::sync::Arc;

/// Shared state for the server. Everything here is cheap to clone.
#[derive(Clone)]
pub struct ServerAppState {
    pub config: Arc<AppConfig>,

    /// Single-name lookups
    pub resolver: ParentResolver,

    /// Spreadsheet batches, sharing the resolver's client
    pub pipeline: BatchPipeline,

    /// Upload and output directories
    pub staging: Arc<StagingAreas>,

    pub shutdown_state: ShutdownState,
}

impl ServerAppState {
    pub fn new(
        config: AppConfig,
        client: Arc<dyn CompletionClient>,
        shutdown_state: ShutdownState,
    ) -> Self {
        let resolver = ParentResolver::new(client);
        let pipeline = BatchPipeline::from_config(resolver.clone(), &config);
        let staging = Arc::new(StagingAreas::from_config(&config));

        Self {
            config: Arc::new(config),
            resolver,
            pipeline,
            staging,
            shutdown_state,
        }
    }

    /// Largest request body the router accepts: the upload cap plus room for
    /// multipart framing.
    pub fn body_limit(&self) -> usize {
        const MULTIPART_OVERHEAD: u64 = 64 * 1024;
        usize::try_from(self.staging.max_upload_bytes() + MULTIPART_OVERHEAD)
            .unwrap_or(usize::MAX)
    }
}
