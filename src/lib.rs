pub mod api;
pub mod config;
pub mod db;
pub mod jobs;
pub mod models;
pub mod pipeline;
pub mod service;

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::api::{api_router, ApiContext};
use crate::config::{AppConfig, ConfigError};
use crate::db::{DatabaseError, ResultStore};
use crate::pipeline::agents::{build_llm_client, AgentExecutor, LlmError, StageSet};
use crate::pipeline::extraction::FinancialPdfTool;
use crate::pipeline::AnalysisPipeline;
use crate::service::{cleanup_orphaned_uploads, AnalysisService};

/// Room for multipart boundaries and the query field on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Result store error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM client error: {0}")]
    Llm(#[from] LlmError),
}

/// Initialize tracing from `RUST_LOG`, falling back to the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Prepare storage and wire the pipeline. Must run outside the async
/// runtime because the LLM clients are blocking.
pub fn build_service(config: &AppConfig) -> Result<Arc<AnalysisService>, StartupError> {
    std::fs::create_dir_all(&config.data_dir)?;
    cleanup_orphaned_uploads(&config.data_dir);

    let store = ResultStore::new(&config.db_path);
    store.initialize()?;

    let llm = build_llm_client(&config.llm)?;
    let stages = Arc::new(StageSet::standard(Arc::new(FinancialPdfTool)));
    let runner = Arc::new(AgentExecutor::new(llm, config.llm.model.clone()));
    let pipeline = AnalysisPipeline::new(stages, runner);

    Ok(Arc::new(AnalysisService::new(
        pipeline,
        store,
        &config.data_dir,
    )))
}

/// Start the workers and serve HTTP until Ctrl-C, then drain the queue.
pub async fn run(config: AppConfig, service: Arc<AnalysisService>) -> Result<(), StartupError> {
    let (queue, pool) =
        jobs::start_workers(service.clone(), config.workers, config.queue_capacity);

    let ctx = ApiContext::new(
        service,
        queue.clone(),
        config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES,
    );
    let listener = api::bind(config.bind_addr).await?;
    let served = api::serve(listener, api_router(ctx), api::shutdown_signal()).await;

    queue.close();
    tracing::info!(workers = pool.len(), "Waiting for in-flight analyses");
    pool.join().await;

    served?;
    Ok(())
}
