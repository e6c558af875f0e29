//! Analysis service: stage upload → run pipeline → persist → remove upload.
//!
//! Shared by the synchronous endpoint and the background workers, so both
//! paths produce the same record shape and cleanup behavior.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempPath;
use uuid::Uuid;

use crate::db::{DatabaseError, ResultStore};
use crate::models::{AnalysisRecord, AnalysisRequest, AnalysisResult};
use crate::pipeline::{AnalysisPipeline, PipelineError, PipelineOutput};

/// Prefix of staged uploads inside the data directory.
pub const STAGING_PREFIX: &str = "financial_document_";
const STAGING_SUFFIX: &str = ".pdf";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Failed to stage upload: {0}")]
    Staging(#[source] std::io::Error),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),

    #[error("Analysis worker failed: {0}")]
    Worker(String),
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Completed analysis as returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub request: AnalysisRequest,
    pub result: AnalysisResult,
    /// All stage outputs under their headings.
    pub combined: String,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct AnalysisService {
    pipeline: AnalysisPipeline,
    store: ResultStore,
    data_dir: PathBuf,
}

impl AnalysisService {
    pub fn new(pipeline: AnalysisPipeline, store: ResultStore, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            pipeline,
            store,
            data_dir: data_dir.into(),
        }
    }

    /// Write upload bytes to a uniquely named file in the data directory.
    ///
    /// The returned path deletes the file when dropped, so a job that is
    /// never run still leaves nothing behind.
    pub fn stage_upload(&self, bytes: &[u8]) -> Result<TempPath, AnalysisError> {
        let mut file = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(STAGING_SUFFIX)
            .tempfile_in(&self.data_dir)
            .map_err(AnalysisError::Staging)?;
        file.write_all(bytes).map_err(AnalysisError::Staging)?;
        file.flush().map_err(AnalysisError::Staging)?;
        let path = file.into_temp_path();
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Upload staged");
        Ok(path)
    }

    /// Run the full pipeline for a staged upload and persist the record.
    ///
    /// The staged file is removed whether or not the run succeeds.
    pub fn analyze(
        &self,
        request: &AnalysisRequest,
        upload: TempPath,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let _span = tracing::info_span!("analysis", analysis_id = %request.id).entered();
        tracing::info!(filename = %request.filename, "Analysis started");

        let file_path = upload.to_string_lossy().into_owned();
        let outcome = self.run_and_save(request, &file_path);
        remove_staged(upload);

        match &outcome {
            Ok(_) => tracing::info!("Analysis complete"),
            Err(e) => tracing::error!(error = %e, "Analysis failed"),
        }
        outcome
    }

    fn run_and_save(
        &self,
        request: &AnalysisRequest,
        file_path: &str,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let output: PipelineOutput = self.pipeline.run(file_path, &request.query)?;
        let combined = output.combined();
        let result = AnalysisResult::from(output);
        self.store.save(request, &result)?;
        Ok(AnalysisOutcome {
            request: request.clone(),
            result,
            combined,
        })
    }

    pub fn get_result(&self, id: &Uuid) -> Result<Option<AnalysisRecord>, AnalysisError> {
        Ok(self.store.get(id)?)
    }
}

fn remove_staged(upload: TempPath) {
    let path = upload.to_path_buf();
    if let Err(e) = upload.close() {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove staged upload");
    }
}

/// Remove staged uploads left behind by a crash. Returns how many were removed.
pub fn cleanup_orphaned_uploads(data_dir: &Path) -> usize {
    let entries = match std::fs::read_dir(data_dir) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !(name.starts_with(STAGING_PREFIX) && name.ends_with(STAGING_SUFFIX)) {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "Failed to remove orphaned upload")
            }
        }
    }
    if removed > 0 {
        tracing::info!(removed, "Removed orphaned staged uploads");
    }
    removed
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use super::*;
    use crate::pipeline::agents::{
        StageConfig, StageContext, StageError, StageOutput, StageRunner, StageSet,
    };
    use crate::pipeline::extraction::{read_financial_pdf, FinancialPdfTool};

    /// Reads the staged file in every stage and echoes the text back.
    pub struct EchoRunner;

    impl StageRunner for EchoRunner {
        fn run_stage(
            &self,
            stage: &StageConfig,
            ctx: &StageContext,
        ) -> Result<StageOutput, StageError> {
            let text = read_financial_pdf(&ctx.file_path).map_err(|source| StageError::Tool {
                tool: "read_financial_pdf".into(),
                source,
            })?;
            Ok(StageOutput {
                kind: stage.kind,
                text: format!("{}: {}", stage.kind, text),
                iterations: 1,
                tool_calls: 1,
            })
        }
    }

    /// Fails every stage.
    pub struct FailingRunner;

    impl StageRunner for FailingRunner {
        fn run_stage(&self, _: &StageConfig, _: &StageContext) -> Result<StageOutput, StageError> {
            Err(StageError::EmptyAnswer)
        }
    }

    pub fn service_with(
        dir: &Path,
        runner: Arc<dyn StageRunner>,
    ) -> AnalysisService {
        let stages = Arc::new(StageSet::standard(Arc::new(FinancialPdfTool)));
        let store = ResultStore::new(dir.join("analysis.db"));
        store.initialize().unwrap();
        let data_dir = dir.join("data");
        std::fs::create_dir_all(&data_dir).unwrap();
        AnalysisService::new(AnalysisPipeline::new(stages, runner), store, data_dir)
    }

    pub fn staged_files(dir: &Path) -> usize {
        std::fs::read_dir(dir.join("data"))
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
            .count()
    }
}
