//! Sequential three-stage analysis pipeline.
//!
//! Verify → Analyze → Assess Risk. Each stage sees the earlier stages'
//! outputs; the first failure aborts the run.

use std::sync::Arc;

use thiserror::Error;

use super::agents::{StageContext, StageError, StageKind, StageOutput, StageRunner, StageSet};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Pipeline stage '{stage}' failed: {source}")]
    Stage {
        stage: StageKind,
        #[source]
        source: StageError,
    },
}

impl PipelineError {
    pub fn stage(&self) -> StageKind {
        match self {
            Self::Stage { stage, .. } => *stage,
        }
    }
}

/// All three stage outputs of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    pub verification: String,
    pub analysis: String,
    pub risk: String,
}

impl PipelineOutput {
    /// Stage outputs rendered under one heading each.
    pub fn combined(&self) -> String {
        [
            (StageKind::Verification, &self.verification),
            (StageKind::Analysis, &self.analysis),
            (StageKind::RiskAssessment, &self.risk),
        ]
        .iter()
        .map(|(kind, text)| format!("# {}\n\n{}", kind.title(), text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
    }
}

pub struct AnalysisPipeline {
    stages: Arc<StageSet>,
    runner: Arc<dyn StageRunner>,
}

impl AnalysisPipeline {
    pub fn new(stages: Arc<StageSet>, runner: Arc<dyn StageRunner>) -> Self {
        Self { stages, runner }
    }

    /// Run every stage in order against one staged document.
    pub fn run(&self, file_path: &str, query: &str) -> Result<PipelineOutput, PipelineError> {
        let start = std::time::Instant::now();
        let mut ctx = StageContext::new(file_path, query);

        for stage in self.stages.ordered() {
            let output = self
                .runner
                .run_stage(stage, &ctx)
                .map_err(|source| {
                    tracing::warn!(stage = %stage.kind, error = %source, "Stage failed, aborting pipeline");
                    PipelineError::Stage {
                        stage: stage.kind,
                        source,
                    }
                })?;
            ctx.prior.push(output);
        }

        tracing::info!(
            duration_ms = start.elapsed().as_millis() as u64,
            "Pipeline complete"
        );
        Ok(collect_outputs(ctx.prior))
    }
}

fn collect_outputs(outputs: Vec<StageOutput>) -> PipelineOutput {
    let mut result = PipelineOutput {
        verification: String::new(),
        analysis: String::new(),
        risk: String::new(),
    };
    for output in outputs {
        match output.kind {
            StageKind::Verification => result.verification = output.text,
            StageKind::Analysis => result.analysis = output.text,
            StageKind::RiskAssessment => result.risk = output.text,
        }
    }
    result
}
