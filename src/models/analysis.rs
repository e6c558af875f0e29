use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::PipelineOutput;

/// An accepted submission. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub id: Uuid,
    pub filename: String,
    pub query: String,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRequest {
    /// New request with a fresh v4 id.
    pub fn new(filename: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            query: query.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub verification: String,
    pub analysis: String,
    pub risk: String,
}

impl From<PipelineOutput> for AnalysisResult {
    fn from(output: PipelineOutput) -> Self {
        Self {
            verification: output.verification,
            analysis: output.analysis,
            risk: output.risk,
        }
    }
}

/// Request and result as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub filename: String,
    pub query: String,
    pub verification: String,
    pub analysis: String,
    pub risk: String,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn new(request: &AnalysisRequest, result: &AnalysisResult) -> Self {
        Self {
            id: request.id,
            filename: request.filename.clone(),
            query: request.query.clone(),
            verification: result.verification.clone(),
            analysis: result.analysis.clone(),
            risk: result.risk.clone(),
            created_at: request.created_at,
        }
    }
}
