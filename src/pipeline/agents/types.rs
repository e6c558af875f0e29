use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{LlmError, StageError};
use crate::pipeline::extraction::Tool;

/// Blocking LLM client abstraction (allows mocking)
pub trait LlmClient: Send + Sync {
    fn generate(&self, model: &str, prompt: &str, system: &str) -> Result<String, LlmError>;
}

/// The three pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Verification,
    Analysis,
    RiskAssessment,
}

impl StageKind {
    pub const ORDER: [StageKind; 3] = [
        StageKind::Verification,
        StageKind::Analysis,
        StageKind::RiskAssessment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verification => "verification",
            Self::Analysis => "analysis",
            Self::RiskAssessment => "risk",
        }
    }

    /// Heading used when stage outputs are rendered together.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Verification => "Document Verification",
            Self::Analysis => "Financial Analysis",
            Self::RiskAssessment => "Risk Assessment",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Agent persona.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub role: &'static str,
    pub goal: &'static str,
    pub backstory: &'static str,
}

/// Work bound to one agent. `description` may reference `{file_path}` and `{query}`.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub description: &'static str,
    pub expected_output: &'static str,
}

impl TaskSpec {
    pub fn render(&self, ctx: &StageContext) -> String {
        self.description
            .replace("{file_path}", &ctx.file_path)
            .replace("{query}", &ctx.query)
    }
}

/// Immutable configuration for one stage, built once at startup.
#[derive(Clone)]
pub struct StageConfig {
    pub kind: StageKind,
    pub agent: AgentSpec,
    pub task: TaskSpec,
    pub tools: Vec<Arc<dyn Tool>>,
    /// Upper bound on LLM calls for this stage.
    pub max_iterations: usize,
}

impl StageConfig {
    pub fn find_tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }
}

impl fmt::Debug for StageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageConfig")
            .field("kind", &self.kind)
            .field("role", &self.agent.role)
            .field("tools", &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>())
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}

/// Per-request input handed to a stage.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub file_path: String,
    pub query: String,
    /// Outputs of the stages that already ran, in order.
    pub prior: Vec<StageOutput>,
}

impl StageContext {
    pub fn new(file_path: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            query: query.into(),
            prior: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutput {
    pub kind: StageKind,
    pub text: String,
    pub iterations: usize,
    pub tool_calls: usize,
}

/// Executes one stage. The pipeline only depends on this seam, so any
/// LLM backend or agent framework can be plugged in.
pub trait StageRunner: Send + Sync {
    fn run_stage(
        &self,
        stage: &StageConfig,
        ctx: &StageContext,
    ) -> Result<StageOutput, StageError>;
}
