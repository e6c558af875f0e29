use std::sync::Arc;

use super::output::{parse_agent_step, strip_thinking, AgentStep};
use super::prompt::{build_system_prompt, build_task_prompt};
use super::types::{LlmClient, StageConfig, StageContext, StageOutput, StageRunner};
use super::StageError;

/// Observations longer than this are cut before they go back into the prompt.
pub const MAX_OBSERVATION_CHARS: usize = 60_000;

/// Bounded Thought/Action/Observation loop over a blocking LLM client.
pub struct AgentExecutor {
    llm: Arc<dyn LlmClient>,
    model_name: String,
}

impl AgentExecutor {
    pub fn new(llm: Arc<dyn LlmClient>, model_name: impl Into<String>) -> Self {
        Self {
            llm,
            model_name: model_name.into(),
        }
    }
}

impl StageRunner for AgentExecutor {
    fn run_stage(
        &self,
        stage: &StageConfig,
        ctx: &StageContext,
    ) -> Result<StageOutput, StageError> {
        let _span = tracing::info_span!("stage", stage = %stage.kind, model = %self.model_name)
            .entered();
        let start = std::time::Instant::now();
        let system = build_system_prompt(stage);
        let max_iterations = stage.max_iterations.max(1);

        let mut scratchpad = String::new();
        let mut tool_calls = 0;

        for iteration in 1..=max_iterations {
            let force_answer = iteration == max_iterations;
            let prompt = build_task_prompt(stage, ctx, &scratchpad, force_answer);
            let raw = self.llm.generate(&self.model_name, &prompt, &system)?;
            let reply = strip_thinking(&raw);

            let answer = match parse_agent_step(&reply) {
                AgentStep::Final(answer) => Some(answer),
                AgentStep::Unstructured(text) => Some(text),
                AgentStep::Action { tool, .. } if force_answer => {
                    tracing::warn!(iteration, tool = %tool, "Tool requested after step limit");
                    Some(self.answer_without_tools(stage, ctx, &scratchpad)?)
                }
                AgentStep::Action { tool, input } => {
                    let handle = stage
                        .find_tool(&tool)
                        .ok_or_else(|| StageError::UnknownTool(tool.clone()))?;
                    tracing::debug!(iteration, tool = %tool, "Agent tool call");
                    let observation = handle.call(&input).map_err(|source| StageError::Tool {
                        tool: tool.clone(),
                        source,
                    })?;
                    tool_calls += 1;
                    append_step(&mut scratchpad, &reply, &observation);
                    None
                }
            };

            if let Some(answer) = answer {
                let answer = answer.trim();
                if answer.is_empty() {
                    return Err(StageError::EmptyAnswer);
                }
                tracing::info!(
                    iteration,
                    tool_calls,
                    chars = answer.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Stage complete"
                );
                return Ok(StageOutput {
                    kind: stage.kind,
                    text: answer.to_string(),
                    iterations: iteration,
                    tool_calls,
                });
            }
        }

        // Unreachable in practice: the last iteration always yields an answer.
        Err(StageError::EmptyAnswer)
    }
}

impl AgentExecutor {
    /// One extra call with no tools offered. A reply that still asks for a
    /// tool fails the stage.
    fn answer_without_tools(
        &self,
        stage: &StageConfig,
        ctx: &StageContext,
        scratchpad: &str,
    ) -> Result<String, StageError> {
        let answer_only = StageConfig {
            tools: Vec::new(),
            ..stage.clone()
        };
        let system = build_system_prompt(&answer_only);
        let prompt = build_task_prompt(&answer_only, ctx, scratchpad, true);
        let reply = strip_thinking(&self.llm.generate(&self.model_name, &prompt, &system)?);

        match parse_agent_step(&reply) {
            AgentStep::Final(answer) | AgentStep::Unstructured(answer) => Ok(answer),
            AgentStep::Action { .. } => Err(StageError::IterationLimit(stage.max_iterations.max(1))),
        }
    }
}

/// Record the model's action text followed by the tool result.
fn append_step(scratchpad: &mut String, reply: &str, observation: &str) {
    // Anything the model wrote after Action Input is a hallucinated observation.
    let action_text = match reply.find("Observation:") {
        Some(pos) => &reply[..pos],
        None => reply,
    };
    scratchpad.push_str(action_text.trim_end());
    scratchpad.push_str("\nObservation: ");
    scratchpad.push_str(truncate_chars(observation, MAX_OBSERVATION_CHARS));
    scratchpad.push('\n');
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::agents::mock::ScriptedLlm;
    use crate::pipeline::agents::prompt::StageSet;
    use crate::pipeline::agents::{LlmError, StageKind};
    use crate::pipeline::extraction::pdf::testing::write_pdf;
    use crate::pipeline::extraction::{ExtractionError, FinancialPdfTool, READ_PDF_TOOL_NAME};

    fn stages() -> StageSet {
        StageSet::standard(Arc::new(FinancialPdfTool))
    }

    #[test]
    fn final_answer_on_first_call_skips_tools() {
        let llm = Arc::new(ScriptedLlm::new(["Thought: easy\nFinal Answer: doc_type: invoice"]));
        let executor = AgentExecutor::new(llm.clone(), "test-model");
        let set = stages();

        let out = executor
            .run_stage(&set.verifier, &StageContext::new("a.pdf", "q"))
            .unwrap();
        assert_eq!(out.kind, StageKind::Verification);
        assert_eq!(out.text, "doc_type: invoice");
        assert_eq!(out.iterations, 1);
        assert_eq!(out.tool_calls, 0);
        assert_eq!(llm.calls(), 1);
    }

    #[test]
    fn tool_observation_feeds_next_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), "r.pdf", &[&["Revenue: $10M"]]);
        let llm = Arc::new(ScriptedLlm::new([
            format!(
                "Thought: read it\nAction: read_financial_pdf\nAction Input: {}",
                path.display()
            ),
            "Final Answer: Revenue was $10M.".to_string(),
        ]));
        let executor = AgentExecutor::new(llm.clone(), "m");
        let set = stages();

        let out = executor
            .run_stage(
                &set.analyst,
                &StageContext::new(path.to_str().unwrap(), "revenue?"),
            )
            .unwrap();
        assert_eq!(out.text, "Revenue was $10M.");
        assert_eq!(out.tool_calls, 1);
        assert_eq!(out.iterations, 2);

        let prompts = llm.prompts();
        assert!(prompts[1].contains("Action Input: "));
        assert!(prompts[1].contains("Observation: "));
        assert!(prompts[1].contains("$10M"));
    }

    #[test]
    fn last_iteration_forces_answer() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), "r.pdf", &[&["Debt: $1M"]]);
        let action = format!("Action: read_financial_pdf\nAction Input: {}", path.display());
        let llm = Arc::new(ScriptedLlm::new([action.clone(), action, "Final Answer: Debt is $1M.".into()]));
        let executor = AgentExecutor::new(llm.clone(), "m");
        let set = stages();

        let out = executor
            .run_stage(&set.verifier, &StageContext::new("x", "q"))
            .unwrap();
        assert_eq!(out.text, "Debt is $1M.");
        assert_eq!(out.iterations, 2);
        assert_eq!(out.tool_calls, 1);
        assert_eq!(llm.calls(), 3);

        let prompts = llm.prompts();
        assert!(prompts[1].contains("maximum number of steps"));
        assert!(prompts[2].contains("maximum number of steps"));
        assert!(prompts[2].contains("$1M"));
        let systems = llm.systems();
        let catalogue_entry = format!("- {READ_PDF_TOOL_NAME}: ");
        assert!(systems[1].contains(&catalogue_entry));
        assert!(!systems[2].contains(&catalogue_entry));
    }

    #[test]
    fn tool_request_after_limit_is_never_the_answer() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), "r.pdf", &[&["Debt: $1M"]]);
        let action = format!("Action: read_financial_pdf\nAction Input: {}", path.display());
        let llm = Arc::new(ScriptedLlm::new([action.clone(), action.clone(), action]));
        let executor = AgentExecutor::new(llm.clone(), "m");

        let err = executor
            .run_stage(&stages().verifier, &StageContext::new("x", "q"))
            .unwrap_err();
        assert!(matches!(err, StageError::IterationLimit(2)));
        assert_eq!(llm.calls(), 3);
    }

    #[test]
    fn think_blocks_are_removed_from_answer() {
        let llm = Arc::new(ScriptedLlm::new(["<think>hmm</think>Final Answer: ok"]));
        let executor = AgentExecutor::new(llm, "m");
        let out = executor
            .run_stage(&stages().verifier, &StageContext::new("a", "q"))
            .unwrap();
        assert_eq!(out.text, "ok");
    }

    #[test]
    fn unstructured_reply_is_the_answer() {
        let llm = Arc::new(ScriptedLlm::new(["## Risk Summary\nNo risks mentioned."]));
        let executor = AgentExecutor::new(llm, "m");
        let out = executor
            .run_stage(&stages().risk_assessor, &StageContext::new("a", "q"))
            .unwrap();
        assert_eq!(out.text, "## Risk Summary\nNo risks mentioned.");
    }

    #[test]
    fn empty_answer_is_error() {
        let llm = Arc::new(ScriptedLlm::new(["Final Answer:   "]));
        let executor = AgentExecutor::new(llm, "m");
        let err = executor
            .run_stage(&stages().verifier, &StageContext::new("a", "q"))
            .unwrap_err();
        assert!(matches!(err, StageError::EmptyAnswer));
    }

    #[test]
    fn unknown_tool_is_error() {
        let llm = Arc::new(ScriptedLlm::new(["Action: browse_web\nAction Input: x"]));
        let executor = AgentExecutor::new(llm, "m");
        let err = executor
            .run_stage(&stages().analyst, &StageContext::new("a", "q"))
            .unwrap_err();
        assert!(matches!(err, StageError::UnknownTool(t) if t == "browse_web"));
    }

    #[test]
    fn tool_failure_fails_stage() {
        let llm = Arc::new(ScriptedLlm::new([
            "Action: read_financial_pdf\nAction Input: /definitely/missing.pdf",
        ]));
        let executor = AgentExecutor::new(llm, "m");
        let err = executor
            .run_stage(&stages().analyst, &StageContext::new("a", "q"))
            .unwrap_err();
        assert!(matches!(
            err,
            StageError::Tool { ref tool, source: ExtractionError::NotFound(_) } if tool == "read_financial_pdf"
        ));
    }

    #[test]
    fn llm_failure_propagates() {
        let llm = Arc::new(ScriptedLlm::failing(LlmError::Timeout(120)));
        let executor = AgentExecutor::new(llm, "m");
        let err = executor
            .run_stage(&stages().verifier, &StageContext::new("a", "q"))
            .unwrap_err();
        assert!(matches!(err, StageError::Llm(LlmError::Timeout(120))));
    }

    #[test]
    fn hallucinated_observation_is_replaced() {
        let mut pad = String::new();
        append_step(
            &mut pad,
            "Action: read_financial_pdf\nAction Input: a.pdf\nObservation: made up",
            "real text",
        );
        assert!(!pad.contains("made up"));
        assert!(pad.ends_with("Observation: real text\n"));
    }

    #[test]
    fn long_observations_are_truncated() {
        let long = "é".repeat(MAX_OBSERVATION_CHARS + 10);
        assert_eq!(
            truncate_chars(&long, MAX_OBSERVATION_CHARS).chars().count(),
            MAX_OBSERVATION_CHARS
        );
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
