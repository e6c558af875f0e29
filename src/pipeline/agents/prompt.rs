use std::sync::Arc;

use super::types::{AgentSpec, StageConfig, StageContext, StageKind, TaskSpec};
use crate::pipeline::extraction::Tool;

pub const VERIFIER: AgentSpec = AgentSpec {
    role: "Document Verifier",
    goal: "Verify the uploaded file is readable and appears to be a financial document \
(report, statement or filing). Summarize what kind of document it is based on the extracted text.",
    backstory: "You are strict about classification. If the content looks non-financial or \
unreadable, you say so.",
};

pub const FINANCIAL_ANALYST: AgentSpec = AgentSpec {
    role: "Financial Analyst",
    goal: "Analyze the provided financial document and answer the user's query using ONLY the \
document content. If something is missing from the document, say so explicitly.",
    backstory: "You are a careful financial analyst. You ground every claim in the provided \
document text and avoid making unsupported assumptions.",
};

pub const RISK_ASSESSOR: AgentSpec = AgentSpec {
    role: "Risk Assessor",
    goal: "Identify realistic risks and uncertainties mentioned or implied by the document \
(macro, business, liquidity, concentration, etc.). Stay grounded in the document and avoid \
fear-mongering.",
    backstory: "You specialize in practical risk analysis and clearly communicate uncertainty. \
You do not fabricate extreme scenarios.",
};

pub const VERIFY_TASK: TaskSpec = TaskSpec {
    description: "Inputs:
- file_path: {file_path}
- query: {query}

Step 1) Use the tool read_financial_pdf with the file_path above to extract the text.
Step 2) Determine whether this looks like a financial document (earnings report, annual report, \
bank statement, invoice, filing, etc.).
Step 3) If the tool returned a WARNING that no text could be extracted, readability is `empty` \
and you must not claim a document type with confidence; use `unknown`.
Step 4) If the text is readable but not financial, say so explicitly.

Output exactly these fields:
- doc_type: <string>
- readability: <good | partial | empty>
- short_reason: <1-3 lines>",
    expected_output: "A short structured output with doc_type, readability, and short_reason.",
};

pub const ANALYZE_TASK: TaskSpec = TaskSpec {
    description: "Inputs:
- file_path: {file_path}
- query: {query}

Instructions:
1) Call read_financial_pdf with the file_path above to get the document text.
2) Answer the user's query using only the extracted text.
3) Extract these metrics if present: revenue, profit, margins, cash flow, debt, guidance. \
For every metric that is not in the text write 'Not found'. Do not add metrics that are not listed.
4) Provide a concise conclusion.

Output format (use these headings):
## Answer to Query
## Key Extracted Metrics
## Notes / Assumptions
## Disclaimer
The disclaimer must say this is informational and not financial advice.",
    expected_output: "A clear analysis using the required headings.",
};

pub const RISK_TASK: TaskSpec = TaskSpec {
    description: "Inputs:
- file_path: {file_path}
- query: {query}

Instructions:
1) Call read_financial_pdf with the file_path above to get the document text.
2) Identify realistic risks mentioned or implied in the document.
3) Separate risks into: Business, Financial, Market/Macro, Operational, Regulatory.
4) If the document does not mention or imply risks, say that explicitly.
5) Keep it concise and non-alarmist. Do not invent extreme scenarios.

Output format:
## Risk Summary
## Risk Breakdown
## What to Verify Next",
    expected_output: "A structured risk assessment grounded in the PDF.",
};

/// The three stage configurations, constructed once and shared by every run.
#[derive(Debug, Clone)]
pub struct StageSet {
    pub verifier: StageConfig,
    pub analyst: StageConfig,
    pub risk_assessor: StageConfig,
}

impl StageSet {
    /// Standard stages; every agent may call `pdf_tool`.
    pub fn standard(pdf_tool: Arc<dyn Tool>) -> Self {
        Self {
            verifier: StageConfig {
                kind: StageKind::Verification,
                agent: VERIFIER,
                task: VERIFY_TASK,
                tools: vec![pdf_tool.clone()],
                max_iterations: 2,
            },
            analyst: StageConfig {
                kind: StageKind::Analysis,
                agent: FINANCIAL_ANALYST,
                task: ANALYZE_TASK,
                tools: vec![pdf_tool.clone()],
                max_iterations: 3,
            },
            risk_assessor: StageConfig {
                kind: StageKind::RiskAssessment,
                agent: RISK_ASSESSOR,
                task: RISK_TASK,
                tools: vec![pdf_tool],
                max_iterations: 3,
            },
        }
    }

    /// Stages in execution order.
    pub fn ordered(&self) -> [&StageConfig; 3] {
        [&self.verifier, &self.analyst, &self.risk_assessor]
    }
}

/// Persona, tool catalogue and reply protocol.
pub fn build_system_prompt(stage: &StageConfig) -> String {
    let agent = &stage.agent;
    let mut prompt = format!(
        "You are {role}. {backstory}\nYour personal goal is: {goal}\n",
        role = agent.role,
        backstory = agent.backstory,
        goal = agent.goal,
    );

    if stage.tools.is_empty() {
        prompt.push_str(
            "\nReply in this format:\nThought: <your reasoning>\nFinal Answer: <your complete answer>\n",
        );
        return prompt;
    }

    prompt.push_str("\nYou ONLY have access to the following tools:\n");
    for tool in &stage.tools {
        prompt.push_str(&format!("- {}: {}\n", tool.name(), tool.description()));
    }
    let names = stage
        .tools
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(", ");
    prompt.push_str(&format!(
        "
To use a tool, reply with exactly:
Thought: <what you need and why>
Action: <one of [{names}]>
Action Input: <the input for the tool>

Stop after Action Input. The tool result will be given back to you as an Observation.
Once you have what you need, reply with:
Thought: I now know the final answer
Final Answer: <your complete answer, following the expected output>
"
    ));
    prompt
}

/// Rendered task, earlier stage outputs and the running scratchpad.
pub fn build_task_prompt(
    stage: &StageConfig,
    ctx: &StageContext,
    scratchpad: &str,
    force_answer: bool,
) -> String {
    let mut prompt = format!(
        "Current Task:\n{description}\n\nThis is the expected criteria for your final answer: {expected}\n\
You MUST return the actual complete content as the final answer, not a summary.\n",
        description = stage.task.render(ctx),
        expected = stage.task.expected_output,
    );

    if !ctx.prior.is_empty() {
        prompt.push_str("\nContext from earlier stages:\n");
        for output in &ctx.prior {
            prompt.push_str(&format!("\n### {}\n{}\n", output.kind.title(), output.text));
        }
    }

    prompt.push_str("\nBegin!\n");
    if !scratchpad.is_empty() {
        prompt.push('\n');
        prompt.push_str(scratchpad);
    }
    if force_answer {
        prompt.push_str(
            "\nYou have reached the maximum number of steps. Do not call any more tools. \
Reply now with your Final Answer based on the observations above.\n",
        );
    }
    prompt
}
