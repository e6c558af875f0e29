//! Post-LLM output handling: strip reasoning artifacts, then classify the
//! reply as a tool call, a final answer, or free text.

use std::sync::LazyLock;

use regex::Regex;

static THINK_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));
static UNUSED_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<unused\d+>").expect("valid regex"));
static FINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)final\s+answer\s*:").expect("valid regex"));
static ACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*action[ \t]*:[ \t]*(.+?)[ \t]*$").expect("valid regex"));
static ACTION_INPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*action[ \t]+input[ \t]*:[ \t]*(.*)$").expect("valid regex")
});

/// What the model asked for in one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStep {
    Final(String),
    Action { tool: String, input: String },
    /// No recognised marker; the caller decides whether this is an answer.
    Unstructured(String),
}

/// Strip model reasoning artifacts from raw LLM output.
pub fn strip_thinking(raw: &str) -> String {
    let text = THINK_BLOCK_RE.replace_all(raw, "");
    UNUSED_TOKEN_RE.replace_all(&text, "").trim().to_string()
}

/// Classify a (thinking-stripped) reply.
///
/// An `Action:` that appears before any `Final Answer:` wins, matching how
/// the model is told to interleave tool calls and answers.
pub fn parse_agent_step(response: &str) -> AgentStep {
    let final_pos = FINAL_RE.find(response).map(|m| (m.start(), m.end()));
    let action = ACTION_RE.captures(response);

    if let Some(caps) = action {
        let action_start = caps.get(0).map(|m| m.start()).unwrap_or(0);
        if final_pos.map_or(true, |(start, _)| action_start < start) {
            let raw_tool = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let (tool, inline_input) = split_inline_call(raw_tool);
            let input = ACTION_INPUT_RE
                .captures(&response[action_start..])
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty())
                .or(inline_input)
                .unwrap_or_default();
            return AgentStep::Action { tool, input };
        }
    }

    if let Some((_, end)) = final_pos {
        return AgentStep::Final(response[end..].trim().to_string());
    }

    AgentStep::Unstructured(response.trim().to_string())
}

/// `read_financial_pdf("x.pdf")` style calls carry their input inline.
fn split_inline_call(raw: &str) -> (String, Option<String>) {
    let raw = raw.trim().trim_matches('`');
    match (raw.find('('), raw.rfind(')')) {
        (Some(open), Some(close)) if close > open => {
            let inner = raw[open + 1..close].trim();
            let input = (!inner.is_empty()).then(|| inner.to_string());
            (raw[..open].trim().to_string(), input)
        }
        _ => (raw.to_string(), None),
    }
}
