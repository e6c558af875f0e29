//! Scripted LLM for tests. Replies are consumed in order and every prompt
//! is recorded.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::types::LlmClient;
use super::LlmError;

pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    failure: Mutex<Option<LlmError>>,
    prompts: Mutex<Vec<String>>,
    systems: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            failure: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
            systems: Mutex::new(Vec::new()),
        }
    }

    /// First call fails with `err`.
    pub fn failing(err: LlmError) -> Self {
        let llm = Self::new(Vec::<String>::new());
        *llm.failure.lock().unwrap() = Some(err);
        llm
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn systems(&self) -> Vec<String> {
        self.systems.lock().unwrap().clone()
    }
}

impl LlmClient for ScriptedLlm {
    fn generate(&self, _model: &str, prompt: &str, system: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.systems.lock().unwrap().push(system.to_string());

        if let Some(err) = self.failure.lock().unwrap().take() {
            return Err(err);
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::ResponseParsing("script exhausted".into()))
    }
}
