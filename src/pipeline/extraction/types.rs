use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// Per-page extraction result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageExtraction {
    pub page_number: usize,
    pub text: String,
}

/// PDF text extraction abstraction
pub trait PdfExtractor {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<Vec<PageExtraction>, ExtractionError>;
}

/// A capability an agent may invoke during its reasoning loop.
pub trait Tool: Send + Sync {
    /// Name the model uses in `Action:` lines.
    fn name(&self) -> &str;

    /// One-line description shown in the tool catalogue.
    fn description(&self) -> &str;

    fn call(&self, input: &str) -> Result<String, ExtractionError>;
}
