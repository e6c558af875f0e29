use std::path::Path;

use super::pdf::PdfTextExtractor;
use super::sanitize::join_pages;
use super::types::{PdfExtractor, Tool};
use super::ExtractionError;

/// Returned instead of an empty string when a PDF has no text layer.
pub const NO_TEXT_WARNING: &str = "WARNING: No extractable text found in this PDF. \
It might be a scanned PDF (image-only). Consider OCR support if needed.";

/// Tool name the agents use to request extraction.
pub const READ_PDF_TOOL_NAME: &str = "read_financial_pdf";

/// Read and return cleaned text from a PDF file path.
pub fn read_financial_pdf(file_path: &str) -> Result<String, ExtractionError> {
    read_pdf_with(&PdfTextExtractor, file_path)
}

/// Same as [`read_financial_pdf`] with an injected extractor.
pub fn read_pdf_with(
    extractor: &dyn PdfExtractor,
    file_path: &str,
) -> Result<String, ExtractionError> {
    if file_path.trim().is_empty() {
        return Err(ExtractionError::InvalidArgument(
            "file_path must be a non-empty string".into(),
        ));
    }

    let path = Path::new(file_path);
    if !path.exists() {
        return Err(ExtractionError::NotFound(path.to_path_buf()));
    }

    let bytes = std::fs::read(path)?;
    let pages = extractor.extract_text(&bytes)?;
    let page_count = pages.len();
    let text = join_pages(pages.iter().map(|p| p.text.as_str()));

    if text.is_empty() {
        tracing::warn!(path = %path.display(), page_count, "PDF has no extractable text");
        return Ok(NO_TEXT_WARNING.to_string());
    }

    tracing::debug!(
        path = %path.display(),
        page_count,
        chars = text.len(),
        "PDF text extracted"
    );
    Ok(text)
}

/// The text extractor exposed to agents as `read_financial_pdf`.
pub struct FinancialPdfTool;

impl Tool for FinancialPdfTool {
    fn name(&self) -> &str {
        READ_PDF_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Read and return cleaned text from a PDF file. Input: the file path of the PDF."
    }

    fn call(&self, input: &str) -> Result<String, ExtractionError> {
        read_financial_pdf(normalize_tool_input(input))
    }
}

/// Models often wrap the path in quotes, backticks or `file_path=`.
fn normalize_tool_input(input: &str) -> &str {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix("file_path")
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix([':', '=']))
        .map(str::trim_start)
        .unwrap_or(trimmed);
    trimmed.trim_matches(|c| c == '"' || c == '\'' || c == '`').trim()
}
