pub mod types;
pub mod sanitize;
pub mod pdf;
pub mod reader;

pub use types::*;
pub use sanitize::*;
pub use pdf::*;
pub use reader::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("PDF file not found: {0}")]
    NotFound(PathBuf),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
