use super::types::{PageExtraction, PdfExtractor};
use super::ExtractionError;

/// PDF text extractor using the pdf-extract crate.
/// Handles digital PDFs with embedded text layers; image-only pages come back empty.
pub struct PdfTextExtractor;

impl PdfExtractor for PdfTextExtractor {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<Vec<PageExtraction>, ExtractionError> {
        // pdf-extract panics on some malformed font tables instead of erroring.
        let outcome =
            std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(pdf_bytes));

        let page_texts = match outcome {
            Ok(result) => result.map_err(|e| ExtractionError::PdfParsing(e.to_string()))?,
            Err(_) => {
                return Err(ExtractionError::PdfParsing(
                    "PDF parser aborted on malformed input".into(),
                ))
            }
        };

        Ok(page_texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| PageExtraction {
                page_number: i + 1,
                text,
            })
            .collect())
    }
}

/// Synthetic PDFs for tests, built with lopdf (the library pdf-extract parses with).
#[cfg(test)]
pub(crate) mod testing {
    use lopdf::dictionary;
    use lopdf::{Document, Object, Stream};

    /// Build a PDF with one page per entry; each page shows its lines top-down.
    /// A page with no lines has an empty content stream (no text layer).
    pub fn make_pdf(pages: &[&[&str]]) -> Vec<u8> {
        let mut doc = Document::with_version("1.4");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();

        for lines in pages {
            let content = if lines.is_empty() {
                String::new()
            } else {
                let mut ops = String::from("BT /F1 12 Tf 72 720 Td");
                for (i, line) in lines.iter().enumerate() {
                    if i > 0 {
                        ops.push_str(" 0 -18 Td");
                    }
                    ops.push_str(&format!(" ({line}) Tj"));
                }
                ops.push_str(" ET");
                ops
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    /// Write a synthetic PDF into `dir` and return its path.
    pub fn write_pdf(dir: &std::path::Path, name: &str, pages: &[&[&str]]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, make_pdf(pages)).unwrap();
        path
    }
}
