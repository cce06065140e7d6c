// Page-level PDF decoding used by the pdf_reader pipeline.
// The decoder is a black box: raw bytes in, one text unit per page out.

use anyhow::Context;

/// Turns raw PDF bytes into page texts, one entry per page in page order.
/// An empty string means the page has no extractable text.
pub trait PageDecoder: Send + Sync + 'static {
    fn decode_pages(&self, bytes: &[u8]) -> anyhow::Result<Vec<String>>;
}

/// Decoder backed by the `pdf-extract` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractDecoder;

impl PageDecoder for PdfExtractDecoder {
    fn decode_pages(&self, bytes: &[u8]) -> anyhow::Result<Vec<String>> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
            .context("failed to extract text from PDF bytes using pdf-extract")?;
        Ok(pages)
    }
}

/// Returns true if given content-type or head indicates a PDF file.
/// - Content-Type: application/pdf (case-insensitive, substring match)
/// - Magic bytes: %PDF-
pub fn is_pdf(content_type: Option<&str>, head: &[u8]) -> bool {
    let ct = content_type.unwrap_or("").to_ascii_lowercase();
    ct.contains("application/pdf") || head.starts_with(b"%PDF-")
}
