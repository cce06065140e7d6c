use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinError;
use tracing::{info, warn};

use crate::utils::content_guard::truncate_chars;
use crate::utils::fetch::{DocumentFetcher, FetchConfig, FetchError, HttpFetcher};
use crate::utils::pdf::{is_pdf, PageDecoder, PdfExtractDecoder};

/// Upper bound on characters kept from each page.
pub const MAX_CHARS_PER_PAGE: usize = 2000;

pub const NO_READABLE_TEXT: &str = "The PDF contains no readable text.";

#[derive(Error, Debug)]
pub enum PdfReadError {
    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("{reason}")]
    Decode { reason: String },
}

/// Text of one page. `content` is `None` when the decoder returned an empty
/// string; whitespace-only text is kept as content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page_index: usize,
    pub content: Option<String>,
}

impl PageText {
    fn from_decoded(page_index: usize, text: String) -> Self {
        let content = if text.is_empty() { None } else { Some(text) };
        Self {
            page_index,
            content,
        }
    }

    /// Renders the page block, truncated to [`MAX_CHARS_PER_PAGE`].
    pub fn render(&self) -> String {
        match &self.content {
            Some(text) => format!(
                "Page {}:\n{}\n",
                self.page_index,
                truncate_chars(text, MAX_CHARS_PER_PAGE)
            ),
            None => format!("Page {} contains no extractable text.\n", self.page_index),
        }
    }
}

/// Rendered page blocks in page order, one per decoded page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionReport {
    blocks: Vec<String>,
}

impl ExtractionReport {
    pub fn from_pages(pages: &[PageText]) -> Self {
        Self {
            blocks: pages.iter().map(PageText::render).collect(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.blocks.len()
    }
}

impl fmt::Display for ExtractionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.blocks.join("\n"))
    }
}

/// Non-exceptional outcomes of reading a PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfReadOutcome {
    Report(ExtractionReport),
    NoReadableText,
    HttpStatus(u16),
}

impl fmt::Display for PdfReadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdfReadOutcome::Report(report) => write!(f, "{}", report),
            PdfReadOutcome::NoReadableText => f.write_str(NO_READABLE_TEXT),
            PdfReadOutcome::HttpStatus(status) => {
                write!(f, "Failed to retrieve PDF. HTTP status code: {}", status)
            }
        }
    }
}

/// Renders any read result into the text handed back to the caller.
pub fn render_result(result: &Result<PdfReadOutcome, PdfReadError>) -> String {
    match result {
        Ok(outcome) => outcome.to_string(),
        Err(e) => format!(
            "An error occurred while downloading or reading the PDF: {}",
            e
        ),
    }
}

/// True for results that should be flagged as failures to the caller.
pub fn is_failure(result: &Result<PdfReadOutcome, PdfReadError>) -> bool {
    matches!(result, Err(_) | Ok(PdfReadOutcome::HttpStatus(_)))
}

/// Fetch, decode, paginate and truncate a remote PDF.
pub struct PdfExtractionPipeline<F, D> {
    fetcher: F,
    decoder: Arc<D>,
}

pub type HttpPdfPipeline = PdfExtractionPipeline<HttpFetcher, PdfExtractDecoder>;

impl HttpPdfPipeline {
    pub fn from_config(config: &FetchConfig) -> Result<Self, FetchError> {
        Ok(Self::new(HttpFetcher::new(config)?, PdfExtractDecoder))
    }
}

impl<F, D> PdfExtractionPipeline<F, D>
where
    F: DocumentFetcher,
    D: PageDecoder,
{
    pub fn new(fetcher: F, decoder: D) -> Self {
        Self {
            fetcher,
            decoder: Arc::new(decoder),
        }
    }

    /// Typed variant of [`extract_text`](Self::extract_text).
    pub async fn read(&self, url: &str) -> Result<PdfReadOutcome, PdfReadError> {
        let fetched = self.fetcher.fetch(url).await?;

        if fetched.status_code != 200 {
            warn!(target: "pdf_reader", url = url, status = fetched.status_code, "HTTP non-success status");
            return Ok(PdfReadOutcome::HttpStatus(fetched.status_code));
        }

        let head = &fetched.body[..fetched.body.len().min(512)];
        if !is_pdf(fetched.content_type.as_deref(), head) {
            warn!(target: "pdf_reader", url = url, ct = ?fetched.content_type, "Body does not look like a PDF; decoding anyway");
        }

        let started = std::time::Instant::now();
        let decoder = Arc::clone(&self.decoder);
        let body = fetched.body;
        let decoded = tokio::task::spawn_blocking(move || decoder.decode_pages(&body))
            .await
            .map_err(|e| PdfReadError::Decode {
                reason: join_failure_reason(e),
            })?
            .map_err(|e| PdfReadError::Decode {
                reason: format!("{:#}", e),
            })?;

        if decoded.is_empty() {
            info!(target: "pdf_reader", url = url, "PDF has no pages");
            return Ok(PdfReadOutcome::NoReadableText);
        }

        let pages: Vec<PageText> = decoded
            .into_iter()
            .enumerate()
            .map(|(i, text)| PageText::from_decoded(i + 1, text))
            .collect();

        let report = ExtractionReport::from_pages(&pages);
        info!(
            target: "pdf_reader",
            url = url,
            pages = report.page_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "PDF extraction succeeded"
        );
        Ok(PdfReadOutcome::Report(report))
    }

    /// Reads the PDF at `url` and always returns a printable result.
    pub async fn extract_text(&self, url: &str) -> String {
        render_result(&self.read(url).await)
    }
}

fn join_failure_reason(err: JoinError) -> String {
    if !err.is_panic() {
        return format!("PDF decoder task failed: {}", err);
    }
    let payload = err.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("PDF decoder panicked: {}", detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::fetch::test_support::serve_once;
    use crate::utils::fetch::FetchResult;
    use std::time::Duration;

    const ERROR_PREFIX: &str = "An error occurred while downloading or reading the PDF: ";

    struct FakeFetcher {
        status_code: u16,
    }

    impl DocumentFetcher for FakeFetcher {
        async fn fetch(&self, _url: &str) -> Result<FetchResult, FetchError> {
            Ok(FetchResult {
                status_code: self.status_code,
                body: b"%PDF-1.4 fake".to_vec(),
                content_type: Some("application/pdf".to_string()),
            })
        }
    }

    struct BrokenFetcher;

    impl DocumentFetcher for BrokenFetcher {
        async fn fetch(&self, _url: &str) -> Result<FetchResult, FetchError> {
            Err(FetchError::BodyTooLarge { size: 10, limit: 1 })
        }
    }

    struct FixedPages(Vec<String>);

    impl PageDecoder for FixedPages {
        fn decode_pages(&self, _bytes: &[u8]) -> anyhow::Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    struct FailingDecoder;

    impl PageDecoder for FailingDecoder {
        fn decode_pages(&self, _bytes: &[u8]) -> anyhow::Result<Vec<String>> {
            Err(anyhow::anyhow!("invalid file header"))
        }
    }

    struct PanickingDecoder;

    impl PageDecoder for PanickingDecoder {
        fn decode_pages(&self, _bytes: &[u8]) -> anyhow::Result<Vec<String>> {
            panic!("unsupported font encoding")
        }
    }

    fn ok_pipeline(pages: &[&str]) -> PdfExtractionPipeline<FakeFetcher, FixedPages> {
        PdfExtractionPipeline::new(
            FakeFetcher { status_code: 200 },
            FixedPages(pages.iter().map(|p| p.to_string()).collect()),
        )
    }

    #[tokio::test]
    async fn non_200_status_renders_status_message() {
        for status in [201, 301, 403, 404, 500] {
            let pipeline = PdfExtractionPipeline::new(
                FakeFetcher {
                    status_code: status,
                },
                FixedPages(vec!["never decoded".to_string()]),
            );
            assert_eq!(
                pipeline.extract_text("https://example.com/a.pdf").await,
                format!("Failed to retrieve PDF. HTTP status code: {}", status)
            );
        }
    }

    #[tokio::test]
    async fn renders_pages_in_order() {
        let out = ok_pipeline(&["alpha", "beta", "gamma"])
            .extract_text("https://example.com/a.pdf")
            .await;
        assert_eq!(out, "Page 1:\nalpha\n\nPage 2:\nbeta\n\nPage 3:\ngamma\n");
    }

    #[tokio::test]
    async fn long_page_is_cut_to_limit() {
        let long = "x".repeat(MAX_CHARS_PER_PAGE + 500);
        let out = ok_pipeline(&[&long])
            .extract_text("https://example.com/a.pdf")
            .await;
        assert_eq!(out, format!("Page 1:\n{}\n", "x".repeat(MAX_CHARS_PER_PAGE)));
    }

    #[tokio::test]
    async fn truncation_counts_characters() {
        let long = "é".repeat(MAX_CHARS_PER_PAGE + 1);
        let out = ok_pipeline(&[&long])
            .extract_text("https://example.com/a.pdf")
            .await;
        let body = out
            .strip_prefix("Page 1:\n")
            .and_then(|s| s.strip_suffix('\n'))
            .expect("page block");
        assert_eq!(body.chars().count(), MAX_CHARS_PER_PAGE);
    }

    #[tokio::test]
    async fn page_at_limit_is_kept_whole() {
        let exact = "y".repeat(MAX_CHARS_PER_PAGE);
        let out = ok_pipeline(&[&exact])
            .extract_text("https://example.com/a.pdf")
            .await;
        assert_eq!(out, format!("Page 1:\n{}\n", exact));
    }

    #[tokio::test]
    async fn empty_page_gets_placeholder() {
        let out = ok_pipeline(&["first", "", "last"])
            .extract_text("https://example.com/a.pdf")
            .await;
        assert_eq!(
            out,
            "Page 1:\nfirst\n\n\
             Page 2 contains no extractable text.\n\n\
             Page 3:\nlast\n"
        );
    }

    #[tokio::test]
    async fn whitespace_only_page_is_rendered_as_content() {
        let out = ok_pipeline(&["first", "  \n ", "\x0c"])
            .extract_text("https://example.com/a.pdf")
            .await;
        assert_eq!(out, "Page 1:\nfirst\n\nPage 2:\n  \n \n\nPage 3:\n\x0c\n");
    }

    #[tokio::test]
    async fn zero_pages_is_no_readable_text() {
        let pipeline = ok_pipeline(&[]);
        let result = pipeline.read("https://example.com/a.pdf").await;
        assert!(matches!(result, Ok(PdfReadOutcome::NoReadableText)));
        assert_eq!(render_result(&result), "The PDF contains no readable text.");
    }

    #[tokio::test]
    async fn report_has_one_block_per_page() {
        let result = ok_pipeline(&["a", "", "c", "d"])
            .read("https://example.com/a.pdf")
            .await;
        match result {
            Ok(PdfReadOutcome::Report(report)) => assert_eq!(report.page_count(), 4),
            other => panic!("expected report, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn decode_failure_is_rendered() {
        let pipeline = PdfExtractionPipeline::new(FakeFetcher { status_code: 200 }, FailingDecoder);
        let result = pipeline.read("https://example.com/a.pdf").await;
        assert!(is_failure(&result));
        assert_eq!(
            render_result(&result),
            format!("{}invalid file header", ERROR_PREFIX)
        );
    }

    #[tokio::test]
    async fn decoder_panic_is_contained() {
        let pipeline =
            PdfExtractionPipeline::new(FakeFetcher { status_code: 200 }, PanickingDecoder);
        let out = pipeline.extract_text("https://example.com/a.pdf").await;
        assert_eq!(
            out,
            format!(
                "{}PDF decoder panicked: unsupported font encoding",
                ERROR_PREFIX
            )
        );
    }

    #[tokio::test]
    async fn fetch_failure_is_rendered() {
        let pipeline = PdfExtractionPipeline::new(BrokenFetcher, FixedPages(vec![]));
        let out = pipeline.extract_text("https://example.com/a.pdf").await;
        assert_eq!(
            out,
            format!(
                "{}response body of 10 bytes exceeds the limit of 1 bytes",
                ERROR_PREFIX
            )
        );
    }

    #[tokio::test]
    async fn identical_calls_give_identical_output() {
        let pipeline = ok_pipeline(&["one", "", "three"]);
        let first = pipeline.extract_text("https://example.com/a.pdf").await;
        let second = pipeline.extract_text("https://example.com/a.pdf").await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn http_status_is_a_flagged_outcome() {
        let pipeline = PdfExtractionPipeline::new(
            FakeFetcher { status_code: 404 },
            FixedPages(vec![]),
        );
        let result = pipeline.read("https://example.com/a.pdf").await;
        assert!(is_failure(&result));
        assert!(!is_failure(&Ok(PdfReadOutcome::NoReadableText)));
    }

    #[tokio::test]
    async fn real_fetcher_reports_server_status() {
        let url = serve_once(
            b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let pipeline =
            HttpPdfPipeline::from_config(&FetchConfig::new(Duration::from_secs(5)))
                .expect("pipeline");
        assert_eq!(
            pipeline.extract_text(&url).await,
            "Failed to retrieve PDF. HTTP status code: 403"
        );
    }

    #[tokio::test]
    async fn status_wins_over_oversized_error_body() {
        let url = serve_once(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 10\r\nConnection: close\r\n\r\nnot found!",
        )
        .await;
        let pipeline = HttpPdfPipeline::from_config(
            &FetchConfig::new(Duration::from_secs(5)).with_max_body_bytes(4),
        )
        .expect("pipeline");
        assert_eq!(
            pipeline.extract_text(&url).await,
            "Failed to retrieve PDF. HTTP status code: 404"
        );
    }

    #[tokio::test]
    async fn real_decoder_rejects_garbage() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 15\r\nConnection: close\r\n\r\n<html></html>\r\n",
        )
        .await;
        let pipeline =
            HttpPdfPipeline::from_config(&FetchConfig::new(Duration::from_secs(5)))
                .expect("pipeline");
        let out = pipeline.extract_text(&url).await;
        assert!(out.starts_with(ERROR_PREFIX), "unexpected output: {}", out);
    }

    #[tokio::test]
    async fn unreachable_host_is_rendered_as_error() {
        let pipeline =
            HttpPdfPipeline::from_config(&FetchConfig::new(Duration::from_secs(5)))
                .expect("pipeline");
        let out = pipeline.extract_text("http://127.0.0.1:1/paper.pdf").await;
        assert!(out.starts_with(ERROR_PREFIX), "unexpected output: {}", out);
    }
}
