use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::mcp::types::{CallToolResult, ToolAnnotations, ToolDefinition};
use crate::utils::fetch::FetchConfig;
use crate::utils::pdf_reader::{is_failure, render_result, HttpPdfPipeline, PdfReadError};

pub static PDF_READER_TOOL_DEFINITION: Lazy<ToolDefinition> = Lazy::new(|| ToolDefinition {
    name: "pdf_reader".to_string(),
    description: "A PDF Reader that can download a PDF from a URL and extract text from it. \
                  It returns the content of the PDF as a string, page by page, with at most \
                  2000 characters kept per page."
        .to_string(),
    input_schema: json!({
        "type": "object",
        "properties": {
            "url": {
                "type": "string",
                "description": "The full URL of the PDF to be downloaded and read."
            }
        },
        "required": ["url"]
    }),
    annotations: Some(ToolAnnotations {
        title: Some("PDF Reader".to_string()),
        read_only_hint: Some(true),
        open_world_hint: Some(true),
    }),
});

#[derive(Debug, Deserialize)]
struct PdfReaderParams {
    url: String,
}

pub struct PdfReaderTool {
    config: FetchConfig,
}

impl PdfReaderTool {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }

    pub async fn execute(&self, arguments: Option<serde_json::Value>) -> CallToolResult {
        let params = match arguments {
            Some(args) => match serde_json::from_value::<PdfReaderParams>(args) {
                Ok(params) => params,
                Err(e) => {
                    error!("Invalid pdf_reader parameters: {}", e);
                    return CallToolResult::error(format!("Invalid parameters: {}", e));
                }
            },
            None => {
                return CallToolResult::error("Missing required parameters");
            }
        };

        info!("Reading PDF from URL: {}", params.url);

        let result = match HttpPdfPipeline::from_config(&self.config) {
            Ok(pipeline) => pipeline.read(&params.url).await,
            Err(e) => Err(PdfReadError::from(e)),
        };
        let text = render_result(&result);

        if is_failure(&result) {
            warn!("PDF read failed for URL {}: {}", params.url, text);
            CallToolResult::error(text)
        } else {
            CallToolResult::success(text)
        }
    }
}
