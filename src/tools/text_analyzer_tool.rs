use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use crate::mcp::types::{CallToolResult, ToolAnnotations, ToolDefinition};
use crate::utils::text_analysis::analyze;

pub static TEXT_ANALYZER_TOOL_DEFINITION: Lazy<ToolDefinition> = Lazy::new(|| ToolDefinition {
    name: "text_analyzer".to_string(),
    description: "Analyzes the input text and provides various statistics. \
                  It can count words, characters, sentences, calculate average word length, \
                  and find most common words. \
                  Input should be a text string and the type of analysis to perform."
        .to_string(),
    input_schema: json!({
        "type": "object",
        "properties": {
            "text": {
                "type": "string",
                "description": "Text to analyze."
            },
            "analysis_type": {
                "type": "string",
                "description": "Type of analysis to perform: 'word_count', 'char_count', 'sentence_count', 'avg_word_length', 'most_common_words', or 'all'.",
                "enum": ["word_count", "char_count", "sentence_count", "avg_word_length", "most_common_words", "all"]
            }
        },
        "required": ["text", "analysis_type"]
    }),
    annotations: Some(ToolAnnotations {
        title: Some("Text Analyzer".to_string()),
        read_only_hint: Some(true),
        open_world_hint: Some(false),
    }),
});

#[derive(Debug, Deserialize)]
struct TextAnalyzerParams {
    text: String,
    analysis_type: String,
}

pub struct TextAnalyzerTool;

impl TextAnalyzerTool {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(&self, arguments: Option<serde_json::Value>) -> CallToolResult {
        let params = match arguments {
            Some(args) => match serde_json::from_value::<TextAnalyzerParams>(args) {
                Ok(params) => params,
                Err(e) => {
                    error!("Invalid text_analyzer parameters: {}", e);
                    return CallToolResult::error(format!("Invalid parameters: {}", e));
                }
            },
            None => {
                return CallToolResult::error("Missing required parameters");
            }
        };

        debug!(
            "Analyzing {} characters of text (analysis_type: {})",
            params.text.chars().count(),
            params.analysis_type
        );

        // An unknown analysis_type is an ordinary answer, not a tool error
        CallToolResult::success(analyze(&params.text, &params.analysis_type))
    }
}
