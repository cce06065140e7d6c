use anyhow::Result;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::transport::{LineTransport, StdioTransport};
use super::types::*;
use crate::tools::{
    pdf_reader_tool::{PdfReaderTool, PDF_READER_TOOL_DEFINITION},
    text_analyzer_tool::{TextAnalyzerTool, TEXT_ANALYZER_TOOL_DEFINITION},
};
use crate::utils::fetch::FetchConfig;

pub struct McpServer {
    fetch_config: FetchConfig,
    initialized: bool,
}

impl McpServer {
    pub fn new(fetch_config: FetchConfig) -> Self {
        Self {
            fetch_config,
            initialized: false,
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        info!("MCP server started and listening on stdio");
        let mut transport = StdioTransport::stdio();
        self.serve(&mut transport).await
    }

    /// Answers requests until the peer closes the stream.
    pub async fn serve<R, W>(&mut self, transport: &mut LineTransport<R, W>) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            match transport.read_message().await? {
                Some(Ok(McpMessage::Request(request))) => {
                    let response = self.handle_request(request).await;
                    transport.write_response(response).await?;
                }
                Some(Ok(McpMessage::Notification(notification))) => {
                    self.handle_notification(notification).await;
                }
                Some(Err(error)) => {
                    warn!("Rejecting malformed message: {}", error.message);
                    transport
                        .write_response(McpResponse::failure(serde_json::Value::Null, error))
                        .await?;
                }
                None => {
                    info!("Client disconnected");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_request(&mut self, request: McpRequest) -> McpResponse {
        let id = Self::ensure_valid_id(request.id.clone());

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id, request.params),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => self.handle_call_tool(id, request.params).await,
            "ping" => McpResponse::success(id, &serde_json::json!({})),
            _ => {
                debug!("Unknown method: {}", request.method);
                McpResponse::failure(id, McpError::new(METHOD_NOT_FOUND, "Method not found"))
            }
        }
    }

    async fn handle_notification(&mut self, notification: McpNotification) {
        debug!("Received notification: {}", notification.method);

        match notification.method.as_str() {
            "notifications/initialized" => {
                info!("Client initialization completed");
                self.initialized = true;
            }
            "notifications/cancelled" => {
                // Calls run to completion; nothing to cancel
                debug!("Request cancelled notification received");
            }
            _ => {
                warn!("Unknown notification method: {}", notification.method);
            }
        }
    }

    fn ensure_valid_id(id: Option<serde_json::Value>) -> serde_json::Value {
        match id {
            Some(serde_json::Value::Null) | None => serde_json::Value::String("0".to_string()),
            Some(value) => value,
        }
    }

    fn parse_params<T: DeserializeOwned>(params: Option<serde_json::Value>) -> Result<T, McpError> {
        let params = params.ok_or_else(|| McpError::new(INVALID_PARAMS, "Missing params"))?;
        serde_json::from_value::<T>(params)
            .map_err(|e| McpError::new(INVALID_PARAMS, format!("Invalid params: {}", e)))
    }

    fn handle_initialize(
        &mut self,
        id: serde_json::Value,
        params: Option<serde_json::Value>,
    ) -> McpResponse {
        let init_params = match Self::parse_params::<InitializeParams>(params) {
            Ok(p) => p,
            Err(e) => return McpResponse::failure(id, e),
        };
        info!(
            "Initializing session for {} {} (protocol {})",
            init_params.client_info.name,
            init_params.client_info.version,
            init_params.protocol_version
        );

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            server_info: ServerInfo {
                name: "mcp-doctools".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: Some(
                    "PDF reader and text statistics tools for agents".to_string(),
                ),
            },
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
                logging: Some(serde_json::json!({})),
            },
        };

        McpResponse::success(id, &result)
    }

    fn handle_list_tools(&self, id: serde_json::Value) -> McpResponse {
        let result = ListToolsResult {
            tools: vec![
                PDF_READER_TOOL_DEFINITION.clone(),
                TEXT_ANALYZER_TOOL_DEFINITION.clone(),
            ],
        };
        McpResponse::success(id, &result)
    }

    async fn handle_call_tool(
        &self,
        id: serde_json::Value,
        params: Option<serde_json::Value>,
    ) -> McpResponse {
        if !self.initialized {
            debug!("tools/call received before the initialized notification");
        }
        match Self::parse_params::<CallToolParams>(params) {
            Ok(call_params) => {
                let result = self.execute_tool(call_params).await;
                McpResponse::success(id, &result)
            }
            Err(e) => McpResponse::failure(id, e),
        }
    }

    pub async fn execute_tool(&self, params: CallToolParams) -> CallToolResult {
        match params.name.as_str() {
            "pdf_reader" => {
                let tool = PdfReaderTool::new(self.fetch_config.clone());
                tool.execute(params.arguments).await
            }
            "text_analyzer" => {
                let tool = TextAnalyzerTool::new();
                tool.execute(params.arguments).await
            }
            _ => CallToolResult::error(format!("Tool not found: {}", params.name)),
        }
    }
}
