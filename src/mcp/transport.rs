use anyhow::Result;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, BufReader, Stdin, Stdout};
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, error, warn};

use super::types::{
    McpError, McpMessage, McpNotification, McpRequest, McpResponse, INVALID_REQUEST, PARSE_ERROR,
};

// Upper bound on a single JSON-RPC line
const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// `LinesCodec` that turns an over-long or non-UTF-8 line into a JSON-RPC
/// error item. `FramedRead` stops yielding after a decoder error, so framing
/// faults must never reach it as errors.
struct JsonRpcLineCodec {
    lines: LinesCodec,
}

impl JsonRpcLineCodec {
    fn new(max_line_bytes: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_line_bytes),
        }
    }

    fn recover(
        result: Result<Option<String>, LinesCodecError>,
    ) -> Result<Option<Result<String, McpError>>, LinesCodecError> {
        match result {
            Ok(line) => Ok(line.map(Ok)),
            // The codec discards the rest of the line on the next call
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!("Dropping message longer than the line limit");
                Ok(Some(Err(McpError::new(
                    INVALID_REQUEST,
                    "Message exceeds the maximum line length",
                ))))
            }
            // Only raised for a line that was already split off the buffer
            Err(LinesCodecError::Io(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                warn!("Dropping message that is not valid UTF-8");
                Ok(Some(Err(McpError::new(
                    PARSE_ERROR,
                    "Parse error: message is not valid UTF-8",
                ))))
            }
            Err(e) => Err(e),
        }
    }
}

impl Decoder for JsonRpcLineCodec {
    type Item = Result<String, McpError>;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Self::recover(self.lines.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Self::recover(self.lines.decode_eof(buf))
    }
}

/// Newline-delimited JSON-RPC over any async byte stream.
pub struct LineTransport<R, W> {
    reader: FramedRead<R, JsonRpcLineCodec>,
    writer: FramedWrite<W, LinesCodec>,
}

pub type StdioTransport = LineTransport<BufReader<Stdin>, Stdout>;

impl StdioTransport {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_max_line_bytes(reader, writer, MAX_LINE_BYTES)
    }

    /// Like [`LineTransport::new`] with a custom bound on incoming lines.
    pub fn with_max_line_bytes(reader: R, writer: W, max_line_bytes: usize) -> Self {
        Self {
            reader: FramedRead::new(reader, JsonRpcLineCodec::new(max_line_bytes)),
            writer: FramedWrite::new(writer, LinesCodec::new()),
        }
    }

    /// Reads the next message. `Ok(None)` means the peer closed the stream;
    /// an inner `Err` is a malformed message the caller should answer.
    pub async fn read_message(&mut self) -> Result<Option<Result<McpMessage, McpError>>> {
        loop {
            match self.reader.next().await {
                Some(Ok(Err(e))) => return Ok(Some(Err(e))),
                Some(Ok(Ok(line))) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    debug!("Received: {}", line);
                    return Ok(Some(parse_message(&line)));
                }
                Some(Err(e)) => {
                    error!("Error reading from input: {}", e);
                    return Err(anyhow::anyhow!("Transport error: {}", e));
                }
                None => {
                    debug!("EOF reached");
                    return Ok(None);
                }
            }
        }
    }

    pub async fn write_response(&mut self, response: McpResponse) -> Result<()> {
        let json = serde_json::to_string(&response)?;
        debug!("Sending: {}", json);

        self.writer.send(json).await?;

        Ok(())
    }
}

/// Classifies one line as a request (has `id`) or a notification.
pub fn parse_message(line: &str) -> Result<McpMessage, McpError> {
    let value = serde_json::from_str::<serde_json::Value>(line).map_err(|e| {
        error!("Failed to parse JSON: {}", e);
        McpError::new(PARSE_ERROR, format!("Parse error: {}", e))
    })?;

    let is_request = match value.as_object() {
        Some(obj) => obj.contains_key("id"),
        None => {
            error!("Invalid JSON-RPC message structure");
            return Err(McpError::new(
                INVALID_REQUEST,
                "Invalid JSON-RPC message structure",
            ));
        }
    };

    if is_request {
        serde_json::from_value::<McpRequest>(value)
            .map(McpMessage::Request)
            .map_err(|e| {
                error!("Failed to parse request: {}", e);
                McpError::new(INVALID_REQUEST, format!("Invalid JSON-RPC request: {}", e))
            })
    } else {
        serde_json::from_value::<McpNotification>(value)
            .map(McpMessage::Notification)
            .map_err(|e| {
                error!("Failed to parse notification: {}", e);
                McpError::new(
                    INVALID_REQUEST,
                    format!("Invalid JSON-RPC notification: {}", e),
                )
            })
    }
}
