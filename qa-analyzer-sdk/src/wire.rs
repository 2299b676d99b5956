//! Newline-delimited JSON transport for the event stream.
//!
//! One JSON object per line, in emission order. The framing is deliberately
//! trivial so the same protocol rides any byte transport — a chunked HTTP
//! response, a pipe, a file — and other framings (SSE, gRPC streaming) can
//! replace it without touching the event schema.

use serde_json::Error as JsonError;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::events::ProgressEvent;

/// Serialize one event to its wire line (no trailing newline).
pub fn encode_event(event: &ProgressEvent) -> Result<String, JsonError> {
    serde_json::to_string(event)
}

/// Parse one wire line back into an event.
pub fn decode_event(line: &str) -> Result<ProgressEvent, JsonError> {
    serde_json::from_str(line.trim())
}

/// Write one event as a JSON line and flush, so consumers observe it
/// immediately rather than at buffer boundaries.
pub async fn write_event<W>(writer: &mut W, event: &ProgressEvent) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = encode_event(event).map_err(std::io::Error::other)?;
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
