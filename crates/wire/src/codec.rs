//! Newline-delimited JSON framing (spec §4.4).
//!
//! Each [`Message`] is written as one line of JSON followed by `\n`. Lines
//! are bounded so a misbehaving peer can't exhaust memory; oversize lines
//! fail the connection rather than being silently truncated.

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::message::Message;

/// Maximum line length accepted on read, per spec §4.4 ("≥ 1 MiB").
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection closed")]
    ConnectionClosed,
    #[error("line exceeded {MAX_LINE_BYTES} bytes")]
    LineTooLong,
    #[error("invalid JSON envelope: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encode one message as a single newline-terminated JSON line.
pub fn encode(message: &Message) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Decode one line (without its trailing newline) into a message.
pub fn decode(line: &str) -> Result<Message, ProtocolError> {
    Ok(serde_json::from_str(line)?)
}

/// Write one message to `writer` and flush.
pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let line = encode(message)?;
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one newline-terminated message from `reader`.
///
/// Returns `Err(ProtocolError::ConnectionClosed)` on a clean EOF with no
/// partial data buffered; a line longer than [`MAX_LINE_BYTES`] is an error
/// rather than being read in chunks — embedded newlines inside JSON strings
/// are legal (properly escaped) and do not end the frame early.
pub async fn read_message<R>(reader: &mut BufReader<R>) -> Result<Message, ProtocolError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let line = read_line(reader).await?;
    decode(&line)
}

/// Read one newline-terminated line, without decoding it. Exposed so a
/// caller can fall back to inspecting the raw JSON (e.g. to recover a
/// message-type discriminator) when [`decode`] fails.
pub async fn read_line<R>(reader: &mut BufReader<R>) -> Result<String, ProtocolError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let n = read_line_bounded(reader, &mut buf).await?;
    if n == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    while buf.last() == Some(&b'\n') || buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

async fn read_line_bounded<R>(reader: &mut BufReader<R>, buf: &mut Vec<u8>) -> Result<usize, ProtocolError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let n = reader.read_until(b'\n', buf).await?;
    if buf.len() > MAX_LINE_BYTES {
        return Err(ProtocolError::LineTooLong);
    }
    Ok(n)
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
