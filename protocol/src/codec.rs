//! Line framing for the MCP stdio transport.
//!
//! Each JSON-RPC message is serialized on a single line terminated by `\n`.
//! Messages must not contain embedded newlines, which compact `serde_json`
//! output guarantees.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Maximum line size (4 MiB) to prevent unbounded memory allocation.
pub const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// Reads newline-delimited frames from an async reader.
pub struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
        }
    }

    /// Read the next non-blank line, without its terminator.
    ///
    /// Returns `Ok(None)` on EOF (clean shutdown). A final line without a
    /// trailing newline is still returned. Returns `Err` on oversized lines
    /// or invalid UTF-8.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        loop {
            self.buf.clear();
            let limit = MAX_LINE_BYTES as u64 + 1;
            let bytes_read = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', &mut self.buf)
                .await
                .context("reading line")?;

            if bytes_read == 0 {
                return Ok(None);
            }

            if self.buf.last() == Some(&b'\n') {
                self.buf.pop();
                if self.buf.last() == Some(&b'\r') {
                    self.buf.pop();
                }
            } else if self.buf.len() > MAX_LINE_BYTES {
                bail!("line exceeds maximum {MAX_LINE_BYTES} bytes");
            }

            let line = std::str::from_utf8(&self.buf).context("line is not valid UTF-8")?;
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(line.to_string()));
        }
    }
}

/// Writes newline-delimited JSON frames to an async writer.
pub struct LineWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Serialize `msg` compactly and write it followed by `\n`.
    pub async fn write_frame<T: Serialize + ?Sized>(&mut self, msg: &T) -> Result<()> {
        let mut body = serde_json::to_vec(msg).context("serializing JSON-RPC frame")?;
        body.push(b'\n');

        self.writer
            .write_all(&body)
            .await
            .context("writing frame")?;
        self.writer.flush().await.context("flushing frame")?;

        Ok(())
    }

    /// Write raw bytes as-is.
    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).await.context("writing bytes")?;
        self.writer.flush().await.context("flushing bytes")
    }

    /// Close the write side; the peer sees EOF.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await.context("closing writer")
    }
}
