//! Response framing.
//!
//! A response is a CRLF-terminated line, continued after every trailing
//! `{n}` by exactly `n` raw bytes and another line. [`FramedStream`] hands
//! each response out as one owned buffer with literals inlined, which is
//! what the [`crate::decode`] functions take.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::trace;

use crate::{Error, Result};

const IO_BUFFER: usize = 8 * 1024;
const LINE_LIMIT: usize = 1024 * 1024;
const LITERAL_LIMIT: usize = 100 * 1024 * 1024;

/// Literal-aware reader and command writer over a transport.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    outgoing: BytesMut,
    io_timeout: Option<Duration>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps `stream` with no read deadline.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(IO_BUFFER, stream),
            outgoing: BytesMut::with_capacity(IO_BUFFER),
            io_timeout: None,
        }
    }

    /// Caps every [`read_response`](Self::read_response) at `limit`.
    #[must_use]
    pub const fn with_timeout(mut self, limit: Duration) -> Self {
        self.io_timeout = Some(limit);
        self
    }

    /// The read deadline, if one was set.
    #[must_use]
    pub const fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout
    }

    /// Next complete response, subject to the read deadline.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let Some(limit) = self.io_timeout else {
            return self.read_response_unbounded().await;
        };
        tokio::time::timeout(limit, self.read_response_unbounded())
            .await
            .map_err(|_| Error::Timeout(limit))?
    }

    /// Next complete response with no deadline. IDLE waits use this and
    /// apply their own.
    pub(crate) async fn read_response_unbounded(&mut self) -> Result<Vec<u8>> {
        let mut response = self.read_line().await?;
        while let Some(len) = trailing_literal(&response) {
            if len > LITERAL_LIMIT {
                return Err(Error::Protocol(format!(
                    "literal too large: {len} bytes, limit {LITERAL_LIMIT}"
                )));
            }
            let start = response.len();
            response.resize(start + len, 0);
            self.reader.read_exact(&mut response[start..]).await?;
            let continuation = self.read_line().await?;
            response.extend_from_slice(&continuation);
        }
        trace!(bytes = response.len(), "S: response");
        Ok(response)
    }

    /// Collects responses up to and including the completion for `tag`.
    pub async fn read_until_tagged(&mut self, tag: &str) -> Result<Vec<Vec<u8>>> {
        let mut collected = Vec::new();
        loop {
            let response = self.read_response().await?;
            let complete = is_tagged_for(&response, tag);
            collected.push(response);
            if complete {
                return Ok(collected);
            }
        }
    }

    /// One line up to and including `\n`.
    async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        let cap = u64::try_from(LINE_LIMIT + 1).unwrap_or(u64::MAX);
        (&mut self.reader).take(cap).read_until(b'\n', &mut line).await?;

        if line.last() == Some(&b'\n') {
            return Ok(line);
        }
        if line.len() > LINE_LIMIT {
            return Err(Error::Protocol("line too long".to_string()));
        }
        Err(Error::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed mid-response",
        )))
    }

    /// Sends one encoded command and flushes.
    pub async fn write_command(&mut self, encoded: &[u8]) -> Result<()> {
        self.outgoing.clear();
        self.outgoing.extend_from_slice(encoded);
        let transport = self.reader.get_mut();
        transport.write_all(&self.outgoing).await?;
        transport.flush().await?;
        Ok(())
    }

    /// The wrapped transport.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Unwraps the transport. Anything buffered but unread is lost, so this
    /// is only safe right after a tagged completion such as STARTTLS's.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

/// Whether `response` is the tagged completion for `tag`.
#[must_use]
pub fn is_tagged_for(response: &[u8], tag: &str) -> bool {
    matches!(response.strip_prefix(tag.as_bytes()), Some([b' ', ..]))
}

/// Size announced by a trailing `{n}` or `{n+}`.
fn trailing_literal(line: &[u8]) -> Option<usize> {
    let inner = line.strip_suffix(b"\r\n")?.strip_suffix(b"}")?;
    let inner = inner.strip_suffix(b"+").unwrap_or(inner);
    let open = inner.iter().rposition(|&b| b == b'{')?;
    let digits = &inner[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}
