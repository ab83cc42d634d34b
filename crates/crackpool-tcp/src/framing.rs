//! Newline-delimited JSON framing
//!
//! One frame per line: `{"event": "<name>", "payload": ...}`. Shared by the
//! transport and by worker clients.

use crackpool_core::{CrackpoolError, CrackpoolResult, ProtocolError, TransportError};
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

use crate::error::TcpTransportError;

/// Serialize a frame as one line, terminator included
pub fn encode_frame<T: Serialize>(frame: &T) -> CrackpoolResult<String> {
    let mut line = serde_json::to_string(frame)?;
    line.push('\n');
    Ok(line)
}

/// Parse one line (terminator already stripped)
pub fn decode_frame<T: DeserializeOwned>(line: &str) -> Result<T, ProtocolError> {
    serde_json::from_str(line).map_err(|e| ProtocolError::MalformedFrame {
        reason: e.to_string(),
    })
}

/// Reads lines of at most `max_len` bytes
pub struct FrameReader<R> {
    reader: BufReader<R>,
    buffer: Vec<u8>,
    max_len: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, max_len: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            buffer: Vec::new(),
            max_len,
        }
    }

    /// Next line without its `\n` or `\r\n`; `None` at end of stream.
    ///
    /// Cancel safe: bytes of a partially read line are kept for the next
    /// call. A line longer than `max_len` is an error and leaves the stream in
    /// the middle of that line, so callers should drop the connection.
    pub async fn next_line(&mut self) -> CrackpoolResult<Option<String>> {
        let budget = (self.max_len + 1).saturating_sub(self.buffer.len()) as u64;
        (&mut self.reader)
            .take(budget)
            .read_until(b'\n', &mut self.buffer)
            .await
            .map_err(TransportError::from)?;

        if self.buffer.is_empty() {
            return Ok(None);
        }
        let mut line = std::mem::take(&mut self.buffer);
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        } else if line.len() > self.max_len {
            return Err(TcpTransportError::FrameTooLong {
                len: line.len(),
                max_len: self.max_len,
            }
            .into());
        }

        String::from_utf8(line)
            .map(Some)
            .map_err(|_| CrackpoolError::malformed_frame("frame is not UTF-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crackpool_core::{ServerEvent, WorkerFrame};

    #[test]
    fn test_encode_is_one_line() {
        let line = encode_frame(&ServerEvent::Log("two\nlines".into())).unwrap();
        assert_eq!(line, "{\"event\":\"log\",\"payload\":\"two\\nlines\"}\n");
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn test_decode_rejects_unknown_event() {
        let result = decode_frame::<WorkerFrame>(r#"{"event":"job","payload":"x"}"#);
        assert!(matches!(result, Err(ProtocolError::MalformedFrame { .. })));
    }

    #[tokio::test]
    async fn test_reader_splits_lines() {
        let input: &[u8] = b"{\"event\":\"lifecheck\"}\r\n\nlast";
        let mut reader = FrameReader::new(input, 64);
        assert_eq!(
            reader.next_line().await.unwrap().as_deref(),
            Some("{\"event\":\"lifecheck\"}")
        );
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some(""));
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("last"));
        assert_eq!(reader.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reader_limits_line_length() {
        let input: &[u8] = b"12345678\n123456789\n";
        let mut reader = FrameReader::new(input, 8);
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("12345678"));
        assert!(matches!(
            reader.next_line().await,
            Err(CrackpoolError::Protocol(ProtocolError::MalformedFrame { .. }))
        ));
    }
}
