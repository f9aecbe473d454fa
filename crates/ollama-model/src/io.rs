#[cfg(test)]
use std::collections::VecDeque;

use bytes::Bytes;
use reqwest::Response;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The transport failed mid-stream; carries the error message.
    Transport(String),
    InvalidPayload,
}

/// Where the raw stream bytes come from. Tests feed canned chunks
/// through the same framing path the HTTP body goes through.
enum ByteSource {
    Response(Response),
    #[cfg(test)]
    Queue(VecDeque<Bytes>),
}

/// A reader of newline-delimited records from a chunked byte stream.
///
/// Chunk boundaries are arbitrary: a record may span several chunks and
/// a chunk may carry several records. Bytes are buffered and only
/// decoded once a full line is available, so multi-byte characters
/// split across chunks are handled correctly.
pub struct Lines {
    buf: Vec<u8>,
    source: ByteSource,
}

impl Lines {
    #[inline]
    pub fn from_response(response: Response) -> Self {
        Self {
            buf: Vec::new(),
            source: ByteSource::Response(response),
        }
    }

    #[cfg(test)]
    pub fn from_queue(queue: VecDeque<Bytes>) -> Self {
        Self {
            buf: Vec::new(),
            source: ByteSource::Queue(queue),
        }
    }

    pub async fn next_line(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Try to frame a line from what we already buffered.
            if let Some(line) = self.try_parse_line()? {
                return Ok(Some(line));
            }

            // Not enough data, pull the next chunk.
            let Some(bytes) = self.pull_chunk().await? else {
                // End of stream. A trailing record without a newline is
                // still a record.
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let rest = std::mem::take(&mut self.buf);
                let Ok(line) = String::from_utf8(rest) else {
                    return Err(Error::InvalidPayload);
                };
                let line = line.trim();
                if line.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(line.to_owned()));
            };
            self.buf.extend_from_slice(&bytes);
        }
    }

    async fn pull_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match &mut self.source {
            ByteSource::Response(response) => response
                .chunk()
                .await
                .map_err(|err| Error::Transport(err.to_string())),
            #[cfg(test)]
            ByteSource::Queue(queue) => Ok(queue.pop_front()),
        }
    }

    fn try_parse_line(&mut self) -> Result<Option<String>, Error> {
        loop {
            let Some(eol_idx) = self.buf.iter().position(|&b| b == b'\n')
            else {
                return Ok(None);
            };

            let mut line_bytes: Vec<u8> =
                self.buf.drain(0..eol_idx + 1).collect();
            line_bytes.pop();
            let Ok(line) = String::from_utf8(line_bytes) else {
                return Err(Error::InvalidPayload);
            };

            let line = line.trim();
            if line.is_empty() {
                // Blank separators are allowed between records.
                continue;
            }
            return Ok(Some(line.to_owned()));
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[tokio::test]
    async fn test_normal_lines() {
        let mut lines = Lines::from_queue(
            vec![
                Bytes::from_static(b"{\"response\":\"a\"}\n"),
                Bytes::from_static(b"{\"response\":\"b\"}\n"),
            ]
            .into(),
        );
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "{\"response\":\"a\"}"
        );
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "{\"response\":\"b\"}"
        );
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_record_split_across_chunks() {
        let mut lines = Lines::from_queue(
            vec![
                Bytes::from_static(b"{\"respon"),
                Bytes::from_static(b"se\":\"a\"}\n{\"response\""),
                Bytes::from_static(b":\"b\"}\n"),
            ]
            .into(),
        );
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "{\"response\":\"a\"}"
        );
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "{\"response\":\"b\"}"
        );
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_multibyte_char_split_across_chunks() {
        // "é" is 0xC3 0xA9; split it between two chunks.
        let mut lines = Lines::from_queue(
            vec![
                Bytes::from_static(b"caf\xc3"),
                Bytes::from_static(b"\xa9\n"),
            ]
            .into(),
        );
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "café");
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_trailing_record_without_newline() {
        let mut lines = Lines::from_queue(
            vec![Bytes::from_static(b"{\"done\":true}")].into(),
        );
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "{\"done\":true}"
        );
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_utf8() {
        let mut lines =
            Lines::from_queue(vec![Bytes::from_static(b"\xff\xfe\n")].into());
        assert_eq!(
            lines.next_line().await.unwrap_err(),
            Error::InvalidPayload
        );
    }
}
