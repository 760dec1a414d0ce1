//! Local hand-off from the hosted message relay
//!
//! The relay client delivers one inbound command per line as a JSON
//! object. Blank lines are ignored and lines that are not JSON are
//! logged and skipped; the gate decides everything else.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use crate::Result;

/// Newline-delimited JSON reader over any buffered async source
pub struct InboundStream<R> {
    lines: Lines<R>,
    line_number: u64,
}

impl<R: AsyncBufRead + Unpin> InboundStream<R> {
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }

    /// Next inbound payload, or `None` once the source is exhausted
    ///
    /// # Errors
    ///
    /// Returns error if reading the underlying source fails
    pub async fn next_payload(&mut self) -> Result<Option<Value>> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_number += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<Value>(line) {
                Ok(payload) => return Ok(Some(payload)),
                Err(e) => {
                    tracing::warn!(line = self.line_number, error = %e, "skipping non-JSON inbound line");
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn reads_payloads_skipping_noise() {
        let mock = tokio_test::io::Builder::new()
            .read(b"{\"action\":\"PAN_LEFT\"}\n\n")
            .read(b"not json\n   \n")
            .read(b"{\"action\":\"STOP\",\"target\":\"cam\"}\n")
            .build();
        let mut stream = InboundStream::new(BufReader::new(mock));

        assert_eq!(stream.next_payload().await.unwrap(), Some(json!({"action": "PAN_LEFT"})));
        assert_eq!(
            stream.next_payload().await.unwrap(),
            Some(json!({"action": "STOP", "target": "cam"}))
        );
        assert_eq!(stream.next_payload().await.unwrap(), None);
    }

    #[tokio::test]
    async fn line_split_across_reads() {
        let mock = tokio_test::io::Builder::new()
            .read(b"{\"action\":")
            .read(b"\"ZOOM_IN\"}")
            .build();
        let mut stream = InboundStream::new(BufReader::new(mock));

        // final line without a trailing newline still counts
        assert_eq!(stream.next_payload().await.unwrap(), Some(json!({"action": "ZOOM_IN"})));
        assert_eq!(stream.next_payload().await.unwrap(), None);
    }

    #[tokio::test]
    async fn read_error_surfaces() {
        let mock = tokio_test::io::Builder::new()
            .read_error(std::io::Error::other("pipe closed"))
            .build();
        let mut stream = InboundStream::new(BufReader::new(mock));
        assert!(stream.next_payload().await.is_err());
    }
}
