//! Newline-delimited JSON decoding for streaming generation.
//!
//! Transport chunks do not align with records: a record may span several
//! chunks and one chunk may carry several records. Bytes are buffered until
//! a newline completes a record.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use ragline_core::{AppError, AppResult};
use serde::Deserialize;

use crate::client::{LlmStream, LlmStreamChunk};

/// Raw transport chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = AppResult<Vec<u8>>> + Send>>;

#[derive(Debug, Deserialize)]
struct GenerateRecord {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

struct DecoderState {
    inner: ByteStream,
    buffer: Vec<u8>,
    pending: VecDeque<AppResult<LlmStreamChunk>>,
    eof: bool,
}

impl DecoderState {
    fn drain_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.push_line(&line[..line.len() - 1]);
        }
    }

    fn flush_remainder(&mut self) {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.push_line(&rest);
        }
    }

    fn push_line(&mut self, raw: &[u8]) {
        if let Some(item) = parse_line(raw) {
            self.pending.push_back(item);
        }
    }
}

/// Parse one record. Blank and malformed lines yield `None`.
fn parse_line(raw: &[u8]) -> Option<AppResult<LlmStreamChunk>> {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<GenerateRecord>(line) {
        Ok(GenerateRecord {
            error: Some(error), ..
        }) => Some(Err(AppError::StreamTransport(format!(
            "backend reported error: {}",
            error
        )))),
        Ok(record) => Some(Ok(LlmStreamChunk {
            content: record.response,
            done: record.done,
        })),
        Err(e) => {
            tracing::warn!("Skipping malformed stream record: {}", e);
            None
        }
    }
}

/// Decode a byte stream into generation chunks.
///
/// A transport error is yielded once and ends the stream. A trailing record
/// without a newline is parsed at end of input.
pub fn decode_ndjson(bytes: ByteStream) -> LlmStream {
    let state = DecoderState {
        inner: bytes,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        eof: false,
    };

    let stream = futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.eof {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(bytes)) => {
                    st.buffer.extend_from_slice(&bytes);
                    st.drain_lines();
                }
                Some(Err(e)) => {
                    st.eof = true;
                    st.buffer.clear();
                    return Some((Err(e), st));
                }
                None => {
                    st.eof = true;
                    st.flush_remainder();
                }
            }
        }
    });

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_of(parts: Vec<&str>) -> ByteStream {
        let items: Vec<AppResult<Vec<u8>>> =
            parts.into_iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        Box::pin(futures::stream::iter(items))
    }

    async fn collect(stream: LlmStream) -> Vec<AppResult<LlmStreamChunk>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_record_split_across_chunks() {
        let input = bytes_of(vec![
            "{\"response\":\"Hel",
            "lo\",\"done\":false}\n{\"response\":\" world\",",
            "\"done\":false}\n{\"response\":\"\",\"done\":true}\n",
        ]);

        let items = collect(decode_ndjson(input)).await;
        let chunks: Vec<LlmStreamChunk> = items.into_iter().map(|r| r.unwrap()).collect();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].content, "Hello");
        assert_eq!(chunks[1].content, " world");
        assert!(chunks[2].done);
    }

    #[tokio::test]
    async fn test_malformed_line_skipped() {
        let input = bytes_of(vec![
            "{\"response\":\"a\"}\nnot json at all\n\n{\"response\":\"b\"}\n",
        ]);

        let items = collect(decode_ndjson(input)).await;
        let texts: Vec<String> = items.into_iter().map(|r| r.unwrap().content).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_trailing_record_without_newline() {
        let input = bytes_of(vec!["{\"response\":\"a\"}\n{\"response\":\"z\",\"done\":true}"]);

        let items = collect(decode_ndjson(input)).await;
        assert_eq!(items.len(), 2);
        assert!(items[1].as_ref().unwrap().done);
    }

    #[tokio::test]
    async fn test_error_record_surfaces() {
        let input = bytes_of(vec!["{\"response\":\"a\"}\n{\"error\":\"model crashed\"}\n"]);

        let items = collect(decode_ndjson(input)).await;
        assert_eq!(items.len(), 2);
        match &items[1] {
            Err(AppError::StreamTransport(msg)) => assert!(msg.contains("model crashed")),
            other => panic!("expected stream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let items: Vec<AppResult<Vec<u8>>> = vec![
            Ok(b"{\"response\":\"a\"}\n{\"resp".to_vec()),
            Err(AppError::StreamTransport("connection reset".to_string())),
            Ok(b"{\"response\":\"never\"}\n".to_vec()),
        ];
        let input: ByteStream = Box::pin(futures::stream::iter(items));

        let items = collect(decode_ndjson(input)).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().content, "a");
        assert!(items[1].is_err());
    }
}
