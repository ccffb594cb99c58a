//! Text chunking with configurable size and overlap.
//!
//! Sizes are given in tokens and converted with a fixed heuristic of four
//! characters per token. Windows slide over character offsets, so multi-byte
//! text is never split inside a code point.

use sha2::{Digest, Sha256};

use crate::types::Chunk;

/// Characters per token.
pub const CHARS_PER_TOKEN: usize = 4;

/// One window of the source text, in character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkWindow {
    pub start: usize,
    pub end: usize,
    /// Trimmed window text
    pub text: String,
}

/// Split `text` into overlapping windows.
///
/// Windows whose trimmed text is shorter than `min_chunk_chars` characters
/// are dropped. `max_tokens == 0` yields the whole text as one window.
pub fn chunk_text(
    text: &str,
    max_tokens: usize,
    overlap_tokens: usize,
    min_chunk_chars: usize,
) -> Vec<ChunkWindow> {
    // Byte offset of every char, plus the end of the string.
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let n = offsets.len() - 1;

    if n == 0 {
        return Vec::new();
    }

    let keep = |start: usize, end: usize| -> Option<ChunkWindow> {
        let piece = text[offsets[start]..offsets[end]].trim();
        (piece.chars().count() >= min_chunk_chars && !piece.is_empty()).then(|| ChunkWindow {
            start,
            end,
            text: piece.to_string(),
        })
    };

    if max_tokens == 0 {
        return keep(0, n).into_iter().collect();
    }

    let overlap_tokens = if overlap_tokens >= max_tokens {
        max_tokens / 4
    } else {
        overlap_tokens
    };
    let size = max_tokens.saturating_mul(CHARS_PER_TOKEN);
    let overlap = overlap_tokens.saturating_mul(CHARS_PER_TOKEN);

    let mut windows = Vec::new();
    let mut start: usize = 0;
    loop {
        let end = start.saturating_add(size).min(n);
        if let Some(window) = keep(start, end) {
            windows.push(window);
        }
        if end == n {
            break;
        }

        let next = end.saturating_sub(overlap);
        start = if next <= start { end } else { next };
    }

    tracing::debug!(
        "Chunked {} chars into {} windows (max_tokens: {}, overlap_tokens: {})",
        n,
        windows.len(),
        max_tokens,
        overlap_tokens
    );

    windows
}

/// Deterministic chunk id: the first 16 bytes of
/// `SHA-256(source_name || 0x1F || text)` formatted as a UUID.
pub fn chunk_id(source_name: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_name.as_bytes());
    hasher.update([0x1F]);
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    uuid::Uuid::from_bytes(bytes).to_string()
}

/// Turn the windows of one document into chunks with ids and positions.
pub fn build_chunks(source_name: &str, windows: Vec<ChunkWindow>) -> Vec<Chunk> {
    let total = windows.len();
    windows
        .into_iter()
        .enumerate()
        .map(|(position, window)| Chunk {
            id: chunk_id(source_name, &window.text),
            text: window.text,
            source_name: source_name.to_string(),
            position,
            total,
        })
        .collect()
}
