//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use ragline_core::DistanceMetric;
use serde::{Deserialize, Serialize};

/// A named text source handed to ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Source name, usually a file name; recorded as `source` on every chunk
    pub name: String,
    /// Plain text content
    pub text: String,
}

impl Document {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// A chunk of a document, ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Deterministic id derived from `(source_name, text)`
    pub id: String,
    pub text: String,
    pub source_name: String,
    /// Zero-based index among the document's kept chunks
    pub position: usize,
    /// Number of kept chunks in the document
    pub total: usize,
}

impl Chunk {
    /// Human-readable location, `"<position+1>/<total>"`.
    pub fn section(&self) -> String {
        format!("{}/{}", self.position + 1, self.total)
    }

    pub fn payload(&self) -> ChunkPayload {
        ChunkPayload {
            text: self.text.clone(),
            source: self.source_name.clone(),
            section: self.section(),
            position: self.position,
        }
    }
}

/// Payload stored next to each vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub text: String,
    pub source: String,
    pub section: String,
    #[serde(default)]
    pub position: usize,
}

/// A point to upsert: id, vector and payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

/// One search result, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub source: String,
    pub section: String,
}

/// Declared shape of a vector collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub dimensionality: usize,
    pub distance: DistanceMetric,
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub documents_processed: usize,
    /// Documents skipped because they were empty, produced no chunks or failed to upsert
    pub documents_skipped: usize,
    pub chunks_upserted: usize,
    pub chunks_dropped: usize,
    /// Collection the chunks were written to
    pub collection: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl IngestReport {
    pub fn start() -> Self {
        let now = Utc::now();
        Self {
            documents_processed: 0,
            documents_skipped: 0,
            chunks_upserted: 0,
            chunks_dropped: 0,
            collection: None,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Collection statistics for the `stats` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub collection: Collection,
    pub points: usize,
}
