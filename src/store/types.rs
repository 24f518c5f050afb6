//! Persisted records and their response views.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by document store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Snapshot file could not be read or written.
    #[error("Snapshot I/O failed for {path}: {source}")]
    Io {
        /// Snapshot or history file involved in the failing operation.
        path: String,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
    /// Snapshot contents could not be encoded or decoded.
    #[error("Snapshot encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// A word-window of a document together with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text, never empty.
    pub text: String,
    /// Embedding vector produced for `text`.
    pub embedding: Vec<f32>,
}

/// An uploaded document and its embedded chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Opaque identifier (UUID v4).
    pub id: String,
    /// Original file name.
    pub title: String,
    /// Reference to the stored raw file.
    pub file_url: String,
    /// Partition tag; searches only see documents of the caller's department.
    pub department: String,
    /// Identifier of the uploading user.
    pub uploaded_by: String,
    /// Chunks in document order.
    pub chunks: Vec<Chunk>,
    /// Creation time as an RFC 3339 timestamp.
    pub created_at: String,
}

/// Document metadata returned to API consumers, without embeddings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// Opaque identifier.
    pub id: String,
    /// Original file name.
    pub title: String,
    /// Reference to the stored raw file.
    pub file_url: String,
    /// Department the document belongs to.
    pub department: String,
    /// Identifier of the uploading user.
    pub uploaded_by: String,
    /// Number of stored chunks.
    pub chunk_count: usize,
    /// Creation time as an RFC 3339 timestamp.
    pub created_at: String,
}

impl From<&Document> for DocumentSummary {
    fn from(document: &Document) -> Self {
        Self {
            id: document.id.clone(),
            title: document.title.clone(),
            file_url: document.file_url.clone(),
            department: document.department.clone(),
            uploaded_by: document.uploaded_by.clone(),
            chunk_count: document.chunks.len(),
            created_at: document.created_at.clone(),
        }
    }
}

/// A query recorded in a user's search history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    /// Query text as submitted.
    pub query: String,
    /// Time of the search as an RFC 3339 timestamp.
    pub timestamp: String,
}

/// Corpus-wide counts derived from persisted state, so they survive restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Documents currently stored, across all departments.
    pub total_documents: usize,
    /// Searches recorded in the history of every user.
    pub total_searches: usize,
}
