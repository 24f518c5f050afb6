//! Core data types and error definitions for the ingestion and retrieval pipelines.

use crate::{
    embedding::EmbeddingClientError,
    processing::{extract::ExtractionError, similarity::SimilarityError, uploads::UploadError},
    store::{DocumentSummary, StoreError},
    summarization::SummarizationClientError,
};
use serde::Serialize;
use thiserror::Error;

/// Errors produced while turning raw text into word windows.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// A window must hold at least one word.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Errors emitted by the ingestion pipeline. Nothing is persisted when one is returned.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Uploads must name a department.
    #[error("Department is required")]
    InvalidDepartment,
    /// The upload could not be turned into text.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed for one of the chunks.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Raw file could not be stored.
    #[error(transparent)]
    Upload(#[from] UploadError),
    /// Document store rejected the new document.
    #[error("Failed to persist document: {0}")]
    Persistence(#[from] StoreError),
}

/// Errors emitted while orchestrating a search.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Query text was empty or whitespace.
    #[error("Query is required")]
    InvalidQuery,
    /// Embedding provider failed to return a vector for the query.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// A stored chunk could not be scored against the query.
    #[error("Failed to score chunk of document {document_id}: {source}")]
    Scoring {
        /// Document owning the offending chunk.
        document_id: String,
        /// Scoring fault.
        #[source]
        source: SimilarityError,
    },
    /// Document store lookup failed.
    #[error("Failed to load documents: {0}")]
    Persistence(#[from] StoreError),
}

/// Errors emitted by the standalone summarize operation.
#[derive(Debug, Error)]
pub enum SummarizeError {
    /// Text to summarize was empty or whitespace.
    #[error("Text is required")]
    EmptyText,
    /// Provider failed to produce a summary.
    #[error(transparent)]
    Provider(#[from] SummarizationClientError),
}

/// Errors raised while wiring the service from configuration.
#[derive(Debug, Error)]
pub enum ServiceInitError {
    /// Embedding client could not be constructed.
    #[error("Failed to initialize embedding client: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Summarization client could not be constructed.
    #[error("Failed to initialize summarization client: {0}")]
    Summarization(#[from] SummarizationClientError),
    /// Document store could not be opened.
    #[error("Failed to open document store: {0}")]
    Store(#[from] StoreError),
}

/// Errors emitted by document administration.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// No document carries the requested id.
    #[error("Document not found: {0}")]
    NotFound(String),
    /// Document store failed.
    #[error("Document store failed: {0}")]
    Persistence(#[from] StoreError),
}

/// A file received from an uploader.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Original file name; its extension selects the extractor.
    pub file_name: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

/// Identity of the caller as established by the upstream auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    /// Stable user identifier.
    pub id: String,
    /// Department the user may search.
    pub department: String,
}

/// A chunk scored against a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    /// Chunk text.
    pub text: String,
    /// Cosine similarity with the query.
    pub similarity: f32,
    /// Owning document.
    pub document_id: String,
    /// Title of the owning document.
    pub title: String,
}

/// Search response: ranked chunks, best-effort summary, and related documents.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SearchResult {
    /// Top chunks, best first.
    pub results: Vec<ScoredChunk>,
    /// Generated summary; empty when there was nothing to summarize or the provider failed.
    pub summary: String,
    /// Documents referenced by `results`, deduplicated in first-seen order.
    pub related_docs: Vec<DocumentSummary>,
}
