//! Document persistence collaborator.
//!
//! The pipelines only need a handful of operations over documents keyed by department and
//! id, plus an append-only search history per user. [`DocumentStore`] captures those; the
//! in-process [`InMemoryDocumentStore`] backs the server and the tests.

mod memory;
pub mod types;

use async_trait::async_trait;

pub use memory::InMemoryDocumentStore;
pub use types::{
    Chunk, Document, DocumentSummary, SearchHistoryEntry, StoreError, StoreStats,
};

/// Storage operations consumed by the ingestion and retrieval pipelines.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist a new document and return the stored record.
    async fn save(&self, document: Document) -> Result<Document, StoreError>;

    /// All documents of a department, in insertion order.
    async fn find_by_department(&self, department: &str) -> Result<Vec<Document>, StoreError>;

    /// Every stored document, in insertion order.
    async fn all_documents(&self) -> Result<Vec<Document>, StoreError>;

    /// Documents matching `ids`, in the order of `ids`; unknown ids are skipped.
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Document>, StoreError>;

    /// Remove a document, returning whether it existed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Append a query to the user's search history.
    async fn append_search_history(
        &self,
        user_id: &str,
        entry: SearchHistoryEntry,
    ) -> Result<(), StoreError>;

    /// Return the user's search history, oldest first.
    async fn search_history(&self, user_id: &str) -> Result<Vec<SearchHistoryEntry>, StoreError>;

    /// Document and search totals computed from stored state.
    async fn stats(&self) -> Result<StoreStats, StoreError>;
}
