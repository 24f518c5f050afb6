//! Document processing pipeline: extraction, chunking, embedding, ranking, and summaries.

pub mod chunking;
pub mod extract;
pub mod ranking;
mod service;
pub mod similarity;
pub mod types;
pub mod uploads;

pub use extract::{DefaultTextExtractor, ExtractionError, FileKind, TextExtractor};
pub(crate) use service::now_rfc3339;
pub use service::{PipelineSettings, ProcessingApi, ProcessingService};
pub use similarity::{SimilarityError, cosine_similarity};
pub use types::{
    ChunkingError, CurrentUser, DocumentError, IngestError, ScoredChunk, SearchError,
    SearchResult, ServiceInitError, SummarizeError, UploadedFile,
};
pub use uploads::{StoredUpload, UploadError, UploadStorage};
