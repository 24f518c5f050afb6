//! Processing service coordinating extraction, chunking, embedding, storage, and search.

use crate::{
    config::Config,
    embedding::{EmbeddingClient, EmbeddingClientError, OpenAiEmbeddingClient},
    metrics::{MetricsSnapshot, SearchMetrics},
    processing::{
        chunking::{DEFAULT_CHUNK_SIZE, chunk_text},
        extract::{DefaultTextExtractor, ExtractionError, TextExtractor},
        ranking::{
            RELATED_DOCS_LIMIT, TOP_K, related_document_ids, score_candidates, select_top,
            summary_input,
        },
        types::{
            CurrentUser, DocumentError, IngestError, ScoredChunk, SearchError, SearchResult,
            ServiceInitError, SummarizeError, UploadedFile,
        },
        uploads::UploadStorage,
    },
    store::{
        Chunk, Document, DocumentStore, DocumentSummary, InMemoryDocumentStore,
        SearchHistoryEntry, StoreError, StoreStats,
    },
    summarization::{
        ChatCompletionClient, SummarizationClient, SummarizationClientError, SummarizationRequest,
    },
};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

/// Tunables applied by the pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Words per chunk.
    pub chunk_size: usize,
    /// Chunk embeddings requested at once during ingestion.
    pub embedding_concurrency: usize,
    /// Token cap for generated summaries.
    pub summary_max_tokens: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            embedding_concurrency: 4,
            summary_max_tokens: 300,
        }
    }
}

/// Coordinates ingestion and retrieval over injected collaborators.
///
/// Construct the service once near process start and share it through an `Arc`; every
/// collaborator is held behind a trait object so tests can substitute stubs.
pub struct ProcessingService {
    embedding_client: Arc<dyn EmbeddingClient>,
    summarization_client: Arc<dyn SummarizationClient>,
    store: Arc<dyn DocumentStore>,
    extractor: Arc<dyn TextExtractor>,
    uploads: UploadStorage,
    settings: PipelineSettings,
    metrics: Arc<SearchMetrics>,
}

/// Abstraction over the pipelines used by the HTTP surface.
#[async_trait]
pub trait ProcessingApi: Send + Sync {
    /// Extract, chunk, embed, and persist an uploaded file for a department.
    async fn ingest(
        &self,
        file: UploadedFile,
        department: &str,
        uploader_id: &str,
    ) -> Result<Document, IngestError>;

    /// Search the caller's department and record the query in their history.
    async fn search_for_user(
        &self,
        user: &CurrentUser,
        query: &str,
    ) -> Result<SearchResult, SearchError>;

    /// Most recent documents of a department.
    async fn recommendations(
        &self,
        department: &str,
    ) -> Result<Vec<DocumentSummary>, StoreError>;

    /// Summarize arbitrary text.
    async fn summarize_text(&self, text: &str) -> Result<String, SummarizeError>;

    /// Remove a document of the caller's department and its chunks.
    async fn delete_document(&self, user: &CurrentUser, id: &str) -> Result<(), DocumentError>;

    /// Queries previously issued by a user, oldest first.
    async fn search_history(&self, user_id: &str) -> Result<Vec<SearchHistoryEntry>, StoreError>;

    /// Every stored document across departments, newest first.
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, StoreError>;

    /// Document and search totals.
    async fn stats(&self) -> Result<StoreStats, StoreError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Outcome of the best-effort summarization step of a search.
#[derive(Debug)]
enum SummaryOutcome {
    Skipped,
    Generated(String),
    Failed(SummarizationClientError),
}

impl ProcessingService {
    /// Assemble a service from explicit collaborators.
    pub fn new(
        embedding_client: Arc<dyn EmbeddingClient>,
        summarization_client: Arc<dyn SummarizationClient>,
        store: Arc<dyn DocumentStore>,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            embedding_client,
            summarization_client,
            store,
            extractor: Arc::new(DefaultTextExtractor),
            uploads: UploadStorage::new(upload_dir),
            settings: PipelineSettings::default(),
            metrics: Arc::new(SearchMetrics::new()),
        }
    }

    /// Replace the text extractor.
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replace the pipeline tunables.
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Build the production service: HTTP provider clients plus the in-memory store,
    /// mirrored to `storage_path` when one is configured.
    pub async fn from_config(config: &Config) -> Result<Self, ServiceInitError> {
        tracing::info!(
            endpoint = %config.embedding.endpoint,
            model = %config.embedding.model,
            "Initializing embedding client"
        );
        let embedding_client =
            OpenAiEmbeddingClient::new(config.embedding.clone(), config.embedding_dimension)?;
        tracing::info!(
            endpoint = %config.summarization.endpoint,
            model = %config.summarization.model,
            "Initializing summarization client"
        );
        let summarization_client = ChatCompletionClient::new(config.summarization.clone())?;
        let store = match &config.storage_path {
            Some(path) => InMemoryDocumentStore::open(path).await?,
            None => {
                tracing::warn!("STORAGE_PATH not set; documents are kept in memory only");
                InMemoryDocumentStore::new()
            }
        };

        Ok(Self::new(
            Arc::new(embedding_client),
            Arc::new(summarization_client),
            Arc::new(store),
            config.upload_dir.clone(),
        )
        .with_settings(PipelineSettings {
            chunk_size: config.chunk_size,
            embedding_concurrency: config.embedding_concurrency,
            summary_max_tokens: config.summary_max_tokens,
        }))
    }

    /// Turn an uploaded file into a stored, searchable document.
    ///
    /// All chunk embeddings must succeed before anything is written; on failure neither the
    /// document nor the raw file is kept.
    pub async fn ingest(
        &self,
        file: UploadedFile,
        department: &str,
        uploader_id: &str,
    ) -> Result<Document, IngestError> {
        let department = department.trim();
        if department.is_empty() {
            return Err(IngestError::InvalidDepartment);
        }
        tracing::info!(file = %file.file_name, department, "Ingesting document");

        let file = Arc::new(file);
        let text = self.extract(Arc::clone(&file)).await?;
        let texts = chunk_text(&text, self.settings.chunk_size)?;
        tracing::debug!(
            chunks = texts.len(),
            chunk_size = self.settings.chunk_size,
            "Chunked document"
        );
        let embeddings = self.embed_chunks(&texts).await?;
        let chunks: Vec<Chunk> = texts
            .into_iter()
            .zip(embeddings)
            .map(|(text, embedding)| Chunk { text, embedding })
            .collect();

        let upload = self.uploads.store(&file.file_name, &file.bytes).await?;
        let document = Document {
            id: Uuid::new_v4().to_string(),
            title: file.file_name.clone(),
            file_url: upload.file_url.clone(),
            department: department.to_string(),
            uploaded_by: uploader_id.to_string(),
            chunks,
            created_at: now_rfc3339(),
        };
        let document = match self.store.save(document).await {
            Ok(document) => document,
            Err(error) => {
                self.uploads.remove(&upload).await;
                return Err(error.into());
            }
        };

        self.metrics.record_document(document.chunks.len() as u64);
        tracing::info!(
            document_id = %document.id,
            department = %document.department,
            chunks = document.chunks.len(),
            "Document indexed"
        );
        Ok(document)
    }

    /// Rank the department's chunks against `query` and attach a summary and related
    /// documents.
    pub async fn search(&self, query: &str, department: &str) -> Result<SearchResult, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::InvalidQuery);
        }

        let query_embedding = self.embedding_client.embed(query).await?;
        let documents = self.store.find_by_department(department).await?;
        let candidates = score_candidates(&query_embedding, &documents).inspect_err(|error| {
            tracing::error!(department, error = %error, "Failed to score stored chunk");
        })?;
        let candidate_count = candidates.len();
        let results = select_top(candidates, TOP_K);

        let (summary, summary_failed) = match self.summarize_results(&results).await {
            SummaryOutcome::Skipped => (String::new(), false),
            SummaryOutcome::Generated(summary) => (summary, false),
            SummaryOutcome::Failed(error) => {
                tracing::warn!(error = %error, "Summary generation failed; returning results without summary");
                (String::new(), true)
            }
        };

        let related_ids = related_document_ids(&results);
        let related_docs = if related_ids.is_empty() {
            Vec::new()
        } else {
            self.store
                .find_by_ids(&related_ids)
                .await?
                .iter()
                .take(RELATED_DOCS_LIMIT)
                .map(DocumentSummary::from)
                .collect()
        };

        self.metrics.record_search(summary_failed);
        tracing::info!(
            department,
            documents = documents.len(),
            candidates = candidate_count,
            results = results.len(),
            related = related_docs.len(),
            "Search completed"
        );

        Ok(SearchResult {
            results,
            summary,
            related_docs,
        })
    }

    /// Search the caller's own department, then record the query in their history.
    ///
    /// History is best effort: a failed append is logged and the results are still returned.
    pub async fn search_for_user(
        &self,
        user: &CurrentUser,
        query: &str,
    ) -> Result<SearchResult, SearchError> {
        let result = self.search(query, &user.department).await?;
        let entry = SearchHistoryEntry {
            query: query.to_string(),
            timestamp: now_rfc3339(),
        };
        if let Err(error) = self.store.append_search_history(&user.id, entry).await {
            tracing::warn!(user = %user.id, error = %error, "Failed to record search history");
        }
        Ok(result)
    }

    /// The most recently ingested documents of a department, newest first.
    pub async fn recommendations(
        &self,
        department: &str,
    ) -> Result<Vec<DocumentSummary>, StoreError> {
        let documents = self.store.find_by_department(department).await?;
        Ok(documents
            .iter()
            .rev()
            .take(RELATED_DOCS_LIMIT)
            .map(DocumentSummary::from)
            .collect())
    }

    /// Summarize caller-provided text with the configured provider.
    pub async fn summarize_text(&self, text: &str) -> Result<String, SummarizeError> {
        if text.trim().is_empty() {
            return Err(SummarizeError::EmptyText);
        }
        let summary = self
            .summarization_client
            .summarize(SummarizationRequest {
                text: text.to_string(),
                max_tokens: self.settings.summary_max_tokens,
            })
            .await?;
        Ok(summary)
    }

    /// Delete a document and all of its chunks.
    ///
    /// Only documents of the caller's department can be removed. Documents of other
    /// departments are reported as missing so their ids are not disclosed.
    pub async fn delete_document(&self, user: &CurrentUser, id: &str) -> Result<(), DocumentError> {
        let owned = self
            .store
            .find_by_ids(&[id.to_string()])
            .await?
            .iter()
            .any(|document| document.department == user.department);
        if !owned {
            tracing::warn!(
                document_id = id,
                user = %user.id,
                department = %user.department,
                "Refused delete of unknown or foreign document"
            );
            return Err(DocumentError::NotFound(id.to_string()));
        }
        if !self.store.delete(id).await? {
            return Err(DocumentError::NotFound(id.to_string()));
        }
        tracing::info!(document_id = id, user = %user.id, "Document deleted");
        Ok(())
    }

    /// Every stored document across departments, newest first.
    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>, StoreError> {
        let documents = self.store.all_documents().await?;
        Ok(documents.iter().rev().map(DocumentSummary::from).collect())
    }

    /// Document and search totals from the store.
    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        self.store.stats().await
    }

    /// Queries previously issued by `user_id`, oldest first.
    pub async fn search_history(
        &self,
        user_id: &str,
    ) -> Result<Vec<SearchHistoryEntry>, StoreError> {
        self.store.search_history(user_id).await
    }

    /// Return current counters.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn extract(&self, file: Arc<UploadedFile>) -> Result<String, ExtractionError> {
        let extractor = Arc::clone(&self.extractor);
        tokio::task::spawn_blocking(move || extractor.extract_text(&file))
            .await
            .map_err(|error| ExtractionError::Aborted(error.to_string()))?
    }

    /// Embed every chunk with bounded concurrency, keeping results in chunk order.
    async fn embed_chunks(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let requests: Vec<_> = texts
            .iter()
            .map(|text| self.embedding_client.embed(text))
            .collect();
        stream::iter(requests)
            .buffered(self.settings.embedding_concurrency.max(1))
            .try_collect()
            .await
    }

    async fn summarize_results(&self, results: &[ScoredChunk]) -> SummaryOutcome {
        let text = summary_input(results);
        if text.trim().is_empty() {
            return SummaryOutcome::Skipped;
        }
        let request = SummarizationRequest {
            text,
            max_tokens: self.settings.summary_max_tokens,
        };
        match self.summarization_client.summarize(request).await {
            Ok(summary) => SummaryOutcome::Generated(summary),
            Err(error) => SummaryOutcome::Failed(error),
        }
    }
}

/// Current UTC time as an RFC 3339 timestamp.
pub(crate) fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[async_trait]
impl ProcessingApi for ProcessingService {
    async fn ingest(
        &self,
        file: UploadedFile,
        department: &str,
        uploader_id: &str,
    ) -> Result<Document, IngestError> {
        ProcessingService::ingest(self, file, department, uploader_id).await
    }

    async fn search_for_user(
        &self,
        user: &CurrentUser,
        query: &str,
    ) -> Result<SearchResult, SearchError> {
        ProcessingService::search_for_user(self, user, query).await
    }

    async fn recommendations(
        &self,
        department: &str,
    ) -> Result<Vec<DocumentSummary>, StoreError> {
        ProcessingService::recommendations(self, department).await
    }

    async fn summarize_text(&self, text: &str) -> Result<String, SummarizeError> {
        ProcessingService::summarize_text(self, text).await
    }

    async fn delete_document(&self, user: &CurrentUser, id: &str) -> Result<(), DocumentError> {
        ProcessingService::delete_document(self, user, id).await
    }

    async fn search_history(&self, user_id: &str) -> Result<Vec<SearchHistoryEntry>, StoreError> {
        ProcessingService::search_history(self, user_id).await
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, StoreError> {
        ProcessingService::list_documents(self).await
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        ProcessingService::stats(self).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        ProcessingService::metrics_snapshot(self)
    }
}
