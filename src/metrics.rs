use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion and search activity.
#[derive(Default)]
pub struct SearchMetrics {
    documents_ingested: AtomicU64,
    chunks_ingested: AtomicU64,
    searches_served: AtomicU64,
    summaries_failed: AtomicU64,
}

impl SearchMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an ingested document and the number of chunks stored with it.
    pub fn record_document(&self, chunk_count: u64) {
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
        self.chunks_ingested
            .fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record a completed search and whether its summary had to be dropped.
    pub fn record_search(&self, summary_failed: bool) {
        self.searches_served.fetch_add(1, Ordering::Relaxed);
        if summary_failed {
            self.summaries_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            chunks_ingested: self.chunks_ingested.load(Ordering::Relaxed),
            searches_served: self.searches_served.load(Ordering::Relaxed),
            summaries_failed: self.summaries_failed.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of the counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents ingested since startup.
    pub documents_ingested: u64,
    /// Total chunk count stored across all ingested documents.
    pub chunks_ingested: u64,
    /// Number of searches that returned a result.
    pub searches_served: u64,
    /// Searches whose summary was dropped after a provider failure.
    pub summaries_failed: u64,
}
