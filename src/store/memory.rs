use super::{Document, DocumentStore, SearchHistoryEntry, StoreError, StoreStats};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

#[derive(Debug, Default, Deserialize)]
struct DocumentSnapshot {
    #[serde(default)]
    documents: Vec<Document>,
}

#[derive(Serialize)]
struct DocumentSnapshotRef<'a> {
    documents: &'a [Document],
}

/// One line of the append-only history log.
#[derive(Serialize, Deserialize)]
struct HistoryRecord {
    user_id: String,
    #[serde(flatten)]
    entry: SearchHistoryEntry,
}

#[derive(Debug)]
struct SnapshotPaths {
    documents: PathBuf,
    history: PathBuf,
}

/// Document store kept in process memory, optionally mirrored to disk.
///
/// Documents and search history live behind separate locks and separate files. Document
/// mutations rewrite the JSON snapshot atomically and roll back in memory when the write
/// fails. History is a JSON-lines log next to the snapshot (`<stem>.history.jsonl`); each
/// search appends one line and never touches the document snapshot.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<Vec<Document>>,
    history: RwLock<BTreeMap<String, Vec<SearchHistoryEntry>>>,
    snapshot: Option<SnapshotPaths>,
}

impl InMemoryDocumentStore {
    /// Create an empty store without a snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store mirrored to `path`, loading the snapshot and history log when present.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let paths = SnapshotPaths::for_snapshot(path.into());

        let documents = match read_optional(&paths.documents).await? {
            Some(bytes) => serde_json::from_slice::<DocumentSnapshot>(&bytes)?.documents,
            None => Vec::new(),
        };
        let mut history: BTreeMap<String, Vec<SearchHistoryEntry>> = BTreeMap::new();
        let mut searches = 0;
        if let Some(bytes) = read_optional(&paths.history).await? {
            for line in bytes
                .split(|byte| *byte == b'\n')
                .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
            {
                let record: HistoryRecord = serde_json::from_slice(line)?;
                history.entry(record.user_id).or_default().push(record.entry);
                searches += 1;
            }
        }

        tracing::info!(
            path = %paths.documents.display(),
            documents = documents.len(),
            searches,
            "Loaded document snapshot"
        );
        Ok(Self {
            documents: RwLock::new(documents),
            history: RwLock::new(history),
            snapshot: Some(paths),
        })
    }

    async fn persist_documents(&self, documents: &[Document]) -> Result<(), StoreError> {
        let Some(paths) = &self.snapshot else {
            return Ok(());
        };
        let bytes = serde_json::to_vec(&DocumentSnapshotRef { documents })?;
        write_atomically(&paths.documents, &bytes)
            .await
            .map_err(|source| io_error(&paths.documents, source))
    }

    async fn append_history_record(&self, record: &HistoryRecord) -> Result<(), StoreError> {
        let Some(paths) = &self.snapshot else {
            return Ok(());
        };
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        append_line(&paths.history, &line)
            .await
            .map_err(|source| io_error(&paths.history, source))
    }
}

impl SnapshotPaths {
    fn for_snapshot(documents: PathBuf) -> Self {
        let history = documents.with_extension("history.jsonl");
        Self { documents, history }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(io_error(path, source)),
    }
}

async fn create_parent(path: &Path) -> std::io::Result<()> {
    match path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        Some(parent) => tokio::fs::create_dir_all(parent).await,
        None => Ok(()),
    }
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    create_parent(path).await?;
    let mut temp: OsString = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);
    tokio::fs::write(&temp, bytes).await?;
    tokio::fs::rename(&temp, path).await
}

async fn append_line(path: &Path, line: &[u8]) -> std::io::Result<()> {
    create_parent(path).await?;
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line).await?;
    file.flush().await
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn save(&self, document: Document) -> Result<Document, StoreError> {
        let mut documents = self.documents.write().await;
        let previous = match documents.iter().position(|doc| doc.id == document.id) {
            Some(index) => Some((
                index,
                std::mem::replace(&mut documents[index], document.clone()),
            )),
            None => {
                documents.push(document.clone());
                None
            }
        };

        if let Err(error) = self.persist_documents(&documents).await {
            match previous {
                Some((index, old)) => documents[index] = old,
                None => {
                    documents.pop();
                }
            }
            return Err(error);
        }

        tracing::debug!(document_id = %document.id, department = %document.department, "Document saved");
        Ok(document)
    }

    async fn find_by_department(&self, department: &str) -> Result<Vec<Document>, StoreError> {
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .filter(|doc| doc.department == department)
            .cloned()
            .collect())
    }

    async fn all_documents(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self.documents.read().await.clone())
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Document>, StoreError> {
        let documents = self.documents.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| documents.iter().find(|doc| &doc.id == id))
            .cloned()
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut documents = self.documents.write().await;
        let Some(index) = documents.iter().position(|doc| doc.id == id) else {
            return Ok(false);
        };
        let removed = documents.remove(index);
        if let Err(error) = self.persist_documents(&documents).await {
            documents.insert(index, removed);
            return Err(error);
        }
        Ok(true)
    }

    async fn append_search_history(
        &self,
        user_id: &str,
        entry: SearchHistoryEntry,
    ) -> Result<(), StoreError> {
        let mut history = self.history.write().await;
        let record = HistoryRecord {
            user_id: user_id.to_string(),
            entry,
        };
        self.append_history_record(&record).await?;
        history.entry(record.user_id).or_default().push(record.entry);
        Ok(())
    }

    async fn search_history(&self, user_id: &str) -> Result<Vec<SearchHistoryEntry>, StoreError> {
        let history = self.history.read().await;
        Ok(history.get(user_id).cloned().unwrap_or_default())
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let total_documents = self.documents.read().await.len();
        let total_searches = self.history.read().await.values().map(Vec::len).sum();
        Ok(StoreStats {
            total_documents,
            total_searches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Chunk;

    fn document(id: &str, department: &str) -> Document {
        Document {
            id: id.into(),
            title: format!("{id}.txt"),
            file_url: format!("/uploads/{id}.txt"),
            department: department.into(),
            uploaded_by: "user-1".into(),
            chunks: vec![Chunk {
                text: "alpha beta".into(),
                embedding: vec![1.0, 0.0],
            }],
            created_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    #[tokio::test]
    async fn find_by_department_keeps_insertion_order_and_partition() {
        let store = InMemoryDocumentStore::new();
        store.save(document("a", "CS")).await.unwrap();
        store.save(document("b", "Physics")).await.unwrap();
        store.save(document("c", "CS")).await.unwrap();

        let ids: Vec<_> = store
            .find_by_department("CS")
            .await
            .unwrap()
            .into_iter()
            .map(|doc| doc.id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(store.find_by_department("Math").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn find_by_ids_follows_requested_order() {
        let store = InMemoryDocumentStore::new();
        store.save(document("a", "CS")).await.unwrap();
        store.save(document("b", "CS")).await.unwrap();

        let ids: Vec<_> = store
            .find_by_ids(&["b".into(), "missing".into(), "a".into()])
            .await
            .unwrap()
            .into_iter()
            .map(|doc| doc.id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn delete_reports_whether_document_existed() {
        let store = InMemoryDocumentStore::new();
        store.save(document("a", "CS")).await.unwrap();

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert!(store.find_by_department("CS").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_history_is_per_user() {
        let store = InMemoryDocumentStore::new();
        let entry = SearchHistoryEntry {
            query: "entropy".into(),
            timestamp: "2025-01-01T00:00:00Z".into(),
        };
        store.append_search_history("u1", entry.clone()).await.unwrap();

        assert_eq!(store.search_history("u1").await.unwrap(), vec![entry]);
        assert!(store.search_history("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = InMemoryDocumentStore::open(&path).await.unwrap();
        store.save(document("a", "CS")).await.unwrap();
        store
            .append_search_history(
                "u1",
                SearchHistoryEntry {
                    query: "q".into(),
                    timestamp: "2025-01-01T00:00:00Z".into(),
                },
            )
            .await
            .unwrap();
        drop(store);

        let reopened = InMemoryDocumentStore::open(&path).await.unwrap();
        let docs = reopened.find_by_department("CS").await.unwrap();
        assert_eq!(docs, vec![document("a", "CS")]);
        assert_eq!(reopened.search_history("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn history_append_leaves_document_snapshot_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = InMemoryDocumentStore::open(&path).await.unwrap();
        store.save(document("a", "CS")).await.unwrap();
        std::fs::remove_file(&path).unwrap();

        for query in ["graphs", "trees"] {
            store
                .append_search_history(
                    "u1",
                    SearchHistoryEntry {
                        query: query.into(),
                        timestamp: "2025-01-01T00:00:00Z".into(),
                    },
                )
                .await
                .unwrap();
        }

        assert!(!path.exists(), "history append rewrote the document snapshot");
        let log = std::fs::read_to_string(dir.path().join("store.history.jsonl")).unwrap();
        assert_eq!(log.lines().count(), 2);
        assert!(log.contains("\"user_id\":\"u1\""));
    }

    #[tokio::test]
    async fn stats_and_listing_cover_every_department() {
        let store = InMemoryDocumentStore::new();
        store.save(document("a", "CS")).await.unwrap();
        store.save(document("b", "Physics")).await.unwrap();
        for user in ["u1", "u1", "u2"] {
            store
                .append_search_history(
                    user,
                    SearchHistoryEntry {
                        query: "q".into(),
                        timestamp: "2025-01-01T00:00:00Z".into(),
                    },
                )
                .await
                .unwrap();
        }

        let ids: Vec<_> = store
            .all_documents()
            .await
            .unwrap()
            .into_iter()
            .map(|doc| doc.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(
            store.stats().await.unwrap(),
            StoreStats {
                total_documents: 2,
                total_searches: 3,
            }
        );
    }

    #[tokio::test]
    async fn open_rejects_corrupt_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, b"{not json").unwrap();

        let error = InMemoryDocumentStore::open(&path).await.unwrap_err();
        assert!(matches!(error, StoreError::Encoding(_)));
    }
}
