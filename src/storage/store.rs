//! Document store seam
//!
//! The ingestion pipeline talks to a `DocumentStore`; it never sees files.
//! `FileDocumentStore` is the durable implementation, `MemoryDocumentStore`
//! backs tests and dry runs.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::errors::{StorageError, StorageResult};
use super::reader::StorageReader;
use super::record::StoredDocument;
use super::writer::{collection_path, is_valid_collection_name, BatchReceipt, StorageWriter};

/// A store that accepts whole batches of documents per collection.
///
/// Implementations must be safe to share between concurrent requests.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts every document or none of them.
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<StoredDocument>,
    ) -> StorageResult<BatchReceipt>;

    /// Returns all documents of a collection in insertion order.
    async fn read_collection(&self, collection: &str) -> StorageResult<Vec<StoredDocument>>;
}

type WriterMap = Mutex<HashMap<String, Arc<Mutex<StorageWriter>>>>;

/// Durable store: one append-only file per collection under `data_dir`.
///
/// Each collection has its own writer lock, so batches for different
/// collections commit concurrently. File I/O runs on the blocking pool.
pub struct FileDocumentStore {
    data_dir: PathBuf,
    writers: Arc<WriterMap>,
}

impl FileDocumentStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            writers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn writer_for(
        writers: &WriterMap,
        data_dir: &Path,
        collection: &str,
    ) -> StorageResult<Arc<Mutex<StorageWriter>>> {
        let mut map = writers
            .lock()
            .map_err(|_| StorageError::write_failed_no_source("Collection registry lock poisoned"))?;

        if let Some(writer) = map.get(collection) {
            return Ok(Arc::clone(writer));
        }

        let writer = Arc::new(Mutex::new(StorageWriter::open(data_dir, collection)?));
        map.insert(collection.to_string(), Arc::clone(&writer));
        tracing::debug!(collection, "opened collection");
        Ok(writer)
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<StoredDocument>,
    ) -> StorageResult<BatchReceipt> {
        let writers = Arc::clone(&self.writers);
        let data_dir = self.data_dir.clone();
        let collection = collection.to_string();

        tokio::task::spawn_blocking(move || {
            let writer = Self::writer_for(&writers, &data_dir, &collection)?;
            let mut writer = writer.lock().map_err(|_| {
                StorageError::write_failed_no_source(format!(
                    "Writer lock poisoned for collection '{}'",
                    collection
                ))
            })?;
            writer.write_batch(documents)
        })
        .await
        .map_err(|e| StorageError::write_failed_no_source(format!("Store task failed: {}", e)))?
    }

    async fn read_collection(&self, collection: &str) -> StorageResult<Vec<StoredDocument>> {
        if !is_valid_collection_name(collection) {
            return Err(StorageError::invalid_collection(collection));
        }
        let path = collection_path(&self.data_dir, collection);

        tokio::task::spawn_blocking(move || {
            if !path.exists() {
                return Ok(Vec::new());
            }
            StorageReader::open(&path)?.read_documents()
        })
        .await
        .map_err(|e| StorageError::read_failed(
            "Store task failed",
            std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        ))?
    }
}

/// One recorded `insert_many` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertCall {
    pub collection: String,
    pub documents: Vec<StoredDocument>,
}

#[derive(Default)]
struct MemoryState {
    collections: HashMap<String, Vec<StoredDocument>>,
    calls: Vec<InsertCall>,
    fail_inserts: bool,
}

/// In-memory store with the same all-or-nothing and unique-key rules as the
/// file store. Records every call for inspection.
#[derive(Default)]
pub struct MemoryDocumentStore {
    state: Mutex<MemoryState>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose inserts always fail with a write error.
    pub fn failing() -> Self {
        let store = Self::default();
        if let Ok(mut state) = store.state.lock() {
            state.fail_inserts = true;
        }
        store
    }

    /// All `insert_many` calls received so far, in order.
    pub fn calls(&self) -> Vec<InsertCall> {
        self.state
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    /// Number of documents held for a collection.
    pub fn document_count(&self, collection: &str) -> usize {
        self.state
            .lock()
            .map(|s| s.collections.get(collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StorageError::write_failed_no_source("Memory store lock poisoned"))
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<StoredDocument>,
    ) -> StorageResult<BatchReceipt> {
        let mut state = self.lock()?;
        state.calls.push(InsertCall {
            collection: collection.to_string(),
            documents: documents.clone(),
        });

        if state.fail_inserts {
            return Err(StorageError::write_failed(
                format!("Injected failure for collection '{}'", collection),
                std::io::Error::new(std::io::ErrorKind::Other, "connection reset by peer"),
            ));
        }
        if !is_valid_collection_name(collection) {
            return Err(StorageError::invalid_collection(collection));
        }

        let existing = state.collections.entry(collection.to_string()).or_default();
        let mut seen: HashSet<&str> = existing.iter().map(|d| d.document_id.as_str()).collect();
        for doc in &documents {
            if !seen.insert(doc.document_id.as_str()) {
                return Err(StorageError::duplicate_key(collection, &doc.document_id));
            }
        }

        let offset = existing.len() as u64;
        let document_count = documents.len();
        existing.extend(documents);

        Ok(BatchReceipt {
            batch_id: Uuid::new_v4().to_string(),
            committed_at_ms: Utc::now().timestamp_millis(),
            offset,
            document_count,
        })
    }

    async fn read_collection(&self, collection: &str) -> StorageResult<Vec<StoredDocument>> {
        Ok(self
            .lock()?
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn docs(ids: &[&str]) -> Vec<StoredDocument> {
        ids.iter()
            .map(|id| StoredDocument::new(*id, format!(r#"{{"_id":"{}"}}"#, id).into_bytes()))
            .collect()
    }

    #[tokio::test]
    async fn test_file_store_insert_and_read() {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::new(dir.path());

        store.insert_many("acme", docs(&["a1", "b2"])).await.unwrap();
        store.insert_many("acme", docs(&["c3"])).await.unwrap();

        let stored = store.read_collection("acme").await.unwrap();
        let ids: Vec<_> = stored.iter().map(|d| d.document_id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "b2", "c3"]);
    }

    #[tokio::test]
    async fn test_file_store_collections_are_isolated() {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::new(dir.path());

        store.insert_many("acme", docs(&["a1"])).await.unwrap();
        // Same key in a different collection is fine
        store.insert_many("globex", docs(&["a1"])).await.unwrap();

        assert_eq!(store.read_collection("acme").await.unwrap().len(), 1);
        assert_eq!(store.read_collection("globex").await.unwrap().len(), 1);
        assert!(store.read_collection("initech").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_duplicate_rejects_batch() {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::new(dir.path());

        store.insert_many("acme", docs(&["a1"])).await.unwrap();
        let err = store
            .insert_many("acme", docs(&["b2", "a1"]))
            .await
            .unwrap_err();
        assert_eq!(err.code().code(), "STORE_DUPLICATE_KEY");
        assert_eq!(store.read_collection("acme").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_store_concurrent_batches() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileDocumentStore::new(dir.path()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let collection = if i % 2 == 0 { "acme" } else { "globex" };
                let ids = [format!("k{}-0", i), format!("k{}-1", i)];
                let batch = ids
                    .iter()
                    .map(|id| StoredDocument::new(id.clone(), b"{}".to_vec()))
                    .collect();
                store.insert_many(collection, batch).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(store.read_collection("acme").await.unwrap().len(), 8);
        assert_eq!(store.read_collection("globex").await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_memory_store_records_calls() {
        let store = MemoryDocumentStore::new();
        store.insert_many("acme", docs(&["a1", "b2"])).await.unwrap();

        let calls = store.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].collection, "acme");
        assert_eq!(calls[0].documents, docs(&["a1", "b2"]));
        assert_eq!(store.document_count("acme"), 2);
    }

    #[tokio::test]
    async fn test_memory_store_failing_writes_nothing() {
        let store = MemoryDocumentStore::failing();
        let err = store.insert_many("acme", docs(&["a1"])).await.unwrap_err();
        assert_eq!(err.code().code(), "STORE_WRITE_FAILED");
        assert_eq!(store.document_count("acme"), 0);
    }
}
