//! Collection writer with fsync enforcement
//!
//! One append-only file per collection. Each committed batch is one frame,
//! written with a single `write_all` and made durable with `fsync` before the
//! batch is acknowledged. A failed write or fsync truncates the file back to
//! its pre-batch length so no document of the batch survives.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use super::errors::{StorageError, StorageResult};
use super::reader::StorageReader;
use super::record::{BatchRecord, StoredDocument};

/// Longest accepted collection name.
pub const MAX_COLLECTION_NAME_LEN: usize = 128;

/// Returns whether `name` can be used as a collection (and file) name.
///
/// Allowed: ASCII letters, digits, `_`, `-` and `.`, not starting with `.`.
pub fn is_valid_collection_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_COLLECTION_NAME_LEN
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Path of a collection file under the data directory.
pub fn collection_path(data_dir: &Path, collection: &str) -> PathBuf {
    data_dir
        .join("collections")
        .join(format!("{}.dat", collection))
}

/// Sidecar that keeps bytes trimmed off a collection file on open.
pub fn torn_tail_path(storage_path: &Path) -> PathBuf {
    let mut name = storage_path.as_os_str().to_os_string();
    name.push(".torn");
    PathBuf::from(name)
}

/// Appends the bytes from `offset` to the end of `file` to the sidecar and
/// syncs it. Returns the number of bytes copied.
fn preserve_torn_tail(file: &mut File, storage_path: &Path, offset: u64) -> std::io::Result<u64> {
    let mut tail = Vec::new();
    file.seek(SeekFrom::Start(offset))?;
    file.read_to_end(&mut tail)?;

    let mut sidecar = OpenOptions::new()
        .create(true)
        .append(true)
        .open(torn_tail_path(storage_path))?;
    sidecar.write_all(&tail)?;
    sidecar.sync_all()?;
    Ok(tail.len() as u64)
}

/// Acknowledgement for a durable batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReceipt {
    pub batch_id: String,
    pub committed_at_ms: i64,
    /// Byte offset of the batch frame
    pub offset: u64,
    pub document_count: usize,
}

/// Append-only writer for a single collection file.
#[derive(Debug)]
pub struct StorageWriter {
    collection: String,
    storage_path: PathBuf,
    file: File,
    /// Length of the committed prefix of the file
    current_offset: u64,
    /// Primary keys already present in the collection
    document_ids: HashSet<String>,
    batch_count: usize,
    /// Set when a rollback truncate failed; the file tail is unknown
    poisoned: bool,
}

impl StorageWriter {
    /// Opens or creates `<data_dir>/collections/<collection>.dat`.
    ///
    /// Scans the existing file to rebuild the primary key set. An incomplete
    /// trailing frame is a batch that never committed and is truncated away.
    ///
    /// # Errors
    ///
    /// - `STORE_INVALID_COLLECTION` for names that cannot be file names
    /// - `STORE_WRITE_FAILED` if the file cannot be created or opened
    /// - `STORE_DATA_CORRUPTION` if a committed frame fails its checksum
    pub fn open(data_dir: &Path, collection: &str) -> StorageResult<Self> {
        if !is_valid_collection_name(collection) {
            return Err(StorageError::invalid_collection(collection));
        }

        let storage_path = collection_path(data_dir, collection);
        if let Some(parent) = storage_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                StorageError::write_failed(
                    format!("Failed to create collections directory: {}", parent.display()),
                    e,
                )
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&storage_path)
            .map_err(|e| {
                StorageError::write_failed(
                    format!("Failed to open collection file: {}", storage_path.display()),
                    e,
                )
            })?;

        let mut reader = StorageReader::open(&storage_path)?;
        let mut document_ids = HashSet::new();
        let mut batch_count = 0;
        while let Some(batch) = reader.read_next()? {
            batch_count += 1;
            document_ids.extend(batch.documents.into_iter().map(|d| d.document_id));
        }

        let current_offset = reader.current_offset();
        if let Some(torn_at) = reader.torn_tail() {
            // A corrupted length prefix on the last frame looks the same as a
            // torn write, so the bytes are kept aside before truncating.
            let trimmed = preserve_torn_tail(&mut file, &storage_path, torn_at).map_err(|e| {
                StorageError::write_failed("Failed to preserve torn batch frame", e)
            })?;
            tracing::error!(
                collection,
                offset = torn_at,
                bytes = trimmed,
                sidecar = %torn_tail_path(&storage_path).display(),
                "discarding incomplete trailing batch frame"
            );
            file.set_len(torn_at)
                .and_then(|_| file.sync_all())
                .map_err(|e| StorageError::write_failed("Failed to trim torn batch frame", e))?;
        }

        Ok(Self {
            collection: collection.to_string(),
            storage_path,
            file,
            current_offset,
            document_ids,
            batch_count,
            poisoned: false,
        })
    }

    /// Returns the collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the path to the collection file.
    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    /// Returns the length of the committed file prefix.
    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Returns the number of documents in the collection.
    pub fn document_count(&self) -> usize {
        self.document_ids.len()
    }

    /// Returns the number of committed batches.
    pub fn batch_count(&self) -> usize {
        self.batch_count
    }

    /// Returns whether a primary key is present.
    pub fn has_document(&self, document_id: &str) -> bool {
        self.document_ids.contains(document_id)
    }

    /// Writes all documents as one durable batch, or none of them.
    ///
    /// # Errors
    ///
    /// - `STORE_DUPLICATE_KEY` if a key exists or repeats within the batch;
    ///   nothing is written
    /// - `STORE_WRITE_FAILED` if encoding, write or fsync fails; the file is
    ///   rolled back to its pre-batch length
    pub fn write_batch(&mut self, documents: Vec<StoredDocument>) -> StorageResult<BatchReceipt> {
        if self.poisoned {
            return Err(StorageError::write_failed_no_source(format!(
                "Collection '{}' needs to be reopened after a failed rollback",
                self.collection
            )));
        }

        let mut batch_ids = HashSet::with_capacity(documents.len());
        for doc in &documents {
            if self.document_ids.contains(&doc.document_id)
                || !batch_ids.insert(doc.document_id.as_str())
            {
                return Err(StorageError::duplicate_key(
                    &self.collection,
                    &doc.document_id,
                ));
            }
        }

        let document_count = documents.len();
        let batch = BatchRecord::new(
            Uuid::new_v4().to_string(),
            Utc::now().timestamp_millis(),
            documents,
        );
        let frame = batch
            .serialize()
            .map_err(|e| StorageError::write_failed("Failed to encode batch frame", e))?;
        let offset = self.current_offset;

        if let Err(e) = self.file.write_all(&frame) {
            self.rollback();
            return Err(StorageError::write_failed(
                format!("Failed to write batch {}", batch.batch_id),
                e,
            ));
        }

        if let Err(e) = self.file.sync_all() {
            self.rollback();
            return Err(StorageError::write_failed(
                format!("fsync failed after writing batch {}", batch.batch_id),
                e,
            ));
        }

        self.current_offset += frame.len() as u64;
        self.batch_count += 1;
        self.document_ids
            .extend(batch.documents.into_iter().map(|d| d.document_id));

        Ok(BatchReceipt {
            batch_id: batch.batch_id,
            committed_at_ms: batch.committed_at_ms,
            offset,
            document_count,
        })
    }

    /// Truncates a partially written frame.
    fn rollback(&mut self) {
        let result = self
            .file
            .set_len(self.current_offset)
            .and_then(|_| self.file.sync_all());
        if let Err(e) = result {
            tracing::error!(
                collection = %self.collection,
                offset = self.current_offset,
                error = %e,
                "failed to roll back partial batch frame"
            );
            self.poisoned = true;
        }
    }
}
