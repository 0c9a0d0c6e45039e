//! Batch writer
//!
//! Hands all documents of one request to the store in a single bulk insert.
//! The store either keeps the whole batch or none of it; nothing is retried.

use uuid::Uuid;

use super::errors::{IngestError, IngestResult};
use super::transform::Document;
use crate::storage::{DocumentStore, StorageError, StoredDocument};

/// Outcome of a committed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    /// Collection the batch was written to
    pub collection: String,
    /// Store-assigned batch identifier
    pub batch_id: String,
    /// Number of documents written
    pub inserted_count: usize,
    /// Primary keys in row order
    pub inserted_ids: Vec<String>,
}

/// Encodes documents for the store, assigning a fresh UUIDv4 primary key to
/// any document that did not carry one.
pub fn prepare_documents(documents: &[Document]) -> Result<Vec<StoredDocument>, StorageError> {
    documents
        .iter()
        .map(|doc| {
            let id = doc
                .primary_key()
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let body = doc.to_json_body(&id).map_err(|e| {
                StorageError::write_failed_no_source(format!(
                    "Failed to encode document '{}': {}",
                    id, e
                ))
            })?;
            Ok(StoredDocument::new(id, body))
        })
        .collect()
}

/// Writes `documents` into `collection` as one all-or-nothing batch.
///
/// # Errors
///
/// `StoreWriteFailed` when the store refuses or fails the insert. The store
/// error is logged here in full and kept as the error source.
pub async fn write_batch(
    store: &dyn DocumentStore,
    collection: &str,
    documents: &[Document],
) -> IngestResult<BatchResult> {
    let prepared = prepare_documents(documents).map_err(|source| store_failed(collection, source))?;
    let inserted_ids: Vec<String> = prepared.iter().map(|d| d.document_id.clone()).collect();

    let receipt = store
        .insert_many(collection, prepared)
        .await
        .map_err(|source| store_failed(collection, source))?;

    Ok(BatchResult {
        collection: collection.to_string(),
        batch_id: receipt.batch_id,
        inserted_count: receipt.document_count,
        inserted_ids,
    })
}

fn store_failed(collection: &str, source: StorageError) -> IngestError {
    tracing::error!(
        collection,
        code = source.code().code(),
        fatal = source.is_fatal(),
        error = %source,
        "bulk insert failed"
    );
    IngestError::StoreWriteFailed {
        collection: collection.to_string(),
        source,
    }
}
