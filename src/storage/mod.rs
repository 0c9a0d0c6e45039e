//! Embedded document store
//!
//! Committed uploads land here, one append-only file per collection.
//!
//! # Design Principles
//!
//! - Append-only (no in-place updates, no deletes)
//! - One checksummed frame per batch: a batch is on disk entirely or not at all
//! - Checksum-verified on every read
//! - Primary keys unique per collection
//! - fsync before a batch is acknowledged

mod checksum;
mod errors;
mod reader;
mod record;
mod store;
mod writer;

pub use checksum::compute_checksum;
pub use errors::{Severity, StorageError, StorageErrorCode, StorageResult};
pub use reader::StorageReader;
pub use record::{BatchRecord, StoredDocument};
pub use store::{DocumentStore, FileDocumentStore, InsertCall, MemoryDocumentStore};
pub use writer::{
    collection_path, is_valid_collection_name, torn_tail_path, BatchReceipt, StorageWriter,
    MAX_COLLECTION_NAME_LEN,
};
