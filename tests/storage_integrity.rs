//! Collection file integrity tests
//!
//! - A batch is on disk entirely or not at all
//! - Corruption is never ignored
//! - A torn trailing frame (crash mid-write) is discarded on reopen, and its
//!   bytes are kept in a `.torn` sidecar
//! - Primary keys stay unique across reopen

use ingestd::storage::{
    collection_path, torn_tail_path, StorageReader, StorageWriter, StoredDocument,
};
use std::fs::{self, OpenOptions};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn docs(ids: &[&str]) -> Vec<StoredDocument> {
    ids.iter()
        .map(|id| StoredDocument::new(*id, format!(r#"{{"_id":"{}"}}"#, id).into_bytes()))
        .collect()
}

fn create_temp_data_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

fn stored_ids(data_dir: &std::path::Path, collection: &str) -> Vec<String> {
    let mut reader = StorageReader::open(&collection_path(data_dir, collection)).unwrap();
    reader
        .read_documents()
        .unwrap()
        .into_iter()
        .map(|d| d.document_id)
        .collect()
}

// =============================================================================
// Durability
// =============================================================================

#[test]
fn test_batches_survive_reopen() {
    let temp_dir = create_temp_data_dir();
    let data_dir = temp_dir.path();

    {
        let mut writer = StorageWriter::open(data_dir, "acme").unwrap();
        writer.write_batch(docs(&["a1", "b2"])).unwrap();
        writer.write_batch(docs(&["c3"])).unwrap();
    }

    let writer = StorageWriter::open(data_dir, "acme").unwrap();
    assert_eq!(writer.batch_count(), 2);
    assert_eq!(writer.document_count(), 3);
    assert!(writer.has_document("b2"));
    assert_eq!(stored_ids(data_dir, "acme"), vec!["a1", "b2", "c3"]);
}

#[test]
fn test_primary_keys_unique_across_reopen() {
    let temp_dir = create_temp_data_dir();
    let data_dir = temp_dir.path();

    {
        let mut writer = StorageWriter::open(data_dir, "acme").unwrap();
        writer.write_batch(docs(&["a1"])).unwrap();
    }

    let mut writer = StorageWriter::open(data_dir, "acme").unwrap();
    let size_before = fs::metadata(writer.path()).unwrap().len();

    let err = writer.write_batch(docs(&["b2", "a1"])).unwrap_err();
    assert_eq!(err.code().code(), "STORE_DUPLICATE_KEY");

    // Nothing of the rejected batch reached the file
    assert_eq!(fs::metadata(writer.path()).unwrap().len(), size_before);
    assert!(!writer.has_document("b2"));
    assert_eq!(stored_ids(data_dir, "acme"), vec!["a1"]);
}

#[test]
fn test_duplicate_within_one_batch_rejected() {
    let temp_dir = create_temp_data_dir();
    let mut writer = StorageWriter::open(temp_dir.path(), "acme").unwrap();

    let err = writer.write_batch(docs(&["a1", "a1"])).unwrap_err();
    assert_eq!(err.code().code(), "STORE_DUPLICATE_KEY");
    assert_eq!(writer.document_count(), 0);
    assert_eq!(writer.current_offset(), 0);
}

// =============================================================================
// Corruption
// =============================================================================

#[test]
fn test_corruption_causes_explicit_failure() {
    let temp_dir = create_temp_data_dir();
    let data_dir = temp_dir.path();
    let storage_path = collection_path(data_dir, "acme");

    {
        let mut writer = StorageWriter::open(data_dir, "acme").unwrap();
        writer.write_batch(docs(&["a1", "b2", "c3"])).unwrap();
    }

    {
        let mut contents = fs::read(&storage_path).unwrap();
        let mid = contents.len() / 2;
        contents[mid] ^= 0xFF;
        fs::write(&storage_path, contents).unwrap();
    }

    let err = StorageWriter::open(data_dir, "acme").unwrap_err();
    assert_eq!(err.code().code(), "STORE_DATA_CORRUPTION");
    assert!(err.is_fatal(), "corruption must be fatal, got: {}", err);

    let mut reader = StorageReader::open(&storage_path).unwrap();
    assert!(reader.read_all().is_err());
}

// =============================================================================
// Torn writes
// =============================================================================

#[test]
fn test_torn_trailing_frame_discarded_on_reopen() {
    let temp_dir = create_temp_data_dir();
    let data_dir = temp_dir.path();
    let storage_path = collection_path(data_dir, "acme");

    let committed_len = {
        let mut writer = StorageWriter::open(data_dir, "acme").unwrap();
        writer.write_batch(docs(&["a1"])).unwrap();
        let committed_len = writer.current_offset();
        writer.write_batch(docs(&["b2", "c3"])).unwrap();
        committed_len
    };

    // Simulate a crash part-way through the second frame
    let full_len = fs::metadata(&storage_path).unwrap().len();
    OpenOptions::new()
        .write(true)
        .open(&storage_path)
        .unwrap()
        .set_len(full_len - 7)
        .unwrap();

    let mut writer = StorageWriter::open(data_dir, "acme").unwrap();
    assert_eq!(writer.document_count(), 1);
    assert!(!writer.has_document("b2"));
    assert_eq!(fs::metadata(&storage_path).unwrap().len(), committed_len);

    // The discarded ids are free again
    writer.write_batch(docs(&["b2"])).unwrap();
    assert_eq!(stored_ids(data_dir, "acme"), vec!["a1", "b2"]);
}

#[test]
fn test_bad_length_on_last_frame_kept_in_sidecar() {
    let temp_dir = create_temp_data_dir();
    let data_dir = temp_dir.path();
    let storage_path = collection_path(data_dir, "acme");

    let committed_len = {
        let mut writer = StorageWriter::open(data_dir, "acme").unwrap();
        writer.write_batch(docs(&["a1"])).unwrap();
        let committed_len = writer.current_offset();
        writer.write_batch(docs(&["b2"])).unwrap();
        committed_len
    };

    // Bit rot in the last frame's length prefix: it now claims more bytes
    // than the file holds
    let mut contents = fs::read(&storage_path).unwrap();
    let start = committed_len as usize;
    contents[start..start + 4].copy_from_slice(&u32::MAX.to_le_bytes());
    fs::write(&storage_path, &contents).unwrap();

    let writer = StorageWriter::open(data_dir, "acme").unwrap();
    assert!(!writer.has_document("b2"));
    assert_eq!(fs::metadata(&storage_path).unwrap().len(), committed_len);

    // The committed batch is still recoverable by hand
    let sidecar = fs::read(torn_tail_path(&storage_path)).unwrap();
    assert_eq!(sidecar, &contents[start..]);
}

#[test]
fn test_reader_stops_at_torn_tail() {
    let temp_dir = create_temp_data_dir();
    let data_dir = temp_dir.path();
    let storage_path = collection_path(data_dir, "acme");

    {
        let mut writer = StorageWriter::open(data_dir, "acme").unwrap();
        writer.write_batch(docs(&["a1"])).unwrap();
    }
    let committed_len = fs::metadata(&storage_path).unwrap().len();

    // A few stray bytes of a frame that never completed
    let mut contents = fs::read(&storage_path).unwrap();
    contents.extend_from_slice(&[0x40, 0x00, 0x00]);
    fs::write(&storage_path, contents).unwrap();

    let mut reader = StorageReader::open(&storage_path).unwrap();
    assert_eq!(reader.read_all().unwrap().len(), 1);
    assert_eq!(reader.torn_tail(), Some(committed_len));
}

#[test]
fn test_invalid_collection_name_rejected() {
    let temp_dir = create_temp_data_dir();
    for name in ["", "../escape", ".hidden", "a/b"] {
        let err = StorageWriter::open(temp_dir.path(), name).unwrap_err();
        assert_eq!(err.code().code(), "STORE_INVALID_COLLECTION");
    }
}
