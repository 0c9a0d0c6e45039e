//! Collection file reader with strict corruption detection
//!
//! - Every frame's checksum is validated on read
//! - A checksum failure anywhere is corruption (FATAL)
//! - An incomplete final frame is a torn write: the batch never committed,
//!   so the reader stops there and reports the offset for the writer to trim

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::errors::{StorageError, StorageResult};
use super::record::{BatchRecord, StoredDocument, MIN_FRAME_SIZE};

/// Sequential reader over a collection file.
pub struct StorageReader {
    /// Path to the collection file
    storage_path: PathBuf,
    /// Buffered reader
    reader: BufReader<File>,
    /// Current byte offset
    current_offset: u64,
    /// Total file size
    file_size: u64,
    /// Offset of an incomplete trailing frame, once seen
    torn_tail: Option<u64>,
}

impl StorageReader {
    /// Opens a collection file for reading.
    pub fn open(storage_path: &Path) -> StorageResult<Self> {
        let file = File::open(storage_path).map_err(|e| {
            StorageError::read_failed(
                format!("Failed to open collection file: {}", storage_path.display()),
                e,
            )
        })?;

        let file_size = file
            .metadata()
            .map_err(|e| StorageError::read_failed("Failed to read file metadata", e))?
            .len();

        Ok(Self {
            storage_path: storage_path.to_path_buf(),
            reader: BufReader::new(file),
            current_offset: 0,
            file_size,
            torn_tail: None,
        })
    }

    /// Returns the collection file path.
    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    /// Returns the current read offset.
    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Offset where an incomplete trailing frame starts, if one was found.
    pub fn torn_tail(&self) -> Option<u64> {
        self.torn_tail
    }

    /// Reads the next committed batch.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(batch))` if a complete frame was read
    /// - `Ok(None)` at end of file or at a torn trailing frame
    /// - `Err(STORE_DATA_CORRUPTION)` if a frame fails validation
    pub fn read_next(&mut self) -> StorageResult<Option<BatchRecord>> {
        if self.torn_tail.is_some() || self.current_offset >= self.file_size {
            return Ok(None);
        }

        let remaining = self.file_size - self.current_offset;
        if remaining < MIN_FRAME_SIZE as u64 {
            self.torn_tail = Some(self.current_offset);
            return Ok(None);
        }

        let mut len_buf = [0u8; 4];
        self.reader.read_exact(&mut len_buf).map_err(|e| {
            StorageError::corruption_at_offset(
                self.current_offset,
                format!("Failed to read frame length: {}", e),
            )
        })?;
        let frame_length = u32::from_le_bytes(len_buf) as u64;

        if frame_length < MIN_FRAME_SIZE as u64 {
            return Err(StorageError::corruption_at_offset(
                self.current_offset,
                format!("Invalid frame length: {}", frame_length),
            ));
        }

        if frame_length > remaining {
            self.torn_tail = Some(self.current_offset);
            return Ok(None);
        }

        let mut frame_buf = vec![0u8; frame_length as usize];
        frame_buf[0..4].copy_from_slice(&len_buf);
        self.reader.read_exact(&mut frame_buf[4..]).map_err(|e| {
            StorageError::corruption_at_offset(
                self.current_offset,
                format!("Failed to read frame body: {}", e),
            )
        })?;

        let (batch, consumed) = BatchRecord::deserialize(&frame_buf)
            .map_err(|e| StorageError::corruption_at_offset(self.current_offset, e.to_string()))?;

        self.current_offset += consumed as u64;

        Ok(Some(batch))
    }

    /// Reads all committed batches in file order.
    pub fn read_all(&mut self) -> StorageResult<Vec<BatchRecord>> {
        let mut batches = Vec::new();
        while let Some(batch) = self.read_next()? {
            batches.push(batch);
        }
        Ok(batches)
    }

    /// Reads every stored document in insertion order.
    pub fn read_documents(&mut self) -> StorageResult<Vec<StoredDocument>> {
        Ok(self
            .read_all()?
            .into_iter()
            .flat_map(|batch| batch.documents)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn batch(id: &str, doc_ids: &[&str]) -> BatchRecord {
        BatchRecord::new(
            id,
            0,
            doc_ids
                .iter()
                .map(|d| StoredDocument::new(*d, format!(r#"{{"_id":"{}"}}"#, d).into_bytes()))
                .collect(),
        )
    }

    fn write_frames(path: &Path, batches: &[BatchRecord]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for b in batches {
            bytes.extend_from_slice(&b.serialize().unwrap());
        }
        fs::write(path, &bytes).unwrap();
        bytes
    }

    #[test]
    fn test_read_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("acme.dat");
        fs::write(&path, b"").unwrap();

        let mut reader = StorageReader::open(&path).unwrap();
        assert!(reader.read_next().unwrap().is_none());
        assert!(reader.torn_tail().is_none());
    }

    #[test]
    fn test_read_documents_in_insertion_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("acme.dat");
        write_frames(&path, &[batch("b1", &["a", "b"]), batch("b2", &["c"])]);

        let mut reader = StorageReader::open(&path).unwrap();
        let ids: Vec<_> = reader
            .read_documents()
            .unwrap()
            .into_iter()
            .map(|d| d.document_id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_torn_tail_stops_reading() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("acme.dat");
        let first = batch("b1", &["a"]).serialize().unwrap();
        let second = batch("b2", &["b"]).serialize().unwrap();

        let mut bytes = first.clone();
        bytes.extend_from_slice(&second[..second.len() - 5]);
        fs::write(&path, &bytes).unwrap();

        let mut reader = StorageReader::open(&path).unwrap();
        let batches = reader.read_all().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(reader.torn_tail(), Some(first.len() as u64));
    }

    #[test]
    fn test_corruption_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("acme.dat");
        let mut bytes = write_frames(&path, &[batch("b1", &["a"])]);
        bytes[10] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        let mut reader = StorageReader::open(&path).unwrap();
        let err = reader.read_next().unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.code().code(), "STORE_DATA_CORRUPTION");
    }
}
