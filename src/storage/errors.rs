//! Document store error types
//!
//! Error codes:
//! - STORE_WRITE_FAILED (ERROR severity)
//! - STORE_READ_FAILED (ERROR severity)
//! - STORE_DUPLICATE_KEY (ERROR severity)
//! - STORE_INVALID_COLLECTION (ERROR severity)
//! - STORE_DATA_CORRUPTION (FATAL severity)

use std::fmt;
use std::io;

/// Severity levels for store errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, server continues
    Error,
    /// The collection can no longer be trusted
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Store-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// Batch write failed
    StoreWriteFailed,
    /// Collection read failed
    StoreReadFailed,
    /// Primary key already present in the collection or repeated in the batch
    StoreDuplicateKey,
    /// Collection name cannot be mapped to a collection file
    StoreInvalidCollection,
    /// Frame checksum failure
    StoreDataCorruption,
}

impl StorageErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            StorageErrorCode::StoreWriteFailed => "STORE_WRITE_FAILED",
            StorageErrorCode::StoreReadFailed => "STORE_READ_FAILED",
            StorageErrorCode::StoreDuplicateKey => "STORE_DUPLICATE_KEY",
            StorageErrorCode::StoreInvalidCollection => "STORE_INVALID_COLLECTION",
            StorageErrorCode::StoreDataCorruption => "STORE_DATA_CORRUPTION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            StorageErrorCode::StoreDataCorruption => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Store error with full context. Carries internals (paths, offsets, keys)
/// and must only ever reach server-side logs.
#[derive(Debug)]
pub struct StorageError {
    code: StorageErrorCode,
    message: String,
    details: Option<String>,
    source: Option<io::Error>,
}

impl StorageError {
    fn new(code: StorageErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Create a new write failed error
    pub fn write_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            source: Some(source),
            ..Self::new(StorageErrorCode::StoreWriteFailed, message)
        }
    }

    /// Create a write failed error without IO source
    pub fn write_failed_no_source(message: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::StoreWriteFailed, message)
    }

    /// Create a new read failed error
    pub fn read_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            source: Some(source),
            ..Self::new(StorageErrorCode::StoreReadFailed, message)
        }
    }

    /// Create a duplicate key error for a collection
    pub fn duplicate_key(collection: &str, document_id: &str) -> Self {
        Self {
            details: Some(format!("document_id: {}", document_id)),
            ..Self::new(
                StorageErrorCode::StoreDuplicateKey,
                format!("Duplicate primary key in collection '{}'", collection),
            )
        }
    }

    /// Create an invalid collection name error
    pub fn invalid_collection(collection: &str) -> Self {
        Self::new(
            StorageErrorCode::StoreInvalidCollection,
            format!("Invalid collection name: '{}'", collection),
        )
    }

    /// Create a new data corruption error (FATAL)
    pub fn data_corruption(message: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::StoreDataCorruption, message)
    }

    /// Create a data corruption error with byte offset context
    pub fn corruption_at_offset(offset: u64, reason: impl Into<String>) -> Self {
        Self {
            details: Some(format!("byte_offset: {}", offset)),
            ..Self::new(StorageErrorCode::StoreDataCorruption, reason)
        }
    }

    /// Returns the error code
    pub fn code(&self) -> StorageErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether this error poisons the collection
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for store operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(StorageErrorCode::StoreReadFailed.code(), "STORE_READ_FAILED");
        assert_eq!(StorageErrorCode::StoreWriteFailed.code(), "STORE_WRITE_FAILED");
        assert_eq!(StorageErrorCode::StoreDuplicateKey.code(), "STORE_DUPLICATE_KEY");
        assert_eq!(StorageErrorCode::StoreDataCorruption.code(), "STORE_DATA_CORRUPTION");
    }

    #[test]
    fn test_only_corruption_is_fatal() {
        assert!(StorageError::data_corruption("checksum mismatch").is_fatal());
        assert!(!StorageError::duplicate_key("acme", "a1").is_fatal());
        assert!(!StorageError::write_failed(
            "disk full",
            io::Error::new(io::ErrorKind::Other, "disk full"),
        )
        .is_fatal());
    }

    #[test]
    fn test_display_contains_code_and_details() {
        let err = StorageError::corruption_at_offset(1024, "checksum mismatch");
        let display = err.to_string();
        assert!(display.contains("STORE_DATA_CORRUPTION"));
        assert!(display.contains("FATAL"));
        assert!(display.contains("byte_offset: 1024"));

        let dup = StorageError::duplicate_key("acme", "a1").to_string();
        assert!(dup.contains("acme"));
        assert!(dup.contains("document_id: a1"));
    }

    #[test]
    fn test_io_source_is_preserved() {
        use std::error::Error;
        let err = StorageError::write_failed(
            "write",
            io::Error::new(io::ErrorKind::Other, "no space left"),
        );
        assert!(err.source().unwrap().to_string().contains("no space left"));
    }
}
