//! # Ingest Errors
//!
//! Every failure of an upload request. All of them are terminal for the
//! request and none is retried here.

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for ingest operations
pub type IngestResult<T> = Result<T, IngestError>;

/// Upload pipeline errors.
///
/// `Display` is the client-visible message. Store internals live only in the
/// `source` chain of `StoreWriteFailed` and are for server-side logs.
#[derive(Debug, Error)]
pub enum IngestError {
    // ==================
    // Authentication
    // ==================
    /// Identity is not in the uploader registry
    #[error("Uploader '{uploader}' is unknown")]
    UnknownUploader { uploader: String },

    /// Supplied signature differs from the expected one
    #[error("Uploader '{uploader}' didn't sign its request")]
    SignatureMismatch { uploader: String },

    // ==================
    // Rows
    // ==================
    /// Row width differs from the uploader's declared column count
    #[error("Length of line #{row_index} is {actual}, expected {expected}")]
    RowLengthMismatch {
        row_index: usize,
        expected: usize,
        actual: usize,
    },

    /// A value does not fully match its field's pattern
    #[error("On line #{row_index} value '{value}' of field '{field}' does not comply with validation")]
    ValidationFailed {
        row_index: usize,
        field: String,
        value: String,
    },

    // ==================
    // Request decoding
    // ==================
    /// Required query parameter absent
    #[error("Missing query parameter '{0}'")]
    MissingParameter(&'static str),

    /// Query string is not decodable into the upload parameters
    #[error("Malformed query string: {0}")]
    MalformedQuery(String),

    /// Body is not decodable as CSV
    #[error("Malformed upload body: {0}")]
    MalformedBody(String),

    /// Body decoded to zero rows
    #[error("Upload contains no rows")]
    EmptyBatch,

    // ==================
    // Store
    // ==================
    /// Bulk insert failed; nothing from the batch was written
    #[error("Failed to store batch in collection '{collection}'")]
    StoreWriteFailed {
        collection: String,
        #[source]
        source: StorageError,
    },
}

impl IngestError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::UnknownUploader { .. } => "UNKNOWN_UPLOADER",
            IngestError::SignatureMismatch { .. } => "SIGNATURE_MISMATCH",
            IngestError::RowLengthMismatch { .. } => "ROW_LENGTH_MISMATCH",
            IngestError::ValidationFailed { .. } => "VALIDATION_FAILED",
            IngestError::MissingParameter(_) => "MISSING_PARAMETER",
            IngestError::MalformedQuery(_) => "MALFORMED_QUERY",
            IngestError::MalformedBody(_) => "MALFORMED_BODY",
            IngestError::EmptyBatch => "EMPTY_BATCH",
            IngestError::StoreWriteFailed { .. } => "STORE_WRITE_FAILED",
        }
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            // 401 Unauthorized
            IngestError::UnknownUploader { .. } => 401,
            IngestError::SignatureMismatch { .. } => 401,

            // 400 Bad Request
            IngestError::RowLengthMismatch { .. } => 400,
            IngestError::ValidationFailed { .. } => 400,
            IngestError::MissingParameter(_) => 400,
            IngestError::MalformedQuery(_) => 400,
            IngestError::MalformedBody(_) => 400,
            IngestError::EmptyBatch => 400,

            // 500 Internal Server Error
            IngestError::StoreWriteFailed { .. } => 500,
        }
    }

    /// Whether the caller can fix the request and submit it again.
    ///
    /// Store failures give no such guidance.
    pub fn is_resubmittable(&self) -> bool {
        !matches!(self, IngestError::StoreWriteFailed { .. })
    }

    /// Message safe to return to the client.
    pub fn client_message(&self) -> String {
        self.to_string()
    }
}

/// Result type for registry construction
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Load-time problems with the uploader or validator registries.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Identity is empty or cannot name a collection
    #[error("Invalid uploader identity '{0}'")]
    InvalidIdentity(String),

    /// Identity registered twice
    #[error("Uploader '{0}' is registered more than once")]
    DuplicateUploader(String),

    /// Shared secret is empty
    #[error("Uploader '{0}' has an empty shared secret")]
    EmptySecret(String),

    /// Column list is empty
    #[error("Uploader '{0}' declares no columns")]
    NoColumns(String),

    /// A column name is empty
    #[error("Uploader '{uploader}' has an empty column name at position {index}")]
    EmptyColumnName { uploader: String, index: usize },

    /// The same column name appears twice
    #[error("Uploader '{uploader}' declares column '{column}' more than once")]
    DuplicateColumn { uploader: String, column: String },

    /// Identifier remap would overwrite another column
    #[error("Uploader '{uploader}' declares both '{reserved}' and '{primary_key}'")]
    PrimaryKeyCollision {
        uploader: String,
        reserved: &'static str,
        primary_key: &'static str,
    },

    /// Validator pattern does not compile
    #[error("Invalid validator pattern for field '{field}': {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },
}
