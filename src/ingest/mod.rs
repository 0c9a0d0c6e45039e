//! # Ingestion
//!
//! Signed CSV uploads turned into documents and committed as one batch.
//!
//! ```text
//! request -> signature -> transform + validate (per row) -> batch -> response
//! ```
//!
//! Registries are built once at startup and read concurrently; every request
//! runs sequentially through `pipeline::run`.

pub mod batch;
pub mod errors;
pub mod pipeline;
pub mod registry;
pub mod request;
pub mod signature;
pub mod transform;
pub mod validate;

pub use batch::{prepare_documents, write_batch, BatchResult};
pub use errors::{IngestError, IngestResult, RegistryError, RegistryResult};
pub use pipeline::{ingest, run, PipelineRun, PipelineState};
pub use registry::{
    target_field, UploaderConfig, UploaderRegistry, PRIMARY_KEY_FIELD, RESERVED_ID_COLUMN,
};
pub use request::{parse_csv_body, UploadQuery, UploadRequest};
pub use signature::{canonical_string, compute_signature, verify};
pub use transform::{transform_row, Document};
pub use validate::ValidatorRegistry;
