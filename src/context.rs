//! Application context
//!
//! Everything a request needs, built once at startup and shared read-only.

use std::sync::Arc;

use crate::ingest::{UploaderRegistry, ValidatorRegistry};
use crate::storage::DocumentStore;

/// Immutable registries plus the shared store handle.
#[derive(Clone)]
pub struct AppContext {
    uploaders: Arc<UploaderRegistry>,
    validators: Arc<ValidatorRegistry>,
    store: Arc<dyn DocumentStore>,
}

impl AppContext {
    pub fn new(
        uploaders: UploaderRegistry,
        validators: ValidatorRegistry,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            uploaders: Arc::new(uploaders),
            validators: Arc::new(validators),
            store,
        }
    }

    pub fn uploaders(&self) -> &UploaderRegistry {
        &self.uploaders
    }

    pub fn validators(&self) -> &ValidatorRegistry {
        &self.validators
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("uploaders", &self.uploaders.identities())
            .field("validators", &self.validators.len())
            .finish_non_exhaustive()
    }
}
