//! Uploader registry
//!
//! Static mapping from uploader identity to its shared secret and declared
//! column order. Built once at startup and never mutated afterwards.

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::errors::{RegistryError, RegistryResult};
use crate::storage::is_valid_collection_name;

/// Column name that carries the document identifier in uploaded rows.
pub const RESERVED_ID_COLUMN: &str = "UUID";

/// The store's primary-key field.
pub const PRIMARY_KEY_FIELD: &str = "_id";

/// Maps a declared column name to the document field it is stored under.
pub fn target_field(column: &str) -> &str {
    if column == RESERVED_ID_COLUMN {
        PRIMARY_KEY_FIELD
    } else {
        column
    }
}

/// One registered uploader.
///
/// The column order is fixed and defines the positional-to-named mapping for
/// every row this uploader sends.
#[derive(Clone, PartialEq, Eq)]
pub struct UploaderConfig {
    identity: String,
    secret: String,
    columns: Vec<String>,
}

impl UploaderConfig {
    /// Validates and builds an uploader entry.
    ///
    /// # Errors
    ///
    /// - identity empty or not usable as a collection name
    /// - empty secret
    /// - no columns, an empty column name, or a repeated column name
    /// - both `UUID` and `_id` declared (the remap would collide)
    pub fn new(
        identity: impl Into<String>,
        secret: impl Into<String>,
        columns: Vec<String>,
    ) -> RegistryResult<Self> {
        let identity = identity.into();
        let secret = secret.into();

        if !is_valid_collection_name(&identity) {
            return Err(RegistryError::InvalidIdentity(identity));
        }
        if secret.is_empty() {
            return Err(RegistryError::EmptySecret(identity));
        }
        if columns.is_empty() {
            return Err(RegistryError::NoColumns(identity));
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            if column.is_empty() {
                return Err(RegistryError::EmptyColumnName {
                    uploader: identity,
                    index,
                });
            }
            if !seen.insert(column.as_str()) {
                return Err(RegistryError::DuplicateColumn {
                    uploader: identity,
                    column: column.clone(),
                });
            }
        }
        if seen.contains(RESERVED_ID_COLUMN) && seen.contains(PRIMARY_KEY_FIELD) {
            return Err(RegistryError::PrimaryKeyCollision {
                uploader: identity,
                reserved: RESERVED_ID_COLUMN,
                primary_key: PRIMARY_KEY_FIELD,
            });
        }

        Ok(Self {
            identity,
            secret,
            columns,
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Declared column names, in row order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Collection this uploader's batches are written to.
    pub fn collection(&self) -> &str {
        &self.identity
    }

    /// Whether rows carry their own identifier.
    pub fn has_id_column(&self) -> bool {
        self.columns.iter().any(|c| c == RESERVED_ID_COLUMN)
    }
}

impl fmt::Debug for UploaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploaderConfig")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .field("columns", &self.columns)
            .finish()
    }
}

/// Identity -> uploader lookup.
#[derive(Debug, Clone, Default)]
pub struct UploaderRegistry {
    uploaders: HashMap<String, UploaderConfig>,
}

impl UploaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an uploader; identities must be unique.
    pub fn register(&mut self, uploader: UploaderConfig) -> RegistryResult<()> {
        if self.uploaders.contains_key(uploader.identity()) {
            return Err(RegistryError::DuplicateUploader(uploader.identity));
        }
        self.uploaders.insert(uploader.identity.clone(), uploader);
        Ok(())
    }

    pub fn get(&self, identity: &str) -> Option<&UploaderConfig> {
        self.uploaders.get(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.uploaders.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.uploaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uploaders.is_empty()
    }

    /// Registered identities, sorted.
    pub fn identities(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.uploaders.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_target_field_remaps_only_uuid() {
        assert_eq!(target_field("UUID"), "_id");
        assert_eq!(target_field("amount"), "amount");
        assert_eq!(target_field("uuid"), "uuid");
    }

    #[test]
    fn test_valid_uploader() {
        let uploader = UploaderConfig::new("acme", "s3cret", cols(&["UUID", "amount"])).unwrap();
        assert_eq!(uploader.column_count(), 2);
        assert_eq!(uploader.collection(), "acme");
        assert!(uploader.has_id_column());
    }

    #[test]
    fn test_duplicate_uuid_column_rejected() {
        let err = UploaderConfig::new("acme", "s3cret", cols(&["UUID", "amount", "UUID"]))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::DuplicateColumn { ref column, .. } if column == "UUID"
        ));
    }

    #[test]
    fn test_duplicate_plain_column_rejected() {
        let err = UploaderConfig::new("acme", "s3cret", cols(&["amount", "amount"])).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateColumn { .. }));
    }

    #[test]
    fn test_zero_columns_rejected() {
        let err = UploaderConfig::new("acme", "s3cret", Vec::new()).unwrap_err();
        assert!(matches!(err, RegistryError::NoColumns(_)));
    }

    #[test]
    fn test_empty_column_name_rejected() {
        let err = UploaderConfig::new("acme", "s3cret", cols(&["UUID", ""])).unwrap_err();
        assert!(matches!(err, RegistryError::EmptyColumnName { index: 1, .. }));
    }

    #[test]
    fn test_primary_key_collision_rejected() {
        let err = UploaderConfig::new("acme", "s3cret", cols(&["_id", "UUID"])).unwrap_err();
        assert!(matches!(err, RegistryError::PrimaryKeyCollision { .. }));

        // A lone `_id` column does not collide with anything
        assert!(UploaderConfig::new("acme", "s3cret", cols(&["_id", "amount"])).is_ok());
    }

    #[test]
    fn test_identity_and_secret_rules() {
        assert!(matches!(
            UploaderConfig::new("../acme", "s3cret", cols(&["a"])).unwrap_err(),
            RegistryError::InvalidIdentity(_)
        ));
        assert!(matches!(
            UploaderConfig::new("acme", "", cols(&["a"])).unwrap_err(),
            RegistryError::EmptySecret(_)
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let uploader = UploaderConfig::new("acme", "s3cret", cols(&["a"])).unwrap();
        let debug = format!("{:?}", uploader);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("acme"));
    }

    #[test]
    fn test_registry_lookup_and_duplicates() {
        let mut registry = UploaderRegistry::new();
        registry
            .register(UploaderConfig::new("acme", "a", cols(&["x"])).unwrap())
            .unwrap();
        registry
            .register(UploaderConfig::new("globex", "g", cols(&["y"])).unwrap())
            .unwrap();

        assert!(registry.contains("acme"));
        assert!(registry.get("initech").is_none());
        assert_eq!(registry.identities(), vec!["acme", "globex"]);

        let err = registry
            .register(UploaderConfig::new("acme", "other", cols(&["z"])).unwrap())
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateUploader(_)));
    }
}
