//! Row transformer
//!
//! Maps a positional row onto the uploader's declared columns, producing a
//! document keyed by field name. The reserved `UUID` column is stored under
//! the primary-key field.

use serde::ser::{Serialize, SerializeMap, Serializer};

use super::errors::{IngestError, IngestResult};
use super::registry::{target_field, PRIMARY_KEY_FIELD};

/// A transformed row: field name -> raw value, in declared column order.
///
/// Created once per input row and not mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    fields: Vec<(String, String)>,
}

impl Document {
    /// Field/value pairs in declared column order.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }

    /// Value of the primary-key field, when the row carried one.
    pub fn primary_key(&self) -> Option<&str> {
        self.get(PRIMARY_KEY_FIELD)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Encoded JSON body with `_id` set to `primary_key`.
    ///
    /// Fields keep column order. A generated key goes first.
    pub fn to_json_body(&self, primary_key: &str) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&BodyWithKey {
            document: self,
            primary_key,
        })
    }
}

struct BodyWithKey<'a> {
    document: &'a Document,
    primary_key: &'a str,
}

impl Serialize for BodyWithKey<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = self.document.fields();
        let carries_key = self.document.primary_key().is_some();
        let len = if carries_key { fields.len() } else { fields.len() + 1 };

        let mut map = serializer.serialize_map(Some(len))?;
        if !carries_key {
            map.serialize_entry(PRIMARY_KEY_FIELD, self.primary_key)?;
        }
        for (name, value) in fields {
            if name == PRIMARY_KEY_FIELD {
                map.serialize_entry(name, self.primary_key)?;
            } else {
                map.serialize_entry(name, value)?;
            }
        }
        map.end()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Transforms one row into a document.
///
/// # Errors
///
/// `RowLengthMismatch` (with the 0-based `row_index`) when the row width
/// differs from the declared column count.
pub fn transform_row(
    columns: &[String],
    row_index: usize,
    row: Vec<String>,
) -> IngestResult<Document> {
    if row.len() != columns.len() {
        return Err(IngestError::RowLengthMismatch {
            row_index,
            expected: columns.len(),
            actual: row.len(),
        });
    }

    let fields = columns
        .iter()
        .zip(row)
        .map(|(column, value)| (target_field(column).to_string(), value))
        .collect();

    Ok(Document { fields })
}
