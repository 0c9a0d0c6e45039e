//! Field validator
//!
//! Field name -> whole-value pattern rules, shared by all uploaders.
//!
//! Fields without a rule are accepted unconditionally (trust by default).
//! Rules are looked up by the declared column name, so a rule keyed `UUID`
//! applies to the identifier column even though it is stored as `_id`.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;

use super::errors::{IngestError, IngestResult, RegistryError, RegistryResult};
use super::transform::Document;

/// Compiled validation rules, immutable after construction.
#[derive(Debug, Clone, Default)]
pub struct ValidatorRegistry {
    rules: HashMap<String, Regex>,
}

impl ValidatorRegistry {
    /// An empty registry: every value of every field is accepted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles every pattern, anchored so it must match the whole value.
    pub fn from_patterns<I, K, V>(patterns: I) -> RegistryResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut rules = HashMap::new();
        for (field, pattern) in patterns {
            let field = field.into();
            let regex = compile_anchored(pattern.as_ref())
                .map_err(|source| RegistryError::InvalidPattern {
                    field: field.clone(),
                    source,
                })?;
            rules.insert(field, regex);
        }
        Ok(Self { rules })
    }

    pub fn rule(&self, field: &str) -> Option<&Regex> {
        self.rules.get(field)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Fields with a rule, sorted, with their anchored pattern text.
    pub fn patterns(&self) -> BTreeMap<&str, &str> {
        self.rules
            .iter()
            .map(|(field, regex)| (field.as_str(), regex.as_str()))
            .collect()
    }

    /// Checks a single value against the rule for `field`, if any.
    pub fn validate_field(&self, row_index: usize, field: &str, value: &str) -> IngestResult<()> {
        match self.rules.get(field) {
            Some(regex) if !regex.is_match(value) => Err(IngestError::ValidationFailed {
                row_index,
                field: field.to_string(),
                value: value.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Checks every field of a transformed row, stopping at the first failure.
    ///
    /// `columns` must be the declared columns the document was built from;
    /// the document keeps column order, so they pair up positionally.
    pub fn validate_document(
        &self,
        row_index: usize,
        columns: &[String],
        document: &Document,
    ) -> IngestResult<()> {
        for (column, (_, value)) in columns.iter().zip(document.fields()) {
            self.validate_field(row_index, column, value)?;
        }
        Ok(())
    }
}

fn compile_anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})$", pattern))
}
