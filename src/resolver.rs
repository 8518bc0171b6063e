//! Maps arbitrary source column names onto [`CanonicalField`]s.
//!
//! Both sides of a comparison go through [`normalize_column_name`]: accents are
//! stripped, case is folded, and whitespace, `_` and `-` are removed. Each field
//! takes the first source column matching its highest-priority candidate.

use crate::error::{AnalyticsError, Result};
use crate::schema::{CanonicalField, SynonymTable};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalizes a column name for comparison.
///
/// ```
/// use invoice_analytics::resolver::normalize_column_name;
///
/// assert_eq!(normalize_column_name("Razão Social/Nome"), "razaosocial/nome");
/// assert_eq!(normalize_column_name(" VALOR_NF "), "valornf");
/// ```
pub fn normalize_column_name(name: &str) -> String {
    name.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FieldBinding {
    Mapped { column: String, index: usize },
    Absent,
}

impl FieldBinding {
    pub fn column(&self) -> Option<&str> {
        match self {
            FieldBinding::Mapped { column, .. } => Some(column),
            FieldBinding::Absent => None,
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            FieldBinding::Mapped { index, .. } => Some(*index),
            FieldBinding::Absent => None,
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, FieldBinding::Mapped { .. })
    }
}

/// Resolved binding for every canonical field. Built once per ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMap {
    bindings: BTreeMap<CanonicalField, FieldBinding>,
    detected_columns: Vec<String>,
}

impl FieldMap {
    pub fn binding(&self, field: CanonicalField) -> &FieldBinding {
        self.bindings.get(&field).unwrap_or(&FieldBinding::Absent)
    }

    pub fn column(&self, field: CanonicalField) -> Option<&str> {
        self.binding(field).column()
    }

    pub fn index(&self, field: CanonicalField) -> Option<usize> {
        self.binding(field).index()
    }

    pub fn is_mapped(&self, field: CanonicalField) -> bool {
        self.binding(field).is_mapped()
    }

    pub fn bindings(&self) -> impl Iterator<Item = (CanonicalField, &FieldBinding)> {
        CanonicalField::ALL
            .into_iter()
            .map(move |field| (field, self.binding(field)))
    }

    pub fn detected_columns(&self) -> &[String] {
        &self.detected_columns
    }

    pub fn missing(&self, required: &[CanonicalField]) -> Vec<CanonicalField> {
        let mut missing: Vec<CanonicalField> = required
            .iter()
            .copied()
            .filter(|field| !self.is_mapped(*field))
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }

    /// Fails with [`AnalyticsError::SchemaValidation`] when any required field
    /// is unresolved.
    pub fn validate_required(&self, required: &[CanonicalField]) -> Result<()> {
        let missing = self.missing(required);
        if missing.is_empty() {
            return Ok(());
        }

        warn!(
            "Schema validation failed: missing {:?} among columns {:?}",
            missing, self.detected_columns
        );
        Err(AnalyticsError::SchemaValidation {
            missing,
            detected: self.detected_columns.clone(),
        })
    }
}

pub fn resolve_fields(columns: &[String], synonyms: &SynonymTable) -> FieldMap {
    let normalized: Vec<String> = columns.iter().map(|c| normalize_column_name(c)).collect();
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut bindings = BTreeMap::new();

    for field in CanonicalField::ALL {
        let candidates = synonyms.get(&field).map(Vec::as_slice).unwrap_or(&[]);

        let hit = candidates.iter().find_map(|candidate| {
            let wanted = normalize_column_name(candidate);
            normalized
                .iter()
                .enumerate()
                .find(|(idx, name)| **name == wanted && !claimed.contains(idx))
                .map(|(idx, _)| idx)
        });

        let binding = match hit {
            Some(index) => {
                claimed.insert(index);
                debug!("Resolved {} -> '{}'", field, columns[index]);
                FieldBinding::Mapped {
                    column: columns[index].clone(),
                    index,
                }
            }
            None => {
                debug!("No source column for {}", field);
                FieldBinding::Absent
            }
        };
        bindings.insert(field, binding);
    }

    FieldMap {
        bindings,
        detected_columns: columns.to_vec(),
    }
}

/// Resolves and validates in one step.
pub fn resolve_and_validate(
    columns: &[String],
    synonyms: &SynonymTable,
    required: &[CanonicalField],
) -> Result<FieldMap> {
    let map = resolve_fields(columns, synonyms);
    map.validate_required(required)?;
    Ok(map)
}
