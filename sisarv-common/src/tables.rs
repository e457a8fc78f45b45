//! Static configuration tables for the sync engine
//!
//! Everything the portal forces us to hardcode — which form field is fed from
//! which dataset column, spelling fixes for taxon names, and the internal
//! option ids the server demands for a handful of selects — is data, not
//! behavior. The tables ship as TOML (`tables/default.toml` is compiled in)
//! so a deployment can adjust them without touching engine code.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::RecordField;

const DEFAULT_TABLES: &str = include_str!("../tables/default.toml");

/// Where a form field's value comes from: a dataset column or a fixed literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueSource {
    /// Read the value from a record column
    Column { column: RecordField },
    /// Use the literal verbatim
    Fixed { fixed: String },
}

/// One entry of the field-mapping table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Form parameter name on the portal side
    pub form_id: String,
    #[serde(flatten)]
    pub source: ValueSource,
}

/// Two-tier alias table for one name kind (common or scientific).
///
/// `manual` holds deployment-specific rewrites applied first; `portal` maps
/// input labels to the exact text the portal's select exposes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameAliases {
    pub manual: HashMap<String, String>,
    pub portal: HashMap<String, String>,
}

/// One label → internal id association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdRule {
    pub label: String,
    pub id: String,
}

/// Label → internal-id table for a select the server only accepts by id,
/// with a deliberate fallback default when nothing matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueIdTable {
    pub default: String,
    pub entries: Vec<IdRule>,
}

impl ValueIdTable {
    /// Exact label match, case-insensitively; falls back to the default id.
    pub fn match_literal(&self, value: &str) -> &str {
        let trimmed = value.trim();
        if let Some(rule) = self.entries.iter().find(|rule| rule.label == trimmed) {
            return &rule.id;
        }
        let upper = trimmed.to_uppercase();
        self.entries
            .iter()
            .find(|rule| rule.label.to_uppercase() == upper)
            .map(|rule| rule.id.as_str())
            .unwrap_or(&self.default)
    }

    /// Literal match first, then bidirectional substring containment over the
    /// entries in table order; falls back to the default id.
    pub fn match_substring(&self, value: &str) -> &str {
        let trimmed = value.trim();
        let upper = trimmed.to_uppercase();
        if let Some(rule) = self
            .entries
            .iter()
            .find(|rule| rule.label == trimmed || rule.label.to_uppercase() == upper)
        {
            return &rule.id;
        }
        self.entries
            .iter()
            .find(|rule| {
                let label = rule.label.to_uppercase();
                label.contains(&upper) || upper.contains(&label)
            })
            .map(|rule| rule.id.as_str())
            .unwrap_or(&self.default)
    }
}

/// The full set of static tables the engine is constructed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTables {
    /// Ordered form-field mapping
    pub fields: Vec<FieldRule>,
    /// Aliases for the common-name picker
    #[serde(default)]
    pub common_name: NameAliases,
    /// Aliases for the scientific-name picker
    #[serde(default)]
    pub scientific_name: NameAliases,
    /// Conservation-status text → option id
    pub conservation_status_ids: ValueIdTable,
    /// Municipal-policy (fcb) text → option id
    pub policy_ids: ValueIdTable,
    /// Motivation text → option id
    pub motivation_ids: ValueIdTable,
    /// Intent text → option id
    pub intent_ids: ValueIdTable,
}

impl SyncTables {
    /// Tables compiled into the binary.
    pub fn builtin() -> Self {
        toml::from_str(DEFAULT_TABLES).expect("embedded default tables are valid")
    }

    /// Parse tables from a TOML string.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let tables: SyncTables =
            toml::from_str(raw).map_err(|e| Error::Config(format!("tables TOML: {e}")))?;
        tables.validate()?;
        Ok(tables)
    }

    /// Load tables from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Every form field must be mapped exactly once.
    fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for rule in &self.fields {
            if !seen.insert(rule.form_id.as_str()) {
                return Err(Error::Config(format!(
                    "form field {:?} mapped more than once",
                    rule.form_id
                )));
            }
        }
        Ok(())
    }
}
