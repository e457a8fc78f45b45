//! Field value mapping and wire encoding
//!
//! `map_row` turns one record into the portal's form values by walking the
//! field-mapping table and applying the per-field business rules (status /
//! motivation / intent classification). `encode_for_transmission` then
//! renders everything the way the server accepts it over direct form posts:
//! integer project number, internal ids for the fixed selects, comma
//! decimals, integer DAP slots. Both passes are pure.

use sisarv_common::record::InventoryRecord;
use sisarv_common::tables::{SyncTables, ValueSource};

/// Canonical conservation-status phrases exposed by the portal.
const STATUS_NOT_COVERED: &str = "Espécime não enquadrada nos casos acima";
const STATUS_EXOTIC_80CM: &str =
    "Especies de origem exótica ou nativa não pertencente ao Bioma Mata Atlântica, com DAP >= 80cm";
const STATUS_NATIVE_70CM: &str = "Espécimes nativas do bioma Mata Atlântica com DAP >= 70cm";

/// Free-text motivation keywords that classify as a dead specimen.
const DEATH_KEYWORDS: [&str; 5] = ["MORTA", "QUEBRADA", "CUPIM", "TOMBADA", "PODRE"];

/// Maps records to portal form values using the configured tables.
pub struct FieldMapper<'a> {
    tables: &'a SyncTables,
}

impl<'a> FieldMapper<'a> {
    pub fn new(tables: &'a SyncTables) -> Self {
        Self { tables }
    }

    /// Produce the `(form_id, value)` pairs for one record, in table order.
    /// Missing cells become empty strings; business rules are applied here,
    /// wire encoding is not.
    pub fn map_row(&self, record: &InventoryRecord) -> Vec<(String, String)> {
        self.tables
            .fields
            .iter()
            .map(|rule| {
                let value = match &rule.source {
                    ValueSource::Column { column } => record.field_text(*column),
                    ValueSource::Fixed { fixed } => fixed.trim().to_string(),
                };
                (rule.form_id.clone(), apply_business_rule(&rule.form_id, value))
            })
            .collect()
    }

    /// Second pass for the direct-submission transport: render every value
    /// in the server's accepted wire format. Unparseable numerics pass
    /// through unchanged except DAP slots, which degrade to "0" rather than
    /// failing the record.
    pub fn encode_for_transmission(&self, values: &[(String, String)]) -> Vec<(String, String)> {
        values
            .iter()
            .map(|(form_id, value)| (form_id.clone(), self.encode_value(form_id, value)))
            .collect()
    }

    fn encode_value(&self, form_id: &str, value: &str) -> String {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return value.to_string();
        }
        match form_id {
            "numero_especie_projeto" => {
                integer_string(trimmed).unwrap_or_else(|| value.to_string())
            }
            "estado_conservacao" if !is_digits(trimmed) => self
                .tables
                .conservation_status_ids
                .match_substring(trimmed)
                .to_string(),
            "fcb" if !is_digits(trimmed) => {
                self.tables.policy_ids.match_literal(trimmed).to_string()
            }
            "motivacao" if !is_digits(trimmed) => {
                self.tables.motivation_ids.match_literal(trimmed).to_string()
            }
            "intencao" if !is_digits(trimmed) => {
                self.tables.intent_ids.match_literal(trimmed).to_string()
            }
            "altura_arvore" | "diametro_copa" => {
                comma_decimal(trimmed).unwrap_or_else(|| value.to_string())
            }
            "dap1" | "dap2" | "dap3" | "dap4" | "dap5" => {
                integer_string(trimmed).unwrap_or_else(|| "0".to_string())
            }
            _ => value.to_string(),
        }
    }
}

/// Business rules keyed by form field, matched case-insensitively against a
/// fixed vocabulary. Unmatched status text passes through unchanged;
/// motivation deliberately falls through to "PROJETO".
fn apply_business_rule(form_id: &str, value: String) -> String {
    let upper = value.to_uppercase();
    match form_id {
        "estado_conservacao" => {
            if upper.contains("NÃO ENQUADRADAS") {
                STATUS_NOT_COVERED.to_string()
            } else if upper.contains("EXÓTICA OU NATIVA, NÃO MA, >=80CM") {
                STATUS_EXOTIC_80CM.to_string()
            } else if upper.contains("NATIVAS MA >= 70CM") {
                STATUS_NATIVE_70CM.to_string()
            } else {
                value
            }
        }
        "motivacao" => {
            if upper.contains("SEM MOTIVO") {
                "SEM MOTIVO".to_string()
            } else if DEATH_KEYWORDS.iter().any(|kw| upper.contains(kw)) {
                "MORTE".to_string()
            } else {
                // Default bucket; free text that names no known motive is
                // recorded as project-driven.
                "PROJETO".to_string()
            }
        }
        "intencao" => {
            if upper.contains("PRESERVAR") {
                "PRESERVAÇÃO".to_string()
            } else if upper.contains("REMOVER") {
                "CORTE".to_string()
            } else {
                value
            }
        }
        _ => value,
    }
}

fn parse_decimal(value: &str) -> Option<f64> {
    let parsed: f64 = value.trim().replace(',', ".").parse().ok()?;
    parsed.is_finite().then_some(parsed)
}

fn integer_string(value: &str) -> Option<String> {
    parse_decimal(value).map(|n| (n as i64).to_string())
}

fn comma_decimal(value: &str) -> Option<String> {
    parse_decimal(value).map(|n| format!("{n:.2}").replace('.', ","))
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}
