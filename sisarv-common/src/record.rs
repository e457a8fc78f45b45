//! Canonical inventory record schema
//!
//! One `InventoryRecord` is one row of the post-ingestion dataset. All fields
//! are kept as free text: the values come out of a spreadsheet and the
//! per-field encoding rules live in the engine, not here. Missing cells
//! deserialize as `None` and read back as empty strings.

use serde::{Deserialize, Deserializer, Serialize};

/// One row of the input dataset, in the canonical column layout produced by
/// the ingestion step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryRecord {
    /// Project-local tree number; identity of the record within a run
    #[serde(deserialize_with = "stringly")]
    pub project_number: Option<String>,
    /// Common (vernacular) species name
    pub common_name: Option<String>,
    /// Scientific species name
    pub scientific_name: Option<String>,
    /// Conservation-status class, free text
    pub conservation_status: Option<String>,
    /// Specimen location
    pub location: Option<String>,
    /// Municipal-policy classification
    pub policy_classification: Option<String>,
    /// Public-area flag, free text ("SIM"/"NÃO")
    pub public_area: Option<String>,
    /// Free-text motivation for the intervention
    pub motivation: Option<String>,
    /// Free-text intervention intent
    pub intent: Option<String>,
    /// Tree height in meters
    #[serde(deserialize_with = "stringly")]
    pub height: Option<String>,
    /// Canopy diameter in meters
    #[serde(deserialize_with = "stringly")]
    pub canopy_diameter: Option<String>,
    /// Trunk diameter at breast height, slot 1 (cm)
    #[serde(deserialize_with = "stringly")]
    pub dap1: Option<String>,
    /// Trunk diameter slot 2 (cm)
    #[serde(deserialize_with = "stringly")]
    pub dap2: Option<String>,
    /// Trunk diameter slot 3 (cm)
    #[serde(deserialize_with = "stringly")]
    pub dap3: Option<String>,
    /// Trunk diameter slot 4 (cm)
    #[serde(deserialize_with = "stringly")]
    pub dap4: Option<String>,
    /// Trunk diameter slot 5 (cm)
    #[serde(deserialize_with = "stringly")]
    pub dap5: Option<String>,
}

/// Column keys of the canonical schema, used by the field-mapping table to
/// name the source of a form value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    ProjectNumber,
    CommonName,
    ScientificName,
    ConservationStatus,
    Location,
    PolicyClassification,
    PublicArea,
    Motivation,
    Intent,
    Height,
    CanopyDiameter,
    Dap1,
    Dap2,
    Dap3,
    Dap4,
    Dap5,
}

impl InventoryRecord {
    /// Raw cell value for a column, untouched.
    pub fn field(&self, field: RecordField) -> Option<&str> {
        let value = match field {
            RecordField::ProjectNumber => &self.project_number,
            RecordField::CommonName => &self.common_name,
            RecordField::ScientificName => &self.scientific_name,
            RecordField::ConservationStatus => &self.conservation_status,
            RecordField::Location => &self.location,
            RecordField::PolicyClassification => &self.policy_classification,
            RecordField::PublicArea => &self.public_area,
            RecordField::Motivation => &self.motivation,
            RecordField::Intent => &self.intent,
            RecordField::Height => &self.height,
            RecordField::CanopyDiameter => &self.canopy_diameter,
            RecordField::Dap1 => &self.dap1,
            RecordField::Dap2 => &self.dap2,
            RecordField::Dap3 => &self.dap3,
            RecordField::Dap4 => &self.dap4,
            RecordField::Dap5 => &self.dap5,
        };
        value.as_deref()
    }

    /// Trimmed cell value for a column; missing cells read as "".
    pub fn field_text(&self, field: RecordField) -> String {
        self.field(field).unwrap_or("").trim().to_string()
    }

    /// Project number parsed leniently: "64", "64.0" and "64,0" all yield 64.
    ///
    /// `None` means the row is not eligible for submission (skip, not fail).
    pub fn project_number(&self) -> Option<u64> {
        let raw = self.project_number.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        let value: f64 = raw.replace(',', ".").parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        Some(value as u64)
    }
}

/// Accepts strings and bare numbers for cells that spreadsheets tend to
/// export as either ("64" vs 64 vs 64.0).
fn stringly<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Cell {
        Text(String),
        Int(i64),
        Float(f64),
    }

    let cell = Option::<Cell>::deserialize(deserializer)?;
    Ok(cell.map(|cell| match cell {
        Cell::Text(text) => text,
        Cell::Int(n) => n.to_string(),
        Cell::Float(n) if n.fract() == 0.0 && n.is_finite() => (n as i64).to_string(),
        Cell::Float(n) => n.to_string(),
    }))
}
