//! Engine data model: scraped remote state and run outcomes

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Structured snapshot of the inventory edit screen, scraped from one page
/// load. Valid only for the lifetime of the page that rendered it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditScreen {
    /// Project numbers already present in the remote tree table
    pub existing_numbers: HashSet<u64>,
    /// Entity ids with a rendered delete action, insertion-ordered, de-duplicated
    pub deletable_ids: Vec<String>,
    /// Common-name picker: display text → option id
    pub common_names: HashMap<String, String>,
    /// Scientific-name picker: display text → option id
    pub scientific_names: HashMap<String, String>,
}

/// An input row whose common or scientific name resolved to no portal option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedName {
    pub project_number: u64,
    /// Common-name label after alias rewriting
    pub common_name: String,
    /// Scientific-name label after alias rewriting
    pub scientific_name: String,
}

/// Per-record outcome of the reconciliation loop.
///
/// Replaces skip-by-exception control flow with an explicit variant the
/// orchestrator aggregates.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Created on the portal; remote state re-derived from the response
    Submitted { project_number: u64 },
    /// Skipped: the number is already in the remote table
    AlreadyPresent { project_number: u64 },
    /// Skipped: no parseable project number in the row
    MissingNumber,
    /// Skipped: one of the names resolved to no option id
    Unmatched(UnmatchedName),
    /// Skipped: the create request failed; the run continues
    SubmitFailed {
        project_number: u64,
        reason: String,
    },
    /// Names resolved but submission suppressed (report-only mode)
    ResolvedOnly { project_number: u64 },
}

/// Terminal outcome of one synchronization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// False on fatal error or cancellation
    pub success: bool,
    /// Rows that could not be matched to portal options, in dataset order
    pub unmatched: Vec<UnmatchedName>,
    /// Fatal or cancellation message, if the run did not complete
    pub error: Option<String>,
}

impl RunResult {
    /// Run drove the whole dataset; per-record skips are not failures.
    pub fn completed(unmatched: Vec<UnmatchedName>) -> Self {
        Self {
            success: true,
            unmatched,
            error: None,
        }
    }

    /// Run stopped at a cancellation checkpoint; partial results preserved.
    pub fn cancelled(unmatched: Vec<UnmatchedName>) -> Self {
        Self {
            success: false,
            unmatched,
            error: Some("stopped by user".to_string()),
        }
    }

    /// Run aborted before completion.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            success: false,
            unmatched: Vec::new(),
            error: Some(message.into()),
        }
    }
}
