//! Batch reconciliation orchestrator
//!
//! Drives one end-to-end run: authenticate and open the edit screen, bulk
//! delete pre-existing entries, then walk the dataset in order, resolving
//! names and submitting records through the transport. Per-record problems
//! (unmatched name, missing number, rejected submission) skip the record and
//! continue; only authentication failure, a missing inventory entity, or
//! cancellation end the run early. Cancellation is cooperative: the token is
//! polled at every checkpoint and at the top of every iteration.

use std::collections::HashSet;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use sisarv_common::{EventBus, InventoryRecord, SyncEvent, SyncTables};

use crate::error::SyncError;
use crate::models::{RecordOutcome, RunResult, UnmatchedName};
use crate::services::field_mapper::FieldMapper;
use crate::services::name_resolver::NameLookup;
use crate::transport::SubmissionTransport;

/// Label substituted for a blank common name before resolution.
const FALLBACK_COMMON_NAME: &str = "não-identificada";
/// Label substituted for a blank scientific name before resolution.
const FALLBACK_SCIENTIFIC_NAME: &str = "ni";

/// One-run reconciliation driver, generic over the submission transport.
pub struct SyncOrchestrator<T: SubmissionTransport> {
    transport: T,
    tables: SyncTables,
    event_bus: EventBus,
    cancel: CancellationToken,
    submit_enabled: bool,
}

impl<T: SubmissionTransport> SyncOrchestrator<T> {
    pub fn new(
        transport: T,
        tables: SyncTables,
        event_bus: EventBus,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            tables,
            event_bus,
            cancel,
            submit_enabled: true,
        }
    }

    /// Report-only mode: resolve names and collect the unmatched list but
    /// issue no create requests.
    pub fn without_submission(mut self) -> Self {
        self.submit_enabled = false;
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn log(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{message}");
        self.event_bus.emit_lossy(SyncEvent::LogMessage {
            message,
            timestamp: Utc::now(),
        });
    }

    fn progress(&self, current: usize, total: usize) {
        self.event_bus.emit_lossy(SyncEvent::RecordProgress {
            current,
            total,
            timestamp: Utc::now(),
        });
    }

    /// Execute one synchronization run. Always returns a terminal
    /// [`RunResult`]; fatal conditions are folded into it rather than
    /// propagated.
    pub async fn run(
        &mut self,
        username: &str,
        password: &str,
        records: &[InventoryRecord],
    ) -> RunResult {
        self.event_bus.emit_lossy(SyncEvent::RunStarted {
            total_records: records.len(),
            timestamp: Utc::now(),
        });
        let result = self.run_inner(username, password, records).await;
        self.event_bus.emit_lossy(SyncEvent::RunFinished {
            success: result.success,
            unmatched_count: result.unmatched.len(),
            timestamp: Utc::now(),
        });
        result
    }

    async fn run_inner(
        &mut self,
        username: &str,
        password: &str,
        records: &[InventoryRecord],
    ) -> RunResult {
        if self.cancelled() {
            return RunResult::cancelled(Vec::new());
        }

        if let Err(e) = self.transport.login(username, password).await {
            return RunResult::fatal(format!("authentication failed: {e}"));
        }
        self.log("authenticated; opening inventory edit screen");

        let mut screen = match self.transport.open_edit_screen().await {
            Ok(screen) => screen,
            Err(e) => return RunResult::fatal(e.to_string()),
        };

        // Bulk deletion of pre-existing entries. Skipped entirely on a first
        // run where nothing is deletable.
        if !screen.deletable_ids.is_empty() {
            if self.cancelled() {
                return RunResult::cancelled(Vec::new());
            }
            self.log(format!(
                "deleting {} existing inventory entries before refill",
                screen.deletable_ids.len()
            ));
            let results = self.transport.delete_entries(&screen.deletable_ids).await;
            for (entity_id, error) in &results {
                if let Some(error) = error {
                    tracing::warn!(entity_id = %entity_id, %error, "deletion failed");
                    self.log(format!("failed to delete entry {entity_id}: {error}"));
                }
            }
            // Refresh regardless of individual outcomes; the page is the
            // only consistent view of what survived.
            screen = match self.transport.open_edit_screen().await {
                Ok(screen) => screen,
                Err(e) => return RunResult::fatal(e.to_string()),
            };
            self.log("existing entries deleted");
            if self.cancelled() {
                return RunResult::cancelled(Vec::new());
            }
        }

        let mapper = FieldMapper::new(&self.tables);
        let common_lookup = NameLookup::new(&self.tables.common_name, &screen.common_names);
        let scientific_lookup =
            NameLookup::new(&self.tables.scientific_name, &screen.scientific_names);

        let mut present: HashSet<u64> = screen.existing_numbers.clone();
        let mut unmatched: Vec<UnmatchedName> = Vec::new();
        let total = records.len();

        for (index, record) in records.iter().enumerate() {
            self.progress(index + 1, total);
            if self.cancelled() {
                self.log("stopped by user");
                return RunResult::cancelled(unmatched);
            }

            let outcome = self
                .process_record(record, &mapper, &common_lookup, &scientific_lookup, &mut present)
                .await;
            if let RecordOutcome::Unmatched(entry) = outcome {
                unmatched.push(entry);
            }
        }

        if !unmatched.is_empty() {
            self.log(format!(
                "{} record(s) had no matching portal option",
                unmatched.len()
            ));
        }
        self.log("synchronization finished");
        RunResult::completed(unmatched)
    }

    async fn process_record(
        &self,
        record: &InventoryRecord,
        mapper: &FieldMapper<'_>,
        common_lookup: &NameLookup<'_>,
        scientific_lookup: &NameLookup<'_>,
        present: &mut HashSet<u64>,
    ) -> RecordOutcome {
        let Some(number) = record.project_number() else {
            self.log("row without a parseable project number, skipping");
            return RecordOutcome::MissingNumber;
        };

        if present.contains(&number) {
            self.log(format!("nº {number} already present, skipping"));
            return RecordOutcome::AlreadyPresent {
                project_number: number,
            };
        }

        let mut common_raw = record
            .common_name
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_string();
        if common_raw.is_empty() {
            common_raw = FALLBACK_COMMON_NAME.to_string();
        }
        let mut scientific_raw = record
            .scientific_name
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_string();
        if scientific_raw.is_empty() {
            scientific_raw = FALLBACK_SCIENTIFIC_NAME.to_string();
        }

        let common_label = common_lookup.portal_label(&common_raw);
        let scientific_label = scientific_lookup.portal_label(&scientific_raw);
        let common_id = common_lookup.resolve_label(&common_label);
        let scientific_id = scientific_lookup.resolve_label(&scientific_label);

        let (Some(common_id), Some(scientific_id)) = (common_id, scientific_id) else {
            self.log(format!(
                "nº {number}: no portal option for {common_label:?} / {scientific_label:?}, skipping"
            ));
            return RecordOutcome::Unmatched(UnmatchedName {
                project_number: number,
                common_name: common_label,
                scientific_name: scientific_label,
            });
        };

        let mut values = mapper.map_row(record);
        for (form_id, value) in &mut values {
            if form_id == "nome_popular" {
                *value = common_id.clone();
            } else if form_id == "nome_cientifico" {
                *value = scientific_id.clone();
            }
        }
        let payload = mapper.encode_for_transmission(&values);

        if !self.submit_enabled {
            self.log(format!("nº {number}: resolved, submission disabled"));
            return RecordOutcome::ResolvedOnly {
                project_number: number,
            };
        }

        match self.transport.submit_record(&payload).await {
            Ok(screen) => {
                // The response page is the canonical "already present" state,
                // not a locally incremented counter.
                *present = screen.existing_numbers;
                self.log(format!(
                    "nº {number} ({common_label} / {scientific_label}) submitted"
                ));
                RecordOutcome::Submitted {
                    project_number: number,
                }
            }
            Err(SyncError::Submit {
                status,
                body_excerpt,
                payload,
            }) => {
                tracing::warn!(
                    number,
                    status,
                    body_len = body_excerpt.len(),
                    "submission rejected"
                );
                self.log(format!("nº {number}: server returned HTTP {status}, skipping"));
                for (key, value) in &payload {
                    tracing::debug!(field = %key, value = %value, "rejected payload field");
                }
                RecordOutcome::SubmitFailed {
                    project_number: number,
                    reason: format!("HTTP {status}"),
                }
            }
            Err(error) => {
                tracing::warn!(number, %error, "submission failed");
                self.log(format!("nº {number}: submission failed ({error}), skipping"));
                RecordOutcome::SubmitFailed {
                    project_number: number,
                    reason: error.to_string(),
                }
            }
        }
    }
}
