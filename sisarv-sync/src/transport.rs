//! Transport seam between reconciliation and the portal
//!
//! The reconciliation loop only needs four capabilities: authenticate, open
//! the edit screen (returning its scraped state), bulk-delete entities, and
//! submit one encoded record. [`PortalClient`](crate::services::PortalClient)
//! implements them with direct form requests; a browser-driven transport can
//! be substituted without touching the reconciliation logic, and the
//! integration tests script one.

use crate::error::{SyncError, SyncResult};
use crate::models::EditScreen;

/// The per-record submission contract shared by all transports.
#[allow(async_fn_in_trait)]
pub trait SubmissionTransport {
    /// Authenticate the session. Failure is fatal for the run.
    async fn login(&mut self, username: &str, password: &str) -> SyncResult<()>;

    /// Navigate to the inventory edit screen and return its scraped state.
    /// Also used to refresh remote state after bulk deletion.
    async fn open_edit_screen(&mut self) -> SyncResult<EditScreen>;

    /// Delete the given entities, independently; one result per input id,
    /// order not guaranteed. Individual failures never abort the batch.
    async fn delete_entries(&self, ids: &[String]) -> Vec<(String, Option<SyncError>)>;

    /// Submit one encoded record. On success returns the refreshed edit
    /// screen scraped from the response, the canonical source of
    /// "already present" state.
    async fn submit_record(&self, fields: &[(String, String)]) -> SyncResult<EditScreen>;
}
