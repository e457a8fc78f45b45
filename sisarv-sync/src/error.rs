//! Error types for sisarv-sync
//!
//! Fatal conditions (login, navigation, missing inventory) abort a run and
//! surface inside the final `RunResult`; per-record and per-deletion
//! conditions are handled where they occur and never cross the orchestrator
//! boundary as errors.

use thiserror::Error;

/// Result type for engine operations
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Engine error type
#[derive(Debug, Error)]
pub enum SyncError {
    /// HTTP transport failure (connection, TLS, non-2xx via error_for_status)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Authentication exchange failed
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// No inventory entity in the consultation list to open for editing
    #[error("no inventory found in the search results")]
    InventoryNotFound,

    /// One record's create request was rejected; carries the response and the
    /// outgoing payload for diagnosis. Recoverable: the caller skips the
    /// record and continues the run.
    #[error("submission rejected with HTTP {status}")]
    Submit {
        status: u16,
        body_excerpt: String,
        payload: Vec<(String, String)>,
    },

    /// Shared error from sisarv-common (config, IO, input)
    #[error("{0}")]
    Common(#[from] sisarv_common::Error),
}
