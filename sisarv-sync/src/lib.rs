//! sisarv-sync library interface
//!
//! Synchronizes a botanical inventory dataset against the SisArv portal,
//! which exposes no API: state is scraped out of server-rendered HTML and
//! records are submitted through the portal's form protocol. The CLI binary
//! and the integration tests both drive the engine through this interface.

pub mod error;
pub mod models;
pub mod services;
pub mod transport;

pub use crate::error::{SyncError, SyncResult};
pub use crate::models::{EditScreen, RecordOutcome, RunResult, UnmatchedName};
pub use crate::services::{FieldMapper, NameLookup, PortalClient, SyncOrchestrator};
pub use crate::transport::SubmissionTransport;
