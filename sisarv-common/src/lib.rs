//! # SisArv Sync Common Library
//!
//! Shared code for the SisArv inventory synchronization tools including:
//! - Canonical inventory record schema
//! - Static configuration tables (field mapping, name aliases, option-id fallbacks)
//! - Event types (SyncEvent enum) and the broadcast EventBus
//! - Common error types

pub mod error;
pub mod events;
pub mod record;
pub mod tables;

pub use error::{Error, Result};
pub use events::{EventBus, SyncEvent};
pub use record::{InventoryRecord, RecordField};
pub use tables::SyncTables;
