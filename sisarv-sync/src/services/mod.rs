//! Service modules for the synchronization engine

pub mod field_mapper;
pub mod name_resolver;
pub mod page_extractor;
pub mod portal_client;
pub mod sync_orchestrator;

pub use field_mapper::FieldMapper;
pub use name_resolver::{normalize_name, NameLookup};
pub use portal_client::PortalClient;
pub use sync_orchestrator::SyncOrchestrator;
