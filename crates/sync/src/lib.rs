//! Call reconciliation: provider records in, CRM contacts, deals, calls and
//! timeline entries out.

pub mod config;
pub mod error;
pub mod memory;
pub mod reconciler;
pub mod service;
pub mod store;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use reconciler::Reconciler;
pub use service::{SyncService, SyncSummary};
pub use store::{CallStore, PgCallStore, RecordingFetcher};
