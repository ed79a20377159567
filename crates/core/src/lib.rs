//! Domain logic for syncing telephony call records into the CRM.
//!
//! Everything here is pure: no database, no HTTP, no filesystem.

pub mod call_record;
pub mod calls;
pub mod error;
pub mod pagination;
pub mod phone;
pub mod recording;
pub mod signing;
pub mod sync_report;
pub mod types;
