//! Deal timeline entries. Append-only.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use crm_core::types::{DbId, Timestamp};

/// Entry written by the system rather than a user.
pub const KIND_SYSTEM_EVENT: &str = "SYSTEM_EVENT";

/// A row from the `deal_comments` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DealComment {
    pub id: DbId,
    pub deal_id: DbId,
    pub kind: String,
    pub body: String,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
}

/// DTO for appending a timeline entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDealComment {
    pub deal_id: DbId,
    pub kind: String,
    pub body: String,
    pub metadata: serde_json::Value,
}
