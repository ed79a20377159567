//! Deals: sales opportunities shown on the pipeline board.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use crm_core::types::{DbId, Timestamp};

/// First pipeline stage.
pub const STAGE_NEW: &str = "NEW";

/// A row from the `deals` table.
///
/// A deal is open while `closed_at` is `NULL`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Deal {
    pub id: DbId,
    pub title: String,
    pub contact_id: Option<DbId>,
    pub stage: String,
    pub probability: i32,
    /// Minor currency units.
    pub amount: i64,
    pub description: Option<String>,
    pub closed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Deal {
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }
}

/// DTO for creating a deal.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDeal {
    pub title: String,
    pub contact_id: Option<DbId>,
    pub stage: String,
    pub probability: i32,
    pub amount: i64,
    pub description: Option<String>,
}
