//! Calls reconciled from the telephony provider.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use crm_core::calls::{recording_expected, CallStatus};
use crm_core::types::{DbId, Timestamp};

/// A row from the `calls` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Call {
    pub id: DbId,
    /// Provider entry id; unique.
    pub external_id: String,
    /// `IN` or `OUT`.
    pub direction: String,
    pub client_phone: String,
    pub from_number: String,
    pub to_number: String,
    pub status: String,
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub duration_secs: i32,
    pub disconnect_reason: Option<String>,
    pub recording_url: Option<String>,
    pub contact_id: Option<DbId>,
    pub deal_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Call {
    /// A completed call with talk time but no recording yet; eligible for
    /// another download attempt on every pass.
    pub fn needs_recording(&self) -> bool {
        self.recording_url.is_none()
            && recording_expected(&CallStatus::parse(&self.status), i64::from(self.duration_secs))
    }
}

/// DTO for inserting a call.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCall {
    pub external_id: String,
    pub direction: String,
    pub client_phone: String,
    pub from_number: String,
    pub to_number: String,
    pub status: String,
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub duration_secs: i32,
    pub disconnect_reason: Option<String>,
    pub recording_url: Option<String>,
    pub contact_id: Option<DbId>,
    pub deal_id: Option<DbId>,
}
