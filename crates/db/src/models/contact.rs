//! Contacts: people identified by a phone number.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use crm_core::types::{DbId, Timestamp};

/// Contact created from an unmatched inbound or outbound call.
pub const SOURCE_PHONE: &str = "PHONE";

/// Status of a contact nobody has worked yet.
pub const STATUS_NEW: &str = "NEW";

/// A row from the `contacts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Contact {
    pub id: DbId,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub source: String,
    pub status: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a contact.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContact {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub source: String,
    pub status: String,
}

impl CreateContact {
    /// A contact auto-created for an unknown caller.
    pub fn from_call(phone: &str) -> Self {
        Self {
            name: format!("Call: {phone}"),
            phone: Some(phone.to_string()),
            email: None,
            source: SOURCE_PHONE.to_string(),
            status: STATUS_NEW.to_string(),
        }
    }
}
