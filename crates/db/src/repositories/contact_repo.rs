//! Repository for the `contacts` table.

use sqlx::{PgExecutor, PgPool};
use crm_core::types::DbId;

use crate::models::contact::{Contact, CreateContact};

const COLUMNS: &str = "id, name, phone, email, source, status, created_at, updated_at";

/// Provides lookup and creation of contacts.
pub struct ContactRepo;

impl ContactRepo {
    /// Insert a contact, returning the created row. Runs on a pool or inside
    /// an open transaction.
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        input: &CreateContact,
    ) -> Result<Contact, sqlx::Error> {
        let query = format!(
            "INSERT INTO contacts (name, phone, email, source, status) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Contact>(&query)
            .bind(&input.name)
            .bind(&input.phone)
            .bind(&input.email)
            .bind(&input.source)
            .bind(&input.status)
            .fetch_one(executor)
            .await
    }

    /// Find a contact by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Contact>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM contacts WHERE id = $1");
        sqlx::query_as::<_, Contact>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find the oldest contact whose stored phone exactly equals any of the
    /// given spellings.
    pub async fn find_by_phones(
        pool: &PgPool,
        phones: &[String],
    ) -> Result<Option<Contact>, sqlx::Error> {
        if phones.is_empty() {
            return Ok(None);
        }
        let query = format!(
            "SELECT {COLUMNS} FROM contacts \
             WHERE phone = ANY($1) \
             ORDER BY created_at ASC, id ASC LIMIT 1"
        );
        sqlx::query_as::<_, Contact>(&query)
            .bind(phones)
            .fetch_optional(pool)
            .await
    }

    /// Count contacts; used by tests and diagnostics.
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM contacts")
            .fetch_one(pool)
            .await
    }
}
