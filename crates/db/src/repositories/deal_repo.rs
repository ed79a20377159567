//! Repository for the `deals` table.

use sqlx::{PgExecutor, PgPool};
use crm_core::types::DbId;

use crate::models::deal::{CreateDeal, Deal};

const COLUMNS: &str = "\
    id, title, contact_id, stage, probability, amount, description, \
    closed_at, created_at, updated_at";

/// Provides deal lookup and creation.
pub struct DealRepo;

impl DealRepo {
    /// Insert a deal, returning the created row.
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        input: &CreateDeal,
    ) -> Result<Deal, sqlx::Error> {
        let query = format!(
            "INSERT INTO deals (title, contact_id, stage, probability, amount, description) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Deal>(&query)
            .bind(&input.title)
            .bind(input.contact_id)
            .bind(&input.stage)
            .bind(input.probability)
            .bind(input.amount)
            .bind(&input.description)
            .fetch_one(executor)
            .await
    }

    /// The contact's most recently updated deal that is still open.
    pub async fn find_latest_open_for_contact(
        pool: &PgPool,
        contact_id: DbId,
    ) -> Result<Option<Deal>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM deals \
             WHERE contact_id = $1 AND closed_at IS NULL \
             ORDER BY updated_at DESC, id DESC LIMIT 1"
        );
        sqlx::query_as::<_, Deal>(&query)
            .bind(contact_id)
            .fetch_optional(pool)
            .await
    }

    /// Mark a deal closed. Returns `None` if the deal does not exist.
    pub async fn close(pool: &PgPool, id: DbId) -> Result<Option<Deal>, sqlx::Error> {
        let query = format!(
            "UPDATE deals SET closed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Deal>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
