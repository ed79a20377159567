//! Repository for the `calls` table.
//!
//! Inserts are insert-or-ignore on the `uq_calls_external_id` constraint, so
//! two overlapping passes can never produce two rows for one provider call.

use sqlx::{PgExecutor, PgPool};
use crm_core::types::DbId;

use crate::models::call::{Call, CreateCall};

const COLUMNS: &str = "\
    id, external_id, direction, client_phone, from_number, to_number, status, \
    started_at, ended_at, duration_secs, disconnect_reason, recording_url, \
    contact_id, deal_id, created_at, updated_at";

/// Provides call persistence keyed on the provider's external id.
pub struct CallRepo;

impl CallRepo {
    /// Insert a call unless one with the same external id exists.
    ///
    /// Returns `None` when the row already existed; the existing row is left
    /// untouched.
    pub async fn insert_if_absent<'e, E: PgExecutor<'e>>(
        executor: E,
        input: &CreateCall,
    ) -> Result<Option<Call>, sqlx::Error> {
        let query = format!(
            "INSERT INTO calls (external_id, direction, client_phone, from_number, to_number, \
                 status, started_at, ended_at, duration_secs, disconnect_reason, recording_url, \
                 contact_id, deal_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT (external_id) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Call>(&query)
            .bind(&input.external_id)
            .bind(&input.direction)
            .bind(&input.client_phone)
            .bind(&input.from_number)
            .bind(&input.to_number)
            .bind(&input.status)
            .bind(input.started_at)
            .bind(input.ended_at)
            .bind(input.duration_secs)
            .bind(&input.disconnect_reason)
            .bind(&input.recording_url)
            .bind(input.contact_id)
            .bind(input.deal_id)
            .fetch_optional(executor)
            .await
    }

    /// Find a call by the provider's entry id.
    pub async fn find_by_external_id(
        pool: &PgPool,
        external_id: &str,
    ) -> Result<Option<Call>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM calls WHERE external_id = $1");
        sqlx::query_as::<_, Call>(&query)
            .bind(external_id)
            .fetch_optional(pool)
            .await
    }

    /// Find a call by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Call>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM calls WHERE id = $1");
        sqlx::query_as::<_, Call>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Attach a recording URL, but only if the call does not have one yet.
    ///
    /// Returns `None` when the call is missing or already has a recording.
    pub async fn set_recording_url_if_missing(
        pool: &PgPool,
        id: DbId,
        recording_url: &str,
    ) -> Result<Option<Call>, sqlx::Error> {
        let query = format!(
            "UPDATE calls SET recording_url = $2, updated_at = NOW() \
             WHERE id = $1 AND recording_url IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Call>(&query)
            .bind(id)
            .bind(recording_url)
            .fetch_optional(pool)
            .await
    }

    /// List calls, newest first.
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Call>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM calls \
             ORDER BY started_at DESC NULLS LAST, id DESC \
             LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, Call>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Count all calls.
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM calls")
            .fetch_one(pool)
            .await
    }
}
