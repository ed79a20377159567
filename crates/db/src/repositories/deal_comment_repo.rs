//! Repository for the `deal_comments` table. There is no update or delete:
//! timeline entries are append-only.

use sqlx::PgPool;
use crm_core::types::DbId;

use crate::models::deal_comment::{CreateDealComment, DealComment};

const COLUMNS: &str = "id, deal_id, kind, body, metadata, created_at";

pub struct DealCommentRepo;

impl DealCommentRepo {
    /// Append an entry to a deal's timeline.
    pub async fn create(
        pool: &PgPool,
        input: &CreateDealComment,
    ) -> Result<DealComment, sqlx::Error> {
        let query = format!(
            "INSERT INTO deal_comments (deal_id, kind, body, metadata) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DealComment>(&query)
            .bind(input.deal_id)
            .bind(&input.kind)
            .bind(&input.body)
            .bind(&input.metadata)
            .fetch_one(pool)
            .await
    }

    /// Timeline of a deal, newest first.
    pub async fn list_for_deal(
        pool: &PgPool,
        deal_id: DbId,
    ) -> Result<Vec<DealComment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM deal_comments WHERE deal_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, DealComment>(&query)
            .bind(deal_id)
            .fetch_all(pool)
            .await
    }
}
