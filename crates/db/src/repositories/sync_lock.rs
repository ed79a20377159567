//! Cross-process serialization of sync passes via PostgreSQL advisory locks.
//!
//! The lock is transaction-scoped (`pg_try_advisory_xact_lock`): the guard
//! owns an open transaction, and the lock is released when that transaction
//! ends, including when the guard is dropped on an error path.

use sqlx::{PgPool, Postgres, Transaction};

/// Advisory lock keys used by the application.
pub struct SyncLock;

impl SyncLock {
    /// Key for the telephony call sync (`"mango"` as ASCII bytes).
    pub const MANGO_SYNC: i64 = 0x6d61_6e67_6f;

    /// Try to take the lock without waiting.
    ///
    /// Returns `None` if another session holds it.
    pub async fn try_acquire(pool: &PgPool, key: i64) -> Result<Option<SyncLockGuard>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_xact_lock($1)")
            .bind(key)
            .fetch_one(&mut *tx)
            .await?;

        if !acquired {
            tx.rollback().await?;
            return Ok(None);
        }
        tracing::debug!(key, "Advisory lock acquired");
        Ok(Some(SyncLockGuard { tx, key }))
    }
}

/// Holds an advisory lock until released or dropped.
pub struct SyncLockGuard {
    tx: Transaction<'static, Postgres>,
    key: i64,
}

impl SyncLockGuard {
    /// End the holding transaction, releasing the lock.
    pub async fn release(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await?;
        tracing::debug!(key = self.key, "Advisory lock released");
        Ok(())
    }
}
