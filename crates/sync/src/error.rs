use crm_mango::MangoError;

/// Errors from a sync pass or a single store operation.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A store failure not backed by sqlx (in-memory store, invariant breach).
    #[error("Store error: {0}")]
    Store(String),

    /// The provider could not be reached or rejected the request.
    #[error(transparent)]
    Provider(#[from] MangoError),

    /// `MANGO_API_KEY` / `MANGO_API_SALT` are not set.
    #[error("Mango API credentials are not configured")]
    NotConfigured,

    /// Another pass holds the sync lock.
    #[error("A sync pass is already running")]
    Busy,
}

pub type SyncResult<T> = Result<T, SyncError>;
