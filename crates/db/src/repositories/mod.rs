//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod call_repo;
pub mod contact_repo;
pub mod deal_comment_repo;
pub mod deal_repo;
pub mod sync_lock;

pub use call_repo::CallRepo;
pub use contact_repo::ContactRepo;
pub use deal_comment_repo::DealCommentRepo;
pub use deal_repo::DealRepo;
pub use sync_lock::{SyncLock, SyncLockGuard};
