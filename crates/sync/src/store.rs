//! Storage and recording seams used by the reconciler.
//!
//! [`PgCallStore`] delegates to the `crm-db` repositories; tests use
//! [`crate::memory::InMemoryStore`].

use async_trait::async_trait;

use crm_core::types::DbId;
use crm_db::models::call::{Call, CreateCall};
use crm_db::models::contact::{Contact, CreateContact};
use crm_db::models::deal::{CreateDeal, Deal};
use crm_db::models::deal_comment::{CreateDealComment, DealComment};
use crm_db::repositories::{CallRepo, ContactRepo, DealCommentRepo, DealRepo};
use crm_db::DbPool;
use crm_mango::RecordingDownloader;

use crate::error::SyncResult;

/// Everything the reconciler reads and writes.
#[async_trait]
pub trait CallStore: Send + Sync {
    async fn find_call_by_external_id(&self, external_id: &str) -> SyncResult<Option<Call>>;

    /// First contact whose phone exactly equals one of `phones`.
    async fn find_contact_by_phones(&self, phones: &[String]) -> SyncResult<Option<Contact>>;

    /// Most recently updated deal of the contact with no close timestamp.
    async fn find_latest_open_deal(&self, contact_id: DbId) -> SyncResult<Option<Deal>>;

    /// Atomic insert-or-ignore keyed on the external id. `None` when a row
    /// with that external id already exists.
    async fn insert_call_if_absent(&self, input: &CreateCall) -> SyncResult<Option<Call>>;

    /// Open a contact and a deal for an unknown caller and insert the call
    /// linked to them, all or nothing. The call's `contact_id`/`deal_id` are
    /// taken from the new rows. `None` when the external id already exists;
    /// no contact or deal is left behind in that case.
    async fn insert_call_for_new_caller(
        &self,
        caller: &NewCaller,
        call: &CreateCall,
    ) -> SyncResult<Option<NewCallerCall>>;

    /// Set the recording URL only if the call has none. `None` when nothing
    /// was updated.
    async fn set_call_recording(&self, call_id: DbId, url: &str) -> SyncResult<Option<Call>>;

    async fn append_deal_comment(&self, input: &CreateDealComment) -> SyncResult<DealComment>;
}

/// Contact and deal to open for a caller with no matching contact.
#[derive(Debug, Clone)]
pub struct NewCaller {
    pub contact: CreateContact,
    /// `contact_id` is filled in by the store.
    pub deal: CreateDeal,
}

/// Rows written by [`CallStore::insert_call_for_new_caller`].
#[derive(Debug, Clone)]
pub struct NewCallerCall {
    pub contact: Contact,
    pub deal: Deal,
    pub call: Call,
}

/// Source of recording URLs.
#[async_trait]
pub trait RecordingFetcher: Send + Sync {
    /// Public URL of the stored recording, or `None` if it is not available now.
    async fn fetch(&self, entry_id: &str, token: &str) -> Option<String>;
}

#[async_trait]
impl RecordingFetcher for RecordingDownloader {
    async fn fetch(&self, entry_id: &str, token: &str) -> Option<String> {
        RecordingDownloader::fetch(self, entry_id, token).await
    }
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgCallStore {
    pool: DbPool,
}

impl PgCallStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CallStore for PgCallStore {
    async fn find_call_by_external_id(&self, external_id: &str) -> SyncResult<Option<Call>> {
        Ok(CallRepo::find_by_external_id(&self.pool, external_id).await?)
    }

    async fn find_contact_by_phones(&self, phones: &[String]) -> SyncResult<Option<Contact>> {
        Ok(ContactRepo::find_by_phones(&self.pool, phones).await?)
    }

    async fn find_latest_open_deal(&self, contact_id: DbId) -> SyncResult<Option<Deal>> {
        Ok(DealRepo::find_latest_open_for_contact(&self.pool, contact_id).await?)
    }

    async fn insert_call_if_absent(&self, input: &CreateCall) -> SyncResult<Option<Call>> {
        Ok(CallRepo::insert_if_absent(&self.pool, input).await?)
    }

    async fn insert_call_for_new_caller(
        &self,
        caller: &NewCaller,
        call: &CreateCall,
    ) -> SyncResult<Option<NewCallerCall>> {
        let mut tx = self.pool.begin().await?;

        let contact = ContactRepo::create(&mut *tx, &caller.contact).await?;
        let deal_input = CreateDeal {
            contact_id: Some(contact.id),
            ..caller.deal.clone()
        };
        let deal = DealRepo::create(&mut *tx, &deal_input).await?;
        let call_input = CreateCall {
            contact_id: Some(contact.id),
            deal_id: Some(deal.id),
            ..call.clone()
        };
        let Some(call) = CallRepo::insert_if_absent(&mut *tx, &call_input).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        tx.commit().await?;
        Ok(Some(NewCallerCall { contact, deal, call }))
    }

    async fn set_call_recording(&self, call_id: DbId, url: &str) -> SyncResult<Option<Call>> {
        Ok(CallRepo::set_recording_url_if_missing(&self.pool, call_id, url).await?)
    }

    async fn append_deal_comment(&self, input: &CreateDealComment) -> SyncResult<DealComment> {
        Ok(DealCommentRepo::create(&self.pool, input).await?)
    }
}
