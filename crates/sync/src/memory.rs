//! In-process [`CallStore`] used by tests and dry runs.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crm_core::types::DbId;
use crm_db::models::call::{Call, CreateCall};
use crm_db::models::contact::{Contact, CreateContact};
use crm_db::models::deal::{CreateDeal, Deal};
use crm_db::models::deal_comment::{CreateDealComment, DealComment};

use crate::error::{SyncError, SyncResult};
use crate::store::{CallStore, NewCaller, NewCallerCall};

#[derive(Default)]
struct Tables {
    next_id: DbId,
    contacts: Vec<Contact>,
    deals: Vec<Deal>,
    calls: Vec<Call>,
    comments: Vec<DealComment>,
}

impl Tables {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn has_call(&self, external_id: &str) -> bool {
        self.calls.iter().any(|c| c.external_id == external_id)
    }

    fn push_contact(&mut self, input: &CreateContact) -> Contact {
        let now = Utc::now();
        let contact = Contact {
            id: self.next_id(),
            name: input.name.clone(),
            phone: input.phone.clone(),
            email: input.email.clone(),
            source: input.source.clone(),
            status: input.status.clone(),
            created_at: now,
            updated_at: now,
        };
        self.contacts.push(contact.clone());
        contact
    }

    fn push_deal(&mut self, input: &CreateDeal) -> Deal {
        let now = Utc::now();
        let deal = Deal {
            id: self.next_id(),
            title: input.title.clone(),
            contact_id: input.contact_id,
            stage: input.stage.clone(),
            probability: input.probability,
            amount: input.amount,
            description: input.description.clone(),
            closed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.deals.push(deal.clone());
        deal
    }

    fn push_call(&mut self, input: &CreateCall) -> Call {
        let now = Utc::now();
        let call = Call {
            id: self.next_id(),
            external_id: input.external_id.clone(),
            direction: input.direction.clone(),
            client_phone: input.client_phone.clone(),
            from_number: input.from_number.clone(),
            to_number: input.to_number.clone(),
            status: input.status.clone(),
            started_at: input.started_at,
            ended_at: input.ended_at,
            duration_secs: input.duration_secs,
            disconnect_reason: input.disconnect_reason.clone(),
            recording_url: input.recording_url.clone(),
            contact_id: input.contact_id,
            deal_id: input.deal_id,
            created_at: now,
            updated_at: now,
        };
        self.calls.push(call.clone());
        call
    }
}

/// Vector-backed store with the same insert-or-ignore and write-once
/// semantics as the PostgreSQL tables.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> SyncResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| SyncError::Store("in-memory store poisoned".into()))
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.lock().map(|t| t.contacts.clone()).unwrap_or_default()
    }

    pub fn deals(&self) -> Vec<Deal> {
        self.lock().map(|t| t.deals.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().map(|t| t.calls.clone()).unwrap_or_default()
    }

    pub fn comments(&self) -> Vec<DealComment> {
        self.lock().map(|t| t.comments.clone()).unwrap_or_default()
    }

    /// Add a contact directly, as if created outside a sync.
    pub fn add_contact(&self, input: &CreateContact) -> Option<Contact> {
        self.lock().ok().map(|mut t| t.push_contact(input))
    }

    /// Mark a deal closed. Returns `false` if no such deal exists.
    pub fn close_deal(&self, deal_id: DbId) -> bool {
        let Ok(mut tables) = self.lock() else {
            return false;
        };
        match tables.deals.iter_mut().find(|d| d.id == deal_id) {
            Some(deal) => {
                deal.closed_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl CallStore for InMemoryStore {
    async fn find_call_by_external_id(&self, external_id: &str) -> SyncResult<Option<Call>> {
        let tables = self.lock()?;
        Ok(tables
            .calls
            .iter()
            .find(|c| c.external_id == external_id)
            .cloned())
    }

    async fn find_contact_by_phones(&self, phones: &[String]) -> SyncResult<Option<Contact>> {
        let tables = self.lock()?;
        Ok(tables
            .contacts
            .iter()
            .filter(|c| c.phone.as_ref().is_some_and(|p| phones.contains(p)))
            .min_by_key(|c| (c.created_at, c.id))
            .cloned())
    }

    async fn find_latest_open_deal(&self, contact_id: DbId) -> SyncResult<Option<Deal>> {
        let tables = self.lock()?;
        Ok(tables
            .deals
            .iter()
            .filter(|d| d.contact_id == Some(contact_id) && d.is_open())
            .max_by_key(|d| (d.updated_at, d.id))
            .cloned())
    }

    async fn insert_call_if_absent(&self, input: &CreateCall) -> SyncResult<Option<Call>> {
        let mut tables = self.lock()?;
        if tables.has_call(&input.external_id) {
            return Ok(None);
        }
        Ok(Some(tables.push_call(input)))
    }

    async fn insert_call_for_new_caller(
        &self,
        caller: &NewCaller,
        call: &CreateCall,
    ) -> SyncResult<Option<NewCallerCall>> {
        let mut tables = self.lock()?;
        if tables.has_call(&call.external_id) {
            return Ok(None);
        }
        let contact = tables.push_contact(&caller.contact);
        let deal = tables.push_deal(&CreateDeal {
            contact_id: Some(contact.id),
            ..caller.deal.clone()
        });
        let call = tables.push_call(&CreateCall {
            contact_id: Some(contact.id),
            deal_id: Some(deal.id),
            ..call.clone()
        });
        Ok(Some(NewCallerCall { contact, deal, call }))
    }

    async fn set_call_recording(&self, call_id: DbId, url: &str) -> SyncResult<Option<Call>> {
        let mut tables = self.lock()?;
        let Some(call) = tables
            .calls
            .iter_mut()
            .find(|c| c.id == call_id && c.recording_url.is_none())
        else {
            return Ok(None);
        };
        call.recording_url = Some(url.to_string());
        call.updated_at = Utc::now();
        Ok(Some(call.clone()))
    }

    async fn append_deal_comment(&self, input: &CreateDealComment) -> SyncResult<DealComment> {
        let mut tables = self.lock()?;
        if !tables.deals.iter().any(|d| d.id == input.deal_id) {
            return Err(SyncError::Store(format!("deal {} does not exist", input.deal_id)));
        }
        let comment = DealComment {
            id: tables.next_id(),
            deal_id: input.deal_id,
            kind: input.kind.clone(),
            body: input.body.clone(),
            metadata: input.metadata.clone(),
            created_at: Utc::now(),
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_db::models::deal::STAGE_NEW;

    fn call(external_id: &str) -> CreateCall {
        CreateCall {
            external_id: external_id.to_string(),
            direction: "IN".into(),
            client_phone: "79991234567".into(),
            from_number: "79991234567".into(),
            to_number: "sip:100@pbx".into(),
            status: "COMPLETED".into(),
            started_at: None,
            ended_at: None,
            duration_secs: 0,
            disconnect_reason: None,
            recording_url: None,
            contact_id: None,
            deal_id: None,
        }
    }

    fn caller() -> NewCaller {
        NewCaller {
            contact: CreateContact::from_call("79991234567"),
            deal: CreateDeal {
                title: "Incoming call 79991234567".into(),
                contact_id: None,
                stage: STAGE_NEW.to_string(),
                probability: 50,
                amount: 0,
                description: None,
            },
        }
    }

    #[tokio::test]
    async fn new_caller_rows_are_linked() {
        let store = InMemoryStore::new();

        let created = store
            .insert_call_for_new_caller(&caller(), &call("E1"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(created.deal.contact_id, Some(created.contact.id));
        assert_eq!(created.call.contact_id, Some(created.contact.id));
        assert_eq!(created.call.deal_id, Some(created.deal.id));
    }

    #[tokio::test]
    async fn taken_external_id_leaves_no_contact_or_deal() {
        let store = InMemoryStore::new();
        store.insert_call_if_absent(&call("E1")).await.unwrap();

        let created = store
            .insert_call_for_new_caller(&caller(), &call("E1"))
            .await
            .unwrap();

        assert!(created.is_none());
        assert!(store.contacts().is_empty());
        assert!(store.deals().is_empty());
        assert_eq!(store.calls().len(), 1);
    }
}
