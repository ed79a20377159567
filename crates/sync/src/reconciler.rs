//! Maps provider call records onto local contacts, deals, calls and deal
//! timeline entries.
//!
//! Records are processed strictly one after another: a contact created for
//! record N is visible when record N+1 with the same phone is resolved. A
//! failing record never aborts the batch; it becomes a
//! [`RecordOutcome::Failed`] entry in the report.

use std::sync::Arc;

use serde_json::json;

use crm_core::call_record::CallRecord;
use crm_core::calls::{
    call_duration, client_phone, infer_direction, infer_status, recording_expected,
    timeline_summary, CallDirection, CallStatus,
};
use crm_core::phone::phone_variants;
use crm_core::sync_report::{BatchReport, RecordOutcome, SkipReason};
use crm_core::types::{timestamp_from_unix, DbId};
use crm_db::models::call::{Call, CreateCall};
use crm_db::models::contact::CreateContact;
use crm_db::models::deal::{CreateDeal, STAGE_NEW};
use crm_db::models::deal_comment::{CreateDealComment, KIND_SYSTEM_EVENT};

use crate::error::SyncResult;
use crate::store::{CallStore, NewCaller, RecordingFetcher};

/// Probability assigned to deals opened from an unknown caller.
const NEW_DEAL_PROBABILITY: i32 = 50;

pub struct Reconciler {
    store: Arc<dyn CallStore>,
    recordings: Arc<dyn RecordingFetcher>,
}

/// Where a new call gets linked.
struct Link {
    contact_id: DbId,
    deal_id: Option<DbId>,
    contact_created: bool,
    deal_created: bool,
}

/// An existing contact for the caller, or the rows to open for a new one.
enum Target {
    Known {
        contact_id: DbId,
        deal_id: Option<DbId>,
    },
    New(NewCaller),
}

impl Reconciler {
    pub fn new(store: Arc<dyn CallStore>, recordings: Arc<dyn RecordingFetcher>) -> Self {
        Self { store, recordings }
    }

    /// Reconcile every record in order and report what happened to each.
    pub async fn reconcile_batch(&self, records: &[CallRecord]) -> BatchReport {
        let mut report = BatchReport::default();
        for record in records {
            let outcome = self.reconcile_record(record).await;
            match &outcome {
                RecordOutcome::Skipped { reason } => {
                    tracing::warn!(
                        entry_id = record.entry_id.as_deref().unwrap_or("-"),
                        reason = %reason,
                        "Skipping call record"
                    );
                }
                RecordOutcome::Failed { entry_id, error } => {
                    tracing::error!(
                        entry_id = entry_id.as_deref().unwrap_or("-"),
                        error = %error,
                        "Failed to reconcile call record"
                    );
                }
                _ => {}
            }
            report.push(outcome);
        }
        tracing::info!(
            total = report.total,
            synced = report.synced,
            recordings_updated = report.recordings_updated,
            skipped = report.skipped(),
            failed = report.failed(),
            "Reconciled call batch"
        );
        report
    }

    /// Reconcile a single record. Errors are folded into the outcome.
    pub async fn reconcile_record(&self, record: &CallRecord) -> RecordOutcome {
        let Some(entry_id) = record.entry_id.as_deref() else {
            return RecordOutcome::Skipped {
                reason: SkipReason::MissingEntryId,
            };
        };
        match self.reconcile_entry(entry_id, record).await {
            Ok(outcome) => outcome,
            Err(e) => RecordOutcome::Failed {
                entry_id: Some(entry_id.to_string()),
                error: e.to_string(),
            },
        }
    }

    async fn reconcile_entry(&self, entry_id: &str, record: &CallRecord) -> SyncResult<RecordOutcome> {
        if let Some(existing) = self.store.find_call_by_external_id(entry_id).await? {
            return self.retry_recording(entry_id, existing, record).await;
        }

        let (Some(from), Some(to)) = (record.from_number.as_deref(), record.to_number.as_deref())
        else {
            return Ok(RecordOutcome::Skipped {
                reason: SkipReason::MissingPhoneNumber,
            });
        };

        let direction = infer_direction(from, to);
        let phone = client_phone(direction, from, to);
        let status = infer_status(record.disconnect_reason.as_deref());
        let duration = call_duration(record.start, record.finish);

        let target = self.resolve_target(direction, phone, record.start).await?;

        let recording_url = match (&record.recording_token, recording_expected(&status, duration)) {
            (Some(token), true) => self.recordings.fetch(entry_id, token).await,
            _ => None,
        };
        let has_recording = recording_url.is_some();

        let input = CreateCall {
            external_id: entry_id.to_string(),
            direction: direction.as_str().to_string(),
            client_phone: phone.to_string(),
            from_number: from.to_string(),
            to_number: to.to_string(),
            status: status.as_str().to_string(),
            started_at: record.start.and_then(timestamp_from_unix),
            ended_at: record.finish.and_then(timestamp_from_unix),
            duration_secs: i32::try_from(duration).unwrap_or(i32::MAX),
            disconnect_reason: record.disconnect_reason.clone(),
            recording_url,
            contact_id: None,
            deal_id: None,
        };
        let Some((call, link)) = self.insert_call(target, input).await? else {
            return Ok(RecordOutcome::Skipped {
                reason: SkipReason::DuplicateExternalId,
            });
        };

        if let Some(deal_id) = link.deal_id {
            self.append_timeline(deal_id, &call, direction, &status).await?;
        }

        tracing::info!(
            entry_id,
            call_id = call.id,
            contact_id = link.contact_id,
            deal_id = ?link.deal_id,
            direction = %direction,
            status = %status,
            "Call synced"
        );

        Ok(RecordOutcome::Created {
            call_id: call.id,
            contact_id: link.contact_id,
            deal_id: link.deal_id,
            contact_created: link.contact_created,
            deal_created: link.deal_created,
            has_recording,
        })
    }

    /// The only mutation allowed on an already reconciled call.
    async fn retry_recording(
        &self,
        entry_id: &str,
        existing: Call,
        record: &CallRecord,
    ) -> SyncResult<RecordOutcome> {
        let already = RecordOutcome::AlreadySynced { call_id: existing.id };
        if !existing.needs_recording() {
            return Ok(already);
        }
        let Some(token) = record.recording_token.as_deref() else {
            return Ok(already);
        };
        let Some(url) = self.recordings.fetch(entry_id, token).await else {
            return Ok(already);
        };
        match self.store.set_call_recording(existing.id, &url).await? {
            Some(call) => {
                tracing::info!(entry_id, call_id = call.id, url = %url, "Recording attached to existing call");
                Ok(RecordOutcome::RecordingAttached { call_id: call.id })
            }
            None => Ok(already),
        }
    }

    /// Find the contact by phone variants, or describe the contact and deal
    /// to open. Nothing is written here.
    async fn resolve_target(
        &self,
        direction: CallDirection,
        phone: &str,
        start: Option<i64>,
    ) -> SyncResult<Target> {
        let variants = phone_variants(phone);
        if let Some(contact) = self.store.find_contact_by_phones(&variants).await? {
            let deal = self.store.find_latest_open_deal(contact.id).await?;
            return Ok(Target::Known {
                contact_id: contact.id,
                deal_id: deal.map(|d| d.id),
            });
        }
        Ok(Target::New(NewCaller {
            contact: CreateContact::from_call(phone),
            deal: new_call_deal(direction, phone, start),
        }))
    }

    /// Insert the call against its target. `None` when the external id was
    /// taken by a concurrent writer; a new caller's contact and deal are then
    /// not created either.
    async fn insert_call(&self, target: Target, input: CreateCall) -> SyncResult<Option<(Call, Link)>> {
        match target {
            Target::Known { contact_id, deal_id } => {
                let input = CreateCall {
                    contact_id: Some(contact_id),
                    deal_id,
                    ..input
                };
                let call = self.store.insert_call_if_absent(&input).await?;
                Ok(call.map(|call| {
                    let link = Link {
                        contact_id,
                        deal_id,
                        contact_created: false,
                        deal_created: false,
                    };
                    (call, link)
                }))
            }
            Target::New(caller) => {
                let Some(created) = self.store.insert_call_for_new_caller(&caller, &input).await? else {
                    return Ok(None);
                };
                tracing::info!(
                    contact_id = created.contact.id,
                    deal_id = created.deal.id,
                    phone = %input.client_phone,
                    "Created contact and deal for new caller"
                );
                let link = Link {
                    contact_id: created.contact.id,
                    deal_id: Some(created.deal.id),
                    contact_created: true,
                    deal_created: true,
                };
                Ok(Some((created.call, link)))
            }
        }
    }

    async fn append_timeline(
        &self,
        deal_id: DbId,
        call: &Call,
        direction: CallDirection,
        status: &CallStatus,
    ) -> SyncResult<()> {
        let duration = i64::from(call.duration_secs);
        let comment = CreateDealComment {
            deal_id,
            kind: KIND_SYSTEM_EVENT.to_string(),
            body: timeline_summary(direction, status, duration),
            metadata: json!({
                "external_call_id": call.external_id,
                "call_id": call.id,
                "duration": duration,
                "disconnect_reason": call.disconnect_reason,
                "status": status.as_str(),
            }),
        };
        self.store.append_deal_comment(&comment).await?;
        Ok(())
    }
}

fn new_call_deal(direction: CallDirection, phone: &str, start: Option<i64>) -> CreateDeal {
    let started = start
        .and_then(timestamp_from_unix)
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    CreateDeal {
        title: format!("{} call {phone}", direction.label()),
        contact_id: None,
        stage: STAGE_NEW.to_string(),
        probability: NEW_DEAL_PROBABILITY,
        amount: 0,
        description: Some(format!(
            "Created from {} call. Phone: {phone}. Started: {started}.",
            direction.label().to_lowercase()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Hands out scripted answers and records every request.
    #[derive(Default)]
    struct ScriptedFetcher {
        answers: Mutex<VecDeque<Option<String>>>,
        requests: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedFetcher {
        fn answering(answers: impl IntoIterator<Item = Option<&'static str>>) -> Self {
            Self {
                answers: Mutex::new(answers.into_iter().map(|a| a.map(str::to_string)).collect()),
                requests: Mutex::default(),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RecordingFetcher for ScriptedFetcher {
        async fn fetch(&self, entry_id: &str, token: &str) -> Option<String> {
            self.requests
                .lock()
                .unwrap()
                .push((entry_id.to_string(), token.to_string()));
            self.answers.lock().unwrap().pop_front().flatten()
        }
    }

    fn reconciler(fetcher: ScriptedFetcher) -> (Reconciler, Arc<InMemoryStore>, Arc<ScriptedFetcher>) {
        let store = Arc::new(InMemoryStore::new());
        let fetcher = Arc::new(fetcher);
        let reconciler = Reconciler::new(store.clone(), fetcher.clone());
        (reconciler, store, fetcher)
    }

    fn outgoing_e1() -> CallRecord {
        CallRecord {
            entry_id: Some("E1".into()),
            start: Some(1_700_000_000),
            finish: Some(1_700_000_300),
            from_number: Some("sip:100@pbx".into()),
            to_number: Some("79991234567".into()),
            disconnect_reason: None,
            recording_token: None,
        }
    }

    #[tokio::test]
    async fn new_outgoing_call_creates_contact_deal_call_and_timeline() {
        let (reconciler, store, _) = reconciler(ScriptedFetcher::default());

        let report = reconciler.reconcile_batch(&[outgoing_e1()]).await;

        assert_eq!(report.total, 1);
        assert_eq!(report.synced, 1);
        assert_matches!(
            report.outcomes[0],
            RecordOutcome::Created { contact_created: true, deal_created: true, has_recording: false, .. }
        );

        let contacts = store.contacts();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].phone.as_deref(), Some("79991234567"));
        assert_eq!(contacts[0].name, "Call: 79991234567");
        assert_eq!(contacts[0].source, "PHONE");

        let deals = store.deals();
        assert_eq!(deals.len(), 1);
        assert!(deals[0].title.contains("Outgoing"));
        assert_eq!(deals[0].stage, "NEW");
        assert_eq!(deals[0].probability, 50);
        assert_eq!(deals[0].amount, 0);

        let calls = store.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].direction, "OUT");
        assert_eq!(calls[0].status, "COMPLETED");
        assert_eq!(calls[0].duration_secs, 300);
        assert_eq!(calls[0].client_phone, "79991234567");
        assert_eq!(calls[0].deal_id, Some(deals[0].id));

        let comments = store.comments();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].kind, "SYSTEM_EVENT");
        assert_eq!(comments[0].body, "Outgoing call, 5 min 0 sec");
        assert_eq!(comments[0].metadata["external_call_id"], "E1");
        assert_eq!(comments[0].metadata["duration"], 300);
        assert_eq!(comments[0].metadata["status"], "COMPLETED");
    }

    #[tokio::test]
    async fn second_pass_is_a_no_op() {
        let (reconciler, store, _) = reconciler(ScriptedFetcher::default());
        let batch = [outgoing_e1()];

        reconciler.reconcile_batch(&batch).await;
        let again = reconciler.reconcile_batch(&batch).await;

        assert_eq!(again.synced, 0);
        assert_matches!(again.outcomes[0], RecordOutcome::AlreadySynced { .. });
        assert_eq!(store.calls().len(), 1);
        assert_eq!(store.contacts().len(), 1);
        assert_eq!(store.deals().len(), 1);
        assert_eq!(store.comments().len(), 1);
    }

    #[tokio::test]
    async fn malformed_record_does_not_stop_batch() {
        let (reconciler, store, _) = reconciler(ScriptedFetcher::default());
        let missing_id = CallRecord {
            entry_id: None,
            ..outgoing_e1()
        };
        let missing_phone = CallRecord {
            entry_id: Some("E0".into()),
            to_number: None,
            ..outgoing_e1()
        };

        let report = reconciler
            .reconcile_batch(&[missing_id, missing_phone, outgoing_e1()])
            .await;

        assert_eq!(report.total, 3);
        assert_eq!(report.synced, 1);
        assert_eq!(report.skipped(), 2);
        assert_matches!(
            report.outcomes[0],
            RecordOutcome::Skipped { reason: SkipReason::MissingEntryId }
        );
        assert_matches!(
            report.outcomes[1],
            RecordOutcome::Skipped { reason: SkipReason::MissingPhoneNumber }
        );
        assert_eq!(store.calls().len(), 1);
    }

    #[tokio::test]
    async fn extreme_timestamps_do_not_stop_batch() {
        let (reconciler, store, _) = reconciler(ScriptedFetcher::default());
        let records = crm_core::call_record::parse_stats_csv(
            ";-9223372036854775808;9223372036854775807;79990000000;sip:1@pbx;1110;BAD\n\
             ;1700000000;1700000060;79991111111;sip:1@pbx;1110;GOOD\n",
        );

        let report = reconciler.reconcile_batch(&records).await;

        assert_eq!(report.total, 2);
        assert_eq!(report.synced, 2);
        let calls = store.calls();
        let bad = calls.iter().find(|c| c.external_id == "BAD").unwrap();
        let good = calls.iter().find(|c| c.external_id == "GOOD").unwrap();
        assert_eq!(bad.duration_secs, 0);
        assert!(bad.started_at.is_none());
        assert_eq!(good.duration_secs, 60);
    }

    #[tokio::test]
    async fn known_contact_without_open_deal_gets_deal_less_call() {
        let (reconciler, store, _) = reconciler(ScriptedFetcher::default());
        // Formatted differently from every variant; must not match.
        store
            .add_contact(&CreateContact::from_call("+7 (999) 123-45-67"))
            .unwrap();
        let contact = store
            .add_contact(&CreateContact::from_call("+79991234567"))
            .unwrap();

        let incoming = CallRecord {
            entry_id: Some("E2".into()),
            from_number: Some("89991234567".into()),
            to_number: Some("sip:101@pbx".into()),
            ..outgoing_e1()
        };
        let report = reconciler.reconcile_batch(&[incoming]).await;

        assert_matches!(
            report.outcomes[0],
            RecordOutcome::Created { contact_created: false, deal_created: false, deal_id: None, .. }
        );
        let call = &store.calls()[0];
        assert_eq!(call.direction, "IN");
        assert_eq!(call.contact_id, Some(contact.id));
        assert_eq!(call.deal_id, None);
        assert!(store.deals().is_empty());
        assert!(store.comments().is_empty());
    }

    #[tokio::test]
    async fn known_contact_uses_latest_open_deal() {
        let (reconciler, store, _) = reconciler(ScriptedFetcher::default());
        reconciler.reconcile_batch(&[outgoing_e1()]).await;
        let first_deal = store.deals()[0].id;

        let follow_up = CallRecord {
            entry_id: Some("E3".into()),
            from_number: Some("+7 999 123 45 67".into()),
            to_number: Some("sip:100@pbx".into()),
            disconnect_reason: Some("1103".into()),
            ..outgoing_e1()
        };
        reconciler.reconcile_batch(&[follow_up]).await;

        assert_eq!(store.contacts().len(), 1);
        let calls = store.calls();
        assert_eq!(calls[1].deal_id, Some(first_deal));
        assert_eq!(calls[1].status, "MISSED");
        let comments = store.comments();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[1].body, "Missed incoming call");
    }

    #[tokio::test]
    async fn closed_deal_is_not_reused() {
        let (reconciler, store, _) = reconciler(ScriptedFetcher::default());
        reconciler.reconcile_batch(&[outgoing_e1()]).await;
        assert!(store.close_deal(store.deals()[0].id));

        let later = CallRecord {
            entry_id: Some("E4".into()),
            ..outgoing_e1()
        };
        reconciler.reconcile_batch(&[later]).await;

        assert_eq!(store.calls()[1].deal_id, None);
    }

    #[tokio::test]
    async fn recording_is_retried_on_later_pass() {
        let fetcher = ScriptedFetcher::answering([None, Some("/recordings/E1.mp3")]);
        let (reconciler, store, fetcher) = reconciler(fetcher);
        let with_token = CallRecord {
            recording_token: Some("TOKEN".into()),
            ..outgoing_e1()
        };

        let first = reconciler.reconcile_batch(std::slice::from_ref(&with_token)).await;
        assert_matches!(first.outcomes[0], RecordOutcome::Created { has_recording: false, .. });
        assert!(store.calls()[0].recording_url.is_none());

        let second = reconciler.reconcile_batch(std::slice::from_ref(&with_token)).await;
        assert_matches!(second.outcomes[0], RecordOutcome::RecordingAttached { .. });
        assert_eq!(second.recordings_updated, 1);
        assert_eq!(second.synced, 1);
        assert_eq!(
            store.calls()[0].recording_url.as_deref(),
            Some("/recordings/E1.mp3")
        );

        let third = reconciler.reconcile_batch(std::slice::from_ref(&with_token)).await;
        assert_matches!(third.outcomes[0], RecordOutcome::AlreadySynced { .. });
        assert_eq!(fetcher.request_count(), 2);
        assert_eq!(store.calls().len(), 1);
    }

    #[tokio::test]
    async fn missed_or_zero_length_calls_never_fetch_recordings() {
        let (reconciler, _, fetcher) = reconciler(ScriptedFetcher::default());
        let missed = CallRecord {
            entry_id: Some("M1".into()),
            disconnect_reason: Some("1103".into()),
            recording_token: Some("TOKEN".into()),
            ..outgoing_e1()
        };
        let zero = CallRecord {
            entry_id: Some("Z1".into()),
            finish: Some(1_700_000_000),
            recording_token: Some("TOKEN".into()),
            ..outgoing_e1()
        };

        let report = reconciler.reconcile_batch(&[missed.clone(), zero.clone()]).await;
        assert_eq!(report.synced, 2);
        reconciler.reconcile_batch(&[missed, zero]).await;

        assert_eq!(fetcher.request_count(), 0);
    }

    #[tokio::test]
    async fn recording_fetched_on_first_pass_is_stored() {
        let fetcher = ScriptedFetcher::answering([Some("/recordings/E1.wav")]);
        let (reconciler, store, _) = reconciler(fetcher);
        let with_token = CallRecord {
            recording_token: Some("TOKEN".into()),
            ..outgoing_e1()
        };

        let report = reconciler.reconcile_batch(&[with_token]).await;

        assert_matches!(report.outcomes[0], RecordOutcome::Created { has_recording: true, .. });
        assert_eq!(report.recordings_updated, 0);
        assert_eq!(
            store.calls()[0].recording_url.as_deref(),
            Some("/recordings/E1.wav")
        );
    }

    #[tokio::test]
    async fn same_new_caller_twice_in_one_batch_creates_one_contact() {
        let (reconciler, store, _) = reconciler(ScriptedFetcher::default());
        let second = CallRecord {
            entry_id: Some("E5".into()),
            ..outgoing_e1()
        };

        let report = reconciler.reconcile_batch(&[outgoing_e1(), second]).await;

        assert_eq!(report.synced, 2);
        assert_eq!(store.contacts().len(), 1);
        assert_eq!(store.deals().len(), 1);
        assert_matches!(
            report.outcomes[1],
            RecordOutcome::Created { contact_created: false, deal_created: false, deal_id: Some(_), .. }
        );
    }
}
