//! Reconciliation against PostgreSQL.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use sqlx::PgPool;

use crm_core::call_record::CallRecord;
use crm_core::sync_report::{RecordOutcome, SkipReason};
use crm_core::types::DbId;
use crm_db::models::call::{Call, CreateCall};
use crm_db::models::contact::Contact;
use crm_db::models::deal::Deal;
use crm_db::models::deal_comment::{CreateDealComment, DealComment};
use crm_db::repositories::{CallRepo, ContactRepo, DealCommentRepo, SyncLock};
use crm_mango::{MangoApi, MangoConfig, RecordingStorageConfig};
use crm_sync::store::{NewCaller, NewCallerCall};
use crm_sync::{
    CallStore, PgCallStore, RecordingFetcher, Reconciler, SyncConfig, SyncError, SyncResult,
    SyncService,
};

struct FixedRecording(Option<&'static str>);

#[async_trait]
impl RecordingFetcher for FixedRecording {
    async fn fetch(&self, _entry_id: &str, _token: &str) -> Option<String> {
        self.0.map(str::to_string)
    }
}

fn reconciler(pool: &PgPool, recording: Option<&'static str>) -> Reconciler {
    Reconciler::new(
        Arc::new(PgCallStore::new(pool.clone())),
        Arc::new(FixedRecording(recording)),
    )
}

fn e1() -> CallRecord {
    CallRecord {
        entry_id: Some("E1".into()),
        start: Some(1_700_000_000),
        finish: Some(1_700_000_300),
        from_number: Some("sip:100@pbx".into()),
        to_number: Some("79991234567".into()),
        disconnect_reason: Some("1110".into()),
        recording_token: Some("TOKEN".into()),
    }
}

#[sqlx::test(migrations = "../db/migrations")]
async fn outgoing_call_end_to_end(pool: PgPool) {
    let report = reconciler(&pool, Some("/recordings/E1.mp3"))
        .reconcile_batch(&[e1()])
        .await;
    assert_eq!(report.synced, 1);

    let call = CallRepo::find_by_external_id(&pool, "E1").await.unwrap().unwrap();
    assert_eq!(call.direction, "OUT");
    assert_eq!(call.status, "COMPLETED");
    assert_eq!(call.duration_secs, 300);
    assert_eq!(call.recording_url.as_deref(), Some("/recordings/E1.mp3"));
    assert_eq!(call.started_at.map(|t| t.timestamp()), Some(1_700_000_000));

    let contact = ContactRepo::find_by_id(&pool, call.contact_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(contact.phone.as_deref(), Some("79991234567"));

    let comments = DealCommentRepo::list_for_deal(&pool, call.deal_id.unwrap())
        .await
        .unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].metadata["call_id"], call.id);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn repeated_batches_write_nothing_new(pool: PgPool) {
    let reconciler = reconciler(&pool, None);
    reconciler.reconcile_batch(&[e1()]).await;
    let second = reconciler.reconcile_batch(&[e1()]).await;

    assert_eq!(second.synced, 0);
    assert_eq!(CallRepo::count(&pool).await.unwrap(), 1);
    assert_eq!(ContactRepo::count(&pool).await.unwrap(), 1);
}

/// Another writer inserted the call and its contact between lookup and insert.
struct RacingStore {
    inner: PgCallStore,
}

#[async_trait]
impl CallStore for RacingStore {
    async fn find_call_by_external_id(
        &self,
        _external_id: &str,
    ) -> SyncResult<Option<Call>> {
        Ok(None)
    }
    async fn find_contact_by_phones(
        &self,
        _phones: &[String],
    ) -> SyncResult<Option<Contact>> {
        Ok(None)
    }
    async fn find_latest_open_deal(
        &self,
        contact_id: DbId,
    ) -> SyncResult<Option<Deal>> {
        self.inner.find_latest_open_deal(contact_id).await
    }
    async fn insert_call_if_absent(
        &self,
        input: &CreateCall,
    ) -> SyncResult<Option<Call>> {
        self.inner.insert_call_if_absent(input).await
    }
    async fn insert_call_for_new_caller(
        &self,
        caller: &NewCaller,
        call: &CreateCall,
    ) -> SyncResult<Option<NewCallerCall>> {
        self.inner.insert_call_for_new_caller(caller, call).await
    }
    async fn set_call_recording(
        &self,
        call_id: DbId,
        url: &str,
    ) -> SyncResult<Option<Call>> {
        self.inner.set_call_recording(call_id, url).await
    }
    async fn append_deal_comment(
        &self,
        input: &CreateDealComment,
    ) -> SyncResult<DealComment> {
        self.inner.append_deal_comment(input).await
    }
}

#[sqlx::test(migrations = "../db/migrations")]
async fn lost_insert_race_is_skipped_not_duplicated(pool: PgPool) {
    reconciler(&pool, None).reconcile_batch(&[e1()]).await;

    let racing = Reconciler::new(
        Arc::new(RacingStore {
            inner: PgCallStore::new(pool.clone()),
        }),
        Arc::new(FixedRecording(None)),
    );
    let report = racing.reconcile_batch(&[e1()]).await;

    assert_matches!(
        report.outcomes[0],
        RecordOutcome::Skipped { reason: SkipReason::DuplicateExternalId }
    );
    assert_eq!(CallRepo::count(&pool).await.unwrap(), 1);
    assert_eq!(ContactRepo::count(&pool).await.unwrap(), 1);
    let deals: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deals")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(deals, 1);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn pass_is_busy_while_lock_is_held_elsewhere(pool: PgPool) {
    let api = MangoApi::new(MangoConfig {
        api_url: "http://127.0.0.1:9".into(),
        api_key: "key".into(),
        api_salt: "salt".into(),
        request_timeout: Duration::from_secs(1),
        recording_timeout: Duration::from_secs(1),
        result_poll_attempts: 1,
        result_poll_delay: Duration::from_millis(1),
    })
    .unwrap();
    let service = SyncService::new(
        pool.clone(),
        Arc::new(api),
        RecordingStorageConfig {
            dir: std::env::temp_dir(),
            public_prefix: "/recordings".into(),
        },
        SyncConfig::default(),
    );

    let held = SyncLock::try_acquire(&pool, SyncLock::MANGO_SYNC)
        .await
        .unwrap()
        .unwrap();
    let err = service.run_pass(None).await.unwrap_err();
    assert_matches!(err, SyncError::Busy);

    held.release().await.unwrap();
    let report = service.ingest(&[]).await.unwrap();
    assert_eq!(report.total, 0);
}
