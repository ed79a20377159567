//! Sync passes: fetch from the provider, reconcile, report.
//!
//! Passes are serialized twice: a process-local mutex, and a PostgreSQL
//! advisory lock when the service runs against a database, so a manual
//! trigger and the background poller (in this or another process) never
//! reconcile at the same time.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;

use crm_core::call_record::CallRecord;
use crm_core::recording::RecordingToken;
use crm_core::sync_report::BatchReport;
use crm_db::repositories::{SyncLock, SyncLockGuard};
use crm_db::DbPool;
use crm_mango::{MangoApi, RecordingDownloader, RecordingProbe, RecordingStorageConfig};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::reconciler::Reconciler;
use crate::store::{CallStore, PgCallStore, RecordingFetcher};

/// Entry id used for files written by a diagnostic probe without one.
const PROBE_ENTRY_ID: &str = "recording-probe";

/// Totals of one pass, plus the per-record report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub synced: usize,
    pub recordings_updated: usize,
    pub total: usize,
    pub report: BatchReport,
}

impl From<BatchReport> for SyncSummary {
    fn from(report: BatchReport) -> Self {
        Self {
            synced: report.synced,
            recordings_updated: report.recordings_updated,
            total: report.total,
            report,
        }
    }
}

pub struct SyncService {
    api: Arc<MangoApi>,
    downloader: RecordingDownloader,
    reconciler: Reconciler,
    /// Database used for the cross-process advisory lock.
    lock_pool: Option<DbPool>,
    running: Mutex<()>,
    config: SyncConfig,
}

impl SyncService {
    /// Service backed by PostgreSQL and the real recording downloader.
    pub fn new(
        pool: DbPool,
        api: Arc<MangoApi>,
        storage: RecordingStorageConfig,
        config: SyncConfig,
    ) -> Self {
        let downloader = RecordingDownloader::new(Arc::clone(&api), storage);
        let store: Arc<dyn CallStore> = Arc::new(PgCallStore::new(pool.clone()));
        let fetcher: Arc<dyn RecordingFetcher> = Arc::new(downloader.clone());
        Self {
            api,
            downloader,
            reconciler: Reconciler::new(store, fetcher),
            lock_pool: Some(pool),
            running: Mutex::new(()),
            config,
        }
    }

    /// Service over arbitrary store and fetcher, without a database lock.
    pub fn with_store(
        api: Arc<MangoApi>,
        storage: RecordingStorageConfig,
        store: Arc<dyn CallStore>,
        fetcher: Arc<dyn RecordingFetcher>,
        config: SyncConfig,
    ) -> Self {
        Self {
            downloader: RecordingDownloader::new(Arc::clone(&api), storage),
            api,
            reconciler: Reconciler::new(store, fetcher),
            lock_pool: None,
            running: Mutex::new(()),
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Fetch calls from the last `lookback` (default: configured window) and
    /// reconcile them.
    ///
    /// Fails with [`SyncError::Busy`] if a pass is already running and with
    /// [`SyncError::Provider`] if the batch cannot be fetched.
    pub async fn run_pass(&self, lookback: Option<Duration>) -> SyncResult<SyncSummary> {
        if !self.api.config().is_configured() {
            return Err(SyncError::NotConfigured);
        }
        let _running = self.running.try_lock().map_err(|_| SyncError::Busy)?;
        let guard = self.acquire_db_lock().await?;

        let lookback = lookback.unwrap_or(self.config.lookback);
        tracing::info!(lookback_secs = lookback.as_secs(), "Starting Mango sync pass");

        let result = self.api.fetch_calls(lookback).await;
        let report = match result {
            Ok(records) => self.reconciler.reconcile_batch(&records).await,
            Err(e) => {
                release(guard).await;
                return Err(e.into());
            }
        };
        release(guard).await;

        Ok(SyncSummary::from(report))
    }

    /// Reconcile records delivered by a push, under the same lock as a pass.
    pub async fn ingest(&self, records: &[CallRecord]) -> SyncResult<BatchReport> {
        let _running = self.running.lock().await;
        let guard = self.acquire_db_lock().await?;
        let report = self.reconciler.reconcile_batch(records).await;
        release(guard).await;
        Ok(report)
    }

    /// Run the recording pipeline once for a raw token and report each stage.
    ///
    /// Without an explicit entry id the one embedded in the token is used.
    pub async fn probe_recording(&self, entry_id: Option<&str>, raw_token: &str) -> RecordingProbe {
        let embedded = RecordingToken::decode(raw_token)
            .and_then(|t| t.entry_id().map(str::to_string));
        let entry_id = entry_id
            .map(str::to_string)
            .or(embedded)
            .unwrap_or_else(|| PROBE_ENTRY_ID.to_string());
        self.downloader.probe(&entry_id, raw_token).await
    }

    async fn acquire_db_lock(&self) -> SyncResult<Option<SyncLockGuard>> {
        let Some(pool) = &self.lock_pool else {
            return Ok(None);
        };
        match SyncLock::try_acquire(pool, SyncLock::MANGO_SYNC).await? {
            Some(guard) => Ok(Some(guard)),
            None => Err(SyncError::Busy),
        }
    }
}

async fn release(guard: Option<SyncLockGuard>) {
    if let Some(guard) = guard {
        if let Err(e) = guard.release().await {
            tracing::warn!(error = %e, "Failed to release sync advisory lock");
        }
    }
}
