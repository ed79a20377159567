//! Periodic Mango sync.
//!
//! Runs a sync pass over the configured lookback window on a fixed
//! interval. A pass that finds another one running is skipped.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crm_sync::{SyncError, SyncService};

/// Run the poll loop until `cancel` is triggered.
pub async fn run(sync: Arc<SyncService>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        lookback_secs = sync.config().lookback.as_secs(),
        "Mango sync poller started"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Mango sync poller stopping");
                break;
            }
            _ = ticker.tick() => {
                match sync.run_pass(None).await {
                    Ok(summary) if summary.synced > 0 => {
                        tracing::info!(
                            synced = summary.synced,
                            recordings_updated = summary.recordings_updated,
                            total = summary.total,
                            "Mango poll: calls synced"
                        );
                    }
                    Ok(summary) => {
                        tracing::debug!(total = summary.total, "Mango poll: nothing new");
                    }
                    Err(SyncError::Busy) => {
                        tracing::debug!("Mango poll: pass already running, skipped");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Mango poll: sync failed");
                    }
                }
            }
        }
    }
}
