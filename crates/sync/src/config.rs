use std::time::Duration;

/// Scheduling of sync passes.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How far back a pass asks the provider for calls.
    pub lookback: Duration,
    /// Background poll interval; `None` disables the poller.
    pub interval: Option<Duration>,
}

impl SyncConfig {
    /// | Env Var                       | Default |
    /// |-------------------------------|---------|
    /// | `MANGO_SYNC_LOOKBACK_MINUTES` | `60`    |
    /// | `MANGO_SYNC_INTERVAL_SECS`    | `300`   |
    ///
    /// An interval of `0` disables background polling.
    pub fn from_env() -> Self {
        let lookback_minutes: u64 = std::env::var("MANGO_SYNC_LOOKBACK_MINUTES")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("MANGO_SYNC_LOOKBACK_MINUTES must be a valid u64");

        let interval_secs: u64 = std::env::var("MANGO_SYNC_INTERVAL_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("MANGO_SYNC_INTERVAL_SECS must be a valid u64");

        Self {
            lookback: lookback_minutes_to_duration(lookback_minutes),
            interval: (interval_secs > 0).then(|| Duration::from_secs(interval_secs)),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lookback: lookback_minutes_to_duration(60),
            interval: Some(Duration::from_secs(300)),
        }
    }
}

/// Longest window a single pass may ask for (30 days).
pub const MAX_LOOKBACK_MINUTES: u64 = 30 * 24 * 60;

/// Lookback window for a number of minutes, clamped to
/// `1..=MAX_LOOKBACK_MINUTES`.
pub fn lookback_minutes_to_duration(minutes: u64) -> Duration {
    Duration::from_secs(minutes.clamp(1, MAX_LOOKBACK_MINUTES) * 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_minutes_is_one_minute() {
        assert_eq!(lookback_minutes_to_duration(0), Duration::from_secs(60));
        assert_eq!(lookback_minutes_to_duration(90), Duration::from_secs(5400));
    }

    #[test]
    fn huge_lookback_is_capped() {
        let cap = Duration::from_secs(MAX_LOOKBACK_MINUTES * 60);
        assert_eq!(lookback_minutes_to_duration(u64::MAX), cap);
        assert_eq!(lookback_minutes_to_duration(MAX_LOOKBACK_MINUTES + 1), cap);
    }
}
