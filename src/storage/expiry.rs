//! Background Expiry Sweeper
//!
//! Lazy expiry only reclaims a key when somebody touches it again. Keys that
//! expire and are never read would otherwise sit in memory for the lifetime
//! of the process, so a Tokio task periodically calls
//! [`StorageEngine::cleanup_expired`].
//!
//! The sweep interval adapts: a sweep that reclaims a large share of the
//! store halves the interval, an idle sweep doubles it, both bounded by
//! `min_interval` and `max_interval`.

use crate::storage::StorageEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Starting interval between sweeps (default: 100ms)
    pub base_interval: Duration,

    /// Lower bound for the interval (default: 10ms)
    pub min_interval: Duration,

    /// Upper bound for the interval (default: 1s)
    pub max_interval: Duration,

    /// Speed up when more than this fraction of entries expired in one sweep
    pub speedup_threshold: f64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(100),
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_secs(1),
            speedup_threshold: 0.25,
        }
    }
}

impl ExpiryConfig {
    /// Default bounds around a caller-chosen starting interval.
    pub fn with_interval(base_interval: Duration) -> Self {
        let defaults = Self::default();
        Self {
            base_interval,
            min_interval: defaults.min_interval.min(base_interval),
            max_interval: defaults.max_interval.max(base_interval),
            ..defaults
        }
    }

    fn next_interval(&self, current: Duration, before: usize, expired: u64) -> Duration {
        if before == 0 {
            return current;
        }

        let rate = expired as f64 / before as f64;
        if rate > self.speedup_threshold {
            (current / 2).max(self.min_interval)
        } else if expired == 0 {
            (current * 2).min(self.max_interval)
        } else {
            current
        }
    }
}

/// Handle to the running sweeper task.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Spawns the sweeper onto the current Tokio runtime.
    ///
    /// ```ignore
    /// let engine = Arc::new(StorageEngine::new());
    /// let sweeper = ExpirySweeper::start(Arc::clone(&engine), ExpiryConfig::default());
    /// // ...
    /// drop(sweeper); // stops sweeping
    /// ```
    pub fn start(engine: Arc<StorageEngine>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            interval_ms = config.base_interval.as_millis() as u64,
            "Background expiry sweeper started"
        );
        tokio::spawn(sweeper_loop(engine, config, shutdown_rx));

        Self { shutdown_tx }
    }

    /// Signals the task to stop after its current sleep.
    pub fn stop(&self) {
        if self.shutdown_tx.send(true).is_ok() {
            info!("Background expiry sweeper stopped");
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    engine: Arc<StorageEngine>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let before = engine.len();
        let expired = engine.cleanup_expired();
        let next = config.next_interval(interval, before, expired);

        if expired > 0 {
            debug!(
                expired = expired,
                keys_remaining = engine.len(),
                next_interval_ms = next.as_millis() as u64,
                "Expired keys cleaned up"
            );
        } else if next != interval {
            trace!(next_interval_ms = next.as_millis() as u64, "Sweeper backing off");
        }

        interval = next;
    }
}

/// Starts the expiry sweeper with default configuration.
pub fn start_expiry_sweeper(engine: Arc<StorageEngine>) -> ExpirySweeper {
    ExpirySweeper::start(engine, ExpiryConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_cleans_expired_keys() {
        let engine = Arc::new(StorageEngine::new());

        for i in 0..10 {
            engine.set(format!("key{}", i), "value", Some(Duration::from_millis(50)));
        }
        engine.set("persistent", "value", None);
        assert_eq!(engine.len(), 11);

        let _sweeper = ExpirySweeper::start(
            Arc::clone(&engine),
            ExpiryConfig::with_interval(Duration::from_millis(10)),
        );

        tokio::time::sleep(Duration::from_millis(250)).await;

        // Nothing read the expired keys, so only the sweeper could remove them
        assert_eq!(engine.len(), 1);
        assert!(engine.exists("persistent"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_on_drop() {
        let engine = Arc::new(StorageEngine::new());

        {
            let _sweeper = ExpirySweeper::start(
                Arc::clone(&engine),
                ExpiryConfig::with_interval(Duration::from_millis(10)),
            );
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        engine.set("key", "value", Some(Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Still physically present, no sweeper left to reclaim it
        assert_eq!(engine.len(), 1);
        // but logically absent
        assert!(engine.get("key").is_none());
    }

    #[test]
    fn test_adaptive_interval() {
        let config = ExpiryConfig::default();
        let base = config.base_interval;

        assert_eq!(config.next_interval(base, 100, 50), base / 2);
        assert_eq!(config.next_interval(base, 100, 0), base * 2);
        assert_eq!(config.next_interval(base, 100, 5), base);
        assert_eq!(config.next_interval(base, 0, 0), base);

        assert_eq!(
            config.next_interval(config.min_interval, 10, 10),
            config.min_interval
        );
        assert_eq!(
            config.next_interval(config.max_interval, 10, 0),
            config.max_interval
        );
    }
}
