// Performance metrics module
//
// Provides lightweight counters for monitoring acquisition behavior

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Geolocation metrics
///
/// Uses atomic operations for thread-safe metric tracking without locks.
/// Collected by the acquisition service, the permission tracker, the scheduler and the
/// state manager; logged on shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// Hardware position calls issued (including probes)
    pub hardware_calls: AtomicU64,

    /// Requests answered from the cached position
    pub cache_hits: AtomicU64,

    /// Requests that joined an in-flight acquisition instead of starting one
    pub deduplicated_requests: AtomicU64,

    /// Acquisitions that produced a fix
    pub acquisitions_succeeded: AtomicU64,

    /// Acquisitions that failed
    pub acquisitions_failed: AtomicU64,

    /// Background probes issued by the permission tracker
    pub permission_probes: AtomicU64,

    /// Scheduler ticks that ran an acquisition
    pub scheduler_ticks: AtomicU64,

    /// Scheduler ticks skipped because of the manual override
    pub scheduler_ticks_skipped: AtomicU64,

    /// Number of state broadcasts sent
    pub state_broadcasts: AtomicU64,

    /// Total time spent waiting on the hardware, in milliseconds
    pub total_acquisition_time_ms: AtomicU64,

    /// Start time
    start_time: Instant,
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Self {
            hardware_calls: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            deduplicated_requests: AtomicU64::new(0),
            acquisitions_succeeded: AtomicU64::new(0),
            acquisitions_failed: AtomicU64::new(0),
            permission_probes: AtomicU64::new(0),
            scheduler_ticks: AtomicU64::new(0),
            scheduler_ticks_skipped: AtomicU64::new(0),
            state_broadcasts: AtomicU64::new(0),
            total_acquisition_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_hardware_call(&self) {
        self.hardware_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deduplicated(&self) {
        self.deduplicated_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a settled acquisition and how long the hardware took
    pub fn record_acquisition(&self, succeeded: bool, duration: Duration) {
        if succeeded {
            self.acquisitions_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.acquisitions_failed.fetch_add(1, Ordering::Relaxed);
        }
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.total_acquisition_time_ms.fetch_add(millis, Ordering::Relaxed);
    }

    pub fn record_probe(&self) {
        self.permission_probes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scheduler_tick(&self, skipped: bool) {
        if skipped {
            self.scheduler_ticks_skipped.fetch_add(1, Ordering::Relaxed);
        } else {
            self.scheduler_ticks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_state_broadcast(&self) {
        self.state_broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average hardware wait per settled acquisition in milliseconds
    pub fn avg_acquisition_time_ms(&self) -> f64 {
        let total = self.total_acquisition_time_ms.load(Ordering::Relaxed);
        let count = self.acquisitions_succeeded.load(Ordering::Relaxed)
            + self.acquisitions_failed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Geolocation Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Acquisitions: {} succeeded, {} failed (avg {:.0}ms), {} hardware calls",
            self.acquisitions_succeeded.load(Ordering::Relaxed),
            self.acquisitions_failed.load(Ordering::Relaxed),
            self.avg_acquisition_time_ms(),
            self.hardware_calls.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Requests: {} cache hits, {} deduplicated, {} permission probes",
            self.cache_hits.load(Ordering::Relaxed),
            self.deduplicated_requests.load(Ordering::Relaxed),
            self.permission_probes.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Scheduler: {} ticks, {} skipped; state broadcasts: {}",
            self.scheduler_ticks.load(Ordering::Relaxed),
            self.scheduler_ticks_skipped.load(Ordering::Relaxed),
            self.state_broadcasts.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.hardware_calls.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.acquisitions_failed.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_acquisitions() {
        let metrics = Metrics::new();

        metrics.record_acquisition(true, Duration::from_millis(100));
        metrics.record_acquisition(false, Duration::from_millis(300));

        assert_eq!(metrics.acquisitions_succeeded.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.acquisitions_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.avg_acquisition_time_ms(), 200.0);
    }

    #[test]
    fn test_oversized_duration_saturates() {
        let metrics = Metrics::new();
        metrics.record_acquisition(true, Duration::MAX);

        assert_eq!(metrics.total_acquisition_time_ms.load(Ordering::Relaxed), u64::MAX);
    }

    #[test]
    fn test_avg_time_without_acquisitions() {
        assert_eq!(Metrics::new().avg_acquisition_time_ms(), 0.0);
    }

    #[test]
    fn test_scheduler_counters() {
        let metrics = Metrics::new();

        metrics.record_scheduler_tick(false);
        metrics.record_scheduler_tick(true);
        metrics.record_scheduler_tick(true);

        assert_eq!(metrics.scheduler_ticks.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.scheduler_ticks_skipped.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_request_counters() {
        let metrics = Metrics::new();

        metrics.record_hardware_call();
        metrics.record_cache_hit();
        metrics.record_deduplicated();
        metrics.record_probe();
        metrics.record_state_broadcast();

        assert_eq!(metrics.hardware_calls.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.cache_hits.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.deduplicated_requests.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.permission_probes.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.state_broadcasts.load(Ordering::Relaxed), 1);
    }
}
