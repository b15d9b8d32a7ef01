//! Pool counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct MetricsRecorder {
    acquires: AtomicU64,
    acquires_failed: AtomicU64,
    releases: AtomicU64,
    probes: AtomicU64,
    probes_failed: AtomicU64,
    reconnects: AtomicU64,
}

impl MetricsRecorder {
    pub(crate) fn acquired(&self) {
        self.acquires.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn acquire_failed(&self) {
        self.acquires_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn released(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn probed(&self, healthy: bool) {
        self.probes.fetch_add(1, Ordering::Relaxed);
        if !healthy {
            self.probes_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn reconnected(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PoolMetrics {
        PoolMetrics {
            acquires: self.acquires.load(Ordering::Relaxed),
            acquires_failed: self.acquires_failed.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            probes: self.probes.load(Ordering::Relaxed),
            probes_failed: self.probes_failed.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of pool activity since it was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    /// Successful acquires.
    pub acquires: u64,
    /// Acquires that returned an error.
    pub acquires_failed: u64,
    /// Borrows returned to the pool.
    pub releases: u64,
    /// Liveness probes sent to idle clients.
    pub probes: u64,
    /// Liveness probes that failed.
    pub probes_failed: u64,
    /// Clients replaced after a failed probe.
    pub reconnects: u64,
}

impl PoolMetrics {
    /// Fraction of acquires that succeeded, 1.0 when none were attempted.
    #[must_use]
    pub fn acquire_success_rate(&self) -> f64 {
        let total = self.acquires + self.acquires_failed;
        if total == 0 {
            1.0
        } else {
            self.acquires as f64 / total as f64
        }
    }

    /// Borrows that have not been returned yet.
    #[must_use]
    pub fn outstanding(&self) -> u64 {
        self.acquires.saturating_sub(self.releases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let recorder = MetricsRecorder::default();
        recorder.acquired();
        recorder.acquired();
        recorder.released();
        recorder.probed(true);
        recorder.probed(false);
        recorder.reconnected();
        recorder.acquire_failed();

        let metrics = recorder.snapshot();
        assert_eq!(metrics.acquires, 2);
        assert_eq!(metrics.acquires_failed, 1);
        assert_eq!(metrics.releases, 1);
        assert_eq!(metrics.probes, 2);
        assert_eq!(metrics.probes_failed, 1);
        assert_eq!(metrics.reconnects, 1);
        assert_eq!(metrics.outstanding(), 1);
    }

    #[test]
    fn test_success_rate() {
        assert!((PoolMetrics::default().acquire_success_rate() - 1.0).abs() < f64::EPSILON);

        let metrics = PoolMetrics {
            acquires: 3,
            acquires_failed: 1,
            ..PoolMetrics::default()
        };
        assert!((metrics.acquire_success_rate() - 0.75).abs() < f64::EPSILON);
    }
}
