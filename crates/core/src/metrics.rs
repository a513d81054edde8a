//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Intake (submissions created, broker publishes)
//! - Processor (outcomes, lease resets)
//! - Consumers (commits, redeliveries, poll scans, running state)

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Intake Metrics
// =============================================================================

/// Submissions accepted by intake.
pub static SUBMISSIONS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "contentgate_submissions_created_total",
        "Total submissions accepted by intake",
    )
    .unwrap()
});

/// Broker publishes by result.
pub static BROKER_PUBLISHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "contentgate_broker_publishes_total",
            "Total broker publish attempts",
        ),
        &["result"], // "success", "retry", "failure"
    )
    .unwrap()
});

// =============================================================================
// Processor Metrics
// =============================================================================

/// Processing outcomes by result.
pub static PROCESS_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "contentgate_process_outcomes_total",
            "Total submission processing outcomes",
        ),
        &["result"], // "passed", "failed", "skipped", "not_found", "error"
    )
    .unwrap()
});

/// Submissions reclaimed after their processing lease expired.
pub static LEASE_RESETS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "contentgate_lease_resets_total",
        "Total expired processing leases reset to pending",
    )
    .unwrap()
});

// =============================================================================
// Consumer Metrics
// =============================================================================

/// Broker offsets committed after successful processing.
pub static BROKER_COMMITS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "contentgate_broker_commits_total",
        "Total broker offsets committed",
    )
    .unwrap()
});

/// Broker messages left uncommitted for redelivery.
pub static BROKER_REDELIVERIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "contentgate_broker_redeliveries_total",
        "Total broker messages rewound for redelivery",
    )
    .unwrap()
});

/// Poll consumer scans of the store.
pub static POLL_SCANS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "contentgate_poll_scans_total",
        "Total pending-submission scans by the poll consumer",
    )
    .unwrap()
});

/// 1 while a consumer loop is running.
pub static CONSUMER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "contentgate_consumer_running",
        "Whether the consumer loop is running",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Intake
        Box::new(SUBMISSIONS_CREATED.clone()),
        Box::new(BROKER_PUBLISHES.clone()),
        // Processor
        Box::new(PROCESS_OUTCOMES.clone()),
        Box::new(LEASE_RESETS.clone()),
        // Consumers
        Box::new(BROKER_COMMITS.clone()),
        Box::new(BROKER_REDELIVERIES.clone()),
        Box::new(POLL_SCANS.clone()),
        Box::new(CONSUMER_RUNNING.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register_without_collisions() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
    }

    #[test]
    fn test_outcome_labels() {
        let before = PROCESS_OUTCOMES.with_label_values(&["skipped"]).get();
        PROCESS_OUTCOMES.with_label_values(&["skipped"]).inc();
        assert!(PROCESS_OUTCOMES.with_label_values(&["skipped"]).get() > before);
    }
}
