//! Store-polling producer and consumer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::metrics::POLL_SCANS;
use crate::processor::SubmissionProcessor;
use crate::submission::{
    Submission, SubmissionError, SubmissionFilter, SubmissionStatus, SubmissionStore,
};

use super::task::LoopHandle;
use super::traits::{Consumer, Producer};
use super::types::TransportError;

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Upper bound on PROCESSING records revisited per scan.
const LEASE_SWEEP_LIMIT: i64 = 1000;

/// The poll consumer discovers submissions on its own, so publishing is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct PollProducer;

impl PollProducer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Producer for PollProducer {
    fn name(&self) -> &str {
        "poll"
    }

    async fn produce(&self, id: &str, _content: &str) -> Result<(), TransportError> {
        debug!("[{}] Left for the poll consumer", id);
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Periodically scans the store and processes what it finds.
///
/// Each scan visits every PENDING record oldest first, then every PROCESSING
/// record whose lease expired, so crashed work is reclaimed without a
/// redelivery. Assumes a single poll consumer per database.
pub struct PollConsumer {
    store: Arc<dyn SubmissionStore>,
    processor: Arc<SubmissionProcessor>,
    interval: Duration,
    shutdown_grace: Duration,
    handle: Mutex<Option<LoopHandle>>,
}

impl PollConsumer {
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        processor: Arc<SubmissionProcessor>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            processor,
            interval,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            handle: Mutex::new(None),
        }
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    fn state(&self) -> MutexGuard<'_, Option<LoopHandle>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn poll_loop(
        store: Arc<dyn SubmissionStore>,
        processor: Arc<SubmissionProcessor>,
        interval: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!("Poll consumer loop started (interval {:?})", interval);
        loop {
            if Self::scan(store.as_ref(), &processor, &mut shutdown_rx).await {
                info!("Poll consumer loop received shutdown signal");
                break;
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Poll consumer loop received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
        info!("Poll consumer loop stopped");
    }

    /// PENDING records oldest first, then PROCESSING records whose lease ran out.
    fn due(
        store: &dyn SubmissionStore,
        processor: &SubmissionProcessor,
    ) -> Result<Vec<Submission>, SubmissionError> {
        let mut due = store.list_pending()?;
        if !due.is_empty() {
            debug!("Found {} pending submissions", due.len());
        }

        match store.list(
            &SubmissionFilter::new()
                .with_status(SubmissionStatus::Processing)
                .with_limit(LEASE_SWEEP_LIMIT),
        ) {
            Ok(in_flight) => {
                let expired: Vec<Submission> = in_flight
                    .into_iter()
                    .filter(|s| processor.is_lease_expired(s))
                    .collect();
                if !expired.is_empty() {
                    debug!("Found {} expired leases", expired.len());
                }
                due.extend(expired);
            }
            Err(e) => warn!("Failed to list in-flight submissions: {}", e),
        }

        Ok(due)
    }

    /// One pass over the store. Returns true if shutdown was requested mid-scan.
    async fn scan(
        store: &dyn SubmissionStore,
        processor: &SubmissionProcessor,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> bool {
        POLL_SCANS.inc();

        let due = match Self::due(store, processor) {
            Ok(due) => due,
            Err(e) => {
                warn!("Failed to list pending submissions: {}", e);
                return false;
            }
        };

        for submission in &due {
            if !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty)) {
                return true;
            }
            processor.process(&submission.id, &submission.content);
            tokio::task::yield_now().await;
        }

        false
    }
}

#[async_trait]
impl Consumer for PollConsumer {
    fn name(&self) -> &str {
        "poll"
    }

    async fn start(&self) -> Result<(), TransportError> {
        let mut state = self.state();
        if state.as_ref().is_some_and(|h| !h.is_finished()) {
            warn!("Poll consumer already running");
            return Ok(());
        }

        let store = Arc::clone(&self.store);
        let processor = Arc::clone(&self.processor);
        let interval = self.interval;
        *state = Some(LoopHandle::spawn(move |shutdown_rx| {
            Self::poll_loop(store, processor, interval, shutdown_rx)
        }));

        info!("Poll consumer started");
        Ok(())
    }

    async fn shutdown(&self) {
        let handle = self.state().take();
        let Some(handle) = handle else {
            warn!("Poll consumer not running");
            return;
        };

        handle.stop(self.shutdown_grace).await;
        info!("Poll consumer shut down");
    }

    fn is_running(&self) -> bool {
        self.state().as_ref().is_some_and(|h| !h.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::submission::{SqliteSubmissionStore, StatusUpdate};
    use crate::testing::ManualClock;
    use crate::validator::ContentRules;
    use chrono::{TimeZone, Utc};

    fn consumer(store: Arc<SqliteSubmissionStore>) -> PollConsumer {
        let processor = Arc::new(SubmissionProcessor::new(
            store.clone(),
            Arc::new(ContentRules::default()),
        ));
        PollConsumer::new(store, processor, Duration::from_millis(10))
    }

    async fn wait_for_status(
        store: &SqliteSubmissionStore,
        id: &str,
        status: SubmissionStatus,
    ) -> bool {
        for _ in 0..500 {
            if store.get(id).unwrap().map(|s| s.status) == Some(status) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_poll_producer_is_noop() {
        let producer = PollProducer::new();
        assert!(producer.is_available());
        assert!(producer.produce("sub-1", "anything").await.is_ok());
    }

    #[tokio::test]
    async fn test_processes_pending_submissions() {
        let store = Arc::new(SqliteSubmissionStore::in_memory().unwrap());
        let good = store.create("abcdefgh1i").unwrap();
        let bad = store.create("too short").unwrap();

        let consumer = consumer(store.clone());
        consumer.start().await.unwrap();
        assert!(consumer.is_running());

        assert!(wait_for_status(&store, &good.id, SubmissionStatus::Passed).await);
        assert!(wait_for_status(&store, &bad.id, SubmissionStatus::Failed).await);

        // Picks up submissions created after start
        let late = store.create("late arrival 7").unwrap();
        assert!(wait_for_status(&store, &late.id, SubmissionStatus::Passed).await);

        consumer.shutdown().await;
        assert!(!consumer.is_running());
    }

    #[tokio::test]
    async fn test_repeated_start_and_shutdown_are_harmless() {
        let store = Arc::new(SqliteSubmissionStore::in_memory().unwrap());
        let consumer = consumer(store);

        consumer.shutdown().await;
        consumer.start().await.unwrap();
        consumer.start().await.unwrap();
        assert!(consumer.is_running());
        consumer.shutdown().await;
        consumer.shutdown().await;
        assert!(!consumer.is_running());

        // Restartable
        consumer.start().await.unwrap();
        assert!(consumer.is_running());
        consumer.shutdown().await;
    }

    #[test]
    fn test_scan_skips_live_leases() {
        let store = Arc::new(SqliteSubmissionStore::in_memory().unwrap());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        let processor = SubmissionProcessor::new(store.clone(), Arc::new(ContentRules::default()))
            .with_clock(Arc::new(clock.clone()));

        let stale = store.create("abcdefgh1i").unwrap();
        store
            .update_status(&stale.id, StatusUpdate::processing(clock.now()))
            .unwrap();
        clock.advance(chrono::Duration::minutes(4));
        let live = store.create("abcdefgh2i").unwrap();
        store
            .update_status(&live.id, StatusUpdate::processing(clock.now()))
            .unwrap();
        let pending = store.create("abcdefgh3i").unwrap();

        let ids = |due: Vec<Submission>| due.into_iter().map(|s| s.id).collect::<Vec<_>>();

        let due = PollConsumer::due(store.as_ref(), &processor).unwrap();
        assert_eq!(ids(due), vec![pending.id.clone()]);

        clock.advance(chrono::Duration::minutes(2));
        let due = PollConsumer::due(store.as_ref(), &processor).unwrap();
        assert_eq!(ids(due), vec![pending.id.clone(), stale.id.clone()]);

        clock.advance(chrono::Duration::minutes(4));
        let due = PollConsumer::due(store.as_ref(), &processor).unwrap();
        assert_eq!(ids(due), vec![pending.id, live.id, stale.id]);
    }
}
