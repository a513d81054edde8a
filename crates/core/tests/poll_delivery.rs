//! Poll consumer integration tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use contentgate_core::{
    testing::{FlakyStore, ManualClock},
    Clock, Consumer, ContentRules, PollConsumer, SqliteSubmissionStore, StatusUpdate,
    SubmissionProcessor, SubmissionStatus, SubmissionStore,
};

async fn wait_for_status(store: &SqliteSubmissionStore, id: &str, status: SubmissionStatus) -> bool {
    for _ in 0..500 {
        if store.get(id).unwrap().map(|s| s.status) == Some(status) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_poll_reclaims_expired_lease() {
    let store = Arc::new(SqliteSubmissionStore::in_memory().unwrap());
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
    let processor = Arc::new(
        SubmissionProcessor::new(store.clone(), Arc::new(ContentRules::default()))
            .with_clock(Arc::new(clock.clone())),
    );
    let consumer = PollConsumer::new(store.clone(), processor, Duration::from_millis(10));

    // Left behind by a worker that died mid-processing
    let stuck = store.create("abcdefgh1i").unwrap();
    store
        .update_status(&stuck.id, StatusUpdate::processing(clock.now()))
        .unwrap();

    consumer.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        store.get(&stuck.id).unwrap().unwrap().status,
        SubmissionStatus::Processing
    );

    clock.advance(chrono::Duration::minutes(6));
    assert!(wait_for_status(&store, &stuck.id, SubmissionStatus::Passed).await);

    consumer.shutdown().await;
}

#[tokio::test]
async fn test_poll_keeps_going_after_processing_errors() {
    let store = Arc::new(SqliteSubmissionStore::in_memory().unwrap());
    let flaky = Arc::new(FlakyStore::new(store.clone() as Arc<dyn SubmissionStore>));
    flaky.fail_gets(3);
    let processor = Arc::new(SubmissionProcessor::new(
        flaky.clone(),
        Arc::new(ContentRules::default()),
    ));
    let consumer = PollConsumer::new(flaky, processor, Duration::from_millis(10));

    let submission = store.create("abcdefgh1i").unwrap();
    consumer.start().await.unwrap();

    assert!(wait_for_status(&store, &submission.id, SubmissionStatus::Passed).await);
    assert!(consumer.is_running());

    consumer.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_scanning() {
    let store = Arc::new(SqliteSubmissionStore::in_memory().unwrap());
    let processor = Arc::new(SubmissionProcessor::new(
        store.clone(),
        Arc::new(ContentRules::default()),
    ));
    let consumer = PollConsumer::new(store.clone(), processor, Duration::from_millis(10));

    consumer.start().await.unwrap();
    consumer.shutdown().await;

    let submission = store.create("abcdefgh1i").unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        store.get(&submission.id).unwrap().unwrap().status,
        SubmissionStatus::Pending
    );
}
