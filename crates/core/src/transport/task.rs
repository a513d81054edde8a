//! Background loop handle shared by the consumers.

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

/// A spawned loop plus the channel that asks it to stop.
pub(crate) struct LoopHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl LoopHandle {
    pub(crate) fn spawn<F, Fut>(body: F) -> Self
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(body(shutdown_rx));
        Self { shutdown_tx, task }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the loop and wait up to `grace` for it to exit, aborting it after that.
    pub(crate) async fn stop(self, grace: Duration) {
        let _ = self.shutdown_tx.send(());

        let mut task = self.task;
        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Consumer loop ended abnormally: {}", e),
            Err(_) => {
                warn!("Consumer loop did not stop within {:?}, aborting", grace);
                task.abort();
                let _ = task.await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_stop_waits_for_loop_exit() {
        let exited = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&exited);

        let handle = LoopHandle::spawn(|mut shutdown_rx| async move {
            let _ = shutdown_rx.recv().await;
            flag.store(true, Ordering::SeqCst);
        });
        assert!(!handle.is_finished());

        handle.stop(Duration::from_secs(1)).await;
        assert!(exited.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_stop_aborts_stuck_loop() {
        let handle = LoopHandle::spawn(|_shutdown_rx| async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        let started = std::time::Instant::now();
        handle.stop(Duration::from_millis(20)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
