//! Background idle-eviction scheduler

use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Handle to the periodic sweep task.
///
/// Cancelled explicitly through [`EvictionTask::cancel`] or implicitly when
/// dropped together with the cache that owns it.
pub struct EvictionTask {
    shutdown: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
    interval: Duration,
}

impl std::fmt::Debug for EvictionTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvictionTask")
            .field("interval", &self.interval)
            .field("cancelled", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl EvictionTask {
    /// Spawn the sweep loop.
    ///
    /// `sweep` is invoked once per tick and returns `None` once the cache it
    /// serves is gone, which ends the loop. The first sweep runs one full
    /// `interval` after spawning.
    pub fn spawn<S>(interval: Duration, sweep: S) -> Self
    where
        S: Fn() -> Option<BoxFuture<'static, usize>> + Send + 'static,
    {
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(run) = sweep() else {
                            tracing::debug!("Connection cache dropped, eviction task exiting");
                            break;
                        };
                        let evicted = run.await;
                        if evicted > 0 {
                            tracing::info!(evicted, "Idle sweep closed inactive clients");
                        } else {
                            tracing::trace!("Idle sweep found nothing to evict");
                        }
                    }
                    () = token.cancelled() => {
                        tracing::debug!("Eviction task shutting down");
                        break;
                    }
                }
            }
        });

        Self {
            shutdown,
            handle: Mutex::new(Some(handle)),
            interval,
        }
    }

    /// Stop the sweep loop. Idempotent.
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Cancel and wait for the loop to finish its current sweep
    pub async fn stop(&self) {
        self.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "Eviction task ended abnormally");
        }
    }
}

impl Drop for EvictionTask {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;

    use super::*;

    fn counting_sweep(count: Arc<AtomicUsize>) -> impl Fn() -> Option<BoxFuture<'static, usize>> {
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            Some(async { 0 }.boxed())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeps_once_per_interval() {
        let count = Arc::new(AtomicUsize::new(0));
        let task = EvictionTask::spawn(Duration::from_secs(300), counting_sweep(count.clone()));

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_sweeping() {
        let count = Arc::new(AtomicUsize::new(0));
        let task = EvictionTask::spawn(Duration::from_secs(60), counting_sweep(count.clone()));

        task.stop().await;
        assert!(task.is_cancelled());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_exits_when_sweep_returns_none() {
        let task = EvictionTask::spawn(Duration::from_secs(1), || None);
        tokio::time::sleep(Duration::from_secs(2)).await;

        let handle = task.handle.lock().take().unwrap();
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_debug_impl() {
        let task = EvictionTask::spawn(Duration::from_secs(5), || None);
        let debug_str = format!("{task:?}");
        assert!(debug_str.contains("EvictionTask"));
        assert!(debug_str.contains("5s"));
    }
}
