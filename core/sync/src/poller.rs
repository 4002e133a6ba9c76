//! Periodic list refresh with cancellation.
//!
//! A poller runs one fetch per tick and publishes the latest result on a
//! watch channel. It never retries inside a tick; the next tick is the
//! retry. It stops when its token fires, when every receiver is gone, or
//! when the server rejects the session.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cipherkeep_common::{Error, Result};

/// Result of one fetch: the request outcome, then one outcome per record.
pub type Snapshot<T> = Arc<Result<Vec<Result<T>>>>;

/// Why a poller stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The cancellation token fired.
    Cancelled,
    /// The server rejected the session; the user must sign in again.
    Unauthorized,
    /// Every receiver was dropped.
    Closed,
}

/// Background refresher for one record list.
pub struct ListPoller {
    interval: Duration,
    cancel: CancellationToken,
}

impl ListPoller {
    /// Create a poller ticking every `interval` until `cancel` fires.
    pub fn new(interval: Duration, cancel: CancellationToken) -> Self {
        Self { interval, cancel }
    }

    /// Spawn the polling task.
    ///
    /// The receiver holds `None` until the first fetch completes.
    pub fn spawn<T, F, Fut>(
        self,
        fetch: F,
    ) -> (watch::Receiver<Option<Snapshot<T>>>, JoinHandle<PollOutcome>)
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Result<T>>>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(None);
        let handle = tokio::spawn(self.run(fetch, tx));
        (rx, handle)
    }

    /// Run the polling loop on the current task.
    pub async fn run<T, F, Fut>(
        self,
        fetch: F,
        tx: watch::Sender<Option<Snapshot<T>>>,
    ) -> PollOutcome
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Vec<Result<T>>>>,
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_ms = self.interval.as_millis() as u64, "List poller started");

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    info!("List poller cancelled");
                    return PollOutcome::Cancelled;
                }
                _ = tx.closed() => {
                    debug!("List poller has no receivers");
                    return PollOutcome::Closed;
                }
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    info!("List poller cancelled during fetch");
                    return PollOutcome::Cancelled;
                }
                result = fetch() => result,
            };

            let unauthorized = matches!(result, Err(Error::Unauthorized));
            match &result {
                Ok(records) => {
                    let failed = records.iter().filter(|r| r.is_err()).count();
                    debug!(records = records.len(), failed, "List refreshed");
                }
                Err(e) => warn!(error = %e, "List refresh failed"),
            }

            if tx.send(Some(Arc::new(result))).is_err() {
                return PollOutcome::Closed;
            }

            if unauthorized {
                warn!("Session rejected, list poller stopping");
                return PollOutcome::Unauthorized;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_publishes_until_cancelled() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let poller = ListPoller::new(Duration::from_millis(5), cancel.clone());
        let (mut rx, handle) = poller.spawn(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(vec![Ok(n)]) }
        });

        for _ in 0..3 {
            rx.changed().await.unwrap();
        }
        let snapshot = rx.borrow().clone().unwrap();
        assert_eq!((*snapshot).as_ref().unwrap().len(), 1);

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), PollOutcome::Cancelled);
        assert!(calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_stops_on_unauthorized() {
        let poller = ListPoller::new(Duration::from_millis(5), CancellationToken::new());
        let (rx, handle) =
            poller.spawn(|| async { Err::<Vec<Result<u8>>, _>(Error::Unauthorized) });

        assert_eq!(handle.await.unwrap(), PollOutcome::Unauthorized);
        let snapshot = rx.borrow().clone().unwrap();
        assert!(matches!(&*snapshot, Err(Error::Unauthorized)));
    }

    #[tokio::test]
    async fn test_transport_errors_keep_polling() {
        let cancel = CancellationToken::new();
        let poller = ListPoller::new(Duration::from_millis(5), cancel.clone());
        let (mut rx, handle) = poller.spawn(|| async {
            Err::<Vec<Result<u8>>, _>(Error::Transport("connection refused".into()))
        });

        rx.changed().await.unwrap();
        rx.changed().await.unwrap();
        assert!(!handle.is_finished());

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), PollOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_stops_when_receiver_dropped() {
        let poller = ListPoller::new(Duration::from_millis(5), CancellationToken::new());
        let (rx, handle) = poller.spawn(|| async { Ok(Vec::<Result<u8>>::new()) });
        drop(rx);

        assert_eq!(handle.await.unwrap(), PollOutcome::Closed);
    }
}
