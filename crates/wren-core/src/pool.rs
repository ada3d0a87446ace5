use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

/// Bounded fire-and-forget task pool for inbound units. Spawning never
/// blocks the receive path; tasks over the limit queue on the semaphore.
#[derive(Clone)]
pub struct UnitPool {
    permits: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl UnitPool {
    pub fn new(limit: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(limit.max(1))),
            in_flight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let permits = self.permits.clone();
        let in_flight = self.in_flight.clone();
        let idle = self.idle.clone();
        tokio::spawn(async move {
            // The semaphore is never closed, so acquisition only ever waits.
            let _permit = permits.acquire().await.ok();
            fut.await;
            if in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                idle.notify_waiters();
            }
        });
    }

    /// Waits until every spawned unit task has run to completion.
    pub async fn drain(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register for the wakeup before re-checking, so a task finishing
            // in between cannot be missed.
            notified.as_mut().enable();
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}
