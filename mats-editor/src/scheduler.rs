//! Single-slot coalescing scheduler.
//!
//! Each logical resource (layout persistence, technique autosave) owns one
//! scheduler. `schedule` replaces the pending snapshot and re-arms the timer;
//! only the latest snapshot is ever handed to the job. `flush` runs the
//! pending snapshot immediately and `cancel` drops it.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

type Job<T> = Arc<dyn Fn(T) -> BoxFuture<'static, ()> + Send + Sync>;

struct Slot<T> {
    generation: u64,
    value: Option<T>,
}

pub struct CoalescingScheduler<T> {
    name: &'static str,
    delay: Duration,
    job: Job<T>,
    slot: Arc<Mutex<Slot<T>>>,
}

fn lock<T>(slot: &Mutex<Slot<T>>) -> MutexGuard<'_, Slot<T>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T: Send + 'static> CoalescingScheduler<T> {
    pub fn new<F, Fut>(name: &'static str, delay: Duration, job: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            name,
            delay,
            job: Arc::new(move |value| Box::pin(job(value))),
            slot: Arc::new(Mutex::new(Slot {
                generation: 0,
                value: None,
            })),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace the pending snapshot and restart the debounce window.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, value: T) {
        let generation = {
            let mut slot = lock(&self.slot);
            slot.generation += 1;
            slot.value = Some(value);
            slot.generation
        };

        let slot = Arc::clone(&self.slot);
        let job = Arc::clone(&self.job);
        let delay = self.delay;
        let name = self.name;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let value = {
                let mut slot = lock(&slot);
                // A newer schedule, flush or cancel superseded this timer.
                if slot.generation != generation {
                    return;
                }
                slot.value.take()
            };
            if let Some(value) = value {
                tracing::trace!(scheduler = name, "Debounce window elapsed, running job");
                job(value).await;
            }
        });
    }

    /// Run the pending snapshot now, if any. Returns whether a job ran.
    pub async fn flush(&self) -> bool {
        let value = {
            let mut slot = lock(&self.slot);
            slot.generation += 1;
            slot.value.take()
        };
        match value {
            Some(value) => {
                tracing::trace!(scheduler = self.name, "Flushing pending job");
                (self.job)(value).await;
                true
            }
            None => false,
        }
    }

    /// Drop the pending snapshot without running it.
    pub fn cancel(&self) {
        self.take();
    }

    /// Disarm the timer and hand the pending snapshot to the caller.
    pub fn take(&self) -> Option<T> {
        let mut slot = lock(&self.slot);
        slot.generation += 1;
        slot.value.take()
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.slot).value.is_some()
    }
}
