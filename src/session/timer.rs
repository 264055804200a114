//! Single-slot cancellable deferred callback.
//!
//! Scheduling replaces (and aborts) whatever was pending in the slot, so at most
//! one deferred callback per purpose is ever armed. Cancellation only affects
//! the waiting phase: once the deadline passes the callback runs as its own
//! task and is allowed to finish.

use std::{
    future::Future,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::{
    task::JoinHandle,
    time::{sleep_until, Instant},
};

#[derive(Debug, Default)]
pub struct ScheduledTask {
    slot: Mutex<Option<JoinHandle<()>>>,
}

impl ScheduledTask {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arms `task` to run after `delay`, replacing any pending callback.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let deadline = Instant::now() + delay;
        let mut slot = self.lock();
        let handle = tokio::spawn(async move {
            sleep_until(deadline).await;
            tokio::spawn(task);
        });
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    /// Disarms the pending callback; returns whether one was still waiting.
    pub fn cancel(&self) -> bool {
        self.lock().take().is_some_and(|handle| {
            let armed = !handle.is_finished();
            handle.abort();
            armed
        })
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        if let Some(handle) = self.lock().take() {
            handle.abort();
        }
    }
}
