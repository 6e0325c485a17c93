//! Delayed-action scheduling on the tokio runtime.
//!
//! [`DelayedScheduler`] runs a closure once after a delay and can cancel it
//! before it fires. [`MeshTimer`] is a restartable one-shot on top of it:
//! starting a running timer replaces the pending action.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Identifies one posted action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// Posts one-shot delayed actions. Must be used inside a tokio runtime.
#[derive(Debug, Default)]
pub struct DelayedScheduler {
    next_id: u64,
    pending: HashMap<u64, JoinHandle<()>>,
}

impl DelayedScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` after `delay_ms` milliseconds.
    pub fn post_delayed<F>(&mut self, delay_ms: u32, action: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.pending.retain(|_, task| !task.is_finished());

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(u64::from(delay_ms))).await;
            action();
        });
        self.pending.insert(id, task);
        tracing::trace!(id, delay_ms, "delayed action posted");
        TimerHandle(id)
    }

    /// Cancel a pending action. Returns `false` if it already ran or was cancelled.
    pub fn cancel_delayed(&mut self, handle: TimerHandle) -> bool {
        match self.pending.remove(&handle.0) {
            Some(task) if !task.is_finished() => {
                task.abort();
                tracing::trace!(id = handle.0, "delayed action cancelled");
                true
            }
            _ => false,
        }
    }

    /// Number of actions posted and not yet run or cancelled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.values().filter(|t| !t.is_finished()).count()
    }
}

impl Drop for DelayedScheduler {
    fn drop(&mut self) {
        for task in self.pending.values() {
            task.abort();
        }
    }
}

/// A restartable one-shot timer.
#[derive(Debug, Default)]
pub struct MeshTimer {
    handle: Option<TimerHandle>,
}

impl MeshTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer, replacing any pending action.
    pub fn start<F>(&mut self, scheduler: &mut DelayedScheduler, delay_ms: u32, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.stop(scheduler);
        self.handle = Some(scheduler.post_delayed(delay_ms, action));
    }

    pub fn stop(&mut self, scheduler: &mut DelayedScheduler) {
        if let Some(handle) = self.handle.take() {
            scheduler.cancel_delayed(handle);
        }
    }

    /// Whether the timer was started and not stopped since.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }
}
