//! Cancellable scheduled tasks.
//!
//! Every delayed action in the kiosk (capture arm, cooldown, reset) is a
//! [`ScheduledTask`]: a spawned tokio task whose handle is owned by the
//! component that scheduled it. Dropping or cancelling the handle aborts the
//! task, so a timer can never outlive the session data it was armed for.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Owned handle to a spawned, abortable task.
#[derive(Debug)]
pub struct ScheduledTask {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Run `fut` on the runtime immediately.
    pub fn spawn<F>(name: &'static str, fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            name,
            handle: Some(tokio::spawn(fut)),
        }
    }

    /// Run `fut` once `delay` has elapsed.
    pub fn after<F>(name: &'static str, delay: Duration, fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::trace!(task = name, delay_ms = delay.as_millis() as u64, "timer armed");
        Self::spawn(name, async move {
            tokio::time::sleep(delay).await;
            fut.await;
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the task has run to completion (or was cancelled).
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Abort the task. Returns `true` if it had not finished yet.
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                tracing::trace!(task = self.name, "timer cancelled");
                true
            }
            _ => false,
        }
    }

    /// Abort the task and wait until its future has been dropped.
    ///
    /// Anything the task owned (a camera handle, for instance) is released
    /// by the time this returns.
    pub async fn cancel_and_wait(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    /// Wait for the task to finish on its own.
    pub async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
