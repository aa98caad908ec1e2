//! Owned timers.
//!
//! Each repeating check, countdown and delayed action is a [`TimerHandle`]
//! wrapping one tokio task. Dropping the handle (or calling `cancel`) aborts
//! the task, so clearing a component's timers is just a matter of dropping
//! the fields that hold them. Under a paused tokio clock these timers advance
//! deterministically with virtual time.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Handle to a spawned timer task. Aborts the task on drop.
#[derive(Debug)]
pub struct TimerHandle {
    task: Option<JoinHandle<()>>,
}

impl TimerHandle {
    /// Run `tick` every `period`, first firing one period from now.
    /// The timer ends on its own when `tick` returns `false`.
    pub fn every<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !tick().await {
                    break;
                }
            }
        });
        Self { task: Some(task) }
    }

    /// Run `action` once after `delay`.
    pub fn after<Fut>(delay: Duration, action: Fut) -> Self
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        });
        Self { task: Some(task) }
    }

    /// Wrap an arbitrary task so it is aborted with the handle.
    pub fn spawn<Fut>(work: Fut) -> Self
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            task: Some(tokio::spawn(work)),
        }
    }

    /// True while the task has neither finished nor been cancelled.
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// `Option<TimerHandle>` helper: active only if present and still running.
pub(crate) fn is_running(slot: &Option<TimerHandle>) -> bool {
    slot.as_ref().is_some_and(TimerHandle::is_active)
}
