//! Sleep built on busy-yield tasks
//!
//! There is no timer wheel or timer thread: a sleeping task awaits a helper
//! task that keeps yielding until its deadline has passed on the scheduler's
//! clock.

use crate::error::ExecutionError;
use crate::scheduler::clock::Clock;
use crate::scheduler::execution::{Execution, Step};
use crate::scheduler::task::TaskOptions;
use crate::scheduler::Scheduler;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Execution that yields until `duration` has passed since its first resume.
pub struct SleepExecution {
    clock: Arc<dyn Clock>,
    duration: Duration,
    started: Option<Instant>,
}

impl SleepExecution {
    /// Sleep for `duration` as measured by `clock`.
    pub fn new(clock: Arc<dyn Clock>, duration: Duration) -> Self {
        Self {
            clock,
            duration,
            started: None,
        }
    }
}

impl Execution for SleepExecution {
    fn resume(&mut self) -> Result<Step, ExecutionError> {
        let now = self.clock.now();
        let started = *self.started.get_or_insert(now);
        if now.saturating_duration_since(started) < self.duration {
            Ok(Step::Suspended)
        } else {
            Ok(Step::Completed)
        }
    }
}

/// Suspend the calling task for at least `duration`.
///
/// Creates a [`SleepExecution`] task on `scheduler` when first polled and
/// awaits it. A zero duration still costs one task and one round trip
/// through the ready queue.
pub fn sleep(scheduler: &Scheduler, duration: Duration) -> impl Future<Output = ()> + Send + 'static {
    let scheduler = scheduler.clone();
    async move {
        let timer = scheduler.create_task(
            SleepExecution::new(scheduler.clock(), duration),
            TaskOptions::internal(),
        );
        timer.await;
    }
}
