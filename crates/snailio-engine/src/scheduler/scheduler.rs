//! Event loop driving tasks to completion

use crate::error::{ExecutionError, SchedulerError, SchedulerResult};
use crate::scheduler::clock::{Clock, SystemClock};
use crate::scheduler::execution::{Execution, FutureExecution, Step};
use crate::scheduler::task::{Task, TaskHandle, TaskOptions, TaskOutcome};
use crossbeam_deque::{Injector, Steal};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scheduler configuration
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfig {
    /// Timeout applied to tasks created without one (None = no timeout)
    pub default_task_timeout: Option<Duration>,

    /// Abort `run` after this many scheduling cycles (None = unlimited)
    pub max_cycles: Option<u64>,
}

/// Scheduler statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Total tasks created, root tasks included
    pub tasks_spawned: u64,

    /// Tasks whose execution ran to the end
    pub tasks_completed: u64,

    /// Tasks finished by explicit cancellation
    pub tasks_cancelled: u64,

    /// Tasks finished because their timeout fired
    pub tasks_timed_out: u64,

    /// Scheduling cycles performed (one per dequeue)
    pub cycles: u64,

    /// Execution steps performed
    pub resumptions: u64,

    /// Tasks currently in the ready queue
    pub active_tasks: usize,
}

#[derive(Default)]
struct Counters {
    spawned: AtomicU64,
    completed: AtomicU64,
    cancelled: AtomicU64,
    timed_out: AtomicU64,
    cycles: AtomicU64,
    resumptions: AtomicU64,
}

struct Shared {
    /// FIFO ready queue; pushed from any handle, popped only by the loop
    queue: Injector<Arc<Task>>,
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    counters: Counters,
    running: AtomicBool,
}

/// Single-threaded cooperative scheduler.
///
/// Cloning yields another handle to the same loop. Executions that need to
/// create tasks capture a clone; nothing is reachable through globals.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

/// Clears the running flag when `run` returns or unwinds.
/// Marks the loop as stopped on every exit path, including unwinding.
struct RunGuard<'a>(&'a Scheduler);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let dropped = self.0.clear_queue();
            log::debug!("scheduler loop panicked, dropped {} queued tasks", dropped);
        }
        self.0.shared.running.store(false, Ordering::Release);
    }
}

impl Scheduler {
    /// Create a scheduler with the default configuration and the system clock
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Create a scheduler with a custom configuration
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a scheduler reading time from `clock`
    pub fn with_clock(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Injector::new(),
                config,
                clock,
                counters: Counters::default(),
                running: AtomicBool::new(false),
            }),
        }
    }

    /// Configuration this scheduler was built with
    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Clock used for timeouts and sleeps
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.shared.clock.clone()
    }

    /// Whether the loop is currently running
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Number of tasks waiting in the ready queue
    pub fn pending_count(&self) -> usize {
        self.shared.queue.len()
    }

    /// Create a task and append it to the ready queue
    pub fn create_task<E>(&self, execution: E, options: TaskOptions) -> TaskHandle
    where
        E: Execution + 'static,
    {
        let timeout = options.timeout.or(if options.inherit_default_timeout {
            self.shared.config.default_task_timeout
        } else {
            None
        });
        let task = Task::new(Box::new(execution), options.name, timeout);
        log::trace!("created task {} ({:?})", task.name(), task.id());

        self.shared.counters.spawned.fetch_add(1, Ordering::Relaxed);
        self.shared.queue.push(task.clone());
        TaskHandle::new(task)
    }

    /// Create a task from a future
    pub fn spawn<F>(&self, future: F, options: TaskOptions) -> TaskHandle
    where
        F: Future<Output = Result<(), ExecutionError>> + Send + 'static,
    {
        self.create_task(FutureExecution::new(future), options)
    }

    /// Run `main` as the root task until every task has finished
    pub fn run<E>(&self, main: E) -> SchedulerResult<()>
    where
        E: Execution + 'static,
    {
        if self
            .shared
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SchedulerError::AlreadyRunning);
        }
        let _guard = RunGuard(self);

        let root = Task::new(Box::new(main), Some("main".to_string()), None);
        self.shared.counters.spawned.fetch_add(1, Ordering::Relaxed);
        self.shared.queue.push(root);

        log::debug!("scheduler loop started");
        let result = self.drive();
        if let Err(e) = &result {
            let dropped = self.clear_queue();
            log::debug!("scheduler loop aborted ({}), dropped {} queued tasks", e, dropped);
        } else {
            log::debug!("scheduler loop drained");
        }
        result
    }

    /// Run a future as the root task until every task has finished
    pub fn block_on<F>(&self, future: F) -> SchedulerResult<()>
    where
        F: Future<Output = Result<(), ExecutionError>> + Send + 'static,
    {
        self.run(FutureExecution::new(future))
    }

    /// Get scheduler statistics
    pub fn stats(&self) -> SchedulerStats {
        let c = &self.shared.counters;
        SchedulerStats {
            tasks_spawned: c.spawned.load(Ordering::Relaxed),
            tasks_completed: c.completed.load(Ordering::Relaxed),
            tasks_cancelled: c.cancelled.load(Ordering::Relaxed),
            tasks_timed_out: c.timed_out.load(Ordering::Relaxed),
            cycles: c.cycles.load(Ordering::Relaxed),
            resumptions: c.resumptions.load(Ordering::Relaxed),
            active_tasks: self.pending_count(),
        }
    }

    fn pop(&self) -> Option<Arc<Task>> {
        loop {
            match self.shared.queue.steal() {
                Steal::Success(task) => return Some(task),
                Steal::Empty => return None,
                Steal::Retry => continue,
            }
        }
    }

    fn clear_queue(&self) -> usize {
        let mut dropped = 0;
        while self.pop().is_some() {
            dropped += 1;
        }
        dropped
    }

    fn drive(&self) -> SchedulerResult<()> {
        let mut cycles: u64 = 0;
        while let Some(task) = self.pop() {
            if let Some(limit) = self.shared.config.max_cycles {
                if cycles >= limit {
                    return Err(SchedulerError::CycleLimitExceeded { limit });
                }
            }
            cycles += 1;
            self.shared.counters.cycles.fetch_add(1, Ordering::Relaxed);
            self.cycle(task)?;
        }
        Ok(())
    }

    /// One dequeue-evaluate-resume-requeue pass over `task`
    fn cycle(&self, task: Arc<Task>) -> SchedulerResult<()> {
        let counters = &self.shared.counters;

        if task.is_cancelled() {
            if task.finish(TaskOutcome::Cancelled) {
                counters.cancelled.fetch_add(1, Ordering::Relaxed);
                log::trace!("task {} cancelled", task.name());
            }
            return Ok(());
        }

        if let Some(timeout) = task.timeout() {
            let now = self.shared.clock.now();
            let started = task.mark_started(now);
            if now.saturating_duration_since(started) >= timeout {
                task.cancel();
                if task.finish(TaskOutcome::TimedOut) {
                    counters.timed_out.fetch_add(1, Ordering::Relaxed);
                    eprintln!("{}", timeout_diagnostic(task.name(), timeout));
                    log::debug!("task {} timed out after {:?}", task.name(), timeout);
                }
                return Ok(());
            }
        }

        counters.resumptions.fetch_add(1, Ordering::Relaxed);
        match task.resume() {
            Ok(Step::Completed) => {
                if task.finish(TaskOutcome::Completed) {
                    counters.completed.fetch_add(1, Ordering::Relaxed);
                    log::trace!("task {} completed", task.name());
                }
                Ok(())
            }
            Ok(Step::Suspended) => {
                self.shared.queue.push(task);
                Ok(())
            }
            Err(source) => Err(SchedulerError::TaskFailed {
                name: task.name().to_string(),
                source,
            }),
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.shared.config)
            .field("running", &self.is_running())
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// Line written to stderr when a task's timeout fires
pub(crate) fn timeout_diagnostic(name: &str, timeout: Duration) -> String {
    format!(
        "Task {} cancelled: timeout of {}s exceeded",
        name,
        timeout.as_secs_f64()
    )
}
