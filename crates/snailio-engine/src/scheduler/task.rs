//! Task structure and lifecycle state

use crate::error::ExecutionError;
use crate::scheduler::execution::{Execution, Step};
use parking_lot::Mutex;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

/// Unique identifier for a Task
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

impl TaskId {
    /// Generate a new unique TaskId
    pub fn new() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric ID value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of a Task
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Eligible for resumption
    Pending,
    /// Terminal; never resumed again
    Finished,
}

/// Why a task reached [`TaskState::Finished`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The execution ran to its end
    Completed,
    /// `cancel()` was observed before the next resumption
    Cancelled,
    /// The timeout elapsed before the next resumption
    TimedOut,
}

/// Per-task creation options.
#[derive(Debug, Clone)]
pub struct TaskOptions {
    pub(crate) name: Option<String>,
    pub(crate) timeout: Option<Duration>,
    /// Whether the scheduler's default timeout applies when `timeout` is unset
    pub(crate) inherit_default_timeout: bool,
}

impl TaskOptions {
    /// Options with no name and no timeout.
    pub fn new() -> Self {
        Self {
            name: None,
            timeout: None,
            inherit_default_timeout: true,
        }
    }

    /// Diagnostic name; defaults to `task-<id>`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Force-cancel the task once this much time has passed since it was
    /// first scheduled.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Options for scheduler-internal helper tasks, which never pick up the
    /// default timeout.
    pub(crate) fn internal() -> Self {
        Self {
            inherit_default_timeout: false,
            ..Self::new()
        }
    }
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// A unit of schedulable work
pub struct Task {
    /// Unique identifier
    id: TaskId,

    /// Diagnostic name (not unique)
    name: String,

    /// The resumable body; dropped once the task finishes
    execution: Mutex<Option<Box<dyn Execution>>>,

    /// Set exactly once, on the transition to Finished
    outcome: Mutex<Option<TaskOutcome>>,

    /// Whether this task has been cancelled
    cancelled: AtomicBool,

    /// Forced cancellation deadline, measured from `start_time`
    timeout: Option<Duration>,

    /// First time the scheduler evaluated the timeout
    start_time: Mutex<Option<Instant>>,

    /// Number of times the execution was resumed
    resume_count: AtomicU64,
}

impl Task {
    /// Create a new Pending task
    pub(crate) fn new(
        execution: Box<dyn Execution>,
        name: Option<String>,
        timeout: Option<Duration>,
    ) -> Arc<Self> {
        let id = TaskId::new();
        Arc::new(Self {
            id,
            name: name.unwrap_or_else(|| format!("task-{}", id)),
            execution: Mutex::new(Some(execution)),
            outcome: Mutex::new(None),
            cancelled: AtomicBool::new(false),
            timeout,
            start_time: Mutex::new(None),
            resume_count: AtomicU64::new(0),
        })
    }

    /// Get the Task's unique ID
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Get the Task's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current state
    pub fn state(&self) -> TaskState {
        if self.outcome.lock().is_some() {
            TaskState::Finished
        } else {
            TaskState::Pending
        }
    }

    /// Whether the task reached Finished
    pub fn is_done(&self) -> bool {
        self.state() == TaskState::Finished
    }

    /// Why the task finished, or `None` while it is still Pending
    pub fn outcome(&self) -> Option<TaskOutcome> {
        *self.outcome.lock()
    }

    /// Cancel this task. Takes effect at its next scheduling cycle.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if this task has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Configured timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// When the scheduler first evaluated this task's timeout
    pub fn start_time(&self) -> Option<Instant> {
        *self.start_time.lock()
    }

    /// Number of times the execution was resumed
    pub fn resume_count(&self) -> u64 {
        self.resume_count.load(Ordering::Relaxed)
    }

    /// Record `now` as the start time unless one is already set.
    /// Returns the (possibly earlier) start time.
    pub(crate) fn mark_started(&self, now: Instant) -> Instant {
        *self.start_time.lock().get_or_insert(now)
    }

    /// Resume the execution for one step.
    pub(crate) fn resume(&self) -> Result<Step, ExecutionError> {
        let mut slot = self.execution.lock();
        let Some(execution) = slot.as_mut() else {
            // Already finished; nothing left to run.
            return Ok(Step::Completed);
        };

        self.resume_count.fetch_add(1, Ordering::Relaxed);
        let step = execution.resume();
        if !matches!(step, Ok(Step::Suspended)) {
            *slot = None;
        }
        step
    }

    /// Transition to Finished. Returns false if the task was already finished.
    pub(crate) fn finish(&self, outcome: TaskOutcome) -> bool {
        {
            let mut current = self.outcome.lock();
            if current.is_some() {
                return false;
            }
            *current = Some(outcome);
        }
        // Drop the execution outside the outcome lock; its destructor may
        // touch other tasks.
        let execution = self.execution.lock().take();
        drop(execution);
        true
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("outcome", &self.outcome())
            .field("cancelled", &self.is_cancelled())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Handle to a scheduled task.
///
/// Cheap to clone. Awaiting a handle (or a reference to one) suspends the
/// awaiting task until this one is done, whatever the reason it finished.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    task: Arc<Task>,
}

impl TaskHandle {
    pub(crate) fn new(task: Arc<Task>) -> Self {
        Self { task }
    }

    /// Get the task ID
    pub fn id(&self) -> TaskId {
        self.task.id()
    }

    /// Get the task name
    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// Get the current state
    pub fn state(&self) -> TaskState {
        self.task.state()
    }

    /// Whether the task reached Finished
    pub fn is_done(&self) -> bool {
        self.task.is_done()
    }

    /// Why the task finished
    pub fn outcome(&self) -> Option<TaskOutcome> {
        self.task.outcome()
    }

    /// Request cancellation; idempotent, and a no-op once finished.
    pub fn cancel(&self) {
        self.task.cancel();
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.task.is_cancelled()
    }

    /// Configured timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.task.timeout()
    }

    /// When the timeout window started
    pub fn start_time(&self) -> Option<Instant> {
        self.task.start_time()
    }

    /// Number of times the execution was resumed
    pub fn resume_count(&self) -> u64 {
        self.task.resume_count()
    }

    /// Future that resolves once the task is done.
    pub fn join(&self) -> Join {
        Join {
            task: self.task.clone(),
        }
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task name={}, done={}", self.name(), self.is_done())
    }
}

impl IntoFuture for TaskHandle {
    type Output = ();
    type IntoFuture = Join;

    fn into_future(self) -> Join {
        Join { task: self.task }
    }
}

impl IntoFuture for &TaskHandle {
    type Output = ();
    type IntoFuture = Join;

    fn into_future(self) -> Join {
        self.join()
    }
}

/// Future returned by awaiting a [`TaskHandle`].
///
/// Busy-waits: every poll before the task is done yields the awaiting task
/// back to the ready queue.
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct Join {
    task: Arc<Task>,
}

impl Future for Join {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.task.is_done() {
            Poll::Ready(())
        } else {
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}
