//! Task scheduler: single-threaded cooperative event loop
//!
//! One loop thread pops tasks from a FIFO ready queue and resumes each for a
//! single step. Tasks suspend only where they choose to; awaiting another task
//! or sleeping is busy-polling through repeated re-queueing.

mod clock;
mod execution;
#[allow(clippy::module_inception)]
mod scheduler;
mod task;
mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use execution::{yield_now, Execution, FutureExecution, Step, YieldNow};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerStats};
pub use task::{Join, Task, TaskHandle, TaskId, TaskOptions, TaskOutcome, TaskState};
pub use timer::{sleep, SleepExecution};
