//! snailio engine
//!
//! A minimal cooperative multitasking runtime. A [`Scheduler`] owns a FIFO
//! queue of ready tasks and drives each one step at a time until it yields
//! or finishes; there is no parallelism and no I/O polling.
//!
//! ## Task lifecycle
//! `Pending --(resume, suspends)--> Pending`,
//! `Pending --(resume, completes)--> Finished`,
//! `Pending --(cancelled or timeout fires)--> Finished`. Finished is terminal.
//!
//! ## Example
//! ```ignore
//! let scheduler = Scheduler::new();
//! let s = scheduler.clone();
//! scheduler.block_on(async move {
//!     let worker = s.spawn(async { Ok(()) }, TaskOptions::new().name("worker"));
//!     sleep(&s, Duration::from_millis(10)).await;
//!     worker.await;
//!     Ok(())
//! })?;
//! ```

pub mod error;
pub mod scheduler;

pub use error::{ExecutionError, SchedulerError, SchedulerResult};
pub use scheduler::{
    sleep, yield_now, Clock, Execution, FutureExecution, Join, ManualClock, Scheduler,
    SchedulerConfig, SchedulerStats, SleepExecution, Step, SystemClock, Task, TaskHandle, TaskId,
    TaskOptions, TaskOutcome, TaskState, YieldNow,
};
