//! `snailio demo`: two workers sharing one loop.
//!
//! `task1` (named `timepass`) prints twice, optionally blocking the loop
//! before each sleep; `task2` prints three times with zero-length sleeps.
//! The root task prints the `timepass` handle, awaits both workers, prints it
//! again and finishes with `done`.

use anyhow::Context;
use parking_lot::Mutex;
use snailio_engine::{
    sleep, ExecutionError, Scheduler, SchedulerConfig, SchedulerStats, TaskOptions, TaskOutcome,
};
use std::sync::Arc;
use std::time::Duration;

/// Line sink for demo output
pub type Output = Arc<dyn Fn(&str) + Send + Sync>;

/// Options for one demo run
#[derive(Debug, Clone)]
pub struct DemoArgs {
    /// Timeout for `timepass`
    pub timeout: Option<Duration>,
    /// How long `task1` blocks the loop before each sleep
    pub work: Duration,
    /// Sleep length for `task1`
    pub sleep: Duration,
}

/// What happened during a demo run
#[derive(Debug, Clone)]
pub struct DemoReport {
    /// How `timepass` finished
    pub timepass: Option<TaskOutcome>,
    /// Scheduler counters after the run
    pub stats: SchedulerStats,
}

/// Convert a seconds flag into a duration.
pub fn secs(value: f64, flag: &str) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("invalid value for {}: {}", flag, value))
}

/// Run the demo program on a fresh scheduler.
pub fn execute(
    args: &DemoArgs,
    config: SchedulerConfig,
    out: Output,
) -> anyhow::Result<DemoReport> {
    let scheduler = Scheduler::with_config(config);
    let outcome: Arc<Mutex<Option<TaskOutcome>>> = Arc::new(Mutex::new(None));

    let s = scheduler.clone();
    let args = args.clone();
    let report_slot = outcome.clone();
    scheduler
        .block_on(async move {
            let mut one_opts = TaskOptions::new().name("timepass");
            if let Some(timeout) = args.timeout {
                one_opts = one_opts.timeout(timeout);
            }
            let one = s.spawn(task1(s.clone(), out.clone(), args.work, args.sleep), one_opts);
            let two = s.spawn(task2(s.clone(), out.clone()), TaskOptions::new());

            out(&one.to_string());

            (&one).await;
            two.await;

            out(&one.to_string());
            out("done");
            *report_slot.lock() = one.outcome();
            Ok(())
        })
        .context("demo run failed")?;

    let timepass = *outcome.lock();
    Ok(DemoReport {
        timepass,
        stats: scheduler.stats(),
    })
}

async fn task1(
    scheduler: Scheduler,
    out: Output,
    work: Duration,
    nap: Duration,
) -> Result<(), ExecutionError> {
    for _ in 0..2 {
        out("Task 1");
        if !work.is_zero() {
            // Deliberately blocks the whole loop.
            std::thread::sleep(work);
        }
        sleep(&scheduler, nap).await;
    }
    Ok(())
}

async fn task2(scheduler: Scheduler, out: Output) -> Result<(), ExecutionError> {
    for _ in 0..3 {
        out("Task 2");
        sleep(&scheduler, Duration::ZERO).await;
    }
    Ok(())
}
