//! End-to-end scheduling behaviour: ordering, awaiting, cancellation,
//! timeouts and sleep, driven through the public API only.

use parking_lot::Mutex;
use snailio_engine::{
    sleep, yield_now, Clock, Execution, ExecutionError, FutureExecution, ManualClock, Scheduler,
    SchedulerConfig, Step, TaskHandle, TaskOptions, TaskOutcome,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

type Log = Arc<Mutex<Vec<String>>>;

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().clone()
}

/// Records `label` on every resume; yields `yields` times, then completes.
struct Recorder {
    label: &'static str,
    yields: usize,
    log: Log,
}

impl Execution for Recorder {
    fn resume(&mut self) -> Result<Step, ExecutionError> {
        self.log.lock().push(self.label.to_string());
        if self.yields == 0 {
            return Ok(Step::Completed);
        }
        self.yields -= 1;
        Ok(Step::Suspended)
    }
}

/// Never completes; advances `clock` by `tick` on every resume.
struct Spinner {
    clock: Option<Arc<ManualClock>>,
    tick: Duration,
}

impl Execution for Spinner {
    fn resume(&mut self) -> Result<Step, ExecutionError> {
        if let Some(clock) = &self.clock {
            clock.advance(self.tick);
        }
        Ok(Step::Suspended)
    }
}

/// Advances `clock` by `tick` on each of `steps` resumes.
struct Ticker {
    clock: Arc<ManualClock>,
    tick: Duration,
    steps: usize,
}

impl Execution for Ticker {
    fn resume(&mut self) -> Result<Step, ExecutionError> {
        if self.steps == 0 {
            return Ok(Step::Completed);
        }
        self.steps -= 1;
        self.clock.advance(self.tick);
        Ok(Step::Suspended)
    }
}

fn manual_scheduler() -> (Scheduler, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let scheduler = Scheduler::with_clock(SchedulerConfig::default(), clock.clone());
    (scheduler, clock)
}

// ────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_two_yields_then_complete_resumed_three_times() {
    let scheduler = Scheduler::new();
    let log = new_log();
    let slot: Arc<Mutex<Option<TaskHandle>>> = Arc::new(Mutex::new(None));

    let s = scheduler.clone();
    let inner_log = log.clone();
    let inner_slot = slot.clone();
    scheduler
        .block_on(async move {
            let task = s.create_task(
                Recorder {
                    label: "step",
                    yields: 2,
                    log: inner_log,
                },
                TaskOptions::new().name("twice"),
            );
            *inner_slot.lock() = Some(task);
            Ok(())
        })
        .unwrap();

    let task = slot.lock().take().expect("task created");
    assert!(task.is_done());
    assert_eq!(task.resume_count(), 3);
    assert_eq!(task.outcome(), Some(TaskOutcome::Completed));
    assert_eq!(entries(&log).len(), 3);
}

#[test]
fn test_not_done_until_all_yields_exhausted() {
    let scheduler = Scheduler::new();
    let worker = scheduler.create_task(
        Recorder {
            label: "w",
            yields: 3,
            log: new_log(),
        },
        TaskOptions::new(),
    );

    let observed = new_log();
    let probe = worker.clone();
    let seen = observed.clone();
    scheduler
        .block_on(async move {
            while !probe.is_done() {
                seen.lock().push(format!("{}:{}", probe.resume_count(), probe.is_done()));
                yield_now().await;
            }
            Ok(())
        })
        .unwrap();

    // The worker runs first, so the probe sees it after 1, 2 and 3 resumes,
    // none of which finish it.
    assert_eq!(entries(&observed), vec!["1:false", "2:false", "3:false"]);
    assert!(worker.is_done());
    assert_eq!(worker.resume_count(), 4);
}

#[test]
fn test_fifo_first_resumption_order() {
    let scheduler = Scheduler::new();
    let log = new_log();

    scheduler.create_task(
        Recorder {
            label: "A",
            yields: 0,
            log: log.clone(),
        },
        TaskOptions::new(),
    );
    scheduler.create_task(
        Recorder {
            label: "B",
            yields: 0,
            log: log.clone(),
        },
        TaskOptions::new(),
    );

    scheduler
        .run(Recorder {
            label: "main",
            yields: 0,
            log: log.clone(),
        })
        .unwrap();

    assert_eq!(entries(&log), vec!["A", "B", "main"]);
}

#[test]
fn test_independent_tasks_interleave_round_robin() {
    let scheduler = Scheduler::new();
    let log = new_log();

    let s = scheduler.clone();
    let inner = log.clone();
    scheduler
        .block_on(async move {
            s.create_task(
                Recorder {
                    label: "A",
                    yields: 2,
                    log: inner.clone(),
                },
                TaskOptions::new(),
            );
            s.create_task(
                Recorder {
                    label: "B",
                    yields: 1,
                    log: inner,
                },
                TaskOptions::new(),
            );
            Ok(())
        })
        .unwrap();

    assert_eq!(entries(&log), vec!["A", "B", "A", "B", "A"]);

    let stats = scheduler.stats();
    // Root (1) + A (2 yields + 1) + B (1 yield + 1)
    assert_eq!(stats.cycles, 1 + 3 + 2);
    assert_eq!(stats.resumptions, 6);
    assert_eq!(stats.tasks_spawned, 3);
    assert_eq!(stats.tasks_completed, 3);
    assert_eq!(stats.active_tasks, 0);
}

// ────────────────────────────────────────────────────────────────────────────
// Awaiting
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_await_task_created_after_waiter_started() {
    let scheduler = Scheduler::new();
    let log = new_log();
    let slot: Arc<Mutex<Option<TaskHandle>>> = Arc::new(Mutex::new(None));

    let s = scheduler.clone();
    let root_log = log.clone();
    let root_slot = slot.clone();
    let waiter_handle: Arc<Mutex<Option<TaskHandle>>> = Arc::new(Mutex::new(None));
    let waiter_out = waiter_handle.clone();

    scheduler
        .block_on(async move {
            let waiter_log = root_log.clone();
            let waiter_slot = root_slot.clone();
            let waiter = s.spawn(
                async move {
                    let target = loop {
                        let current = waiter_slot.lock().clone();
                        if let Some(t) = current {
                            break t;
                        }
                        yield_now().await;
                    };
                    target.await;
                    waiter_log.lock().push("A resumed".to_string());
                    Ok(())
                },
                TaskOptions::new().name("A"),
            );
            *waiter_out.lock() = Some(waiter);

            // Let A start waiting before B exists.
            yield_now().await;

            let b = s.create_task(
                Recorder {
                    label: "B",
                    yields: 2,
                    log: root_log,
                },
                TaskOptions::new().name("B"),
            );
            *root_slot.lock() = Some(b);
            Ok(())
        })
        .unwrap();

    assert_eq!(entries(&log), vec!["B", "B", "B", "A resumed"]);

    let a = waiter_handle.lock().take().expect("waiter created");
    // Polled once before B existed, three times while B was pending, and
    // once more right after B finished.
    assert_eq!(a.resume_count(), 5);
    assert_eq!(a.outcome(), Some(TaskOutcome::Completed));
}

#[test]
fn test_await_returns_for_cancelled_task() {
    let scheduler = Scheduler::new();
    let victim = scheduler.create_task(
        Spinner {
            clock: None,
            tick: Duration::ZERO,
        },
        TaskOptions::new().name("victim"),
    );

    let v = victim.clone();
    scheduler
        .block_on(async move {
            yield_now().await;
            v.cancel();
            v.cancel();
            (&v).await;
            assert!(v.is_done());
            Ok(())
        })
        .unwrap();

    assert_eq!(victim.outcome(), Some(TaskOutcome::Cancelled));
    assert_eq!(victim.resume_count(), 2);

    // Cancelling a finished task changes nothing.
    victim.cancel();
    assert_eq!(victim.outcome(), Some(TaskOutcome::Cancelled));
    assert_eq!(scheduler.stats().tasks_cancelled, 1);
}

#[test]
fn test_await_finished_task_returns_immediately() {
    let scheduler = Scheduler::new();
    let done = scheduler.create_task(
        Recorder {
            label: "x",
            yields: 0,
            log: new_log(),
        },
        TaskOptions::new(),
    );

    let d = done.clone();
    let polls = Arc::new(Mutex::new(0u32));
    let counter = polls.clone();
    scheduler
        .run(FutureExecution::new(async move {
            *counter.lock() += 1;
            d.await;
            Ok(())
        }))
        .unwrap();

    assert_eq!(*polls.lock(), 1);
    assert_eq!(scheduler.stats().cycles, 2);
}

// ────────────────────────────────────────────────────────────────────────────
// Timeouts
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_timeout_forces_cancellation() {
    let (scheduler, clock) = manual_scheduler();

    // Each resume "blocks" for a full second before yielding.
    let task = scheduler.create_task(
        Spinner {
            clock: Some(clock.clone()),
            tick: Duration::from_secs(1),
        },
        TaskOptions::new().name("timepass").timeout(Duration::from_secs(2)),
    );

    let t = task.clone();
    scheduler
        .block_on(async move {
            t.await;
            Ok(())
        })
        .unwrap();

    assert!(task.is_done());
    assert!(task.is_cancelled());
    assert_eq!(task.outcome(), Some(TaskOutcome::TimedOut));
    assert_eq!(task.resume_count(), 2);
    assert_eq!(scheduler.stats().tasks_timed_out, 1);
}

#[test]
fn test_timeout_fires_within_one_round_trip() {
    let (scheduler, clock) = manual_scheduler();
    let t0 = clock.now();

    let spinner = scheduler.create_task(
        Spinner {
            clock: None,
            tick: Duration::ZERO,
        },
        TaskOptions::new().timeout(Duration::from_secs(2)),
    );
    scheduler.create_task(
        Ticker {
            clock: clock.clone(),
            tick: Duration::from_secs(1),
            steps: 5,
        },
        TaskOptions::new(),
    );

    scheduler
        .run(Recorder {
            label: "main",
            yields: 0,
            log: new_log(),
        })
        .unwrap();

    assert_eq!(spinner.outcome(), Some(TaskOutcome::TimedOut));
    // Resumed at t=0 and t=1; at t=2 the timeout fires before resumption.
    assert_eq!(spinner.resume_count(), 2);
    assert_eq!(spinner.start_time(), Some(t0));
}

#[test]
fn test_timeout_window_starts_at_first_cycle() {
    let (scheduler, clock) = manual_scheduler();

    let late = scheduler.create_task(
        Recorder {
            label: "late",
            yields: 0,
            log: new_log(),
        },
        TaskOptions::new().timeout(Duration::from_secs(1)),
    );

    // Time passing between creation and first scheduling is not counted.
    clock.advance(Duration::from_secs(10));
    scheduler
        .run(Recorder {
            label: "main",
            yields: 0,
            log: new_log(),
        })
        .unwrap();

    assert_eq!(late.outcome(), Some(TaskOutcome::Completed));
    assert_eq!(late.start_time(), Some(clock.now()));
}

// ────────────────────────────────────────────────────────────────────────────
// Sleep
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_sleep_waits_for_manual_clock() {
    let (scheduler, clock) = manual_scheduler();
    let t0 = clock.now();
    let woke_at = Arc::new(Mutex::new(None));

    scheduler.create_task(
        Ticker {
            clock: clock.clone(),
            tick: Duration::from_secs(1),
            steps: 10,
        },
        TaskOptions::new(),
    );

    let s = scheduler.clone();
    let c = clock.clone();
    let out = woke_at.clone();
    scheduler
        .block_on(async move {
            sleep(&s, Duration::from_secs(3)).await;
            *out.lock() = Some(c.now());
            Ok(())
        })
        .unwrap();

    let woke = woke_at.lock().expect("sleep returned");
    assert!(woke - t0 >= Duration::from_secs(3));
}

#[test]
fn test_sleep_zero_is_one_round_trip() {
    let scheduler = Scheduler::new();
    let s = scheduler.clone();
    scheduler
        .block_on(async move {
            sleep(&s, Duration::ZERO).await;
            Ok(())
        })
        .unwrap();

    let stats = scheduler.stats();
    assert_eq!(stats.tasks_spawned, 2);
    // root polls, timer completes, root resumes
    assert_eq!(stats.cycles, 3);
}

#[test]
fn test_sleep_real_clock() {
    let scheduler = Scheduler::new();
    let s = scheduler.clone();
    let start = Instant::now();
    scheduler
        .block_on(async move {
            sleep(&s, Duration::from_millis(20)).await;
            Ok(())
        })
        .unwrap();
    assert!(start.elapsed() >= Duration::from_millis(20));
}

#[test]
fn test_concurrent_sleepers_interleave() {
    let scheduler = Scheduler::new();
    let log = new_log();

    let s = scheduler.clone();
    let inner = log.clone();
    scheduler
        .block_on(async move {
            let mut workers = Vec::new();
            for label in ["one", "two"] {
                let s2 = s.clone();
                let l = inner.clone();
                workers.push(s.spawn(
                    async move {
                        for _ in 0..2 {
                            l.lock().push(label.to_string());
                            sleep(&s2, Duration::ZERO).await;
                        }
                        Ok(())
                    },
                    TaskOptions::new().name(label),
                ));
            }
            for w in &workers {
                w.await;
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(entries(&log), vec!["one", "two", "one", "two"]);
}

// ────────────────────────────────────────────────────────────────────────────
// Faults
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_fault_in_nested_task_aborts_run() {
    let scheduler = Scheduler::new();
    let s = scheduler.clone();
    let err = scheduler
        .block_on(async move {
            let child = s.spawn(
                async { Err(ExecutionError::msg("bad input")) },
                TaskOptions::new().name("child"),
            );
            child.await;
            Ok(())
        })
        .unwrap_err();

    assert_eq!(err.to_string(), "task 'child' failed: bad input");
    assert_eq!(scheduler.pending_count(), 0);
}
