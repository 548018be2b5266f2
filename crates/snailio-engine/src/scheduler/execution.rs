//! Resumable executions.
//!
//! An execution is the body of a task. The scheduler resumes it one step at
//! a time; each step either suspends (yields control back to the loop) or
//! completes. Hand-written state machines implement [`Execution`] directly,
//! ordinary `async` blocks go through [`FutureExecution`].

use crate::error::ExecutionError;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

/// Result of resuming an execution for one step.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Step {
    /// Yielded at a suspension point; resume again later
    Suspended,
    /// Ran to the end; never resume again
    Completed,
}

/// A step-by-step resumable computation owned by exactly one task.
pub trait Execution: Send {
    /// Run until the next suspension point or until the end.
    ///
    /// Never called again after it returned `Ok(Step::Completed)` or an error.
    fn resume(&mut self) -> Result<Step, ExecutionError>;
}

impl<E: Execution + ?Sized> Execution for Box<E> {
    fn resume(&mut self) -> Result<Step, ExecutionError> {
        (**self).resume()
    }
}

/// Adapts a future into an [`Execution`].
///
/// Each resume polls the future exactly once. Wakeups are ignored: a pending
/// task is re-queued unconditionally and polled again on its next turn.
pub struct FutureExecution<F> {
    future: Pin<Box<F>>,
}

impl<F> FutureExecution<F>
where
    F: Future<Output = Result<(), ExecutionError>> + Send,
{
    /// Wrap `future`.
    pub fn new(future: F) -> Self {
        Self {
            future: Box::pin(future),
        }
    }
}

impl<F> Execution for FutureExecution<F>
where
    F: Future<Output = Result<(), ExecutionError>> + Send,
{
    fn resume(&mut self) -> Result<Step, ExecutionError> {
        let mut cx = Context::from_waker(Waker::noop());
        match self.future.as_mut().poll(&mut cx) {
            Poll::Pending => Ok(Step::Suspended),
            Poll::Ready(Ok(())) => Ok(Step::Completed),
            Poll::Ready(Err(e)) => Err(e),
        }
    }
}

/// Suspend the current task once.
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

/// Future returned by [`yield_now`].
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
