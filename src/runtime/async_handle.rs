//! Handles to background invocations
//!
//! [`Executor::async_invoke`](super::Executor::async_invoke) runs the call on a
//! dedicated worker thread and hands back an [`Async`]. The outcome is stored
//! once, when the worker finishes, and every later [`Async::get`] observes the
//! same stored result.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};

use super::executor::Executor;
use super::function::Function;
use super::{Completion, RuntimeError, Trap, Value};

type Outcome = Result<(Completion, Vec<Value>), RuntimeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncState {
    Running,
    Completed,
    /// Stopped by [`Async::cancel`] before it could finish
    Cancelled,
}

struct AsyncShared {
    state: Mutex<AsyncState>,
    done: Condvar,
    outcome: OnceCell<Outcome>,
    cancel: AtomicBool,
}

impl AsyncShared {
    fn finish(&self, outcome: Outcome) {
        let cancelled =
            self.cancel.load(Ordering::Acquire) && matches!(outcome, Err(RuntimeError::Trap(Trap::Interrupted)));
        let _ = self.outcome.set(outcome);
        let mut state = self.state.lock();
        *state = if cancelled {
            AsyncState::Cancelled
        } else {
            AsyncState::Completed
        };
        self.done.notify_all();
    }
}

/// Handle to one background invocation
///
/// Dropping the handle cancels the invocation and joins its worker, so the
/// drop blocks until the worker reaches a checkpoint or finishes.
pub struct Async {
    shared: Arc<AsyncShared>,
    worker: Option<JoinHandle<()>>,
}

impl Async {
    pub(crate) fn spawn(executor: Executor, func: Arc<Function>, params: Vec<Value>) -> Result<Async, RuntimeError> {
        let shared = Arc::new(AsyncShared {
            state: Mutex::new(AsyncState::Running),
            done: Condvar::new(),
            outcome: OnceCell::new(),
            cancel: AtomicBool::new(false),
        });
        let worker_shared = Arc::clone(&shared);
        let param_count = params.len();
        let worker = thread::Builder::new()
            .name("wasmbed-async".into())
            .stack_size(executor.config().worker_stack_size())
            .spawn(move || {
                let run = panic::catch_unwind(AssertUnwindSafe(|| {
                    executor.execute(&func, &params, &worker_shared.cancel)
                }));
                let outcome = run.unwrap_or_else(|_| {
                    tracing::error!("async worker panicked");
                    Err(RuntimeError::ExecutionFailed("host function panicked".into()))
                });
                worker_shared.finish(outcome);
            })
            .map_err(|e| RuntimeError::Spawn(e.to_string()))?;
        tracing::debug!(params = param_count, "spawned async invocation");
        Ok(Async {
            shared,
            worker: Some(worker),
        })
    }

    pub fn state(&self) -> AsyncState {
        *self.shared.state.lock()
    }

    /// Block until the invocation reaches a terminal state
    pub fn wait(&self) {
        let mut state = self.shared.state.lock();
        while *state == AsyncState::Running {
            self.shared.done.wait(&mut state);
        }
    }

    /// Block for at most `timeout`; true if a terminal state was observed
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while *state == AsyncState::Running {
            if self.shared.done.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        *state != AsyncState::Running
    }

    /// Ask the invocation to stop at its next checkpoint
    ///
    /// Has no effect when it already finished. Compiled code is only checked
    /// on entry, and only when the executor is interruptible.
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::Release);
    }

    /// Wait for the outcome and write the results into `returns`
    ///
    /// May be called any number of times; each call reports the same outcome.
    pub fn get(&self, returns: &mut [Value]) -> Result<Completion, RuntimeError> {
        self.wait();
        match self.shared.outcome.get() {
            Some(Ok((completion, values))) => {
                for (slot, value) in returns.iter_mut().zip(values) {
                    *slot = value.clone();
                }
                Ok(*completion)
            }
            Some(Err(e)) => Err(e.clone()),
            None => Err(RuntimeError::ExecutionFailed("async outcome missing".into())),
        }
    }
}

impl Drop for Async {
    fn drop(&mut self) {
        self.shared.cancel.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for Async {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Async").field("state", &self.state()).finish()
    }
}
