//! Deadline/cancellation node.
//!
//! # Responsibilities
//! - Derive child nodes whose deadline never exceeds the parent's
//! - Own the timer that fires the signal when the deadline elapses
//! - Expose both a poll check (`err`) and a wait handle (`done`)
//!
//! # Design Decisions
//! - Uses Tokio's timer facilities; without a runtime, expiry is still
//!   detected lazily on observation
//! - The release handle is RAII: dropping it cancels the node and frees the
//!   timer, so every exit path releases
//! - Timeout errors are distinct from cancellation errors

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::deadline::signal::{Signal, SignalState};
use crate::error::ContextError;

/// Immutable node holding an absolute deadline and a cancellation signal.
///
/// Cloning is cheap and clones observe the same signal.
#[derive(Debug, Clone)]
pub struct DeadlineNode {
    signal: Arc<Signal>,
}

impl DeadlineNode {
    /// A root node with no deadline that is never canceled.
    pub fn background() -> Self {
        Self {
            signal: Signal::root(None),
        }
    }

    /// Derive a node that can be canceled independently of `parent`.
    pub fn with_cancel(parent: &DeadlineNode) -> (DeadlineNode, CancelGuard) {
        let signal = Signal::child_of(&parent.signal, parent.deadline());
        let node = DeadlineNode {
            signal: signal.clone(),
        };
        (node, CancelGuard::new(signal, None))
    }

    /// Derive a node that expires at `deadline`, or at the parent's deadline if
    /// that is earlier.
    pub fn with_deadline(parent: &DeadlineNode, deadline: Instant) -> (DeadlineNode, CancelGuard) {
        if parent.deadline().is_some_and(|current| current <= deadline) {
            // The parent expires first and will push its expiry down.
            return Self::with_cancel(parent);
        }

        let signal = Signal::child_of(&parent.signal, Some(deadline));
        let timer = if signal.state().is_fired() {
            None
        } else {
            spawn_timer(&signal, deadline)
        };
        let node = DeadlineNode {
            signal: signal.clone(),
        };
        (node, CancelGuard::new(signal, timer))
    }

    /// Derive a node that expires `timeout` from now.
    ///
    /// A zero timeout yields a node that is already expired. A timeout too
    /// large to represent keeps the parent's deadline.
    pub fn with_timeout(parent: &DeadlineNode, timeout: Duration) -> (DeadlineNode, CancelGuard) {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::with_deadline(parent, deadline),
            None => Self::with_cancel(parent),
        }
    }

    /// The absolute deadline, `None` if the node has none.
    pub fn deadline(&self) -> Option<Instant> {
        self.signal.deadline()
    }

    /// Time left until the deadline, saturating at zero.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline()
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Why the node is done, or `None` while it is still live.
    pub fn err(&self) -> Option<ContextError> {
        self.signal.state().error()
    }

    /// Like [`err`](DeadlineNode::err) but never settles a passed deadline,
    /// so it has no side effects.
    pub(crate) fn peek_err(&self) -> Option<ContextError> {
        self.signal.peek_state().error()
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Wait until the signal fires and return the reason.
    pub async fn done(&self) -> ContextError {
        let mut rx = self.signal.subscribe();
        loop {
            if let Some(err) = self.err() {
                return err;
            }
            match self.deadline() {
                Some(deadline) => {
                    tokio::select! {
                        _ = rx.changed() => {}
                        _ = tokio::time::sleep_until(deadline.into()) => {}
                    }
                }
                None => {
                    if rx.changed().await.is_err() {
                        // The sender lives inside the signal we hold, this
                        // only happens if it was never going to fire.
                        std::future::pending::<()>().await;
                    }
                }
            }
        }
    }

    /// Race `work` against the signal.
    ///
    /// Returns the work's output if it completes first, otherwise the reason
    /// the node fired. `work` is dropped at its next suspension point when the
    /// signal wins.
    pub async fn run<F>(&self, work: F) -> Result<F::Output, ContextError>
    where
        F: Future,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            output = work => Ok(output),
        }
    }
}

fn spawn_timer(signal: &Arc<Signal>, deadline: Instant) -> Option<JoinHandle<()>> {
    let handle = match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle,
        Err(_) => {
            tracing::trace!(signal = %signal.id(), "No runtime, deadline checked on observation");
            return None;
        }
    };
    let weak = Arc::downgrade(signal);
    Some(handle.spawn(async move {
        tokio::time::sleep_until(deadline.into()).await;
        if let Some(signal) = weak.upgrade() {
            signal.fire(SignalState::Expired);
        }
    }))
}

/// Release handle returned with every cancelable node.
///
/// Calling [`cancel`](CancelGuard::cancel) or dropping the guard cancels the
/// node and every node derived from it, and stops the deadline timer. Repeated
/// calls have no further effect.
///
/// Bind the guard to a named variable (`_guard`, not `_`). Destructuring with
/// `let (ctx, _) = ...` drops it on the spot and leaves `ctx` canceled; the
/// compiler does not warn about that form.
#[must_use = "dropping a CancelGuard cancels its context immediately"]
#[derive(Debug)]
pub struct CancelGuard {
    signal: Arc<Signal>,
    timer: Option<JoinHandle<()>>,
}

impl CancelGuard {
    fn new(signal: Arc<Signal>, timer: Option<JoinHandle<()>>) -> Self {
        Self { signal, timer }
    }

    /// Cancel the node and release its timer.
    pub fn cancel(&self) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
        self.signal.fire(SignalState::Canceled);
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}
