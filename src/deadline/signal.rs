//! One-shot broadcast cancellation signal.
//!
//! # Responsibilities
//! - Hold the single `Live -> Canceled | Expired` transition of a node
//! - Push the transition down to every registered child signal
//! - Wake any number of waiters without busy-polling
//!
//! # Design Decisions
//! - State is an `AtomicU8`; the transition is a compare-exchange from `Live`,
//!   so racing cancels and timers produce exactly one transition
//! - Waiters subscribe to a `watch` channel owned by the signal
//! - Children are registered as `Weak` references; a parent never keeps a
//!   descendant alive
//! - Expiry is also detected lazily on observation, so an elapsed deadline is
//!   reported even when no timer task could be spawned

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;
use tokio::sync::watch;

use crate::error::ContextError;
use crate::observability::metrics;

/// Relaxed ordering is enough, ids only need to be unique.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a signal, used as the key in a parent's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalId(u64);

impl SignalId {
    fn next() -> Self {
        Self(SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SignalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sig-{}", self.0)
    }
}

/// Observable state of a signal.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    Live = 0,
    Canceled = 1,
    Expired = 2,
}

impl From<u8> for SignalState {
    fn from(val: u8) -> Self {
        match val {
            1 => SignalState::Canceled,
            2 => SignalState::Expired,
            _ => SignalState::Live,
        }
    }
}

impl SignalState {
    /// The error a fired state reports, `None` while live.
    pub fn error(self) -> Option<ContextError> {
        match self {
            SignalState::Live => None,
            SignalState::Canceled => Some(ContextError::Canceled),
            SignalState::Expired => Some(ContextError::DeadlineExceeded),
        }
    }

    pub fn is_fired(self) -> bool {
        self != SignalState::Live
    }
}

/// Shared cancellation state of one deadline node.
#[derive(Debug)]
pub(crate) struct Signal {
    id: SignalId,
    deadline: Option<Instant>,
    state: AtomicU8,
    notify: watch::Sender<SignalState>,
    children: Mutex<HashMap<SignalId, Weak<Signal>>>,
    parent: Option<Weak<Signal>>,
}

impl Signal {
    /// A signal with no parent.
    pub(crate) fn root(deadline: Option<Instant>) -> Arc<Self> {
        Arc::new(Self::new(deadline, None))
    }

    /// A signal registered under `parent`.
    ///
    /// If the parent has already fired, the child fires immediately with the
    /// same reason.
    pub(crate) fn child_of(parent: &Arc<Signal>, deadline: Option<Instant>) -> Arc<Self> {
        let child = Arc::new(Self::new(deadline, Some(Arc::downgrade(parent))));
        parent.attach(&child);
        child
    }

    fn new(deadline: Option<Instant>, parent: Option<Weak<Signal>>) -> Self {
        let (notify, _) = watch::channel(SignalState::Live);
        Self {
            id: SignalId::next(),
            deadline,
            state: AtomicU8::new(SignalState::Live as u8),
            notify,
            children: Mutex::new(HashMap::new()),
            parent,
        }
    }

    pub(crate) fn id(&self) -> SignalId {
        self.id
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Current state, firing `Expired` first if the deadline has passed.
    pub(crate) fn state(&self) -> SignalState {
        let current = self.raw_state();
        if current == SignalState::Live && self.deadline_passed() {
            self.fire(SignalState::Expired);
            return self.raw_state();
        }
        current
    }

    /// Receiver that is notified on the transition.
    pub(crate) fn subscribe(&self) -> watch::Receiver<SignalState> {
        self.notify.subscribe()
    }

    /// Transition out of `Live`. Returns false if the signal had already fired.
    ///
    /// A cancel that arrives after the deadline has passed is recorded as an
    /// expiry, so callers always see the earlier of the two causes.
    ///
    /// Descendants are fired from a worklist, so chain depth never grows the
    /// stack.
    pub(crate) fn fire(&self, reason: SignalState) -> bool {
        let Some(reason) = self.transition(reason) else {
            return false;
        };

        let mut pending = self.take_children();
        while let Some(child) = pending.pop() {
            if child.transition(reason).is_some() {
                pending.extend(child.take_children());
            }
        }

        if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
            parent.detach(self.id);
        }
        true
    }

    /// Flip this signal alone and wake its waiters. Returns the recorded
    /// reason, or `None` if the signal was not live.
    fn transition(&self, reason: SignalState) -> Option<SignalState> {
        if !reason.is_fired() {
            return None;
        }
        let reason = if reason == SignalState::Canceled && self.deadline_passed() {
            SignalState::Expired
        } else {
            reason
        };

        self.state
            .compare_exchange(
                SignalState::Live as u8,
                reason as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()?;

        self.notify.send_replace(reason);
        tracing::trace!(signal = %self.id, reason = ?reason, "Signal fired");
        metrics::record_signal_fired(reason);
        Some(reason)
    }

    fn take_children(&self) -> Vec<Arc<Signal>> {
        let children = std::mem::take(&mut *self.lock_children());
        children.values().filter_map(Weak::upgrade).collect()
    }

    /// State as last recorded, without settling a passed deadline.
    pub(crate) fn peek_state(&self) -> SignalState {
        self.raw_state()
    }

    fn raw_state(&self) -> SignalState {
        SignalState::from(self.state.load(Ordering::Acquire))
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn attach(&self, child: &Arc<Signal>) {
        // Settle lazy expiry before taking the registry lock, `fire` needs it.
        self.state();

        let mut children = self.lock_children();
        let fired = self.raw_state();
        if fired.is_fired() {
            drop(children);
            child.fire(fired);
            return;
        }
        children.retain(|_, weak| weak.strong_count() > 0);
        children.insert(child.id, Arc::downgrade(child));
    }

    fn detach(&self, id: SignalId) {
        self.lock_children().remove(&id);
    }

    fn lock_children(&self) -> MutexGuard<'_, HashMap<SignalId, Weak<Signal>>> {
        self.children.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn child_count(&self) -> usize {
        self.lock_children().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fires_exactly_once() {
        let signal = Signal::root(None);
        assert_eq!(signal.state(), SignalState::Live);

        assert!(signal.fire(SignalState::Canceled));
        assert!(!signal.fire(SignalState::Canceled));
        assert!(!signal.fire(SignalState::Expired));

        assert_eq!(signal.state(), SignalState::Canceled);
        assert_eq!(signal.state().error(), Some(ContextError::Canceled));
    }

    #[test]
    fn firing_live_is_ignored() {
        let signal = Signal::root(None);
        assert!(!signal.fire(SignalState::Live));
        assert_eq!(signal.state(), SignalState::Live);
    }

    #[test]
    fn propagates_to_descendants() {
        let root = Signal::root(None);
        let child = Signal::child_of(&root, None);
        let grandchild = Signal::child_of(&child, None);
        let sibling_root = Signal::root(None);

        root.fire(SignalState::Canceled);

        assert_eq!(child.state(), SignalState::Canceled);
        assert_eq!(grandchild.state(), SignalState::Canceled);
        assert_eq!(sibling_root.state(), SignalState::Live);
    }

    #[test]
    fn child_cancel_does_not_reach_parent() {
        let root = Signal::root(None);
        let child = Signal::child_of(&root, None);

        child.fire(SignalState::Canceled);

        assert_eq!(root.state(), SignalState::Live);
        assert_eq!(root.child_count(), 0, "fired child detaches itself");
    }

    #[test]
    fn deep_chain_fires_without_recursion() {
        let root = Signal::root(None);
        let mut chain = vec![root.clone()];
        for _ in 0..10_000 {
            let child = Signal::child_of(chain.last().unwrap(), None);
            chain.push(child);
        }

        assert!(root.fire(SignalState::Canceled));

        assert!(chain.iter().all(|s| s.state() == SignalState::Canceled));
        assert_eq!(root.child_count(), 0);
    }

    #[test]
    fn peek_does_not_settle_expiry() {
        let signal = Signal::root(Some(Instant::now()));
        assert_eq!(signal.peek_state(), SignalState::Live);
        assert_eq!(signal.state(), SignalState::Expired);
        assert_eq!(signal.peek_state(), SignalState::Expired);
    }

    #[test]
    fn attach_to_fired_parent_fires_child() {
        let root = Signal::root(None);
        root.fire(SignalState::Canceled);

        let child = Signal::child_of(&root, None);
        assert_eq!(child.state(), SignalState::Canceled);
        assert_eq!(root.child_count(), 0);
    }

    #[test]
    fn dropped_children_are_pruned() {
        let root = Signal::root(None);
        let first = Signal::child_of(&root, None);
        drop(first);
        let _second = Signal::child_of(&root, None);
        assert_eq!(root.child_count(), 1);
    }

    #[test]
    fn past_deadline_reports_expired() {
        let signal = Signal::root(Some(Instant::now()));
        assert_eq!(signal.state(), SignalState::Expired);
    }

    #[test]
    fn cancel_after_deadline_reports_expired() {
        let signal = Signal::root(Some(Instant::now() - Duration::from_millis(1)));
        signal.fire(SignalState::Canceled);
        assert_eq!(signal.state(), SignalState::Expired);
    }

    #[tokio::test]
    async fn subscribers_see_transition() {
        let signal = Signal::root(None);
        let mut rx = signal.subscribe();

        let waiter = tokio::spawn(async move {
            rx.wait_for(|s| s.is_fired()).await.map(|s| *s).ok()
        });

        signal.fire(SignalState::Canceled);
        assert_eq!(waiter.await.unwrap(), Some(SignalState::Canceled));
    }

    #[test]
    fn concurrent_fire_single_transition() {
        let signal = Signal::root(None);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let signal = signal.clone();
                std::thread::spawn(move || {
                    let reason = if i % 2 == 0 {
                        SignalState::Canceled
                    } else {
                        SignalState::Expired
                    };
                    signal.fire(reason)
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
        assert!(signal.state().is_fired());
    }
}
