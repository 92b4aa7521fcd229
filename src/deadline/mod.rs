//! Deadline and cancellation subsystem.
//!
//! # Data Flow
//! ```text
//! DeadlineNode::with_timeout(parent, d)
//!     → deadline = min(parent.deadline, now + d)
//!     → signal.rs registers the child signal under the parent's signal
//!     → node.rs spawns a timer that fires Expired at the deadline
//!     → CancelGuard returned to the owner
//!
//! Cancel (guard.cancel() / drop) or timer:
//!     → signal fires once (Live → Canceled | Expired)
//!     → transition pushed to every registered descendant
//!     → waiters in done()/run() wake up
//! ```
//!
//! # Design Decisions
//! - Cancellation only flows downward; a child never cancels its parent
//! - No un-cancel: the transition is permanent
//! - Nodes are immutable; the signal is the only shared mutable state

pub mod node;
pub mod signal;

pub use node::{CancelGuard, DeadlineNode};
pub use signal::SignalState;
