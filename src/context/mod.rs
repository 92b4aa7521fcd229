//! Request context subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound request:
//!     new_context(timeout)
//!         → root deadline node (deadline/)
//!         → span node (new root span)
//!         → handed to client code with its CancelGuard
//!
//! Inbound request (dispatch/ only):
//!     new_incoming_context(call, timeout, span)
//!         → root deadline node
//!         → span node
//!         → call node
//!         → handler reads current_call(&ctx) / ctx.span()
//! ```
//!
//! # Design Decisions
//! - No ambient or thread-local context; every function takes `&Context`
//! - Only the dispatcher can attach call metadata outside tests

pub mod tree;
pub mod value;

use std::sync::Arc;
use std::time::Duration;

use crate::deadline::CancelGuard;
use crate::observability::tracing::{new_root_span, Span};

pub use tree::Context;
pub use value::IncomingCall;

/// Create the root context of an outbound request.
///
/// The returned context always carries a freshly minted root span. The guard
/// must be held until the request finishes; dropping it cancels the context.
/// Destructuring as `let (ctx, _) = new_context(..)` drops the guard at once,
/// so `ctx` is already canceled.
pub fn new_context(timeout: Duration) -> (Context, CancelGuard) {
    let (ctx, guard) = Context::background().with_timeout(timeout);
    (ctx.with_span(new_root_span()), guard)
}

/// Attach `call` to a copy of `ctx`, shadowing any call already attached.
///
/// This should be used in unit tests only; production handlers receive their
/// call metadata from the dispatcher.
pub fn wrap_context_for_test(ctx: &Context, call: Arc<dyn IncomingCall>) -> Context {
    ctx.with_call(call)
}

/// Create the context an inbound call's handler runs under.
pub(crate) fn new_incoming_context(
    call: Arc<dyn IncomingCall>,
    timeout: Duration,
    span: Span,
) -> (Context, CancelGuard) {
    let (ctx, guard) = Context::background().with_timeout(timeout);
    let ctx = ctx.with_span(span).with_call(call);
    (ctx, guard)
}

/// The incoming call `ctx` belongs to, or `None` outside an inbound handler.
pub fn current_call(ctx: &Context) -> Option<Arc<dyn IncomingCall>> {
    ctx.call().cloned()
}
