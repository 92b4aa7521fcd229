//! Request-scoped context propagation for RPC clients and servers.
//!
//! # Architecture Overview
//!
//! ```text
//!   client code                         transport (inbound frame)
//!       │                                        │
//!       ▼                                        ▼
//!  new_context(timeout)                 Dispatcher::dispatch(call, timeout, span, handler)
//!       │                                        │
//!       ▼                                        ▼
//!  ┌──────────────────────── context tree ────────────────────────┐
//!  │  root ── deadline node ── span node ── [call node] ── ...    │
//!  │            │                                                  │
//!  │            └─ signal: Live → Canceled | Expired (push down)   │
//!  └───────────────────────────────────────────────────────────────┘
//!       │                                        │
//!       ▼                                        ▼
//!  ctx.run(work) / ctx.done()             current_call(&ctx), ctx.span()
//! ```
//!
//! Contexts are immutable and passed explicitly; there is no global or
//! thread-local request state.

pub mod config;
pub mod context;
pub mod deadline;
pub mod dispatch;
pub mod error;
pub mod observability;

pub use config::RpcContextConfig;
pub use context::{current_call, new_context, wrap_context_for_test, Context, IncomingCall};
pub use deadline::{CancelGuard, DeadlineNode};
pub use dispatch::Dispatcher;
pub use error::ContextError;
pub use observability::tracing::{new_root_span, Span};
