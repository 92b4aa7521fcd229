//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! deadline + dispatch produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (signal and dispatch counters)
//!     → tracing.rs (RPC spans carried by contexts)
//! ```
//!
//! # Design Decisions
//! - Trace ids flow through the context tree, never through globals
//! - Metrics are cheap (facade calls, no-op without a recorder)

pub mod logging;
pub mod metrics;
pub mod tracing;
