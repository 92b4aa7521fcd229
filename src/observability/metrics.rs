//! Metrics collection.
//!
//! # Metrics
//! - `rpc_context_signals_total` (counter): signal transitions by reason
//! - `rpc_dispatch_total` (counter): inbound dispatches by outcome
//! - `rpc_dispatch_duration_seconds` (histogram): handler latency
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; the embedding service
//!   installs the exporter
//! - Without an installed recorder every call is a no-op

use std::time::Instant;

use crate::deadline::SignalState;

/// Record a signal leaving the live state.
pub fn record_signal_fired(reason: SignalState) {
    let reason = match reason {
        SignalState::Live => return,
        SignalState::Canceled => "canceled",
        SignalState::Expired => "expired",
    };
    ::metrics::counter!("rpc_context_signals_total", "reason" => reason).increment(1);
}

/// Record the outcome and latency of one inbound dispatch.
pub fn record_dispatch(outcome: &'static str, start_time: Instant) {
    ::metrics::counter!("rpc_dispatch_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("rpc_dispatch_duration_seconds")
        .record(start_time.elapsed().as_secs_f64());
}
