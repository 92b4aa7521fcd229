//! Inbound call dispatch.
//!
//! # Data Flow
//! ```text
//! Transport frame decoded (outside this crate)
//!     → Dispatcher::dispatch(call, requested timeout, span, handler)
//!     → effective timeout (default when absent, clamped to max)
//!     → new_incoming_context (span + call attached)
//!     → handler raced against the context signal
//!     → context released, outcome logged and recorded
//! ```
//!
//! # Design Decisions
//! - The dispatcher is the only owner of the inbound constructor
//! - The context is released on every exit path, including handler timeout
//! - Timed-out calls report `DeadlineExceeded`, distinct from cancellation

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

use crate::config::{RpcContextConfig, TimeoutConfig};
use crate::context::{new_incoming_context, Context, IncomingCall};
use crate::error::ContextError;
use crate::observability::metrics;
use crate::observability::tracing::Span;

/// Builds the context for each inbound call and runs its handler.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    timeouts: TimeoutConfig,
    metrics_enabled: bool,
}

impl Dispatcher {
    pub fn new(config: &RpcContextConfig) -> Self {
        Self {
            timeouts: config.timeouts.clone(),
            metrics_enabled: config.observability.metrics_enabled,
        }
    }

    /// The timeout an inbound call actually runs with.
    ///
    /// A zero timeout is kept as is and yields an already expired context.
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        requested
            .unwrap_or_else(|| self.timeouts.default_timeout())
            .min(self.timeouts.max_timeout())
    }

    /// Run `handler` under a fresh inbound context.
    ///
    /// Returns the handler's output, or the reason the context finished first.
    /// Clones of the context kept by the handler observe `Canceled` once this
    /// returns.
    pub async fn dispatch<F, Fut>(
        &self,
        call: Arc<dyn IncomingCall>,
        timeout: Option<Duration>,
        span: Span,
        handler: F,
    ) -> Result<Fut::Output, ContextError>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future,
    {
        let start_time = Instant::now();
        let timeout = self.effective_timeout(timeout);
        let caller = call.caller_name().to_string();
        let log_span = span.tracing_span("inbound");

        let (ctx, guard) = new_incoming_context(call, timeout, span);

        tracing::debug!(
            parent: &log_span,
            caller = %caller,
            timeout_ms = timeout.as_millis() as u64,
            "Dispatching inbound call"
        );

        let result = ctx
            .run(handler(ctx.clone()).instrument(log_span.clone()))
            .await;
        guard.cancel();

        let outcome = match &result {
            Ok(_) => {
                tracing::debug!(
                    parent: &log_span,
                    caller = %caller,
                    elapsed = ?start_time.elapsed(),
                    "Inbound call completed"
                );
                "ok"
            }
            Err(err) => {
                tracing::warn!(
                    parent: &log_span,
                    caller = %caller,
                    error = %err,
                    elapsed = ?start_time.elapsed(),
                    "Inbound call abandoned"
                );
                err.as_str()
            }
        };

        if self.metrics_enabled {
            metrics::record_dispatch(outcome, start_time);
        }
        result
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(&RpcContextConfig::default())
    }
}
