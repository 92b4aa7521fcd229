//! Distributed tracing span carried by request contexts.
//!
//! # Responsibilities
//! - Mint root spans for new requests
//! - Derive child spans that stay in the same trace
//! - Project a span into a `tracing::Span` so log lines carry trace ids
//!
//! # Design Decisions
//! - Ids are random non-zero 64-bit values; sampling and reporting live
//!   outside this crate
//! - The span is an opaque value to the context tree

use rand::Rng;
use std::fmt;

/// Flag bit set when the trace should be recorded.
pub const FLAG_TRACING_ENABLED: u8 = 0x01;

/// Identifies one trace across every service it touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(u64);

/// Identifies one span within a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(u64);

impl TraceId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl SpanId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

fn random_id() -> u64 {
    // Zero is reserved to mean "no id" on the wire.
    rand::thread_rng().gen_range(1..=u64::MAX)
}

/// One span of a distributed trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    trace_id: TraceId,
    span_id: SpanId,
    parent_id: Option<SpanId>,
    flags: u8,
}

impl Span {
    /// Start a new trace. The root span's id doubles as the trace id.
    pub fn new_root() -> Self {
        let id = random_id();
        Self {
            trace_id: TraceId(id),
            span_id: SpanId(id),
            parent_id: None,
            flags: FLAG_TRACING_ENABLED,
        }
    }

    /// Rebuild a span from ids received from a peer.
    pub fn from_parts(trace_id: u64, span_id: u64, parent_id: Option<u64>, flags: u8) -> Self {
        Self {
            trace_id: TraceId(trace_id),
            span_id: SpanId(span_id),
            parent_id: parent_id.map(SpanId),
            flags,
        }
    }

    /// A new span in the same trace, parented to this one.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: SpanId(random_id()),
            parent_id: Some(self.span_id),
            flags: self.flags,
        }
    }

    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    pub fn parent_id(&self) -> Option<SpanId> {
        self.parent_id
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn tracing_enabled(&self) -> bool {
        self.flags & FLAG_TRACING_ENABLED != 0
    }

    /// A `tracing` span correlated with this RPC span.
    pub fn tracing_span(&self, operation: &str) -> ::tracing::Span {
        ::tracing::info_span!(
            "rpc",
            operation = %operation,
            trace_id = %self.trace_id,
            span_id = %self.span_id
        )
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraceID={} SpanID={}", self.trace_id, self.span_id)?;
        if let Some(parent) = self.parent_id {
            write!(f, " ParentID={}", parent)?;
        }
        Ok(())
    }
}

/// Mint the root span of a new request.
pub fn new_root_span() -> Span {
    Span::new_root()
}
