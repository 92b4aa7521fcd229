//! Typed value slots.
//!
//! The key set is closed, and each key is bound to exactly one value variant,
//! so a lookup can never observe a value of the wrong shape.

use std::fmt;
use std::sync::Arc;

use crate::observability::tracing::Span;

/// Metadata about an inbound call, supplied by the transport dispatcher.
pub trait IncomingCall: Send + Sync + fmt::Debug {
    /// The caller name from the caller-name transport header.
    fn caller_name(&self) -> &str;
}

/// Keys a node can carry a value under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ContextKey {
    /// Nodes that only narrow the deadline. Never looked up.
    Unknown,
    Tracing,
    Call,
}

/// The value attached to one node.
#[derive(Debug, Clone)]
pub(crate) enum ContextValue {
    Span(Span),
    Call(Arc<dyn IncomingCall>),
}

impl ContextValue {
    pub(crate) fn key(&self) -> ContextKey {
        match self {
            ContextValue::Span(_) => ContextKey::Tracing,
            ContextValue::Call(_) => ContextKey::Call,
        }
    }
}
