//! Persistent context tree.
//!
//! # Responsibilities
//! - Derive new nodes that add one value or narrow the deadline
//! - Resolve lookups by walking toward the root
//! - Delegate deadline and cancellation queries to the deadline node
//!
//! # Design Decisions
//! - Copy-on-derive: a node is never mutated, children share ancestors via Arc
//! - A value is visible from its node and descendants only
//! - Lookups and derivations never block

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::context::value::{ContextKey, ContextValue, IncomingCall};
use crate::deadline::{CancelGuard, DeadlineNode};
use crate::error::ContextError;
use crate::observability::tracing::Span;

/// Immutable carrier of a deadline, a cancellation signal and the values
/// attached to one request.
///
/// Cloning is cheap; pass contexts explicitly through every call boundary.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    parent: Option<Context>,
    deadline: DeadlineNode,
    value: Option<ContextValue>,
}

impl Drop for ContextInner {
    // Unlink uniquely owned ancestors one at a time so a long chain does not
    // drop recursively.
    fn drop(&mut self) {
        let mut parent = self.parent.take();
        while let Some(ctx) = parent {
            parent = match Arc::try_unwrap(ctx.inner) {
                Ok(mut inner) => inner.parent.take(),
                Err(_) => None,
            };
        }
    }
}

impl Context {
    /// An empty root with no deadline and no values.
    pub fn background() -> Self {
        Self::from_deadline(DeadlineNode::background())
    }

    fn from_deadline(deadline: DeadlineNode) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                parent: None,
                deadline,
                value: None,
            }),
        }
    }

    fn derive(&self, deadline: DeadlineNode, value: Option<ContextValue>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                parent: Some(self.clone()),
                deadline,
                value,
            }),
        }
    }

    /// Derive a context that expires `timeout` from now, or with this one if
    /// that is earlier.
    pub fn with_timeout(&self, timeout: Duration) -> (Context, CancelGuard) {
        let (node, guard) = DeadlineNode::with_timeout(&self.inner.deadline, timeout);
        (self.derive(node, None), guard)
    }

    /// Derive a context that expires at `deadline`, or with this one if that
    /// is earlier.
    pub fn with_deadline(&self, deadline: Instant) -> (Context, CancelGuard) {
        let (node, guard) = DeadlineNode::with_deadline(&self.inner.deadline, deadline);
        (self.derive(node, None), guard)
    }

    /// Derive a context that can be canceled without affecting this one.
    pub fn with_cancel(&self) -> (Context, CancelGuard) {
        let (node, guard) = DeadlineNode::with_cancel(&self.inner.deadline);
        (self.derive(node, None), guard)
    }

    /// Attach a tracing span, shadowing any span set on an ancestor.
    pub fn with_span(&self, span: Span) -> Context {
        self.with_value(ContextValue::Span(span))
    }

    pub(crate) fn with_call(&self, call: Arc<dyn IncomingCall>) -> Context {
        self.with_value(ContextValue::Call(call))
    }

    fn with_value(&self, value: ContextValue) -> Context {
        self.derive(self.inner.deadline.clone(), Some(value))
    }

    fn key(&self) -> ContextKey {
        self.inner
            .value
            .as_ref()
            .map_or(ContextKey::Unknown, ContextValue::key)
    }

    pub(crate) fn lookup(&self, key: ContextKey) -> Option<&ContextValue> {
        let mut node = self;
        loop {
            if key != ContextKey::Unknown && node.key() == key {
                return node.inner.value.as_ref();
            }
            node = node.inner.parent.as_ref()?;
        }
    }

    /// The nearest tracing span, if any.
    pub fn span(&self) -> Option<&Span> {
        match self.lookup(ContextKey::Tracing) {
            Some(ContextValue::Span(span)) => Some(span),
            _ => None,
        }
    }

    pub(crate) fn call(&self) -> Option<&Arc<dyn IncomingCall>> {
        match self.lookup(ContextKey::Call) {
            Some(ContextValue::Call(call)) => Some(call),
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline.deadline()
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.inner.deadline.remaining()
    }

    /// Why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<ContextError> {
        self.inner.deadline.err()
    }

    pub fn is_done(&self) -> bool {
        self.inner.deadline.is_done()
    }

    /// Wait until the context is canceled or expires.
    pub async fn done(&self) -> ContextError {
        self.inner.deadline.done().await
    }

    /// Run `work` until it completes or the context is done, whichever first.
    pub async fn run<F>(&self, work: F) -> Result<F::Output, ContextError>
    where
        F: Future,
    {
        self.inner.deadline.run(work).await
    }

    /// The node this one was derived from.
    pub(crate) fn parent(&self) -> Option<&Context> {
        self.inner.parent.as_ref()
    }

    fn depth(&self) -> usize {
        std::iter::successors(Some(self), |c| c.parent()).count()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("depth", &self.depth())
            .field("deadline", &self.deadline())
            .field("err", &self.inner.deadline.peek_err())
            .field("span", &self.span())
            .field("call", &self.call())
            .finish()
    }
}
