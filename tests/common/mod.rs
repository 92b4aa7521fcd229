//! Shared utilities for integration tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rpc_context::IncomingCall;

/// A call object as a transport would build it from call headers.
#[derive(Debug)]
pub struct TestCall {
    caller: String,
}

impl IncomingCall for TestCall {
    fn caller_name(&self) -> &str {
        &self.caller
    }
}

/// Create a shared call object with the given caller name.
pub fn call(caller: &str) -> Arc<dyn IncomingCall> {
    Arc::new(TestCall {
        caller: caller.to_string(),
    })
}

/// True when `actual` lies within `tolerance` after `expected`.
#[allow(dead_code)]
pub fn close_to(actual: Instant, expected: Instant, tolerance: Duration) -> bool {
    actual >= expected && actual <= expected + tolerance
}
