//! Error types observed when a context's signal has fired.

use thiserror::Error;

/// Why a context stopped being live.
///
/// Both variants are terminal. They are only ever reported to code that
/// observes the signal (`err`, `done`, `run`); deriving and looking up values
/// never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ContextError {
    /// The context, or one of its ancestors, was released explicitly.
    #[error("context canceled")]
    Canceled,

    /// The context's deadline elapsed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

impl ContextError {
    /// Short label used for log fields and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextError::Canceled => "canceled",
            ContextError::DeadlineExceeded => "deadline_exceeded",
        }
    }
}
