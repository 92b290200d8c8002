//! Error types for vzlite.

use std::fmt;

use thiserror::Error;

use crate::handle::Handle;

/// Result alias used by every vzlite operation.
pub type VzResult<T> = Result<T, VzError>;

/// Errors returned by vzlite operations.
///
/// Every error is returned synchronously to the caller of the operation that
/// produced it. Nothing here is raised for ordinary control flow by a panic.
#[derive(Debug, Error)]
pub enum VzError {
    /// Bad dimensions or arguments, detected before any foreign call.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// Feature gated by the runtime's platform version.
    #[error("requires platform version {required} or newer, running {actual}")]
    UnsupportedOnPlatform { required: u32, actual: String },

    /// The runtime reported a failure for an operation.
    #[error("{operation} failed: {source}")]
    Foreign {
        operation: &'static str,
        #[source]
        source: ForeignError,
    },

    /// The operation is not valid in the current lifecycle state.
    #[error("{0}")]
    Precondition(String),

    /// A token did not resolve against the handle registry.
    #[error(transparent)]
    Handle(#[from] HandleError),

    /// A bridge invariant was broken (dropped channel, dead worker).
    #[error("internal error: {0}")]
    Internal(String),

    /// Filesystem or thread-spawn failure (log directory, worker threads).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl VzError {
    /// Wrap a runtime error with the name of the operation that produced it.
    pub fn foreign(operation: &'static str, source: ForeignError) -> Self {
        Self::Foreign { operation, source }
    }
}

/// Typed form of the runtime's native error object.
///
/// The runtime reports errors as a domain string, a numeric code and a human
/// readable description. The triple is preserved unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignError {
    pub domain: String,
    pub code: i64,
    pub description: String,
}

impl ForeignError {
    pub fn new(domain: impl Into<String>, code: i64, description: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            code,
            description: description.into(),
        }
    }

    /// Placeholder for a callback that signalled failure without an error object.
    pub fn unspecified() -> Self {
        Self::new("vzlite", -1, "the runtime reported an unspecified error")
    }
}

impl fmt::Display for ForeignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (domain: {}, code: {})",
            self.description, self.domain, self.code
        )
    }
}

impl std::error::Error for ForeignError {}

/// Outcome of resolving a token that does not name a live value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleError {
    #[error("handle {0} not found")]
    NotFound(Handle),

    #[error("handle {handle} holds {found}, expected {expected}")]
    TypeMismatch {
        handle: Handle,
        expected: &'static str,
        found: &'static str,
    },
}
