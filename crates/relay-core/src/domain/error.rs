//! Error types for the dispatch engine.
//!
//! Only [`DispatchError`] ever reaches a caller. Table and inbound errors are
//! internal and end up in logs and counters.

use crate::domain::command::CommandKind;
use crate::domain::correlation::RequestId;
use std::time::Duration;

/// Terminal failure of a dispatch call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    /// No executor was connected when the command was dispatched
    #[error("no browser executor is connected")]
    NoExecutorAvailable,

    /// The per-kind deadline elapsed before any executor answered
    #[error("{kind} timed out after {}ms without a reply from the executor", .after.as_millis())]
    Timeout { kind: CommandKind, after: Duration },

    /// The reaper swept the request after its deadline had passed
    #[error("{kind} expired without a reply from the executor")]
    Expired { kind: CommandKind },

    /// The executor replied with an explicit error
    #[error("{0}")]
    ExecutorFailure(String),

    /// The generated id was already pending
    #[error("request id {0} is already pending")]
    DuplicateRequestId(RequestId),

    /// The outbound frame could not be serialized
    #[error("failed to encode command: {0}")]
    Encode(String),
}

impl DispatchError {
    /// True for both the per-request timer and the reaper path
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Expired { .. })
    }

    /// Short label for metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoExecutorAvailable => "no_executor",
            Self::Timeout { .. } => "timeout",
            Self::Expired { .. } => "expired",
            Self::ExecutorFailure(_) => "executor_error",
            Self::DuplicateRequestId(_) => "duplicate_id",
            Self::Encode(_) => "encode_error",
        }
    }
}

/// Result of a dispatch call
pub type DispatchResult = Result<serde_json::Value, DispatchError>;

/// Pending table errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("request id {0} is already pending")]
    DuplicateRequestId(RequestId),
}

/// Problems with frames received from an executor
#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    /// Not JSON, or JSON without a recognized `type`
    #[error("malformed inbound frame: {0}")]
    Malformed(String),

    /// A completion for an id the table does not hold
    #[error("completion for unknown or stale request {0}")]
    UnknownOrStale(RequestId),
}

/// Outbound channel errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,
    #[error("outbound buffer full")]
    Full,
}
