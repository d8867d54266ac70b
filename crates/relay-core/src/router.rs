//! Completion Router - matches executor replies to pending requests.
//!
//! Nothing an executor sends can fail a caller or stop the router: stale,
//! duplicate and malformed frames are logged and dropped.

use crate::domain::message::error_message;
use crate::domain::{ChannelId, InboundError, InboundFrame, OutboundFrame};
use crate::pending::{PendingRequestTable, Resolution, ResolveStatus};
use crate::ports::EngineStatus;
use crate::registry::ExecutorRegistry;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// What happened to one inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A pending request was resolved
    Resolved,
    /// Completion arrived after its request was already resolved
    Late,
    /// Completion for an id the table does not know
    Unknown,
    /// Frame could not be understood
    Malformed,
    /// Frame is answered directly on the sending channel
    Reply(String),
}

impl RouteOutcome {
    /// Short label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::Late => "late",
            Self::Unknown => "unknown",
            Self::Malformed => "malformed",
            Self::Reply(_) => "reply",
        }
    }
}

pub struct CompletionRouter {
    table: Arc<PendingRequestTable>,
    registry: Arc<ExecutorRegistry>,
}

impl CompletionRouter {
    pub fn new(table: Arc<PendingRequestTable>, registry: Arc<ExecutorRegistry>) -> Self {
        Self { table, registry }
    }

    /// Route one text frame received on `channel`.
    pub fn route(&self, channel: ChannelId, text: &str) -> RouteOutcome {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(channel_id = %channel, error = %e, "Dropping inbound frame");
                return RouteOutcome::Malformed;
            }
        };

        match frame {
            InboundFrame::CommandResult { id, result } => {
                self.complete(channel, id, Resolution::Succeeded(result))
            }
            InboundFrame::CommandError { id, error } => {
                self.complete(channel, id, Resolution::Failed(error_message(&error)))
            }
            InboundFrame::Status => {
                let status = self.status();
                self.reply(OutboundFrame::Status {
                    connected_executors: status.connected_executors,
                    pending_requests: status.pending_requests,
                })
            }
            InboundFrame::Ping => self.reply(OutboundFrame::Pong),
        }
    }

    /// Read-only snapshot; never touches table contents
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            connected_executors: self.registry.count(),
            pending_requests: self.table.len(),
        }
    }

    fn complete(
        &self,
        channel: ChannelId,
        id: crate::domain::RequestId,
        resolution: Resolution,
    ) -> RouteOutcome {
        match self.table.resolve(id, resolution) {
            ResolveStatus::Resolved => {
                debug!(channel_id = %channel, request_id = %id, "Completion matched");
                RouteOutcome::Resolved
            }
            ResolveStatus::AlreadyResolved => {
                // A reply this late usually means the executor is backed up
                warn!(
                    channel_id = %channel,
                    request_id = %id,
                    "Late completion for already resolved request"
                );
                RouteOutcome::Late
            }
            ResolveStatus::Unknown => {
                let err = InboundError::UnknownOrStale(id);
                debug!(channel_id = %channel, error = %err, "Dropping completion");
                RouteOutcome::Unknown
            }
        }
    }

    fn reply(&self, frame: OutboundFrame) -> RouteOutcome {
        match frame.encode() {
            Ok(text) => RouteOutcome::Reply(text),
            Err(e) => {
                error!(error = %e, "Failed to encode reply frame");
                RouteOutcome::Malformed
            }
        }
    }
}
