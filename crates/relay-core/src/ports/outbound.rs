//! Outbound (driven) ports.

use crate::domain::{ChannelError, ChannelId};

/// One live connection to an executor.
///
/// `try_send` must not block: broadcast is fire-and-forget and a stalled
/// executor may not hold up any other caller.
pub trait ExecutorChannel: Send + Sync {
    fn id(&self) -> ChannelId;

    /// False once the connection is closing
    fn is_open(&self) -> bool;

    /// Queue an encoded frame for delivery.
    fn try_send(&self, frame: &str) -> Result<(), ChannelError>;
}
