//! Inbound (driving) ports.

use crate::domain::{Command, DispatchResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Snapshot for health reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub connected_executors: usize,
    pub pending_requests: usize,
}

/// API the tool frontend uses to run commands on an executor.
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    /// Dispatch a command and wait for its terminal outcome.
    ///
    /// Always returns; failures come back as `Err(DispatchError)`.
    async fn dispatch(&self, command: Command) -> DispatchResult;

    /// Read-only status snapshot.
    fn status(&self) -> EngineStatus;
}
