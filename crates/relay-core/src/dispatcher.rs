//! Dispatcher - stamps commands, broadcasts them and waits for the outcome.

use crate::domain::{
    Command, CommandKind, DispatchConfig, DispatchError, DispatchResult, OutboundFrame, RequestId,
    TableError,
};
use crate::pending::{PendingRequestTable, Resolution};
use crate::registry::ExecutorRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub struct Dispatcher {
    registry: Arc<ExecutorRegistry>,
    table: Arc<PendingRequestTable>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ExecutorRegistry>,
        table: Arc<PendingRequestTable>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            registry,
            table,
            config,
        }
    }

    /// Send a command to the executors and wait for its terminal outcome.
    ///
    /// Produces exactly one outcome. The per-request timer resolves through
    /// the table like every other path, so if a completion or the reaper got
    /// there first, that resolution is what the caller sees.
    pub async fn dispatch(&self, command: Command) -> DispatchResult {
        let Command { kind, payload } = command;

        if self.registry.count() == 0 {
            info!(kind = %kind, "Dispatch rejected, no executor connected");
            return Err(DispatchError::NoExecutorAvailable);
        }

        let id = RequestId::new();
        let frame = OutboundFrame::Command { id, kind, payload }
            .encode()
            .map_err(|e| DispatchError::Encode(e.to_string()))?;

        let timeout = self.config.timeout_for(kind);
        let deadline = Instant::now() + timeout;

        let mut rx = self
            .table
            .insert(id, kind, deadline)
            .map_err(|e| match e {
                TableError::DuplicateRequestId(id) => DispatchError::DuplicateRequestId(id),
            })?;
        let _cancel = CancelOnDrop {
            table: &self.table,
            id,
        };

        let delivered = self.registry.broadcast(&frame);
        if delivered == 0 {
            // Executors vanished between the count and the send; one may reconnect
            warn!(request_id = %id, kind = %kind, "Command reached no executor, waiting for deadline");
        } else {
            debug!(request_id = %id, kind = %kind, delivered, "Command broadcast");
        }

        let resolution = match tokio::time::timeout_at(deadline, &mut rx).await {
            Ok(received) => received,
            Err(_) => {
                self.table.resolve(id, Resolution::TimedOut);
                // Whoever removed the entry has sent (or is about to send)
                rx.await
            }
        };

        match resolution {
            Ok(resolution) => into_result(kind, timeout, resolution),
            // Sender dropped without sending; only happens if the table itself is torn down
            Err(_) => Err(DispatchError::Expired { kind }),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }
}

/// Removes the entry if the dispatch future is dropped before an outcome
/// arrives. A no-op once any resolver has taken the entry.
struct CancelOnDrop<'a> {
    table: &'a PendingRequestTable,
    id: RequestId,
}

impl Drop for CancelOnDrop<'_> {
    fn drop(&mut self) {
        self.table.cancel(self.id);
    }
}

fn into_result(kind: CommandKind, timeout: Duration, resolution: Resolution) -> DispatchResult {
    match resolution {
        Resolution::Succeeded(value) => Ok(value),
        Resolution::Failed(message) => Err(DispatchError::ExecutorFailure(message)),
        Resolution::TimedOut => {
            warn!(kind = %kind, timeout_ms = timeout.as_millis() as u64, "Request timed out");
            Err(DispatchError::Timeout {
                kind,
                after: timeout,
            })
        }
        Resolution::Expired => Err(DispatchError::Expired { kind }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::channel;
    use crate::domain::{BroadcastMode, TimeoutConfig};
    use crate::ports::ExecutorChannel;
    use serde_json::json;

    fn setup(timeout: Duration) -> (Arc<ExecutorRegistry>, Arc<PendingRequestTable>, Arc<Dispatcher>) {
        let registry = Arc::new(ExecutorRegistry::new(BroadcastMode::All));
        let table = Arc::new(PendingRequestTable::new(64));
        let config = DispatchConfig {
            timeouts: TimeoutConfig::uniform(timeout),
            ..DispatchConfig::default()
        };
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&table),
            config,
        ));
        (registry, table, dispatcher)
    }

    fn command_id(frame: &str) -> RequestId {
        match serde_json::from_str::<OutboundFrame>(frame).unwrap() {
            OutboundFrame::Command { id, .. } => id,
            other => panic!("expected command frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_executor_fails_fast() {
        let (_registry, table, dispatcher) = setup(Duration::from_secs(5));

        let result = dispatcher
            .dispatch(Command::new(CommandKind::Execute, json!({"code": "1+1"})))
            .await;

        assert_eq!(result, Err(DispatchError::NoExecutorAvailable));
        assert!(table.is_empty());
        assert_eq!(table.stats().snapshot().registered, 0);
    }

    #[tokio::test]
    async fn test_executor_failure_propagates_verbatim() {
        let (registry, table, dispatcher) = setup(Duration::from_secs(5));
        let (chan, mut rx) = channel(8);
        registry.register(chan);

        let task = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move {
                dispatcher
                    .dispatch(Command::new(CommandKind::CaptureDom, json!({"selector": "#x"})))
                    .await
            }
        });

        let id = command_id(&rx.recv().await.unwrap());
        table.resolve(id, Resolution::Failed("selector not found".into()));

        assert_eq!(
            task.await.unwrap(),
            Err(DispatchError::ExecutorFailure("selector not found".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_when_executor_is_silent() {
        let (registry, table, dispatcher) = setup(Duration::from_secs(30));
        let (chan, mut rx) = channel(8);
        registry.register(chan);

        let result = dispatcher
            .dispatch(Command::new(CommandKind::Navigate, json!({"url": "https://x"})))
            .await;

        assert_eq!(
            result,
            Err(DispatchError::Timeout {
                kind: CommandKind::Navigate,
                after: Duration::from_secs(30),
            })
        );
        assert!(table.is_empty());

        // A late completion is dropped
        let id = command_id(&rx.recv().await.unwrap());
        assert_eq!(
            table.resolve(id, Resolution::Succeeded(json!(null))),
            crate::pending::ResolveStatus::AlreadyResolved
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_resolution_wins_over_timer() {
        let (registry, table, dispatcher) = setup(Duration::from_secs(30));
        let (chan, mut rx) = channel(8);
        registry.register(chan);

        let task = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move {
                dispatcher
                    .dispatch(Command::new(CommandKind::ShowAlert, json!({"message": "hi"})))
                    .await
            }
        });
        let _ = rx.recv().await.unwrap();

        // Sweep as if the clock were already past the deadline
        let expired = table.sweep_expired(Instant::now() + Duration::from_secs(31));
        assert_eq!(expired.len(), 1);

        assert_eq!(
            task.await.unwrap(),
            Err(DispatchError::Expired {
                kind: CommandKind::ShowAlert
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_dispatch_leaves_no_entry() {
        let (registry, table, dispatcher) = setup(Duration::from_secs(10));
        let (chan, mut rx) = channel(8);
        registry.register(chan);

        // Caller gives up long before the command deadline
        let gave_up = tokio::time::timeout(
            Duration::from_secs(1),
            dispatcher.dispatch(Command::new(CommandKind::ShowAlert, json!({"message": "hi"}))),
        )
        .await;
        assert!(gave_up.is_err());
        assert!(table.is_empty());

        // The executor's answer now arrives for a forgotten request
        let id = command_id(&rx.recv().await.unwrap());
        assert_eq!(
            table.resolve(id, Resolution::Succeeded(json!({"ok": true}))),
            crate::pending::ResolveStatus::AlreadyResolved
        );

        tokio::time::advance(Duration::from_secs(12)).await;
        assert!(table.sweep_expired(Instant::now()).is_empty());

        let stats = table.stats().snapshot();
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.expired, 0);
        assert_eq!(stats.timeouts, 0);
        assert_eq!(stats.abandoned, 0);
    }

    #[tokio::test]
    async fn test_completed_dispatch_is_not_counted_as_cancelled() {
        let (registry, table, dispatcher) = setup(Duration::from_secs(5));
        let (chan, mut rx) = channel(8);
        registry.register(chan);

        let task = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move {
                dispatcher
                    .dispatch(Command::new(CommandKind::Execute, json!({"code": "1"})))
                    .await
            }
        });
        let id = command_id(&rx.recv().await.unwrap());
        table.resolve(id, Resolution::Succeeded(json!(1)));

        assert_eq!(task.await.unwrap(), Ok(json!(1)));
        assert_eq!(table.stats().snapshot().cancelled, 0);
    }

    #[tokio::test]
    async fn test_disconnect_does_not_cancel_request() {
        let (registry, table, dispatcher) = setup(Duration::from_secs(5));
        let (first, mut first_rx) = channel(8);
        registry.register(first.clone());

        let task = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move {
                dispatcher
                    .dispatch(Command::new(CommandKind::CaptureScreenshot, json!({})))
                    .await
            }
        });
        let id = command_id(&first_rx.recv().await.unwrap());

        registry.unregister(&first.id());
        assert!(table.is_pending(&id));

        // A reconnected executor can still answer
        table.resolve(id, Resolution::Succeeded(json!({"png": "..."})));
        assert_eq!(task.await.unwrap(), Ok(json!({"png": "..."})));
    }
}
