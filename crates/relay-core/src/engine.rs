//! Relay engine - wires registry, table, dispatcher, router and reaper.
//!
//! The transport layer only talks to this type: it registers channels as
//! executors connect, feeds every inbound text frame to `handle_inbound`, and
//! calls `dispatch` on behalf of tool callers.

use crate::dispatcher::Dispatcher;
use crate::domain::{ChannelId, Command, ConfigError, DispatchConfig, DispatchResult};
use crate::pending::{PendingRequestTable, PendingStatsSnapshot};
use crate::ports::{CommandDispatcher, EngineStatus, ExecutorChannel};
use crate::reaper::Reaper;
use crate::registry::ExecutorRegistry;
use crate::router::{CompletionRouter, RouteOutcome};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct RelayEngine {
    registry: Arc<ExecutorRegistry>,
    table: Arc<PendingRequestTable>,
    dispatcher: Dispatcher,
    router: CompletionRouter,
}

impl RelayEngine {
    /// Build an engine from validated configuration.
    pub fn new(config: DispatchConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let registry = Arc::new(ExecutorRegistry::new(config.broadcast));
        let table = Arc::new(PendingRequestTable::new(config.tombstone_capacity));
        let router = CompletionRouter::new(Arc::clone(&table), Arc::clone(&registry));
        let dispatcher = Dispatcher::new(Arc::clone(&registry), Arc::clone(&table), config);

        Ok(Self {
            registry,
            table,
            dispatcher,
            router,
        })
    }

    pub fn register(&self, channel: Arc<dyn ExecutorChannel>) {
        self.registry.register(channel);
    }

    /// Drop a channel. Requests already broadcast stay pending.
    pub fn unregister(&self, id: &ChannelId) -> bool {
        self.registry.unregister(id)
    }

    /// Feed one text frame received from an executor.
    pub fn handle_inbound(&self, channel: ChannelId, text: &str) -> RouteOutcome {
        self.router.route(channel, text)
    }

    pub fn stats(&self) -> PendingStatsSnapshot {
        self.table.stats().snapshot()
    }

    pub fn config(&self) -> &DispatchConfig {
        self.dispatcher.config()
    }

    /// Start the background reaper; it stops when `shutdown` turns true.
    pub fn spawn_reaper(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        self.reaper().spawn(shutdown)
    }

    /// A reaper over this engine's table, for driving sweeps by hand
    pub fn reaper(&self) -> Reaper {
        Reaper::new(Arc::clone(&self.table), self.config().reaper.clone())
    }
}

#[async_trait]
impl CommandDispatcher for RelayEngine {
    async fn dispatch(&self, command: Command) -> DispatchResult {
        self.dispatcher.dispatch(command).await
    }

    fn status(&self) -> EngineStatus {
        self.router.status()
    }
}
