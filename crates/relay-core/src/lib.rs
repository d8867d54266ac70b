//! Relay Core - request correlation and broadcast dispatch for browser executors.
//!
//! Callers issue a command and block until some executor reports back. The
//! executors are remote, connect and disconnect at will, and answer
//! asynchronously over a message channel. This crate pairs each reply with
//! the request that produced it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          RELAY ENGINE                               │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │   tool caller ──dispatch()──► Dispatcher ──broadcast──► Registry ───┼──► executors
//! │                                   │                                 │
//! │                              insert / await                          │
//! │                                   ▼                                 │
//! │                       ┌───────────────────────┐                     │
//! │                       │ Pending Request Table │◄── sweep ── Reaper  │
//! │                       │  (oneshot per request) │                     │
//! │                       └───────────▲───────────┘                     │
//! │                                   │ resolve                          │
//! │                          Completion Router ◄────────────────────────┼─── executors
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Guarantees
//!
//! - Every dispatched request ends exactly once: result, executor error,
//!   timeout or reaper expiry. Resolution removes the table entry, and only
//!   the remover can deliver.
//! - Requests are never cancelled by executor disconnects; another executor
//!   may still answer before the deadline.
//! - Unknown, late and malformed executor frames are dropped without
//!   affecting callers or connections.
//!
//! # Usage
//!
//! ```ignore
//! use relay_core::{Command, CommandDispatcher, CommandKind, DispatchConfig, RelayEngine};
//!
//! let engine = RelayEngine::new(DispatchConfig::default())?;
//! let (channel, outbound) = relay_core::adapters::channel(64);
//! engine.register(channel);
//! let result = engine.dispatch(Command::new(CommandKind::Navigate, payload)).await;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod dispatcher;
pub mod domain;
pub mod engine;
pub mod pending;
pub mod ports;
pub mod reaper;
pub mod registry;
pub mod router;

pub use domain::{
    BroadcastMode, ChannelError, ChannelId, Command, CommandKind, ConfigError, DispatchConfig,
    DispatchError, DispatchResult, InboundFrame, OutboundFrame, ReaperConfig, RequestId,
    TimeoutConfig,
};
pub use engine::RelayEngine;
pub use pending::{PendingStatsSnapshot, Resolution, ResolveStatus};
pub use ports::{CommandDispatcher, EngineStatus, ExecutorChannel};
pub use router::RouteOutcome;
