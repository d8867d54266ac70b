//! Domain types for the dispatch engine.

pub mod command;
pub mod config;
pub mod correlation;
pub mod error;
pub mod message;

pub use command::{Command, CommandKind, UnknownCommandKind};
pub use config::{BroadcastMode, ConfigError, DispatchConfig, ReaperConfig, TimeoutConfig};
pub use correlation::{ChannelId, RequestId};
pub use error::{ChannelError, DispatchError, DispatchResult, InboundError, TableError};
pub use message::{InboundFrame, OutboundFrame};
