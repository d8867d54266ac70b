//! Relay Gateway - network surfaces of the browser relay.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                       RELAY GATEWAY                           │
//! ├───────────────────────────────────────────────────────────────┤
//! │   POST /mcp          GET /ws          /status /health /metrics │
//! │  ┌───────────┐   ┌──────────────┐                             │
//! │  │ JSON-RPC  │   │   Executor   │                             │
//! │  │ tool calls│   │   sessions   │                             │
//! │  └─────┬─────┘   └──────┬───────┘                             │
//! │        │ dispatch        │ register / inbound frames           │
//! │  ┌─────┴─────────────────┴───────┐                            │
//! │  │      relay_core::RelayEngine  │                            │
//! │  └───────────────────────────────┘                            │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use relay_gateway::{GatewayConfig, RelayGatewayService};
//!
//! let service = RelayGatewayService::new(GatewayConfig::default())?;
//! service.start().await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod rpc;
pub mod service;
pub mod tools;
pub mod ws;

pub use config::{ConfigError, CorsConfig, GatewayConfig, HttpConfig, WebSocketConfig};
pub use error::{ApiError, GatewayError};
pub use service::{build_router, RelayGatewayService};
