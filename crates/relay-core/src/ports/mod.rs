//! Ports layer for the dispatch engine.
//!
//! - Inbound (driving): what the tool frontend calls
//! - Outbound (driven): what the engine needs from the executor transport

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
