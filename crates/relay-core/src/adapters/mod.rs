//! Adapters implementing the outbound ports.

pub mod channel;

pub use channel::{channel, MpscChannel};
