//! Executor channel backed by a bounded tokio mpsc queue.
//!
//! The transport owns the receiving half and drains it onto the socket; the
//! registry only ever sees the sending half.

use crate::domain::{ChannelError, ChannelId};
use crate::ports::ExecutorChannel;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Sending half of one executor connection
#[derive(Debug)]
pub struct MpscChannel {
    id: ChannelId,
    tx: mpsc::Sender<String>,
}

impl MpscChannel {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self {
            id: ChannelId::new(),
            tx,
        }
    }
}

impl ExecutorChannel for MpscChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    fn try_send(&self, frame: &str) -> Result<(), ChannelError> {
        self.tx.try_send(frame.to_owned()).map_err(|e| match e {
            TrySendError::Full(_) => ChannelError::Full,
            TrySendError::Closed(_) => ChannelError::Closed,
        })
    }
}

/// Create a channel with an outbound queue of `buffer` frames
pub fn channel(buffer: usize) -> (Arc<MpscChannel>, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (Arc::new(MpscChannel::new(tx)), rx)
}
