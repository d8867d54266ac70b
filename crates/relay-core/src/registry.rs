//! Executor Registry - the set of currently connected executor channels.

use crate::domain::{BroadcastMode, ChannelError, ChannelId};
use crate::ports::ExecutorChannel;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

struct Registered {
    channel: Arc<dyn ExecutorChannel>,
    /// Registration order, used by [`BroadcastMode::Latest`]
    seq: u64,
}

/// Registry of executor channels.
///
/// Connections come and go at any time; a broadcast only reaches the channels
/// registered at the moment it runs.
pub struct ExecutorRegistry {
    channels: DashMap<ChannelId, Registered>,
    next_seq: AtomicU64,
    mode: BroadcastMode,
}

impl ExecutorRegistry {
    pub fn new(mode: BroadcastMode) -> Self {
        Self {
            channels: DashMap::new(),
            next_seq: AtomicU64::new(0),
            mode,
        }
    }

    /// Add a channel
    pub fn register(&self, channel: Arc<dyn ExecutorChannel>) {
        let id = channel.id();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.channels.insert(id, Registered { channel, seq });
        info!(
            channel_id = %id,
            connected = self.channels.len(),
            "Executor registered"
        );
    }

    /// Remove a channel. Returns false if it was not registered.
    pub fn unregister(&self, id: &ChannelId) -> bool {
        let removed = self.channels.remove(id).is_some();
        if removed {
            info!(
                channel_id = %id,
                connected = self.channels.len(),
                "Executor unregistered"
            );
        }
        removed
    }

    /// Number of open channels
    pub fn count(&self) -> usize {
        self.channels
            .iter()
            .filter(|entry| entry.value().channel.is_open())
            .count()
    }

    pub fn contains(&self, id: &ChannelId) -> bool {
        self.channels.contains_key(id)
    }

    /// Send a frame to the channels selected by the broadcast mode.
    ///
    /// Closing channels are skipped and pruned, full ones are skipped.
    /// Returns how many channels accepted the frame.
    pub fn broadcast(&self, frame: &str) -> usize {
        // Snapshot first so no map shard stays locked while sending
        let targets = self.targets();
        let mut delivered = 0;

        for channel in targets {
            match channel.try_send(frame) {
                Ok(()) => delivered += 1,
                Err(ChannelError::Closed) => {
                    debug!(channel_id = %channel.id(), "Skipping closed executor channel");
                    self.unregister(&channel.id());
                }
                Err(ChannelError::Full) => {
                    warn!(
                        channel_id = %channel.id(),
                        "Executor outbound buffer full, frame dropped for this channel"
                    );
                }
            }
        }

        delivered
    }

    fn targets(&self) -> Vec<Arc<dyn ExecutorChannel>> {
        let mut open = Vec::new();
        let mut closed = Vec::new();
        for entry in self.channels.iter() {
            let registered = entry.value();
            if registered.channel.is_open() {
                open.push((registered.seq, Arc::clone(&registered.channel)));
            } else {
                closed.push(*entry.key());
            }
        }

        for id in closed {
            debug!(channel_id = %id, "Skipping closed executor channel");
            self.unregister(&id);
        }

        match self.mode {
            BroadcastMode::All => open.into_iter().map(|(_, channel)| channel).collect(),
            BroadcastMode::Latest => open
                .into_iter()
                .max_by_key(|(seq, _)| *seq)
                .map(|(_, channel)| channel)
                .into_iter()
                .collect(),
        }
    }
}
