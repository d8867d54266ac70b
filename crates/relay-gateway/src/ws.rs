//! Executor WebSocket endpoint.
//!
//! Each connection becomes one executor channel:
//! - a bounded queue the engine broadcasts into
//! - a writer task draining that queue onto the socket
//! - a reader loop feeding inbound frames to the engine
//!
//! Closing or erroring the socket unregisters the channel. Requests already
//! sent to it stay pending until another executor answers or they time out.

use crate::config::WebSocketConfig;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use relay_core::adapters::{channel, MpscChannel};
use relay_core::{ChannelId, CommandDispatcher, ExecutorChannel, RelayEngine, RouteOutcome};
use relay_telemetry::{EXECUTORS_CONNECTED, INBOUND_FRAMES};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What happened to one frame read from the socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Larger than `max_message_size`, dropped unread
    Oversized,
    /// Binary frame that is not UTF-8
    NotText,
    /// Handed to the engine
    Routed(RouteOutcome),
}

impl Disposition {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Oversized => "oversized",
            Self::NotText => "malformed",
            Self::Routed(outcome) => outcome.label(),
        }
    }
}

/// One executor connection
pub struct ExecutorSession {
    engine: Arc<RelayEngine>,
    config: WebSocketConfig,
    channel: Arc<MpscChannel>,
}

impl ExecutorSession {
    /// Create the session and register its channel with the engine.
    ///
    /// Returns the receiving end of the channel's outbound queue.
    pub fn open(
        engine: Arc<RelayEngine>,
        config: WebSocketConfig,
    ) -> (Self, mpsc::Receiver<String>) {
        let (channel, outbound) = channel(config.outbound_buffer);
        engine.register(channel.clone());
        EXECUTORS_CONNECTED.set(engine.status().connected_executors as i64);

        let session = Self {
            engine,
            config,
            channel,
        };
        (session, outbound)
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel.id()
    }

    /// Handle one text frame. Replies are queued on this session's channel.
    pub fn process_text(&self, text: &str) -> Disposition {
        if self.oversized(text.len()) {
            return self.record(Disposition::Oversized);
        }

        let outcome = self.engine.handle_inbound(self.channel.id(), text);
        if let RouteOutcome::Reply(reply) = &outcome {
            if let Err(e) = self.channel.try_send(reply) {
                warn!(channel_id = %self.channel.id(), error = %e, "Could not queue reply");
            }
        }
        self.record(Disposition::Routed(outcome))
    }

    /// Handle one binary frame; UTF-8 payloads are treated as text.
    pub fn process_binary(&self, data: Vec<u8>) -> Disposition {
        if self.oversized(data.len()) {
            return self.record(Disposition::Oversized);
        }
        match String::from_utf8(data) {
            Ok(text) => self.process_text(&text),
            Err(_) => {
                warn!(channel_id = %self.channel.id(), "Dropping non UTF-8 binary frame");
                self.record(Disposition::NotText)
            }
        }
    }

    fn oversized(&self, size: usize) -> bool {
        if size <= self.config.max_message_size {
            return false;
        }
        warn!(
            channel_id = %self.channel.id(),
            size,
            max = self.config.max_message_size,
            "Executor frame exceeds size limit, dropped"
        );
        true
    }

    fn record(&self, disposition: Disposition) -> Disposition {
        INBOUND_FRAMES
            .with_label_values(&[disposition.label()])
            .inc();
        disposition
    }

    /// Drive the socket until it closes.
    pub async fn run(self, mut outbound: mpsc::Receiver<String>, socket: WebSocket) {
        let channel_id = self.channel.id();
        info!(channel_id = %channel_id, "Executor connected");

        let (mut sink, mut stream) = socket.split();
        let ping_interval = self.config.ping_interval;

        let writer = tokio::spawn(async move {
            let mut ping = tokio::time::interval(ping_interval);
            ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ping.tick().await;

            loop {
                tokio::select! {
                    frame = outbound.recv() => {
                        let Some(text) = frame else { break };
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            debug!(channel_id = %channel_id, error = %e, "Executor write failed");
                            break;
                        }
                    }
                    _ = ping.tick() => {
                        if sink.send(Message::Ping(Vec::new())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            // Stop accepting broadcasts as soon as the socket is unusable
            outbound.close();
            let _ = sink.close().await;
        });

        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    self.process_text(&text);
                }
                Ok(Message::Binary(data)) => {
                    self.process_binary(data);
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Close(frame)) => {
                    debug!(channel_id = %channel_id, ?frame, "Executor sent close");
                    break;
                }
                Err(e) => {
                    warn!(channel_id = %channel_id, error = %e, "Executor socket error");
                    break;
                }
            }
        }

        writer.abort();
        self.close();
    }

    /// Unregister the channel; pending requests are left alone.
    pub fn close(self) {
        let channel_id = self.channel.id();
        self.engine.unregister(&channel_id);
        EXECUTORS_CONNECTED.set(self.engine.status().connected_executors as i64);
        info!(channel_id = %channel_id, "Executor disconnected");
    }
}
