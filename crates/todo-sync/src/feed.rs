//! Change notifications for the todo table.
//!
//! The synchronizer only needs to know *that* something changed; every
//! notification is answered with a full fetch, so row payloads are dropped
//! here.

use crate::SyncResult;
use async_trait::async_trait;
use realtime_feed::{ChannelConfig, RealtimeChannel, RealtimeConfig, RealtimeEvent};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Subscribed,
    /// A row was inserted, updated or deleted.
    Changed,
    Error(String),
    /// The feed stopped for good.
    Closed,
}

/// Controls a live subscription.
#[async_trait]
pub trait FeedHandle: Send + Sync {
    fn set_access_token(&self, access_token: &str);

    /// Leave the channel. Idempotent.
    async fn release(&mut self);
}

/// An open subscription: its event stream plus the handle that releases it.
pub struct FeedSubscription {
    pub events: mpsc::UnboundedReceiver<FeedEvent>,
    pub handle: Box<dyn FeedHandle>,
}

impl FeedSubscription {
    pub fn new(events: mpsc::UnboundedReceiver<FeedEvent>, handle: Box<dyn FeedHandle>) -> Self {
        Self { events, handle }
    }
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Subscribe to INSERT, UPDATE and DELETE on `table`.
    async fn subscribe(&self, table: &str, access_token: &str) -> SyncResult<FeedSubscription>;
}

/// [`ChangeFeed`] over the platform's realtime websocket.
#[derive(Debug, Clone)]
pub struct RealtimeFeed {
    config: RealtimeConfig,
}

impl RealtimeFeed {
    pub fn new(config: RealtimeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ChangeFeed for RealtimeFeed {
    async fn subscribe(&self, table: &str, access_token: &str) -> SyncResult<FeedSubscription> {
        let (channel, realtime_events) =
            RealtimeChannel::open(self.config.clone(), ChannelConfig::table(table), access_token);
        let (tx, events) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(forward(realtime_events, tx));

        let handle = RealtimeHandle {
            channel: Some(channel),
            forwarder,
        };
        Ok(FeedSubscription::new(events, Box::new(handle)))
    }
}

async fn forward(
    mut realtime_events: broadcast::Receiver<RealtimeEvent>,
    tx: mpsc::UnboundedSender<FeedEvent>,
) {
    let mut joined_before = false;
    loop {
        let event = match realtime_events.recv().await {
            // A rejoin may have missed changes made while the socket was down.
            Ok(RealtimeEvent::Subscribed) if joined_before => FeedEvent::Changed,
            Ok(RealtimeEvent::Subscribed) => {
                joined_before = true;
                FeedEvent::Subscribed
            }
            Ok(RealtimeEvent::Change(_)) => FeedEvent::Changed,
            Ok(RealtimeEvent::ChannelError(reason)) => FeedEvent::Error(reason),
            Ok(RealtimeEvent::Disconnected(reason)) => {
                debug!(reason = ?reason, "Change feed disconnected");
                continue;
            }
            Ok(RealtimeEvent::Closed) | Err(broadcast::error::RecvError::Closed) => {
                let _ = tx.send(FeedEvent::Closed);
                break;
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                // Some notifications were dropped; one reload covers them all.
                warn!(missed, "Change feed lagged");
                FeedEvent::Changed
            }
        };

        if tx.send(event).is_err() {
            break;
        }
    }
}

struct RealtimeHandle {
    channel: Option<RealtimeChannel>,
    forwarder: JoinHandle<()>,
}

#[async_trait]
impl FeedHandle for RealtimeHandle {
    fn set_access_token(&self, access_token: &str) {
        if let Some(channel) = &self.channel {
            if let Err(e) = channel.set_access_token(access_token) {
                debug!(error = %e, "Change feed already closed");
            }
        }
    }

    async fn release(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.close().await;
        }
        self.forwarder.abort();
    }
}

impl Drop for RealtimeHandle {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn forwarded(events: Vec<RealtimeEvent>) -> Vec<FeedEvent> {
        let (realtime_tx, realtime_rx) = broadcast::channel(16);
        let (tx, mut rx) = mpsc::unbounded_channel();
        for event in events {
            realtime_tx.send(event).unwrap();
        }
        forward(realtime_rx, tx).await;

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        seen
    }

    #[tokio::test]
    async fn test_rejoin_reloads() {
        let seen = forwarded(vec![
            RealtimeEvent::Subscribed,
            RealtimeEvent::Disconnected(Some("reset".to_string())),
            RealtimeEvent::Subscribed,
            RealtimeEvent::Closed,
        ])
        .await;

        assert_eq!(
            seen,
            vec![FeedEvent::Subscribed, FeedEvent::Changed, FeedEvent::Closed]
        );
    }

    #[tokio::test]
    async fn test_channel_errors_pass_through() {
        let seen = forwarded(vec![
            RealtimeEvent::ChannelError("denied".to_string()),
            RealtimeEvent::Closed,
        ])
        .await;

        assert_eq!(
            seen,
            vec![FeedEvent::Error("denied".to_string()), FeedEvent::Closed]
        );
    }
}
