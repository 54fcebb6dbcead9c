//! Realtime change feed over a Phoenix-channel websocket.
//!
//! This crate provides:
//! - Phoenix message framing (`phx_join`, `phx_leave`, `heartbeat`, `access_token`)
//! - `postgres_changes` decoding into [`ChangeEvent`]s
//! - A background connection with heartbeat and reconnect-with-backoff
//! - Explicit release of the channel (`phx_leave`, then close)

mod client;
mod error;
mod messages;

pub use client::{ConnectionState, RealtimeChannel, RealtimeConfig, RealtimeEvent};
pub use error::{RealtimeError, RealtimeResult};
pub use messages::{ChangeEvent, ChangeKind, ChannelConfig, PhoenixMessage, ReplyStatus};
