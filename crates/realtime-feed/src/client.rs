//! Realtime channel client.
//!
//! One [`RealtimeChannel`] owns one websocket connection and one joined
//! topic. The connection lives in a background task that sends heartbeats,
//! rejoins after reconnecting, and forwards row changes as
//! [`RealtimeEvent`]s on a broadcast channel.

use crate::messages::{
    ChannelConfig, PhoenixMessage, ReplyStatus, PHOENIX_TOPIC, PHX_CLOSE, PHX_ERROR, SYSTEM,
};
use crate::{ChangeEvent, RealtimeError, RealtimeResult};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

/// Realtime connection configuration.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Websocket URL including `apikey` and `vsn` query parameters.
    pub url: Url,
    pub heartbeat_interval: Duration,
    /// Base reconnect delay, doubled per consecutive failure.
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    /// Consecutive failed connections before the channel gives up.
    pub max_reconnect_attempts: u32,
}

impl RealtimeConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            heartbeat_interval: Duration::from_secs(25),
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(10),
            max_reconnect_attempts: 10,
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.reconnect_base_delay
            .saturating_mul(factor)
            .min(self.reconnect_max_delay)
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Joining,
    Joined,
    /// Released or gave up reconnecting. Terminal.
    Closed,
}

/// Events emitted by a realtime channel.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// The join was accepted; changes will now arrive.
    Subscribed,
    Change(ChangeEvent),
    /// The server rejected the join or errored the channel.
    ChannelError(String),
    /// The connection dropped. A reconnect follows unless attempts are exhausted.
    Disconnected(Option<String>),
    Closed,
}

enum Command {
    SetAccessToken(String),
    Close(Option<oneshot::Sender<()>>),
}

/// A joined realtime topic. Dropping it releases the channel.
pub struct RealtimeChannel {
    topic: String,
    event_tx: broadcast::Sender<RealtimeEvent>,
    command_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    task: Option<JoinHandle<()>>,
}

impl RealtimeChannel {
    /// Connect and join in the background.
    ///
    /// The returned receiver is registered before the task starts, so it
    /// sees every event including the first `Subscribed`.
    pub fn open(
        config: RealtimeConfig,
        channel: ChannelConfig,
        access_token: impl Into<String>,
    ) -> (Self, broadcast::Receiver<RealtimeEvent>) {
        let (event_tx, event_rx) = broadcast::channel(100);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let topic = channel.topic();

        let worker = Worker {
            config,
            channel,
            access_token: access_token.into(),
            event_tx: event_tx.clone(),
            command_rx,
            state_tx,
            next_ref: 0,
        };
        let task = tokio::spawn(worker.run());

        let this = Self {
            topic,
            event_tx,
            command_tx,
            state_rx,
            task: Some(task),
        };
        (this, event_rx)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.event_tx.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Push a refreshed access token to the server and use it for rejoins.
    pub fn set_access_token(&self, access_token: impl Into<String>) -> RealtimeResult<()> {
        self.command_tx
            .send(Command::SetAccessToken(access_token.into()))
            .map_err(|_| RealtimeError::Closed)
    }

    /// Leave the topic, close the socket, and wait for the task to finish.
    pub async fn close(mut self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.command_tx.send(Command::Close(Some(ack_tx))).is_ok() {
            let _ = ack_rx.await;
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.command_tx.send(Command::Close(None));
        }
    }
}

impl std::fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("topic", &self.topic)
            .field("state", &self.state())
            .finish()
    }
}

enum SessionEnd {
    Released(Option<oneshot::Sender<()>>),
    Lost(String),
}

struct Worker {
    config: RealtimeConfig,
    channel: ChannelConfig,
    access_token: String,
    event_tx: broadcast::Sender<RealtimeEvent>,
    command_rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    next_ref: u64,
}

impl Worker {
    async fn run(mut self) {
        let mut attempts: u32 = 0;
        let mut ack = None;

        loop {
            self.set_state(ConnectionState::Connecting);
            info!(topic = %self.channel.topic(), "Connecting to realtime");

            let connected = tokio::select! {
                result = connect_async(self.config.url.as_str()) => result,
                cmd = self.command_rx.recv() => match cmd {
                    Some(Command::SetAccessToken(token)) => {
                        self.access_token = token;
                        continue;
                    }
                    Some(Command::Close(done)) => {
                        ack = done;
                        break;
                    }
                    None => break,
                },
            };

            let reason = match connected {
                Ok((ws, _)) => match self.session(ws, &mut attempts).await {
                    SessionEnd::Released(done) => {
                        ack = done;
                        break;
                    }
                    SessionEnd::Lost(reason) => reason,
                },
                Err(e) => e.to_string(),
            };

            warn!(reason = %reason, "Realtime connection lost");
            self.set_state(ConnectionState::Disconnected);
            self.emit(RealtimeEvent::Disconnected(Some(reason)));

            attempts += 1;
            if attempts > self.config.max_reconnect_attempts {
                warn!("Max realtime reconnect attempts reached");
                break;
            }

            let delay = self.config.backoff_delay(attempts);
            info!(attempt = attempts, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");
            match self.wait(delay).await {
                Some(done) => {
                    ack = done;
                    break;
                }
                None => continue,
            }
        }

        self.set_state(ConnectionState::Closed);
        self.emit(RealtimeEvent::Closed);
        if let Some(ack) = ack {
            let _ = ack.send(());
        }
        debug!(topic = %self.channel.topic(), "Realtime task finished");
    }

    /// Sleep through a backoff delay. Returns `Some` if the channel was released meanwhile.
    async fn wait(&mut self, delay: Duration) -> Option<Option<oneshot::Sender<()>>> {
        let deadline = Instant::now() + delay;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return None,
                cmd = self.command_rx.recv() => match cmd {
                    Some(Command::SetAccessToken(token)) => self.access_token = token,
                    Some(Command::Close(done)) => return Some(done),
                    None => return Some(None),
                },
            }
        }
    }

    async fn session(&mut self, ws: WsStream, attempts: &mut u32) -> SessionEnd {
        let (mut write, mut read) = ws.split();
        let topic = self.channel.topic();

        self.set_state(ConnectionState::Joining);
        let join_ref = self.make_ref();
        let join = PhoenixMessage::join(&self.channel, &self.access_token, join_ref.clone());
        if let Err(e) = send(&mut write, &join).await {
            return SessionEnd::Lost(e.to_string());
        }
        debug!(topic = %topic, join_ref = %join_ref, "Sent phx_join");

        let mut heartbeat = interval(self.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        heartbeat.tick().await;
        let mut pending_heartbeat: Option<String> = None;
        let mut joined = false;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if pending_heartbeat.is_some() {
                        return SessionEnd::Lost("heartbeat timeout".to_string());
                    }
                    let msg_ref = self.make_ref();
                    if let Err(e) = send(&mut write, &PhoenixMessage::heartbeat(msg_ref.clone())).await {
                        return SessionEnd::Lost(e.to_string());
                    }
                    pending_heartbeat = Some(msg_ref);
                }
                cmd = self.command_rx.recv() => match cmd {
                    Some(Command::SetAccessToken(token)) => {
                        self.access_token = token;
                        if joined {
                            let msg_ref = self.make_ref();
                            let push = PhoenixMessage::access_token(
                                &topic,
                                &self.access_token,
                                Some(join_ref.clone()),
                                msg_ref,
                            );
                            if let Err(e) = send(&mut write, &push).await {
                                return SessionEnd::Lost(e.to_string());
                            }
                            debug!(topic = %topic, "Pushed refreshed access token");
                        }
                    }
                    Some(Command::Close(done)) => {
                        self.release(&mut write, &topic, &join_ref).await;
                        return SessionEnd::Released(done);
                    }
                    None => {
                        self.release(&mut write, &topic, &join_ref).await;
                        return SessionEnd::Released(None);
                    }
                },
                frame = next_frame(&mut read) => match frame {
                    Ok(Message::Text(text)) => {
                        let msg = match PhoenixMessage::from_json(&text) {
                            Ok(msg) => msg,
                            Err(e) => {
                                warn!(error = %e, "Failed to parse realtime message");
                                continue;
                            }
                        };

                        if msg.topic == PHOENIX_TOPIC {
                            if msg.msg_ref.is_some() && msg.msg_ref == pending_heartbeat {
                                pending_heartbeat = None;
                            }
                            continue;
                        }
                        if msg.topic != topic {
                            continue;
                        }

                        if let Some(status) = msg.reply_status() {
                            if msg.msg_ref.as_deref() != Some(join_ref.as_str()) {
                                continue;
                            }
                            match status {
                                ReplyStatus::Ok => {
                                    joined = true;
                                    *attempts = 0;
                                    self.set_state(ConnectionState::Joined);
                                    info!(topic = %topic, "Joined realtime channel");
                                    self.emit(RealtimeEvent::Subscribed);
                                }
                                ReplyStatus::Error(reason) => {
                                    warn!(topic = %topic, reason = %reason, "Join rejected");
                                    self.emit(RealtimeEvent::ChannelError(reason.clone()));
                                    return SessionEnd::Lost(
                                        RealtimeError::JoinRejected(reason).to_string(),
                                    );
                                }
                            }
                        } else if let Some(change) = msg.change_event() {
                            debug!(table = %change.table, kind = ?change.kind, "Row change");
                            self.emit(RealtimeEvent::Change(change));
                        } else if msg.event == PHX_ERROR || msg.event == PHX_CLOSE {
                            let reason = format!("channel {}", msg.event);
                            self.emit(RealtimeEvent::ChannelError(reason.clone()));
                            return SessionEnd::Lost(reason);
                        } else if msg.event == SYSTEM {
                            debug!(payload = %msg.payload, "Realtime system message");
                        }
                    }
                    Ok(Message::Ping(data)) => {
                        if write.send(Message::Pong(data)).await.is_err() {
                            return SessionEnd::Lost("failed to answer ping".to_string());
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "closed by server".to_string());
                        return SessionEnd::Lost(reason);
                    }
                    Ok(_) => {}
                    Err(e) => return SessionEnd::Lost(e.to_string()),
                },
            }
        }
    }

    async fn release(&mut self, write: &mut WsWrite, topic: &str, join_ref: &str) {
        let leave = PhoenixMessage::leave(topic, Some(join_ref.to_string()), self.make_ref());
        if let Err(e) = send(write, &leave).await {
            debug!(error = %e, "Failed to send phx_leave");
        }
        let _ = write.send(Message::Close(None)).await;
        info!(topic = %topic, "Released realtime channel");
    }

    fn make_ref(&mut self) -> String {
        self.next_ref += 1;
        self.next_ref.to_string()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    fn emit(&self, event: RealtimeEvent) {
        // No receivers is fine; the channel keeps running.
        let _ = self.event_tx.send(event);
    }
}

async fn send(write: &mut WsWrite, msg: &PhoenixMessage) -> RealtimeResult<()> {
    let json = msg.to_json()?;
    write.send(Message::Text(json.into())).await?;
    Ok(())
}

async fn next_frame(read: &mut WsRead) -> RealtimeResult<Message> {
    match read.next().await {
        Some(frame) => Ok(frame?),
        None => Err(RealtimeError::Closed),
    }
}
