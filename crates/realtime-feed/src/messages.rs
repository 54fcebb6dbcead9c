//! Phoenix channel protocol messages (serializer `vsn=1.0.0`).
//!
//! Every frame is a JSON object:
//! `{"topic": "...", "event": "...", "payload": {...}, "ref": "7", "join_ref": "1"}`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const PHX_JOIN: &str = "phx_join";
pub const PHX_LEAVE: &str = "phx_leave";
pub const PHX_REPLY: &str = "phx_reply";
pub const PHX_ERROR: &str = "phx_error";
pub const PHX_CLOSE: &str = "phx_close";
pub const HEARTBEAT: &str = "heartbeat";
pub const ACCESS_TOKEN: &str = "access_token";
pub const POSTGRES_CHANGES: &str = "postgres_changes";
pub const SYSTEM: &str = "system";

/// Topic for socket-level messages such as heartbeats.
pub const PHOENIX_TOPIC: &str = "phoenix";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub msg_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

/// Which table changes a channel listens to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub schema: String,
    pub table: String,
    /// `INSERT`, `UPDATE`, `DELETE` or `*`.
    pub event: String,
}

impl ChannelConfig {
    /// All changes on `public.<table>`.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            schema: "public".to_string(),
            table: table.into(),
            event: "*".to_string(),
        }
    }

    pub fn topic(&self) -> String {
        format!("realtime:{}", self.table)
    }
}

impl PhoenixMessage {
    fn new(topic: &str, event: &str, payload: Value, msg_ref: String) -> Self {
        Self {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
            msg_ref: Some(msg_ref),
            join_ref: None,
        }
    }

    pub fn join(channel: &ChannelConfig, access_token: &str, msg_ref: String) -> Self {
        let payload = json!({
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [{
                    "event": channel.event,
                    "schema": channel.schema,
                    "table": channel.table,
                }],
            },
            "access_token": access_token,
        });

        let mut msg = Self::new(&channel.topic(), PHX_JOIN, payload, msg_ref.clone());
        msg.join_ref = Some(msg_ref);
        msg
    }

    pub fn leave(topic: &str, join_ref: Option<String>, msg_ref: String) -> Self {
        let mut msg = Self::new(topic, PHX_LEAVE, json!({}), msg_ref);
        msg.join_ref = join_ref;
        msg
    }

    pub fn heartbeat(msg_ref: String) -> Self {
        Self::new(PHOENIX_TOPIC, HEARTBEAT, json!({}), msg_ref)
    }

    pub fn access_token(
        topic: &str,
        access_token: &str,
        join_ref: Option<String>,
        msg_ref: String,
    ) -> Self {
        let mut msg = Self::new(
            topic,
            ACCESS_TOKEN,
            json!({ "access_token": access_token }),
            msg_ref,
        );
        msg.join_ref = join_ref;
        msg
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Status of a `phx_reply`, `None` for any other event.
    pub fn reply_status(&self) -> Option<ReplyStatus> {
        if self.event != PHX_REPLY {
            return None;
        }
        match self.payload.get("status").and_then(Value::as_str) {
            Some("ok") => Some(ReplyStatus::Ok),
            _ => Some(ReplyStatus::Error(reply_reason(&self.payload))),
        }
    }

    /// Decode a `postgres_changes` push.
    pub fn change_event(&self) -> Option<ChangeEvent> {
        if self.event != POSTGRES_CHANGES {
            return None;
        }
        let data = self.payload.get("data")?;
        serde_json::from_value(data.clone()).ok()
    }
}

fn reply_reason(payload: &Value) -> String {
    let response = payload.get("response");
    response
        .and_then(|r| r.get("reason"))
        .or_else(|| response.and_then(|r| r.get("message")))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| response.map(Value::to_string))
        .unwrap_or_else(|| "unknown error".to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyStatus {
    Ok,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row change.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub schema: String,
    pub table: String,
    #[serde(default)]
    pub commit_timestamp: Option<String>,
    /// New row for inserts and updates.
    #[serde(default)]
    pub record: Option<Value>,
    /// Primary key (or full row with replica identity full) for updates and deletes.
    #[serde(default)]
    pub old_record: Option<Value>,
}
