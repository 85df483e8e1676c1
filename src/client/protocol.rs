//! NDJSON protocol spoken with the WhatsApp Web bridge.
//!
//! One JSON object per line in both directions. Requests carry an id that
//! the bridge echoes in its response; events are pushed unprompted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Chat, ClientEvent, Credentials, UserInfo};
use crate::error::{Error, Result};

pub const PROTOCOL_VERSION: u8 = 1;

/// A request to the bridge.
///
/// ```json
/// {"id": "uuid", "v": 1, "method": "connect", "params": {}}
/// ```
#[derive(Debug, Serialize)]
pub struct Request {
    pub id: String,
    pub v: u8,
    pub method: String,
    pub params: Value,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            v: PROTOCOL_VERSION,
            method: method.into(),
            params,
        }
    }

    pub fn no_params(method: impl Into<String>) -> Self {
        Self::new(method, Value::Object(serde_json::Map::new()))
    }

    pub fn load_credentials(credentials: &Credentials) -> Self {
        Self::new(
            "load_credentials",
            serde_json::json!({ "credentials": credentials }),
        )
    }

    pub fn connect() -> Self {
        Self::no_params("connect")
    }

    /// Compact JSON terminated by `\n`.
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    pub id: String,
    pub ok: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorPayload>,
}

impl Response {
    /// Turn a failed response into [`Error::Bridge`].
    pub fn into_result(self) -> Result<Option<Value>> {
        if self.ok {
            return Ok(self.result);
        }
        let error = self.error.unwrap_or(ErrorPayload {
            code: "ERROR".to_string(),
            message: "unknown error".to_string(),
            details: None,
        });
        Err(Error::Bridge {
            code: error.code,
            message: error.message,
        })
    }
}

/// Events pushed by the bridge, tagged by `event`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event")]
pub enum BridgeEvent {
    #[serde(rename = "open")]
    Open { user: UserInfo },

    #[serde(rename = "chats-received")]
    ChatsReceived {
        #[serde(default)]
        chats: Vec<Chat>,
    },

    #[serde(rename = "credentials-updated")]
    CredentialsUpdated { credentials: Credentials },

    #[serde(rename = "close")]
    Close {
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        is_reconnecting: bool,
    },

    #[serde(other)]
    Unknown,
}

impl BridgeEvent {
    /// Lifecycle event as seen by the exporter; `Open` and unknown events
    /// have no counterpart. Deliveries are stamped with the current time.
    pub fn into_client_event(self) -> Option<ClientEvent> {
        match self {
            BridgeEvent::ChatsReceived { chats } => Some(ClientEvent::chats_received(chats)),
            BridgeEvent::CredentialsUpdated { credentials } => {
                Some(ClientEvent::CredentialsUpdated(credentials))
            }
            BridgeEvent::Close {
                reason,
                is_reconnecting,
            } => Some(ClientEvent::Closed {
                reason: reason.unwrap_or_else(|| "unknown".to_string()),
                is_reconnecting,
            }),
            BridgeEvent::Open { .. } | BridgeEvent::Unknown => None,
        }
    }
}

/// Any line the bridge may send.
#[derive(Debug, Clone)]
pub enum BridgeMessage {
    Response(Response),
    Event(BridgeEvent),
}

impl BridgeMessage {
    /// Parse one NDJSON line. Lines tagged `"type": "response"` are responses;
    /// everything else is read as an event, so recorded logs may omit `type`.
    pub fn parse(line: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(line.trim())?;
        let kind = value.get("type").and_then(Value::as_str).unwrap_or("event");

        match kind {
            "response" => Ok(BridgeMessage::Response(serde_json::from_value(value)?)),
            "event" => {
                if value.get("event").is_none() {
                    return Err(Error::Protocol(format!("event without name: {}", line.trim())));
                }
                Ok(BridgeMessage::Event(serde_json::from_value(value)?))
            }
            other => Err(Error::Protocol(format!("unknown message type '{}'", other))),
        }
    }
}
