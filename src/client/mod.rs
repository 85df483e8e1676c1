//! Messaging service client seam
//!
//! The WhatsApp Web protocol lives outside this crate. Everything the
//! exporter needs from it goes through [`MessagingClient`]:
//! - load stored credentials before connecting
//! - connect and learn who we are
//! - receive lifecycle events one at a time
//! - read a snapshot of the known chats

pub mod bridge;
pub mod protocol;
pub mod replay;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;

use crate::error::Result;

pub use bridge::BridgeClient;
pub use replay::ReplayClient;

/// A conversation known to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub jid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Chat {
    pub fn new(jid: impl Into<String>) -> Self {
        Self {
            jid: jid.into(),
            name: None,
        }
    }
}

/// The account the session is logged in as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub jid: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl UserInfo {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unknown")
    }
}

/// Opaque session credentials; the shape belongs to the external client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(pub Value);

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A batch of chats was delivered (may repeat many times).
    ChatsReceived {
        chats: Vec<Chat>,
        /// When the batch reached the client, not when it was handed out.
        received_at: Instant,
    },
    CredentialsUpdated(Credentials),
    Closed {
        reason: String,
        is_reconnecting: bool,
    },
}

impl ClientEvent {
    /// Delivery stamped with the current time.
    pub fn chats_received(chats: Vec<Chat>) -> Self {
        ClientEvent::ChatsReceived {
            chats,
            received_at: Instant::now(),
        }
    }
}

#[async_trait]
pub trait MessagingClient: Send {
    /// Hand stored credentials to the client. Must be called before `connect`.
    async fn load_credentials(&mut self, credentials: Credentials) -> Result<()>;

    async fn connect(&mut self) -> Result<UserInfo>;

    /// Next lifecycle event; `None` once the event source has ended.
    ///
    /// Events that arrived during `connect` are returned first, in order.
    async fn next_event(&mut self) -> Option<ClientEvent>;

    /// Snapshot of every chat seen so far, in first-seen order.
    fn chats(&self) -> Vec<Chat>;

    /// Most recent credentials reported by the client.
    fn credentials(&self) -> Option<Credentials>;
}

/// Chats keyed by JID, first-seen order kept.
#[derive(Debug, Default, Clone)]
pub struct ChatStore {
    chats: Vec<Chat>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, chat: Chat) {
        match self.chats.iter_mut().find(|c| c.jid == chat.jid) {
            Some(existing) => {
                if chat.name.is_some() {
                    existing.name = chat.name;
                }
            }
            None => self.chats.push(chat),
        }
    }

    pub fn extend(&mut self, chats: impl IntoIterator<Item = Chat>) {
        for chat in chats {
            self.upsert(chat);
        }
    }

    pub fn snapshot(&self) -> Vec<Chat> {
        self.chats.clone()
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }
}
