//! Offline client that replays a recorded bridge event log.
//!
//! The log is NDJSON with the same event lines the bridge pushes. Responses
//! in the log are ignored, so a raw capture of a bridge socket replays as is.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use super::protocol::{BridgeEvent, BridgeMessage};
use super::{Chat, ChatStore, ClientEvent, Credentials, MessagingClient, UserInfo};
use crate::error::{Error, Result};

pub struct ReplayClient {
    events: VecDeque<BridgeEvent>,
    chats: ChatStore,
    credentials: Option<Credentials>,
    user: Option<UserInfo>,
}

impl ReplayClient {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_ndjson(&content)
    }

    pub fn from_ndjson(content: &str) -> Result<Self> {
        let mut events = VecDeque::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match BridgeMessage::parse(line) {
                Ok(BridgeMessage::Event(event)) => events.push_back(event),
                Ok(BridgeMessage::Response(_)) => {}
                Err(err) => {
                    return Err(Error::Protocol(format!(
                        "replay line {}: {}",
                        index + 1,
                        err
                    )))
                }
            }
        }
        Ok(Self::from_events(events))
    }

    pub fn from_events(events: impl IntoIterator<Item = BridgeEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
            chats: ChatStore::new(),
            credentials: None,
            user: None,
        }
    }

    fn placeholder_user() -> UserInfo {
        UserInfo {
            jid: "replay@s.whatsapp.net".to_string(),
            name: Some("replay".to_string()),
        }
    }
}

#[async_trait]
impl MessagingClient for ReplayClient {
    async fn load_credentials(&mut self, credentials: Credentials) -> Result<()> {
        debug!("replay client received stored credentials");
        self.credentials = Some(credentials);
        Ok(())
    }

    async fn connect(&mut self) -> Result<UserInfo> {
        let open_at = self
            .events
            .iter()
            .position(|event| matches!(event, BridgeEvent::Open { .. }));

        let user = match open_at.and_then(|index| self.events.remove(index)) {
            Some(BridgeEvent::Open { user }) => user,
            _ => Self::placeholder_user(),
        };
        info!(events = self.events.len(), "replaying recorded session");
        self.user = Some(user.clone());
        Ok(user)
    }

    async fn next_event(&mut self) -> Option<ClientEvent> {
        while let Some(event) = self.events.pop_front() {
            match &event {
                BridgeEvent::ChatsReceived { chats } => self.chats.extend(chats.iter().cloned()),
                BridgeEvent::CredentialsUpdated { credentials } => {
                    self.credentials = Some(credentials.clone())
                }
                BridgeEvent::Open { user } => self.user = Some(user.clone()),
                BridgeEvent::Close { .. } | BridgeEvent::Unknown => {}
            }
            if let Some(client_event) = event.into_client_event() {
                tokio::task::yield_now().await;
                return Some(client_event);
            }
        }
        None
    }

    fn chats(&self) -> Vec<Chat> {
        self.chats.snapshot()
    }

    fn credentials(&self) -> Option<Credentials> {
        self.credentials.clone()
    }
}
