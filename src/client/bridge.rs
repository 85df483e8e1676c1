//! TCP client for the WhatsApp Web bridge.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, warn};

use super::protocol::{BridgeEvent, BridgeMessage, Request, Response};
use super::{Chat, ChatStore, ClientEvent, Credentials, MessagingClient, UserInfo};
use crate::error::{Error, Result};

pub struct BridgeClient {
    reader: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    pending: VecDeque<ClientEvent>,
    chats: ChatStore,
    credentials: Option<Credentials>,
    user: Option<UserInfo>,
    closed: bool,
}

impl BridgeClient {
    /// Open the socket to the bridge. The WhatsApp session is not started
    /// until [`MessagingClient::connect`]; `connect_timeout` bounds only the
    /// TCP handshake.
    pub async fn open(addr: &str, connect_timeout: Duration) -> Result<Self> {
        let stream = time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Connection(format!("timed out connecting to bridge at {}", addr)))?
            .map_err(|e| Error::Connection(format!("bridge at {}: {}", addr, e)))?;

        Ok(Self::from_stream(stream))
    }

    pub fn from_stream(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half).lines(),
            writer: write_half,
            pending: VecDeque::new(),
            chats: ChatStore::new(),
            credentials: None,
            user: None,
            closed: false,
        }
    }

    pub fn user(&self) -> Option<&UserInfo> {
        self.user.as_ref()
    }

    async fn send(&mut self, request: &Request) -> Result<()> {
        let line = request.to_line()?;
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        debug!(method = %request.method, id = %request.id, "sent bridge request");
        Ok(())
    }

    /// Read one message from the socket; `None` on EOF.
    async fn read_message(&mut self) -> Result<Option<BridgeMessage>> {
        loop {
            let Some(line) = self.reader.next_line().await? else {
                self.closed = true;
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            return BridgeMessage::parse(&line).map(Some);
        }
    }

    /// Apply an event to local state and queue what the exporter should see.
    fn absorb(&mut self, event: BridgeEvent) {
        match &event {
            BridgeEvent::ChatsReceived { chats } => self.chats.extend(chats.iter().cloned()),
            BridgeEvent::CredentialsUpdated { credentials } => {
                self.credentials = Some(credentials.clone())
            }
            BridgeEvent::Open { user } => self.user = Some(user.clone()),
            BridgeEvent::Unknown => debug!("skipping unknown bridge event"),
            BridgeEvent::Close { .. } => {}
        }
        if let Some(client_event) = event.into_client_event() {
            self.pending.push_back(client_event);
        }
    }

    /// Send a request and wait for its response, queueing events seen meanwhile.
    async fn call(&mut self, request: Request) -> Result<Response> {
        self.send(&request).await?;
        loop {
            match self.read_message().await? {
                Some(BridgeMessage::Response(response)) if response.id == request.id => {
                    return Ok(response)
                }
                Some(BridgeMessage::Response(response)) => {
                    warn!(id = %response.id, "dropping response to unknown request");
                }
                Some(BridgeMessage::Event(event)) => self.absorb(event),
                None => {
                    return Err(Error::Connection(format!(
                        "bridge closed before answering '{}'",
                        request.method
                    )))
                }
            }
        }
    }

    async fn wait_for_open(&mut self) -> Result<UserInfo> {
        while self.user.is_none() {
            match self.read_message().await? {
                Some(BridgeMessage::Event(event)) => self.absorb(event),
                Some(BridgeMessage::Response(response)) => {
                    warn!(id = %response.id, "dropping unexpected response");
                }
                None => {
                    return Err(Error::Connection(
                        "bridge closed before the session opened".to_string(),
                    ))
                }
            }
        }
        self.user
            .clone()
            .ok_or_else(|| Error::Connection("session did not open".to_string()))
    }
}

#[async_trait]
impl MessagingClient for BridgeClient {
    async fn load_credentials(&mut self, credentials: Credentials) -> Result<()> {
        let request = Request::load_credentials(&credentials);
        self.call(request).await?.into_result()?;
        self.credentials = Some(credentials);
        Ok(())
    }

    /// Waits as long as the session takes to open, QR pairing included.
    async fn connect(&mut self) -> Result<UserInfo> {
        let response = self.call(Request::connect()).await?;
        if let Err(err) = response.into_result() {
            return Err(Error::Connection(err.to_string()));
        }
        self.wait_for_open().await
    }

    async fn next_event(&mut self) -> Option<ClientEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.closed {
                return None;
            }
            match self.read_message().await {
                Ok(Some(BridgeMessage::Event(event))) => self.absorb(event),
                Ok(Some(BridgeMessage::Response(response))) => {
                    warn!(id = %response.id, "dropping unexpected response");
                }
                Ok(None) => return None,
                Err(Error::Io(err)) => {
                    warn!("bridge read failed: {}", err);
                    self.closed = true;
                }
                Err(err) => warn!("skipping malformed bridge message: {}", err),
            }
        }
    }

    fn chats(&self) -> Vec<Chat> {
        self.chats.snapshot()
    }

    fn credentials(&self) -> Option<Credentials> {
        self.credentials.clone()
    }
}
