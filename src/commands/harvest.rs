//! Contact harvest command
//!
//! Connects, waits until chat deliveries go quiet for the debounce window,
//! then writes every user chat's phone number to contacts.txt.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::client::{BridgeClient, ClientEvent, MessagingClient, ReplayClient};
use crate::config::{debounce_window, Config, CONTACTS_FILE};
use crate::contacts::{extract_phone_numbers, write_contacts};
use crate::credentials::{CredentialStore, CredentialsLock};
use crate::debounce::Debouncer;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct HarvestArgs {
    pub save_credentials: bool,
    pub debounce_secs: f64,
    pub bridge_addr: Option<String>,
    pub replay: Option<PathBuf>,
}

/// Where the harvest loop reads and writes.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub debounce: Duration,
    pub credentials: Option<CredentialStore>,
    pub output: PathBuf,
}

impl HarvestOptions {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            credentials: None,
            output: PathBuf::from(CONTACTS_FILE),
        }
    }

    pub fn with_credentials(mut self, store: CredentialStore) -> Self {
        self.credentials = Some(store);
        self
    }

    pub fn with_output<P: Into<PathBuf>>(mut self, output: P) -> Self {
        self.output = output.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestOutcome {
    Written { path: PathBuf, count: usize },
    /// The event source ended before any chats arrived.
    NoChatsDelivered,
}

pub async fn run(args: HarvestArgs) -> Result<HarvestOutcome> {
    let config = Config::new();
    let mut options = HarvestOptions::new(debounce_window(args.debounce_secs));

    // Keep the lock for the whole session
    let _lock = if args.save_credentials {
        options = options.with_credentials(CredentialStore::default());
        Some(CredentialsLock::acquire()?)
    } else {
        None
    };

    if let Some(path) = args.replay {
        let mut client = ReplayClient::from_file(&path)?;
        return run_with_client(&mut client, &options).await;
    }

    let addr = args.bridge_addr.unwrap_or(config.bridge_addr);
    info!(%addr, "connecting to WhatsApp Web bridge");
    let mut client = BridgeClient::open(&addr, config.connect_timeout).await?;
    run_with_client(&mut client, &options).await
}

/// Drive one harvest against an already constructed client.
pub async fn run_with_client<C: MessagingClient>(
    client: &mut C,
    options: &HarvestOptions,
) -> Result<HarvestOutcome> {
    let mut loaded = None;
    if let Some(store) = &options.credentials {
        if let Some(credentials) = store.load()? {
            client.load_credentials(credentials.clone()).await?;
            loaded = Some(credentials);
        }
    }

    let user = match client.connect().await {
        Ok(user) => user,
        Err(err) => {
            // Pairing may have rotated the session before the failure
            if let (Some(store), Some(credentials)) = (&options.credentials, client.credentials()) {
                if loaded.as_ref() != Some(&credentials) {
                    store.save(&credentials)?;
                }
            }
            return Err(err);
        }
    };
    println!("connected: {} ({})", user.display_name(), user.jid);

    let mut debouncer = Debouncer::new(options.debounce);
    let mut events_open = true;

    loop {
        // Queued events go first so a stale deadline cannot skip a later delivery
        tokio::select! {
            biased;

            event = client.next_event(), if events_open => match event {
                Some(ClientEvent::ChatsReceived { chats, received_at }) => {
                    println!("receiving contacts...");
                    debug!(batch = chats.len(), "chats delivered");
                    debouncer.reschedule_from(received_at);
                }
                Some(ClientEvent::CredentialsUpdated(credentials)) => {
                    if let Some(store) = &options.credentials {
                        println!("credentials updated");
                        store.save(&credentials)?;
                    }
                }
                Some(ClientEvent::Closed { reason, is_reconnecting }) => {
                    println!("disconnected: {}", reason);
                    debug!(is_reconnecting, "session closed");
                }
                None => {
                    events_open = false;
                    if !debouncer.is_pending() {
                        warn!("event stream ended before any chats were delivered");
                        return Ok(HarvestOutcome::NoChatsDelivered);
                    }
                }
            },
            _ = debouncer.fired() => {
                println!("contacts received");
                return finalize(client, &options.output);
            }
        }
    }
}

fn finalize<C: MessagingClient>(client: &C, output: &Path) -> Result<HarvestOutcome> {
    let numbers = extract_phone_numbers(&client.chats());
    let count = write_contacts(output, &numbers)?;
    println!("contacts written: {}", count);
    Ok(HarvestOutcome::Written {
        path: output.to_path_buf(),
        count,
    })
}
