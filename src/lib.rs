//! WhatsApp contact exporter library
//!
//! This library provides tools to:
//! - Talk to a WhatsApp Web bridge (or replay a recorded session)
//! - Persist session credentials between runs
//! - Debounce repeated chat deliveries
//! - Export the phone numbers of all user chats to contacts.txt

pub mod client;
pub mod config;
pub mod contacts;
pub mod credentials;
pub mod debounce;
pub mod error;

// Re-export common types
pub use client::{Chat, ClientEvent, Credentials, MessagingClient, UserInfo};
pub use config::Config;
pub use contacts::{extract_phone_numbers, write_contacts};
pub use credentials::{CredentialStore, CredentialsLock};
pub use debounce::Debouncer;
pub use error::{Error, Result};

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
