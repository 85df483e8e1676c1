//! Error types for the contact exporter

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Credentials are locked by another process")]
    CredentialsLocked,

    #[error("Failed to acquire credentials lock: {0}")]
    LockError(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Bridge error [{code}]: {message}")]
    Bridge { code: String, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
