//! Session credential persistence
//!
//! Provides:
//! - File-based locking so two exporters never share one session
//! - Loading the stored credential blob before connecting
//! - Rewriting it whenever the client reports new credentials

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::Serialize;
use tracing::{debug, error};

use crate::client::Credentials;
use crate::config::{CREDENTIALS_FILE, CREDENTIALS_LOCK_FILE};
use crate::error::{Error, Result};

/// Lock guard giving this process exclusive use of the credentials file.
pub struct CredentialsLock {
    path: PathBuf,
    lock_file: Option<File>,
}

impl CredentialsLock {
    pub fn acquire() -> Result<Self> {
        Self::acquire_at(CREDENTIALS_LOCK_FILE)
    }

    pub fn acquire_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::LockError(format!("Failed to open lock file: {}", e)))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                lock_file: Some(lock_file),
            }),
            Err(_) => {
                error!(
                    "credentials are in use by another exporter; wait for it to finish and retry"
                );
                Err(Error::CredentialsLocked)
            }
        }
    }

    /// Release the lock manually
    pub fn release(&mut self) {
        if let Some(ref file) = self.lock_file {
            let _ = file.unlock();
        }
        if self.lock_file.take().is_some() {
            let _ = fs::remove_file(&self.path);
        }
    }
}

impl Drop for CredentialsLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// JSON file holding the opaque credential blob.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(CREDENTIALS_FILE)
    }
}

impl CredentialStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored credentials, or `None` when no file exists yet.
    pub fn load(&self) -> Result<Option<Credentials>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let credentials: Credentials = serde_json::from_str(&content)?;
        debug!(path = %self.path.display(), "loaded stored credentials");
        Ok(Some(credentials))
    }

    /// Overwrite the file with tab-indented JSON.
    ///
    /// Written to a sibling temp file first and renamed into place, so a
    /// crash mid-write leaves the previous credentials intact.
    pub fn save(&self, credentials: &Credentials) -> Result<()> {
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        credentials.serialize(&mut ser)?;

        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, &buf)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "credentials.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
