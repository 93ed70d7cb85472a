//! Credential persistence backends.
//!
//! All operations are synchronous. A record is written and cleared as a whole,
//! and any failure to read the backing medium is reported as "absent" so the
//! client falls back to unauthenticated instead of a stale token.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::{CredentialRecord, UserProfile};
use crate::error::StoreError;

pub trait CredentialStore: Send + Sync {
    /// Load the current record, or `None` when unauthenticated or unreadable.
    fn read(&self) -> Option<CredentialRecord>;

    /// Replace the whole record atomically. A record missing either token is
    /// refused with [`StoreError::IncompleteRecord`].
    fn write(&self, record: &CredentialRecord) -> Result<(), StoreError>;

    /// Remove the record. Clearing an empty store is not an error.
    fn clear(&self) -> Result<(), StoreError>;

    /// Swap the access token in place, keeping the profile. The refresh token
    /// is only replaced when the server rotated it.
    ///
    /// Returns `false` without writing anything when no record exists, so a
    /// late refresh never resurrects a cleared session.
    fn replace_tokens(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Replace the cached profile in place. Returns `false` when no record exists.
    fn replace_user(&self, user: &UserProfile) -> Result<bool, StoreError>;

    fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }
}

/// Process-local store. Contents do not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    record: RwLock<Option<CredentialRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: CredentialRecord) -> Self {
        Self {
            record: RwLock::new(Some(record)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn read(&self) -> Option<CredentialRecord> {
        self.record.read().clone()
    }

    fn write(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        if !record.is_complete() {
            return Err(StoreError::IncompleteRecord);
        }
        *self.record.write() = Some(record.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.record.write() = None;
        Ok(())
    }

    fn replace_tokens(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut guard = self.record.write();
        match guard.as_mut() {
            Some(record) => {
                record.access_token = access_token.to_string();
                if let Some(refresh_token) = refresh_token {
                    record.refresh_token = refresh_token.to_string();
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn replace_user(&self, user: &UserProfile) -> Result<bool, StoreError> {
        let mut guard = self.record.write();
        match guard.as_mut() {
            Some(record) => {
                record.user = user.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// On-disk layout: one JSON document with three named entries.
#[derive(Serialize, Deserialize)]
struct PersistedCredentials {
    access_token: String,
    refresh_token: String,
    user: UserProfile,
}

impl From<PersistedCredentials> for CredentialRecord {
    fn from(p: PersistedCredentials) -> Self {
        CredentialRecord::new(p.access_token, p.refresh_token, p.user)
    }
}

impl From<&CredentialRecord> for PersistedCredentials {
    fn from(r: &CredentialRecord) -> Self {
        Self {
            access_token: r.access_token.clone(),
            refresh_token: r.refresh_token.clone(),
            user: r.user.clone(),
        }
    }
}

/// Durable store backed by a JSON file.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so readers see either the old or the new record. The temp
/// file is created owner-only on unix.
///
/// When the file can be neither removed nor truncated, the store remembers
/// the clear and reports no session until the next successful write.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    /// Serializes read-modify-write sequences within this process. `true`
    /// while a failed clear is pending.
    lock: Mutex<bool>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Option<CredentialRecord> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read credential file, treating as logged out");
                return None;
            }
        };

        let record: CredentialRecord = match serde_json::from_slice::<PersistedCredentials>(&bytes)
        {
            Ok(persisted) => persisted.into(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt credential file, treating as logged out");
                return None;
            }
        };

        if !record.is_complete() {
            warn!(path = %self.path.display(), "Incomplete credential file, treating as logged out");
            return None;
        }

        Some(record)
    }

    fn persist(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, &PersistedCredentials::from(record))?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;

        debug!(path = %self.path.display(), "Credentials persisted");
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn read(&self) -> Option<CredentialRecord> {
        let clear_pending = self.lock.lock();
        if *clear_pending {
            return None;
        }
        self.load()
    }

    fn write(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        if !record.is_complete() {
            return Err(StoreError::IncompleteRecord);
        }
        let mut clear_pending = self.lock.lock();
        self.persist(record)?;
        *clear_pending = false;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut clear_pending = self.lock.lock();
        let err = match fs::remove_file(&self.path) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => e,
        };

        warn!(path = %self.path.display(), error = %err, "Failed to remove credential file, truncating");
        if fs::write(&self.path, b"").is_ok() {
            return Ok(());
        }

        *clear_pending = true;
        Err(err.into())
    }

    fn replace_tokens(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<bool, StoreError> {
        let clear_pending = self.lock.lock();
        if *clear_pending {
            return Ok(false);
        }
        let Some(mut record) = self.load() else {
            return Ok(false);
        };
        record.access_token = access_token.to_string();
        if let Some(refresh_token) = refresh_token {
            record.refresh_token = refresh_token.to_string();
        }
        self.persist(&record)?;
        Ok(true)
    }

    fn replace_user(&self, user: &UserProfile) -> Result<bool, StoreError> {
        let clear_pending = self.lock.lock();
        if *clear_pending {
            return Ok(false);
        }
        let Some(mut record) = self.load() else {
            return Ok(false);
        };
        record.user = user.clone();
        self.persist(&record)?;
        Ok(true)
    }
}
