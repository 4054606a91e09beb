//! Session token storage.
//!
//! A token store holds at most one bearer token. Reads never fail; the
//! persistent stores keep an in-process copy so the last `set` is always
//! visible to `get`, even when writing it through to disk or the keychain
//! failed (that failure is only logged).

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{Config, TokenBackend};

/// Token file name in the data directory
const TOKEN_FILE: &str = "token.json";

const KEYRING_SERVICE: &str = "medvault";
const KEYRING_ACCOUNT: &str = "session-token";

pub trait TokenStore: Send + Sync {
    /// The stored token, if any.
    fn get(&self) -> Option<String>;

    /// Store `token`, replacing any previous value.
    fn set(&self, token: &str);

    /// Remove the stored token.
    fn clear(&self);

    fn is_present(&self) -> bool {
        self.get().is_some()
    }
}

pub type SharedTokenStore = Arc<dyn TokenStore>;

/// Open the store selected by the configuration.
pub fn open_token_store(config: &Config) -> Result<SharedTokenStore> {
    let store: SharedTokenStore = match config.token_backend {
        TokenBackend::File => Arc::new(FileTokenStore::open(config.data_dir()?)),
        TokenBackend::Keyring => Arc::new(KeyringTokenStore::open()?),
        TokenBackend::Memory => Arc::new(MemoryTokenStore::new()),
    };
    debug!(backend = ?config.token_backend, present = store.is_present(), "Token store opened");
    Ok(store)
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: RwLock::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> {
        read_slot(&self.token)
    }

    fn set(&self, token: &str) {
        write_slot(&self.token, Some(token.to_string()));
    }

    fn clear(&self) {
        write_slot(&self.token, None);
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    token: String,
    stored_at: DateTime<Utc>,
}

/// Token persisted as JSON in the data directory; survives restarts,
/// removed on clear.
#[derive(Debug)]
pub struct FileTokenStore {
    dir: PathBuf,
    token: RwLock<Option<String>>,
}

impl FileTokenStore {
    /// Open the store, reading any token saved by a previous run.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let token = match Self::load(&dir) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable token file");
                None
            }
        };
        Self {
            dir,
            token: RwLock::new(token),
        }
    }

    fn load(dir: &Path) -> Result<Option<String>> {
        let path = dir.join(TOKEN_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read token file")?;
        let file: TokenFile =
            serde_json::from_str(&contents).context("Failed to parse token file")?;
        debug!(stored_at = %file.stored_at, "Loaded token from disk");
        Ok(Some(file.token))
    }

    fn save(&self, token: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let file = TokenFile {
            token: token.to_string(),
            stored_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&file)?;
        let path = self.token_path();

        // Owner read/write only
        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

            let mut out = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&path)
                .context("Failed to open token file for writing")?;
            // mode() only applies on creation
            out.set_permissions(std::fs::Permissions::from_mode(0o600))?;
            out.write_all(contents.as_bytes())
                .context("Failed to write token file")?;
        }

        #[cfg(not(unix))]
        {
            std::fs::write(&path, contents).context("Failed to write token file")?;
        }

        Ok(())
    }

    fn remove(&self) -> Result<()> {
        let path = self.token_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<String> {
        read_slot(&self.token)
    }

    fn set(&self, token: &str) {
        write_slot(&self.token, Some(token.to_string()));
        if let Err(e) = self.save(token) {
            warn!(error = %e, "Failed to save token file");
        }
    }

    fn clear(&self) {
        write_slot(&self.token, None);
        if let Err(e) = self.remove() {
            warn!(error = %e, "Failed to remove token file");
        }
    }
}

/// Token kept in the OS keychain.
pub struct KeyringTokenStore {
    entry: Entry,
    token: RwLock<Option<String>>,
}

impl KeyringTokenStore {
    pub fn open() -> Result<Self> {
        let entry = Entry::new(KEYRING_SERVICE, KEYRING_ACCOUNT)
            .context("Failed to create keyring entry")?;
        let token = match entry.get_password() {
            Ok(token) => Some(token),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read token from keychain");
                None
            }
        };
        Ok(Self {
            entry,
            token: RwLock::new(token),
        })
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self) -> Option<String> {
        read_slot(&self.token)
    }

    fn set(&self, token: &str) {
        write_slot(&self.token, Some(token.to_string()));
        if let Err(e) = self.entry.set_password(token) {
            warn!(error = %e, "Failed to store token in keychain");
        }
    }

    fn clear(&self) {
        write_slot(&self.token, None);
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(e) => warn!(error = %e, "Failed to delete token from keychain"),
        }
    }
}

// A poisoned lock still holds a usable Option<String>.
fn read_slot(slot: &RwLock<Option<String>>) -> Option<String> {
    match slot.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn write_slot(slot: &RwLock<Option<String>>, value: Option<String>) {
    match slot.write() {
        Ok(mut guard) => *guard = value,
        Err(poisoned) => *poisoned.into_inner() = value,
    }
}
