//! Best-effort local persistence for the cart.
//!
//! After every dispatch the cart's items are written under a versioned key
//! as `{"items": [...], "updatedAt": <epoch millis>}`. A future incompatible
//! layout gets a new key; old snapshots are simply left behind, never
//! migrated.
//!
//! Nothing here ever surfaces an error to the cart: failed writes are logged
//! and dropped, and a missing or unreadable snapshot means an empty cart.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use nft_market_core::LineItem;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::lock;

/// Storage key for the current snapshot layout.
pub const CART_STORAGE_KEY: &str = "nft-marketplace:cart:v2";

/// Errors from a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Write would exceed the backend's quota.
    #[error("Quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    /// Storage cannot be used at all in this environment.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// A string key-value store local to this client.
pub trait CartStorage: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend rejects the write.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// Backends
// =============================================================================

/// One JSON file per key inside a data directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File path for a key; characters unsafe in file names become `_`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl CartStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        // Write then rename so a crash never leaves a half-written snapshot
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory storage with an optional byte quota.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects any value longer than `quota` bytes.
    #[must_use]
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota: Some(quota),
        }
    }
}

impl CartStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota
            && value.len() > quota
        {
            return Err(StorageError::QuotaExceeded {
                needed: value.len(),
                quota,
            });
        }
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// The persisted form of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub items: Vec<LineItem>,
    /// Epoch milliseconds of the write.
    pub updated_at: i64,
}

impl CartSnapshot {
    /// Snapshot of `items` stamped with the current time.
    #[must_use]
    pub fn now(items: &[LineItem]) -> Self {
        Self {
            items: items.to_vec(),
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

// =============================================================================
// PersistenceBridge
// =============================================================================

/// Mirrors cart items into client-local storage and restores them once.
pub struct PersistenceBridge {
    storage: Option<Arc<dyn CartStorage>>,
    preloaded: OnceLock<Vec<LineItem>>,
}

impl PersistenceBridge {
    /// Bridge backed by client-local storage.
    #[must_use]
    pub fn new(storage: Arc<dyn CartStorage>) -> Self {
        Self {
            storage: Some(storage),
            preloaded: OnceLock::new(),
        }
    }

    /// Bridge for environments without client storage (server-side
    /// rendering). Never reads, never writes.
    #[must_use]
    pub const fn detached() -> Self {
        Self {
            storage: None,
            preloaded: OnceLock::new(),
        }
    }

    /// Whether this bridge has storage behind it.
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.storage.is_some()
    }

    /// Items to seed a new cart with.
    ///
    /// Storage is read on the first call only; later calls return the same
    /// items without touching storage again.
    pub fn preloaded_items(&self) -> Vec<LineItem> {
        self.preloaded.get_or_init(|| self.read_snapshot()).clone()
    }

    fn read_snapshot(&self) -> Vec<LineItem> {
        let Some(storage) = &self.storage else {
            return Vec::new();
        };

        match storage.get_item(CART_STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<CartSnapshot>(&raw) {
                Ok(snapshot) => {
                    debug!(items = snapshot.items.len(), "Restored persisted cart");
                    snapshot.items
                }
                Err(e) => {
                    debug!(error = %e, "Ignoring unreadable cart snapshot");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                debug!(error = %e, "Cart storage unavailable, starting empty");
                Vec::new()
            }
        }
    }

    /// Write the current items. Failures are logged and swallowed.
    pub fn persist(&self, items: &[LineItem]) {
        let Some(storage) = &self.storage else {
            return;
        };

        let result = serde_json::to_string(&CartSnapshot::now(items))
            .map_err(|e| StorageError::Unavailable(e.to_string()))
            .and_then(|json| storage.set_item(CART_STORAGE_KEY, &json));

        if let Err(e) = result {
            debug!(error = %e, "Failed to persist cart, continuing in memory");
        }
    }
}

impl std::fmt::Debug for PersistenceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceBridge")
            .field("attached", &self.is_attached())
            .field("preloaded", &self.preloaded.get().map(Vec::len))
            .finish()
    }
}
