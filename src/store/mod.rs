//! Local persistence: small JSON records under fixed keys.
//!
//! Synchronous and last-write-wins, with no locking across processes.
//! Components go through `load`/`save` so the backing implementation can be
//! swapped for an in-memory one in tests.

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub const PROFILE_KEY: &str = "bhasha_profile";
pub const MEDICATIONS_KEY: &str = "bhasha_medications";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt record under {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// Raw key/value access. Values are serialized JSON documents.
pub trait LocalStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Read and decode the record under `key`. Missing records are `Ok(None)`.
pub fn load<T: DeserializeOwned>(store: &dyn LocalStore, key: &str) -> Result<Option<T>, StoreError> {
    match store.read(key)? {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            }),
    }
}

/// Encode and write `value` under `key`, replacing any previous record.
pub fn save<T: Serialize>(store: &dyn LocalStore, key: &str, value: &T) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value)?;
    store.write(key, &raw)
}

pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}
