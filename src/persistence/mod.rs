//! Durable key-value storage
//!
//! The ledger only ever needs string get/set by key, mirroring the browser's
//! LocalStorage. Backends:
//! - `MemoryStorage`: in-process map (tests, fallback)
//! - `FileStorage`: one JSON object file (native)
//! - `platform::LocalStorage`: `window.localStorage` (wasm32)

#[cfg(not(target_arch = "wasm32"))]
mod file;

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStorage;

use std::collections::HashMap;

/// Why a storage operation failed
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No backing store is reachable (private mode, missing window, ...)
    #[error("storage unavailable")]
    Unavailable,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("corrupt storage contents: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend-specific failure (quota exceeded, security error)
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// String key-value store
pub trait Storage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&mut self, key: &str) -> Result<(), StorageError>;
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key)
    }
}

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        self.items.remove(key);
        Ok(())
    }
}

/// A store that refuses every operation (storage disabled by the browser)
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableStorage;

impl Storage for UnavailableStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable)
    }

    fn set_item(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }

    fn remove_item(&mut self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }
}
