//! `window.localStorage` backend

use wasm_bindgen::JsValue;

use crate::persistence::{Storage, StorageError};

/// Browser LocalStorage. Resolved on every call so a page that revokes
/// storage mid-session degrades instead of holding a dead handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }

    fn backend(&self) -> Result<web_sys::Storage, StorageError> {
        web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
            .ok_or(StorageError::Unavailable)
    }
}

fn js_error(e: JsValue) -> StorageError {
    StorageError::Backend(e.as_string().unwrap_or_else(|| format!("{:?}", e)))
}

impl Storage for LocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.backend()?.get_item(key).map_err(js_error)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.backend()?.set_item(key, value).map_err(js_error)
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        self.backend()?.remove_item(key).map_err(js_error)
    }
}
