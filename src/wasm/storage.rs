//! WebStorage: `window.localStorage` as a key/value store.
//!
//! Holds no JS handles. The `Storage` object is looked up per call, which
//! keeps the type `Send + Sync` like the native stores.

use wasm_bindgen::JsValue;

use crate::storage::{KeyValueStore, StorageError, StorageResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct WebStorage;

impl WebStorage {
    pub fn new() -> Self {
        Self
    }

    /// False when storage is disabled (private mode, sandboxed iframe).
    pub fn is_available() -> bool {
        local_storage().is_ok()
    }
}

fn local_storage() -> StorageResult<web_sys::Storage> {
    let window = web_sys::window().ok_or_else(|| unavailable("no window"))?;
    window
        .local_storage()
        .map_err(js_error)?
        .ok_or_else(|| unavailable("localStorage disabled"))
}

fn unavailable(reason: &str) -> StorageError {
    StorageError::Unavailable(reason.to_string())
}

fn js_error(value: JsValue) -> StorageError {
    StorageError::Unavailable(value.as_string().unwrap_or_else(|| format!("{:?}", value)))
}

impl KeyValueStore for WebStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        local_storage()?.get_item(key).map_err(js_error)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        local_storage()?.set_item(key, value).map_err(|e| {
            super::log!("localStorage write of '{}' failed", key);
            js_error(e)
        })
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        local_storage()?.remove_item(key).map_err(js_error)
    }
}
