//! SelectionStore - remembers which wallet the user picked.
//!
//! Written on `select`, cleared on a user disconnect, read once at startup.
//! Storage failures are logged and swallowed: losing the remembered wallet
//! only costs the user one extra click.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::KeyValueStore;
use crate::core::keys::storage::SELECTION_KEY;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSelection {
    pub provider_name: String,
}

impl PersistedSelection {
    pub fn new(provider_name: impl Into<String>) -> Self {
        Self { provider_name: provider_name.into() }
    }

    fn encode(&self) -> String {
        serde_json::json!({ "providerName": self.provider_name }).to_string()
    }

    /// Accepts the JSON form and the bare wallet name older builds wrote.
    fn decode(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match serde_json::from_str::<PersistedSelection>(raw) {
            Ok(sel) if !sel.provider_name.is_empty() => Some(sel),
            Ok(_) => None,
            Err(_) if !raw.starts_with('{') => Some(Self::new(raw.trim_matches('"'))),
            Err(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct SelectionStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl SelectionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, SELECTION_KEY)
    }

    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self { store, key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn load(&self) -> Option<PersistedSelection> {
        match self.store.get(&self.key) {
            Ok(Some(raw)) => {
                let decoded = PersistedSelection::decode(&raw);
                if decoded.is_none() {
                    tracing::warn!("ignoring unreadable wallet selection under '{}'", self.key);
                }
                decoded
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("wallet selection read failed: {}", e);
                None
            }
        }
    }

    pub fn save(&self, provider_name: &str) {
        let encoded = PersistedSelection::new(provider_name).encode();
        if let Err(e) = self.store.set(&self.key, &encoded) {
            tracing::warn!("wallet selection write failed: {}", e);
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.remove(&self.key) {
            tracing::warn!("wallet selection clear failed: {}", e);
        }
    }
}

impl std::fmt::Debug for SelectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionStore").field("key", &self.key).finish()
    }
}
