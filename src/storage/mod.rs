//! Storage - durable client key/value storage
//!
//! Backends:
//! - [`MemoryStore`]: process-local, for tests and ephemeral sessions
//! - [`FileStore`]: JSON file under the app data dir (native)
//! - `wasm::WebStorage`: browser `localStorage` (wasm)
//!
//! The session only ever touches one key through [`SelectionStore`].

mod memory;
pub mod selection;
#[cfg(feature = "native")]
mod file;

pub use memory::MemoryStore;
pub use selection::{PersistedSelection, SelectionStore};
#[cfg(feature = "native")]
pub use file::FileStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Synchronous, durable key/value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;
}
