//! wallet-session: one wallet session, many wallets.
//!
//! Discovers wallets through a static registry, drives a single connection
//! through its lifecycle, remembers the chosen wallet across restarts, and
//! serializes signing and sending against the active session.
//!
//! # Architecture
//!
//! ```text
//! WalletContext (entry point)
//!   │
//!   ├── OperationGateway
//!   │     ├── select / connect / disconnect
//!   │     ├── sign_transaction / sign_all_transactions / sign_message
//!   │     └── send_transaction ──► NetworkClient (quote, submit, confirm)
//!   │
//!   ├── Session (state machine)
//!   │     ├── ProviderRegistry ──► WalletProvider (capability-tagged)
//!   │     ├── EventSink ◄── wallet events (connect, disconnect, error, accountChanged)
//!   │     └── SelectionStore ──► KeyValueStore (memory, file, localStorage)
//!   │
//!   └── BalancePoller
//!         └── follows session state ──► NetworkClient::get_balance
//! ```
//!
//! # Session states
//!
//! | Status | Entered by | Left by |
//! |--------|------------|---------|
//! | `Disconnected` | start, disconnect, wallet error | `connect()` |
//! | `Connecting` | `connect()` | wallet answer / `Connect` / `Error` event |
//! | `Connected` | wallet answer / `Connect` event | `disconnect()`, `Disconnect` event |
//! | `Disconnecting` | `disconnect()` | wallet answer / `Disconnect` / `Error` event |
//!
//! # Features
//!
//! - `native` - multi-threaded tokio, signals, file-backed persistence, log init
//! - `wasm` - browser build: `spawn_local` poller, `WalletSession` JS bindings,
//!   `localStorage` persistence, console logging
//! - `simulated` - in-process wallets and cluster for the CLI, demos and tests
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use wallet_session::{ContextConfig, MemoryStore, WalletContext};
//! use wallet_session::simulated::{demo_cluster, demo_registry};
//!
//! let ctx = WalletContext::init(
//!     ContextConfig::new("shop").with_auto_connect(true),
//!     demo_registry(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(demo_cluster()),
//! ).await;
//!
//! ctx.select("Phantom")?;
//! let account = ctx.connect().await?;
//! let signature = ctx.sign_text("hello").await?;
//! ```

// =============================================================================
// Shared modules (compile everywhere)
// =============================================================================
pub mod balance;
pub mod context;
pub mod core;
pub mod error;
pub mod gateway;
pub mod network;
pub mod provider;
pub mod runtime;
pub mod session;
#[cfg(feature = "simulated")]
pub mod simulated;
pub mod storage;

// =============================================================================
// Native-only modules
// =============================================================================
#[cfg(feature = "native")]
pub mod logging;

// =============================================================================
// WASM-only modules
// =============================================================================
#[cfg(feature = "wasm")]
pub mod wasm;

// =============================================================================
// Re-exports
// =============================================================================
pub use balance::{BalancePoller, BalanceSnapshot, BalanceView};
pub use context::{ContextConfig, WalletContext};
pub use core::{AccountId, SubmissionId, TransactionPayload};
pub use error::{ErrorKind, LastError, SessionError, SessionResult, TransactionStage};
pub use gateway::OperationGateway;
pub use network::{Cluster, Confirmation, LatestReference, NetworkClient, NetworkFailure};
pub use provider::{
    Capabilities, Capability, ConnectMode, EventSink, ProviderDescriptor, ProviderEvent,
    ProviderFailure, ProviderInfo, ProviderRegistry, SubscriptionId, WalletProvider,
};
pub use runtime::{Shutdown, ShutdownSignal, Task};
pub use session::{ConnectionStatus, PendingKind, RestoreOutcome, Session, SessionState};
pub use storage::{KeyValueStore, MemoryStore, PersistedSelection, SelectionStore, StorageError};

#[cfg(feature = "native")]
pub use runtime::install_signal_handlers;
#[cfg(feature = "native")]
pub use storage::FileStore;

#[cfg(feature = "wasm")]
pub use wasm::{WalletSession, WebStorage};
