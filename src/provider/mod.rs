//! Provider - the capability contract every wallet implements
//!
//! Wallets are unrelated objects with overlapping method sets. Each one
//! declares which optional operations it supports through [`Capabilities`];
//! callers check the declaration before dispatching instead of probing.
//!
//! ```text
//! WalletProvider
//!     │
//!     ├── connect(mode) / disconnect()           required
//!     ├── sign_transaction(payload)              optional
//!     ├── sign_all_transactions(payloads)        optional
//!     ├── sign_message(bytes)                    optional
//!     ├── sign_and_send_transaction(payload)     optional
//!     │
//!     └── subscribe(EventSink) ──► ProviderEvent {Connect, Disconnect, Error, AccountChanged}
//! ```

pub mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::core::{AccountId, SubmissionId, TransactionPayload};

pub use registry::{ProviderDescriptor, ProviderInfo, ProviderRegistry};

/// Optional operation a wallet may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    SignTransaction,
    SignAllTransactions,
    SignMessage,
    SignAndSendTransaction,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::SignTransaction => "sign_transaction",
            Capability::SignAllTransactions => "sign_all_transactions",
            Capability::SignMessage => "sign_message",
            Capability::SignAndSendTransaction => "sign_and_send_transaction",
        }
    }

    /// Phrase used in user-facing messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Capability::SignTransaction => "transaction signing",
            Capability::SignAllTransactions => "batch transaction signing",
            Capability::SignMessage => "message signing",
            Capability::SignAndSendTransaction => "signing and sending transactions",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub sign_transaction: bool,
    pub sign_all_transactions: bool,
    pub sign_message: bool,
    pub sign_and_send_transaction: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        sign_transaction: false,
        sign_all_transactions: false,
        sign_message: false,
        sign_and_send_transaction: false,
    };

    pub const ALL: Capabilities = Capabilities {
        sign_transaction: true,
        sign_all_transactions: true,
        sign_message: true,
        sign_and_send_transaction: true,
    };

    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::SignTransaction => self.sign_transaction,
            Capability::SignAllTransactions => self.sign_all_transactions,
            Capability::SignMessage => self.sign_message,
            Capability::SignAndSendTransaction => self.sign_and_send_transaction,
        }
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.set(capability, true);
        self
    }

    pub fn without(mut self, capability: Capability) -> Self {
        self.set(capability, false);
        self
    }

    fn set(&mut self, capability: Capability, on: bool) {
        match capability {
            Capability::SignTransaction => self.sign_transaction = on,
            Capability::SignAllTransactions => self.sign_all_transactions = on,
            Capability::SignMessage => self.sign_message = on,
            Capability::SignAndSendTransaction => self.sign_and_send_transaction = on,
        }
    }
}

/// How hard `connect` may try.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectMode {
    /// User-initiated; the wallet may show its approval prompt.
    #[default]
    Interactive,
    /// Restore only if the wallet already trusts this app. Must not prompt.
    Silent,
}

/// Lifecycle notification pushed by a wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    Connect(AccountId),
    Disconnect,
    Error(String),
    AccountChanged(AccountId),
}

impl ProviderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderEvent::Connect(_) => "connect",
            ProviderEvent::Disconnect => "disconnect",
            ProviderEvent::Error(_) => "error",
            ProviderEvent::AccountChanged(_) => "accountChanged",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderFailure {
    #[error("{0} is not installed or not ready")]
    NotReady(String),
    #[error("request rejected in the wallet")]
    Rejected,
    #[error("wallet cannot restore the session without a prompt")]
    NotTrusted,
    #[error("{} is not supported", .0.describe())]
    Unsupported(Capability),
    #[error("{0}")]
    Other(String),
}

/// Handle returned by `subscribe`, used to detach the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Receiver end a wallet pushes its events into.
///
/// Delivery is synchronous: `emit` returns once the session has applied the
/// event, so events are applied in the order the wallet emits them.
#[derive(Clone)]
pub struct EventSink {
    deliver: Arc<dyn Fn(ProviderEvent) + Send + Sync>,
}

impl EventSink {
    pub fn new(deliver: impl Fn(ProviderEvent) + Send + Sync + 'static) -> Self {
        Self { deliver: Arc::new(deliver) }
    }

    pub fn emit(&self, event: ProviderEvent) {
        (self.deliver)(event)
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Unique, stable name (e.g. "Phantom").
    fn name(&self) -> &str;
    fn icon(&self) -> Option<&str> {
        None
    }
    fn url(&self) -> Option<&str> {
        None
    }
    fn capabilities(&self) -> Capabilities;

    /// Detection of the underlying wallet happens here, not at registration.
    async fn connect(&self, mode: ConnectMode) -> Result<AccountId, ProviderFailure>;
    async fn disconnect(&self) -> Result<(), ProviderFailure>;

    async fn sign_transaction(
        &self,
        _payload: TransactionPayload,
    ) -> Result<TransactionPayload, ProviderFailure> {
        Err(ProviderFailure::Unsupported(Capability::SignTransaction))
    }

    async fn sign_all_transactions(
        &self,
        _payloads: Vec<TransactionPayload>,
    ) -> Result<Vec<TransactionPayload>, ProviderFailure> {
        Err(ProviderFailure::Unsupported(Capability::SignAllTransactions))
    }

    async fn sign_message(&self, _message: &[u8]) -> Result<Vec<u8>, ProviderFailure> {
        Err(ProviderFailure::Unsupported(Capability::SignMessage))
    }

    /// Co-sign and submit through the wallet's own channel.
    async fn sign_and_send_transaction(
        &self,
        _payload: TransactionPayload,
    ) -> Result<SubmissionId, ProviderFailure> {
        Err(ProviderFailure::Unsupported(Capability::SignAndSendTransaction))
    }

    fn subscribe(&self, sink: EventSink) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_flags() {
        let caps = Capabilities::NONE.with(Capability::SignMessage);
        assert!(caps.supports(Capability::SignMessage));
        assert!(!caps.supports(Capability::SignTransaction));

        let caps = Capabilities::ALL.without(Capability::SignAndSendTransaction);
        assert!(caps.supports(Capability::SignAllTransactions));
        assert!(!caps.supports(Capability::SignAndSendTransaction));
    }

    #[test]
    fn sink_delivers_in_order() {
        use std::sync::Mutex;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let sink = EventSink::new(move |event| log.lock().unwrap().push(event.name()));
        sink.emit(ProviderEvent::Connect(AccountId::new("a")));
        sink.emit(ProviderEvent::Disconnect);
        assert_eq!(*seen.lock().unwrap(), vec!["connect", "disconnect"]);
    }
}
