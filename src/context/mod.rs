//! WalletContext - application-level assembly of the session stack
//!
//! ```text
//! WalletContext::init(config, registry, store, network)
//!     │
//!     ├── Session            (registry + SelectionStore over `store`)
//!     ├── BalancePoller      (spawned, follows session state)
//!     ├── OperationGateway   (session + poller)
//!     └── restore()          (only with `auto_connect`)
//!
//! teardown() ── stop poller ──► session.teardown() ──► forget selection
//! ```
//!
//! One context per application. Clones share it.

mod config;

pub use config::ContextConfig;

use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::info;

use crate::balance::{BalancePoller, BalanceSnapshot, BalanceView};
use crate::core::{AccountId, SubmissionId, TransactionPayload};
use crate::error::SessionResult;
use crate::gateway::OperationGateway;
use crate::network::NetworkClient;
use crate::provider::{ProviderDescriptor, ProviderInfo, ProviderRegistry};
use crate::runtime::{Shutdown, Task};
use crate::session::{RestoreOutcome, Session, SessionState};
use crate::storage::{KeyValueStore, SelectionStore};

#[derive(Clone)]
pub struct WalletContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    config: ContextConfig,
    session: Session,
    poller: BalancePoller,
    gateway: OperationGateway,
    network: Arc<dyn NetworkClient>,
    shutdown: Shutdown,
    poll_task: Mutex<Option<Task>>,
}

impl WalletContext {
    /// Build the stack and start balance polling. With `auto_connect`, the
    /// remembered wallet is restored silently before this returns.
    pub async fn init(
        config: ContextConfig,
        registry: ProviderRegistry,
        store: Arc<dyn KeyValueStore>,
        network: Arc<dyn NetworkClient>,
    ) -> Self {
        let selection = SelectionStore::with_key(store, config.storage_key.clone());
        let session = Session::new(registry, selection);
        let poller = BalancePoller::new(session.clone(), network.clone(), config.balance_interval);
        let gateway = OperationGateway::new(session.clone(), poller.clone());
        let shutdown = Shutdown::new();
        let poll_task = poller.spawn(shutdown.signal());

        info!(
            "wallet context '{}' on {} ({} wallets)",
            config.app,
            config.cluster.as_str(),
            session.registry().len()
        );

        let context = Self {
            inner: Arc::new(ContextInner {
                config,
                session,
                poller,
                gateway,
                network,
                shutdown,
                poll_task: Mutex::new(Some(poll_task)),
            }),
        };

        if context.inner.config.auto_connect {
            match context.restore().await {
                RestoreOutcome::Restored(account) => info!("restored session for {}", account.short()),
                RestoreOutcome::NothingSaved => {}
                RestoreOutcome::Skipped { provider, reason } => {
                    info!("not restoring {}: {}", provider, reason)
                }
            }
        }
        context
    }

    /// `init` over the native file store for `config.app`.
    #[cfg(feature = "native")]
    pub async fn open(
        config: ContextConfig,
        registry: ProviderRegistry,
        network: Arc<dyn NetworkClient>,
    ) -> crate::storage::StorageResult<Self> {
        let store = crate::storage::FileStore::open(&config.app)?;
        Ok(Self::init(config, registry, Arc::new(store), network).await)
    }

    // Accessors
    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }
    pub fn session(&self) -> &Session {
        &self.inner.session
    }
    pub fn gateway(&self) -> &OperationGateway {
        &self.inner.gateway
    }
    pub fn poller(&self) -> &BalancePoller {
        &self.inner.poller
    }
    pub fn network(&self) -> &Arc<dyn NetworkClient> {
        &self.inner.network
    }

    // Observation
    pub fn state(&self) -> SessionState {
        self.inner.session.state()
    }
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.session.subscribe()
    }
    pub fn balance(&self) -> Option<BalanceSnapshot> {
        self.inner.poller.current()
    }
    pub fn balance_view(&self) -> BalanceView {
        self.inner.poller.view()
    }
    pub fn wallets(&self) -> Vec<ProviderInfo> {
        self.inner.session.registry().list().iter().map(|d| d.info()).collect()
    }
    /// Explorer link for the connected account.
    pub fn explorer_url(&self) -> Option<String> {
        self.inner.session.account().map(|a| a.explorer_url(self.inner.config.cluster))
    }

    // Operations
    pub fn select(&self, name: &str) -> SessionResult<ProviderDescriptor> {
        self.inner.gateway.select(name)
    }
    pub async fn connect(&self) -> SessionResult<AccountId> {
        self.inner.gateway.connect().await
    }
    pub async fn disconnect(&self) -> SessionResult<()> {
        self.inner.gateway.disconnect().await
    }
    pub async fn restore(&self) -> RestoreOutcome {
        self.inner.session.restore().await
    }
    pub async fn sign_transaction(&self, payload: TransactionPayload) -> SessionResult<TransactionPayload> {
        self.inner.gateway.sign_transaction(payload).await
    }
    pub async fn sign_all_transactions(
        &self,
        payloads: Vec<TransactionPayload>,
    ) -> SessionResult<Vec<TransactionPayload>> {
        self.inner.gateway.sign_all_transactions(payloads).await
    }
    pub async fn sign_message(&self, message: &[u8]) -> SessionResult<Vec<u8>> {
        self.inner.gateway.sign_message(message).await
    }
    pub async fn sign_text(&self, text: &str) -> SessionResult<Vec<u8>> {
        self.inner.gateway.sign_text(text).await
    }
    /// `send_transaction` against this context's network client.
    pub async fn send_transaction(&self, payload: TransactionPayload) -> SessionResult<SubmissionId> {
        self.inner.gateway.send_transaction(payload, self.inner.network.as_ref()).await
    }
    pub async fn refresh_balance(&self) -> Option<BalanceSnapshot> {
        self.inner.gateway.refresh_balance().await
    }

    /// Full sign-out. Stops polling, detaches from the wallet, disconnects
    /// it if live and forgets the remembered selection.
    pub async fn teardown(&self) {
        self.inner.shutdown.trigger();
        let task = self.inner.poll_task.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(task) = task {
            task.join().await;
        }
        self.inner.session.teardown().await;
        self.inner.poller.clear();
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.shutdown.is_triggered()
    }
}

impl std::fmt::Debug for WalletContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletContext")
            .field("config", &self.inner.config)
            .field("state", &self.state())
            .finish()
    }
}
