//! Simulated - in-process wallets and cluster
//!
//! Deterministic stand-ins for browser wallets and the RPC node. Used by the
//! CLI demo, the browser `WalletSession` and the test suites, which need to
//! hold calls open, inject failures and push unprompted wallet events.
//! Compiled only with the `simulated` feature (on by default).
//!
//! Signatures are 64 bytes of blake3 XOF output over (wallet, account,
//! message); submission ids are the hex of a blake3 hash over the signed
//! payload. Neither means anything outside this module.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;

use crate::core::{AccountId, SubmissionId, TransactionPayload};
use crate::network::{Confirmation, LatestReference, NetworkClient, NetworkFailure};
use crate::provider::{
    Capabilities, Capability, ConnectMode, EventSink, ProviderEvent, ProviderFailure,
    ProviderRegistry, SubscriptionId, WalletProvider,
};

/// Blocks callers until released. `open` lets everything through for good.
#[derive(Debug, Clone)]
pub struct Gate {
    permits: Arc<Semaphore>,
}

impl Gate {
    fn new() -> Self {
        Self { permits: Arc::new(Semaphore::new(0)) }
    }

    /// Let one waiting (or the next) caller through.
    pub fn release(&self) {
        self.permits.add_permits(1);
    }

    pub fn open(&self) {
        self.permits.close();
    }

    async fn pass(&self) {
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Wallet
// ============================================================================

#[derive(Default)]
struct WalletState {
    sinks: Vec<(SubscriptionId, EventSink)>,
    next_subscription: u64,
    connected: bool,
    connect_gate: Option<Gate>,
    sign_gate: Option<Gate>,
    reject_connect: Option<ProviderFailure>,
    reject_disconnect: Option<ProviderFailure>,
    reject_sign: Option<ProviderFailure>,
    sent: Vec<TransactionPayload>,
}

pub struct SimulatedWallet {
    name: String,
    icon: Option<String>,
    url: Option<String>,
    capabilities: Capabilities,
    account: Mutex<AccountId>,
    trusted: AtomicBool,
    emits_events: bool,
    state: Mutex<WalletState>,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    sign_calls: AtomicUsize,
}

impl SimulatedWallet {
    pub fn new(name: impl Into<String>, account: impl Into<AccountId>) -> Self {
        Self {
            name: name.into(),
            icon: None,
            url: None,
            capabilities: Capabilities::ALL,
            account: Mutex::new(account.into()),
            trusted: AtomicBool::new(false),
            emits_events: true,
            state: Mutex::new(WalletState::default()),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            sign_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self { self.icon = Some(icon.into()); self }
    pub fn with_url(mut self, url: impl Into<String>) -> Self { self.url = Some(url.into()); self }
    pub fn with_capabilities(mut self, caps: Capabilities) -> Self { self.capabilities = caps; self }
    /// Silent connects succeed only for trusted wallets.
    pub fn trusted(self, trusted: bool) -> Self { self.trusted.store(trusted, Ordering::SeqCst); self }
    /// Report connect/disconnect through return values only, no events.
    pub fn without_events(mut self) -> Self { self.emits_events = false; self }

    pub fn set_trusted(&self, trusted: bool) {
        self.trusted.store(trusted, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // Test controls
    // ------------------------------------------------------------------

    /// Park every `connect` on a gate until released.
    pub fn hold_connects(&self) -> Gate {
        let gate = Gate::new();
        lock(&self.state).connect_gate = Some(gate.clone());
        gate
    }

    /// Park every sign/send on a gate until released.
    pub fn hold_signing(&self) -> Gate {
        let gate = Gate::new();
        lock(&self.state).sign_gate = Some(gate.clone());
        gate
    }

    pub fn reject_next_connect(&self, failure: ProviderFailure) {
        lock(&self.state).reject_connect = Some(failure);
    }

    pub fn reject_next_disconnect(&self, failure: ProviderFailure) {
        lock(&self.state).reject_disconnect = Some(failure);
    }

    pub fn reject_next_sign(&self, failure: ProviderFailure) {
        lock(&self.state).reject_sign = Some(failure);
    }

    /// Push an event to every listener, as the wallet would unprompted.
    pub fn emit(&self, event: ProviderEvent) {
        let sinks: Vec<EventSink> = lock(&self.state).sinks.iter().map(|(_, s)| s.clone()).collect();
        for sink in sinks {
            sink.emit(event.clone());
        }
    }

    /// User picked another account inside the wallet.
    pub fn switch_account(&self, account: impl Into<AccountId>) {
        let account = account.into();
        *lock(&self.account) = account.clone();
        if lock(&self.state).connected {
            self.emit(ProviderEvent::AccountChanged(account));
        }
    }

    /// User revoked the app from the wallet's own UI.
    pub fn revoke(&self) {
        lock(&self.state).connected = false;
        self.emit(ProviderEvent::Disconnect);
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn account(&self) -> AccountId {
        lock(&self.account).clone()
    }
    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }
    pub fn listener_count(&self) -> usize {
        lock(&self.state).sinks.len()
    }
    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }
    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }
    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }
    /// Payloads submitted through `sign_and_send_transaction`.
    pub fn sent(&self) -> Vec<TransactionPayload> {
        lock(&self.state).sent.clone()
    }

    fn signature(&self, message: &[u8]) -> Vec<u8> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.name.as_bytes());
        hasher.update(self.account().as_str().as_bytes());
        hasher.update(message);
        let mut signature = vec![0u8; 64];
        hasher.finalize_xof().fill(&mut signature);
        signature
    }

    async fn before_sign(&self, capability: Capability) -> Result<(), ProviderFailure> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if !self.capabilities.supports(capability) {
            return Err(ProviderFailure::Unsupported(capability));
        }
        let gate = lock(&self.state).sign_gate.clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        if !lock(&self.state).connected {
            return Err(ProviderFailure::Other("wallet is not connected".into()));
        }
        match lock(&self.state).reject_sign.take() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    fn sign_payload(&self, mut payload: TransactionPayload) -> TransactionPayload {
        let signature = self.signature(&payload.message);
        payload.signatures.push(signature);
        payload
    }
}

#[async_trait]
impl WalletProvider for SimulatedWallet {
    fn name(&self) -> &str {
        &self.name
    }
    fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }
    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn connect(&self, mode: ConnectMode) -> Result<AccountId, ProviderFailure> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let gate = lock(&self.state).connect_gate.clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        if mode == ConnectMode::Silent && !self.trusted.load(Ordering::SeqCst) {
            return Err(ProviderFailure::NotTrusted);
        }
        if let Some(failure) = lock(&self.state).reject_connect.take() {
            return Err(failure);
        }

        let account = self.account();
        lock(&self.state).connected = true;
        self.trusted.store(true, Ordering::SeqCst);
        if self.emits_events {
            self.emit(ProviderEvent::Connect(account.clone()));
        }
        Ok(account)
    }

    async fn disconnect(&self) -> Result<(), ProviderFailure> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = lock(&self.state).reject_disconnect.take() {
            return Err(failure);
        }
        lock(&self.state).connected = false;
        if self.emits_events {
            self.emit(ProviderEvent::Disconnect);
        }
        Ok(())
    }

    async fn sign_transaction(
        &self,
        payload: TransactionPayload,
    ) -> Result<TransactionPayload, ProviderFailure> {
        self.before_sign(Capability::SignTransaction).await?;
        Ok(self.sign_payload(payload))
    }

    async fn sign_all_transactions(
        &self,
        payloads: Vec<TransactionPayload>,
    ) -> Result<Vec<TransactionPayload>, ProviderFailure> {
        self.before_sign(Capability::SignAllTransactions).await?;
        Ok(payloads.into_iter().map(|p| self.sign_payload(p)).collect())
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>, ProviderFailure> {
        self.before_sign(Capability::SignMessage).await?;
        Ok(self.signature(message))
    }

    async fn sign_and_send_transaction(
        &self,
        payload: TransactionPayload,
    ) -> Result<SubmissionId, ProviderFailure> {
        self.before_sign(Capability::SignAndSendTransaction).await?;
        let signed = self.sign_payload(payload);
        let id = submission_id(&signed);
        lock(&self.state).sent.push(signed);
        Ok(id)
    }

    fn subscribe(&self, sink: EventSink) -> SubscriptionId {
        let mut state = lock(&self.state);
        state.next_subscription += 1;
        let id = SubscriptionId(state.next_subscription);
        state.sinks.push((id, sink));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        lock(&self.state).sinks.retain(|(sub, _)| *sub != id);
    }
}

fn submission_id(signed: &TransactionPayload) -> SubmissionId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&signed.message);
    for signature in &signed.signatures {
        hasher.update(signature);
    }
    SubmissionId::new(hex::encode(hasher.finalize().as_bytes()))
}

// ============================================================================
// Cluster
// ============================================================================

/// Validity window handed out with each reference, in blocks.
const REFERENCE_WINDOW: u64 = 150;

pub struct SimulatedCluster {
    balances: Mutex<HashMap<AccountId, u64>>,
    balance_gate: Mutex<Option<Gate>>,
    balance_failure: Mutex<Option<NetworkFailure>>,
    quote_failure: Mutex<Option<NetworkFailure>>,
    submit_failure: Mutex<Option<NetworkFailure>>,
    confirmation: Mutex<Confirmation>,
    submissions: Mutex<Vec<TransactionPayload>>,
    height: AtomicU64,
    balance_calls: AtomicUsize,
    quote_calls: AtomicUsize,
    confirm_calls: AtomicUsize,
}

impl Default for SimulatedCluster {
    fn default() -> Self { Self::new() }
}

impl SimulatedCluster {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            balance_gate: Mutex::new(None),
            balance_failure: Mutex::new(None),
            quote_failure: Mutex::new(None),
            submit_failure: Mutex::new(None),
            confirmation: Mutex::new(Confirmation::Confirmed),
            submissions: Mutex::new(Vec::new()),
            height: AtomicU64::new(1_000),
            balance_calls: AtomicUsize::new(0),
            quote_calls: AtomicUsize::new(0),
            confirm_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_balance(self, account: impl Into<AccountId>, lamports: u64) -> Self {
        self.set_balance(account, lamports);
        self
    }

    pub fn set_balance(&self, account: impl Into<AccountId>, lamports: u64) {
        lock(&self.balances).insert(account.into(), lamports);
    }

    pub fn hold_balances(&self) -> Gate {
        let gate = Gate::new();
        *lock(&self.balance_gate) = Some(gate.clone());
        gate
    }

    /// Fail every balance fetch until called again with `None`.
    pub fn fail_balances(&self, message: Option<&str>) {
        *lock(&self.balance_failure) = message.map(NetworkFailure::new);
    }

    pub fn fail_quotes(&self, message: Option<&str>) {
        *lock(&self.quote_failure) = message.map(NetworkFailure::new);
    }

    pub fn fail_submits(&self, message: Option<&str>) {
        *lock(&self.submit_failure) = message.map(NetworkFailure::new);
    }

    pub fn set_confirmation(&self, outcome: Confirmation) {
        *lock(&self.confirmation) = outcome;
    }

    /// Payloads submitted through the cluster, in order.
    pub fn submissions(&self) -> Vec<TransactionPayload> {
        lock(&self.submissions).clone()
    }
    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }
    pub fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }
    pub fn confirm_calls(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkClient for SimulatedCluster {
    async fn get_balance(&self, account: &AccountId) -> Result<u64, NetworkFailure> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        let gate = lock(&self.balance_gate).clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        if let Some(failure) = lock(&self.balance_failure).clone() {
            return Err(failure);
        }
        Ok(lock(&self.balances).get(account).copied().unwrap_or(0))
    }

    async fn latest_reference(&self) -> Result<LatestReference, NetworkFailure> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = lock(&self.quote_failure).clone() {
            return Err(failure);
        }
        let height = self.height.fetch_add(1, Ordering::SeqCst);
        let reference = hex::encode(&blake3::hash(&height.to_le_bytes()).as_bytes()[..16]);
        Ok(LatestReference { reference, valid_until_height: height + REFERENCE_WINDOW })
    }

    async fn submit(&self, signed: &TransactionPayload) -> Result<SubmissionId, NetworkFailure> {
        if let Some(failure) = lock(&self.submit_failure).clone() {
            return Err(failure);
        }
        if !signed.is_signed() {
            return Err(NetworkFailure::new("transaction is not signed"));
        }
        lock(&self.submissions).push(signed.clone());
        Ok(submission_id(signed))
    }

    async fn confirm(
        &self,
        _id: &SubmissionId,
        _reference: &LatestReference,
    ) -> Result<Confirmation, NetworkFailure> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*lock(&self.confirmation))
    }
}

// ============================================================================
// Demo set
// ============================================================================

pub const PHANTOM_ACCOUNT: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";
pub const SOLFLARE_ACCOUNT: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
pub const BACKPACK_ACCOUNT: &str = "5fNfvyp5czQVX77yoACa3JJVEhdRaWjPuazuWgjhTqEH";

/// Phantom, Solflare and Backpack, all trusted so silent restore works.
/// Backpack signs but cannot sign-and-send.
pub fn demo_wallets() -> Vec<Arc<SimulatedWallet>> {
    vec![
        Arc::new(
            SimulatedWallet::new("Phantom", PHANTOM_ACCOUNT)
                .with_icon("👻")
                .with_url("https://phantom.app")
                .trusted(true),
        ),
        Arc::new(
            SimulatedWallet::new("Solflare", SOLFLARE_ACCOUNT)
                .with_icon("🔥")
                .with_url("https://solflare.com")
                .trusted(true),
        ),
        Arc::new(
            SimulatedWallet::new("Backpack", BACKPACK_ACCOUNT)
                .with_icon("🎒")
                .with_url("https://backpack.app")
                .with_capabilities(Capabilities::ALL.without(Capability::SignAndSendTransaction))
                .trusted(true),
        ),
    ]
}

pub fn demo_registry() -> ProviderRegistry {
    ProviderRegistry::new(
        demo_wallets().into_iter().map(|w| w as Arc<dyn WalletProvider>),
    )
}

pub fn demo_cluster() -> SimulatedCluster {
    SimulatedCluster::new()
        .with_balance(PHANTOM_ACCOUNT, 2_500_000_000)
        .with_balance(SOLFLARE_ACCOUNT, 730_000_000)
        .with_balance(BACKPACK_ACCOUNT, 12_000_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn silent_connect_needs_trust() {
        let wallet = SimulatedWallet::new("Phantom", PHANTOM_ACCOUNT);
        assert_eq!(wallet.connect(ConnectMode::Silent).await, Err(ProviderFailure::NotTrusted));
        assert!(wallet.connect(ConnectMode::Interactive).await.is_ok());
        wallet.disconnect().await.unwrap();
        // approving once makes the wallet trust the app
        assert!(wallet.connect(ConnectMode::Silent).await.is_ok());
    }

    #[tokio::test]
    async fn signatures_are_deterministic() {
        let wallet = SimulatedWallet::new("Phantom", PHANTOM_ACCOUNT);
        wallet.connect(ConnectMode::Interactive).await.unwrap();
        let a = wallet.sign_message(b"hello").await.unwrap();
        let b = wallet.sign_message(b"hello").await.unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        assert_ne!(a, wallet.sign_message(b"other").await.unwrap());
    }

    #[tokio::test]
    async fn cluster_references_advance() {
        let cluster = demo_cluster();
        let first = cluster.latest_reference().await.unwrap();
        let second = cluster.latest_reference().await.unwrap();
        assert_ne!(first.reference, second.reference);
        assert_eq!(second.valid_until_height, first.valid_until_height + 1);
        assert_eq!(cluster.get_balance(&AccountId::new(PHANTOM_ACCOUNT)).await.unwrap(), 2_500_000_000);
        assert_eq!(cluster.get_balance(&AccountId::new("unknown")).await.unwrap(), 0);
    }

    #[test]
    fn demo_registry_order() {
        assert_eq!(demo_registry().names(), vec!["Phantom", "Solflare", "Backpack"]);
    }
}
