//! Session - the single current (wallet, account) pairing
//!
//! ```text
//!              select(name)
//!                   │
//!   Disconnected ──connect()──► Connecting ──Connect event / Ok──► Connected ◄─┐
//!        ▲                          │                                │   │     │
//!        │◄────Error / Err──────────┘                  AccountChanged│   └─────┘
//!        │                                                           │
//!        └──Disconnect event / Ok / Err── Disconnecting ◄──disconnect()
//! ```
//!
//! All mutation goes through one mutex. Wallet events arrive through an
//! [`EventSink`] tagged with the selection generation they were attached
//! under; events from a wallet that is no longer selected are dropped. The
//! lock is never held across an `.await`.

mod pending;
mod state;

pub use pending::PendingKind;
pub use state::{ConnectionStatus, SessionState};

pub(crate) use pending::{PendingLease, PendingSlots, Slot};

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::core::AccountId;
use crate::error::{ErrorKind, LastError, SessionError, SessionResult};
use crate::provider::{
    ConnectMode, EventSink, ProviderDescriptor, ProviderEvent, ProviderFailure, ProviderRegistry,
    SubscriptionId, WalletProvider,
};
use crate::storage::{PersistedSelection, SelectionStore};

/// Result of a startup restore attempt. Never an error: a failed silent
/// restore leaves the session disconnected and is only logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored(AccountId),
    NothingSaved,
    Skipped { provider: String, reason: String },
}

impl RestoreOutcome {
    pub fn account(&self) -> Option<&AccountId> {
        match self {
            RestoreOutcome::Restored(account) => Some(account),
            _ => None,
        }
    }
}

/// Shared handle to the session. Clones drive the same session.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    registry: ProviderRegistry,
    selection: SelectionStore,
    core: Mutex<Core>,
    state_tx: watch::Sender<SessionState>,
}

struct Listener {
    provider: Arc<dyn WalletProvider>,
    id: SubscriptionId,
}

pub(crate) struct Core {
    selected: Option<ProviderDescriptor>,
    listener: Option<Listener>,
    /// Bumped whenever the selected wallet changes or the session is torn down.
    pub(crate) generation: u64,
    pub(crate) account: Option<AccountId>,
    pub(crate) status: ConnectionStatus,
    last_error: Option<LastError>,
    pub(crate) pending: PendingSlots,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventEffect {
    Ignored,
    Applied,
    /// Applied, and the user asked for it: drop the remembered wallet.
    Forget,
}

/// Everything a sign/send needs, captured under the lock.
pub(crate) struct Signing {
    pub descriptor: ProviderDescriptor,
    pub account: AccountId,
    _lease: PendingLease,
}

impl Core {
    fn new() -> Self {
        Self {
            selected: None,
            listener: None,
            generation: 0,
            account: None,
            status: ConnectionStatus::Disconnected,
            last_error: None,
            pending: PendingSlots::default(),
        }
    }

    fn snapshot(&self) -> SessionState {
        SessionState {
            selected_provider_name: self.selected.as_ref().map(|d| d.name().to_string()),
            account_id: self.account.clone(),
            status: self.status,
            last_error: self.last_error.clone(),
        }
    }

    fn enter_connected(&mut self, account: AccountId) {
        self.status = ConnectionStatus::Connected;
        self.account = Some(account);
        self.last_error = None;
    }

    fn enter_disconnected(&mut self) {
        self.status = ConnectionStatus::Disconnected;
        self.account = None;
    }

    fn record(&mut self, err: &SessionError) {
        self.last_error = Some(LastError::from(err));
    }

    fn on_event(&mut self, event: ProviderEvent) -> EventEffect {
        use ConnectionStatus::*;
        match (event, self.status) {
            (ProviderEvent::Connect(account), Connecting) => {
                self.enter_connected(account);
                EventEffect::Applied
            }
            (ProviderEvent::Connect(account), Connected)
            | (ProviderEvent::AccountChanged(account), Connected) => {
                if self.account.as_ref() == Some(&account) {
                    return EventEffect::Ignored;
                }
                self.account = Some(account);
                EventEffect::Applied
            }
            (ProviderEvent::Connect(_), _) | (ProviderEvent::AccountChanged(_), _) => {
                EventEffect::Ignored
            }
            (ProviderEvent::Disconnect, Disconnected) => EventEffect::Ignored,
            (ProviderEvent::Disconnect, Disconnecting) => {
                self.enter_disconnected();
                EventEffect::Forget
            }
            (ProviderEvent::Disconnect, _) => {
                self.enter_disconnected();
                EventEffect::Applied
            }
            (ProviderEvent::Error(message), status) => {
                self.record(&SessionError::Provider(ProviderFailure::Other(message)));
                if status.is_transitional() {
                    self.enter_disconnected();
                }
                EventEffect::Applied
            }
        }
    }
}

impl Shared {
    pub(crate) fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn publish(&self, core: &Core) {
        let next = core.snapshot();
        self.state_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    fn apply(&self, generation: u64, event: ProviderEvent) {
        let name = event.name();
        let effect = {
            let mut core = self.core();
            if core.generation != generation {
                debug!("dropping stale '{}' event", name);
                return;
            }
            let effect = core.on_event(event);
            match effect {
                EventEffect::Ignored => debug!("'{}' event ignored while {}", name, core.status),
                _ => info!("'{}' event: session now {}", name, core.status),
            }
            self.publish(&core);
            effect
        };
        if effect == EventEffect::Forget {
            self.selection.clear();
        }
    }
}

impl Session {
    pub fn new(registry: ProviderRegistry, selection: SelectionStore) -> Self {
        let (state_tx, _) = watch::channel(SessionState::default());
        Self {
            shared: Arc::new(Shared {
                registry,
                selection,
                core: Mutex::new(Core::new()),
                state_tx,
            }),
        }
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.shared.core().snapshot()
    }

    /// Reactive view; every committed transition is published once.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.core().status
    }

    pub fn account(&self) -> Option<AccountId> {
        let core = self.shared.core();
        match core.status {
            ConnectionStatus::Connected => core.account.clone(),
            _ => None,
        }
    }

    pub fn selected(&self) -> Option<ProviderDescriptor> {
        self.shared.core().selected.clone()
    }

    pub fn pending(&self) -> Vec<PendingKind> {
        self.shared.core().pending.all()
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.shared.registry
    }

    pub fn selection_store(&self) -> &SelectionStore {
        &self.shared.selection
    }

    /// Registry entry for the remembered wallet, without selecting it.
    pub fn resolve_persisted(&self) -> Option<ProviderDescriptor> {
        let saved = self.shared.selection.load()?;
        self.shared.registry.find(&saved.provider_name).cloned()
    }

    pub fn persisted(&self) -> Option<PersistedSelection> {
        self.shared.selection.load()
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Choose the wallet to operate against. Only allowed while disconnected.
    pub fn select(&self, name: &str) -> SessionResult<ProviderDescriptor> {
        let (descriptor, detached) = {
            let mut core = self.shared.core();
            if let Some(kind) = core.pending.all().first().copied() {
                return Err(SessionError::Busy(kind));
            }
            if core.status != ConnectionStatus::Disconnected {
                return Err(SessionError::invalid("select a wallet", core.status));
            }
            let descriptor = self
                .shared
                .registry
                .find(name)
                .cloned()
                .ok_or_else(|| SessionError::NotFound(name.to_string()))?;

            let same = core.selected.as_ref().map(|d| d.name()) == Some(descriptor.name());
            let detached = if same {
                None
            } else {
                core.generation += 1;
                core.selected = Some(descriptor.clone());
                core.last_error = None;
                core.listener.take()
            };
            self.shared.publish(&core);
            (descriptor, detached)
        };

        if let Some(listener) = detached {
            listener.provider.unsubscribe(listener.id);
        }
        self.shared.selection.save(descriptor.name());
        info!("selected wallet {}", descriptor.name());
        Ok(descriptor)
    }

    pub async fn connect(&self) -> SessionResult<AccountId> {
        self.connect_with(ConnectMode::Interactive).await
    }

    /// Resolves once the wallet answers. The wallet's own `Connect` event
    /// may land first; either path commits the same transition.
    pub async fn connect_with(&self, mode: ConnectMode) -> SessionResult<AccountId> {
        let (descriptor, lease, generation, attach) = {
            let mut core = self.shared.core();
            if let Some(kind) = core.pending.get(Slot::Lifecycle) {
                return Err(SessionError::Busy(kind));
            }
            let descriptor = core.selected.clone().ok_or_else(|| SessionError::InvalidState {
                operation: "connect",
                reason: "no wallet selected".into(),
            })?;
            if core.status != ConnectionStatus::Disconnected {
                return Err(SessionError::invalid("connect", core.status));
            }
            let token = core
                .pending
                .claim(Slot::Lifecycle, PendingKind::Connect)
                .map_err(SessionError::Busy)?;
            core.status = ConnectionStatus::Connecting;
            self.shared.publish(&core);
            let lease = PendingLease::new(
                self.shared.clone(),
                Slot::Lifecycle,
                PendingKind::Connect,
                token,
                core.generation,
            );
            (descriptor, lease, core.generation, core.listener.is_none())
        };

        if attach {
            self.attach(&descriptor, generation);
        }
        info!("connecting to {} ({:?})", descriptor.name(), mode);
        let result = descriptor.provider().connect(mode).await;
        let outcome = self.settle_connect(generation, descriptor.name(), result);
        drop(lease);
        outcome
    }

    fn settle_connect(
        &self,
        generation: u64,
        name: &str,
        result: Result<AccountId, ProviderFailure>,
    ) -> SessionResult<AccountId> {
        let mut core = self.shared.core();
        if core.generation != generation {
            return Err(SessionError::InvalidState {
                operation: "connect",
                reason: "session was reset".into(),
            });
        }
        let outcome = match result {
            Ok(account) => match core.status {
                ConnectionStatus::Connecting => {
                    core.enter_connected(account.clone());
                    info!("connected to {} as {}", name, account.short());
                    Ok(account)
                }
                ConnectionStatus::Connected => Ok(core.account.clone().unwrap_or(account)),
                _ => Err(SessionError::Provider(ProviderFailure::Other(
                    "connection was interrupted".into(),
                ))),
            },
            Err(failure) => {
                let err = SessionError::Provider(failure);
                core.record(&err);
                if core.status == ConnectionStatus::Connecting {
                    core.enter_disconnected();
                }
                warn!("connect to {} failed: {}", name, err);
                Err(err)
            }
        };
        self.shared.publish(&core);
        outcome
    }

    /// User-initiated disconnect. Success forgets the remembered wallet.
    pub async fn disconnect(&self) -> SessionResult<()> {
        let (descriptor, lease, generation) = {
            let mut core = self.shared.core();
            if let Some(kind) = core.pending.get(Slot::Lifecycle) {
                return Err(SessionError::Busy(kind));
            }
            if core.status != ConnectionStatus::Connected {
                return Err(SessionError::invalid("disconnect", core.status));
            }
            let descriptor = match core.selected.clone() {
                Some(descriptor) => descriptor,
                None => return Err(SessionError::NotConnected),
            };
            let token = core
                .pending
                .claim(Slot::Lifecycle, PendingKind::Disconnect)
                .map_err(SessionError::Busy)?;
            core.status = ConnectionStatus::Disconnecting;
            self.shared.publish(&core);
            let lease = PendingLease::new(
                self.shared.clone(),
                Slot::Lifecycle,
                PendingKind::Disconnect,
                token,
                core.generation,
            );
            (descriptor, lease, core.generation)
        };

        let result = descriptor.provider().disconnect().await;
        let outcome = self.settle_disconnect(generation, descriptor.name(), result);
        drop(lease);
        outcome
    }

    fn settle_disconnect(
        &self,
        generation: u64,
        name: &str,
        result: Result<(), ProviderFailure>,
    ) -> SessionResult<()> {
        let outcome = {
            let mut core = self.shared.core();
            if core.generation != generation {
                return Ok(());
            }
            let outcome = match result {
                Ok(()) => {
                    if core.status != ConnectionStatus::Disconnected {
                        core.enter_disconnected();
                    }
                    info!("disconnected from {}", name);
                    Ok(())
                }
                Err(failure) => {
                    let err = SessionError::Provider(failure);
                    core.record(&err);
                    if core.status.is_transitional() {
                        core.enter_disconnected();
                    }
                    warn!("disconnect from {} failed: {}", name, err);
                    Err(err)
                }
            };
            self.shared.publish(&core);
            outcome
        };
        if outcome.is_ok() {
            self.shared.selection.clear();
        }
        outcome
    }

    /// Startup auto-reconnect: select the remembered wallet, then try a
    /// silent connect. Failures are logged and leave the session disconnected.
    pub async fn restore(&self) -> RestoreOutcome {
        let Some(saved) = self.shared.selection.load() else {
            return RestoreOutcome::NothingSaved;
        };
        let name = saved.provider_name;
        let skipped = |reason: String| RestoreOutcome::Skipped { provider: name.clone(), reason };

        if let Err(err) = self.select(&name) {
            if err.kind() == ErrorKind::NotFound {
                warn!("remembered wallet {} is no longer registered", name);
                self.shared.selection.clear();
            }
            return skipped(err.to_string());
        }

        match self.connect_with(ConnectMode::Silent).await {
            Ok(account) => RestoreOutcome::Restored(account),
            Err(err) => {
                warn!("silent restore of {} failed: {}", name, err);
                let mut core = self.shared.core();
                if core.status == ConnectionStatus::Disconnected {
                    core.last_error = None;
                    self.shared.publish(&core);
                }
                skipped(err.to_string())
            }
        }
    }

    /// Full sign-out: detach from the wallet, best-effort disconnect,
    /// forget the selection. Calls already in flight settle as no-ops.
    pub async fn teardown(&self) {
        let (selected, listener, was_live) = {
            let mut core = self.shared.core();
            core.generation += 1;
            let was_live = core.status != ConnectionStatus::Disconnected;
            core.enter_disconnected();
            core.last_error = None;
            core.pending.reset();
            let selected = core.selected.take();
            let listener = core.listener.take();
            self.shared.publish(&core);
            (selected, listener, was_live)
        };

        if let Some(listener) = listener {
            listener.provider.unsubscribe(listener.id);
        }
        if let (Some(descriptor), true) = (selected, was_live) {
            if let Err(e) = descriptor.provider().disconnect().await {
                debug!("disconnect during teardown failed: {}", e);
            }
        }
        self.shared.selection.clear();
        info!("session torn down");
    }

    // ------------------------------------------------------------------
    // Gateway support
    // ------------------------------------------------------------------

    /// Claim the prompt slot for a sign/send. Busy wins over NotConnected.
    pub(crate) fn begin_signing(&self, kind: PendingKind) -> SessionResult<Signing> {
        let mut core = self.shared.core();
        if let Some(held) = core.pending.get(Slot::Prompt) {
            return Err(SessionError::Busy(held));
        }
        let (descriptor, account) = match (&core.selected, &core.account, core.status) {
            (Some(descriptor), Some(account), ConnectionStatus::Connected) => {
                (descriptor.clone(), account.clone())
            }
            _ => return Err(SessionError::NotConnected),
        };
        let token = core.pending.claim(Slot::Prompt, kind).map_err(SessionError::Busy)?;
        let lease =
            PendingLease::new(self.shared.clone(), Slot::Prompt, kind, token, core.generation);
        Ok(Signing { descriptor, account, _lease: lease })
    }

    fn attach(&self, descriptor: &ProviderDescriptor, generation: u64) {
        let provider = descriptor.provider().clone();
        let id = provider.subscribe(event_sink(Arc::downgrade(&self.shared), generation));
        let mut core = self.shared.core();
        if core.generation == generation && core.listener.is_none() {
            core.listener = Some(Listener { provider, id });
        } else {
            drop(core);
            provider.unsubscribe(id);
        }
    }
}

fn event_sink(shared: Weak<Shared>, generation: u64) -> EventSink {
    EventSink::new(move |event| {
        if let Some(shared) = shared.upgrade() {
            shared.apply(generation, event);
        }
    })
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("state", &self.state()).finish()
    }
}
