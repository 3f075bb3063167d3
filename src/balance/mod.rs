//! Balance Poller - periodically refreshed balance of the connected account
//!
//! ```text
//!   session state ──watch──► run loop ──► fetch on entering Connected
//!                                   ├──► fetch every `interval` while Connected
//!                                   └──► clear + pause on leaving Connected
//!
//!   refresh() ──► fetch now, or join the fetch already in flight
//! ```
//!
//! Fetches are single-flight: a tick or refresh that lands while a fetch is
//! running joins it, and fetches again only if the joined fetch did not
//! produce a balance for the account connected now. The view never holds a
//! snapshot of an account other than the one being tracked. Failures never
//! escape; they show up in [`BalanceView::last_error`] next to the previous
//! snapshot of the same account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::core::keys::balance::DEFAULT_INTERVAL_MS;
use crate::core::AccountId;
use crate::error::{SessionError, SessionResult};
use crate::network::{format_sol, lamports_to_sol, NetworkClient};
use crate::runtime::{self, ShutdownSignal, Task};
use crate::session::{PendingKind, Session, SessionState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSnapshot {
    pub account_id: AccountId,
    pub lamports: u64,
    pub fetched_at: DateTime<Utc>,
}

impl BalanceSnapshot {
    pub fn sol(&self) -> f64 {
        lamports_to_sol(self.lamports)
    }

    pub fn display(&self) -> String {
        format_sol(self.lamports)
    }
}

/// Observable poller state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    pub snapshot: Option<BalanceSnapshot>,
    pub fetching: bool,
    pub last_error: Option<String>,
}

#[derive(Clone)]
pub struct BalancePoller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    session: Session,
    network: Arc<dyn NetworkClient>,
    interval: Duration,
    view: watch::Sender<BalanceView>,
}

/// Resets `fetching` if a fetch future is dropped before it settles.
struct FetchGuard<'a> {
    view: &'a watch::Sender<BalanceView>,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.view.send_if_modified(|view| std::mem::replace(&mut view.fetching, false));
    }
}

impl BalancePoller {
    /// A zero `interval` falls back to the default period.
    pub fn new(session: Session, network: Arc<dyn NetworkClient>, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            warn!("zero balance interval, polling every {}ms instead", DEFAULT_INTERVAL_MS);
            Duration::from_millis(DEFAULT_INTERVAL_MS)
        } else {
            interval
        };
        let (view, _) = watch::channel(BalanceView::default());
        Self { inner: Arc::new(PollerInner { session, network, interval, view }) }
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn subscribe(&self) -> watch::Receiver<BalanceView> {
        self.inner.view.subscribe()
    }

    pub fn view(&self) -> BalanceView {
        self.inner.view.borrow().clone()
    }

    /// Latest snapshot, only if it belongs to the account connected right now.
    pub fn current(&self) -> Option<BalanceSnapshot> {
        let account = self.inner.session.account()?;
        let view = self.inner.view.borrow();
        view.snapshot.as_ref().filter(|s| s.account_id == account).cloned()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.view.borrow().last_error.clone()
    }

    /// Fetch now, bypassing the timer. Joins a fetch already in flight
    /// instead of starting a second one. Never fails.
    pub async fn refresh(&self) -> Option<BalanceSnapshot> {
        match self.try_refresh().await {
            Ok(snapshot) => snapshot,
            Err(SessionError::Busy(_)) => {
                debug!("balance fetch already running, joining it");
                self.settled().await;
                if let Some(snapshot) = self.current() {
                    return Some(snapshot);
                }
                // joined a fetch for a previous account, or one that failed
                match self.try_refresh().await {
                    Ok(snapshot) => snapshot,
                    Err(_) => self.current(),
                }
            }
            Err(_) => self.current(),
        }
    }

    async fn settled(&self) {
        let mut view = self.inner.view.subscribe();
        let _ = view.wait_for(|v| !v.fetching).await;
    }

    /// Single fetch attempt. `Busy` if one is already running,
    /// `NotConnected` outside a connected session.
    pub async fn try_refresh(&self) -> SessionResult<Option<BalanceSnapshot>> {
        let Some(account) = self.inner.session.account() else {
            self.clear();
            return Err(SessionError::NotConnected);
        };

        let mut claimed = false;
        self.inner.view.send_if_modified(|view| {
            let dropped = drop_foreign(view, &account);
            if view.fetching {
                return dropped;
            }
            view.fetching = true;
            claimed = true;
            true
        });
        if !claimed {
            return Err(SessionError::Busy(PendingKind::Refresh));
        }
        let _guard = FetchGuard { view: &self.inner.view };

        let result = self.inner.network.get_balance(&account).await;

        if self.inner.session.account().as_ref() != Some(&account) {
            debug!("discarding balance for {}: account changed", account.short());
            self.inner.view.send_modify(|view| {
                view.fetching = false;
                if view.snapshot.as_ref().map(|s| &s.account_id) == Some(&account) {
                    view.snapshot = None;
                }
            });
            return Ok(None);
        }

        match result {
            Ok(lamports) => {
                let snapshot =
                    BalanceSnapshot { account_id: account, lamports, fetched_at: Utc::now() };
                debug!("balance {} = {}", snapshot.account_id.short(), snapshot.display());
                self.inner.view.send_modify(|view| {
                    view.fetching = false;
                    view.snapshot = Some(snapshot.clone());
                    view.last_error = None;
                });
                Ok(Some(snapshot))
            }
            Err(e) => {
                warn!("balance fetch for {} failed: {}", account.short(), e);
                self.inner.view.send_modify(|view| {
                    view.fetching = false;
                    view.last_error = Some(e.to_string());
                });
                Err(SessionError::Network(e))
            }
        }
    }

    /// Drop the snapshot and any recorded error.
    pub fn clear(&self) {
        self.inner.view.send_if_modified(|view| {
            let stale = view.snapshot.is_some() || view.last_error.is_some();
            view.snapshot = None;
            view.last_error = None;
            stale
        });
    }

    /// Run the poll loop in the background until `shutdown` fires.
    pub fn spawn(&self, shutdown: ShutdownSignal) -> Task {
        let poller = self.clone();
        runtime::spawn(async move { poller.run(shutdown).await })
    }

    /// Poll loop. Follows session state; exits on shutdown or when the
    /// session is dropped.
    pub async fn run(&self, mut shutdown: ShutdownSignal) {
        let mut states = self.inner.session.subscribe();
        let period = self.inner.interval;
        let mut tick = runtime::delay(period);
        let mut tracked: Option<AccountId> = None;

        loop {
            let account = states.borrow_and_update().active_account().cloned();
            if account != tracked {
                tracked = account;
                match &tracked {
                    Some(account) => {
                        info!("polling balance of {} every {:?}", account.short(), period);
                        self.inner.view.send_if_modified(|view| drop_foreign(view, account));
                        tick = runtime::delay(period);
                        if self.fetch_until_interrupted(&mut states, &mut shutdown).await {
                            break;
                        }
                        continue;
                    }
                    None => {
                        debug!("balance polling paused");
                        self.clear();
                    }
                }
            }

            tokio::select! {
                _ = shutdown.wait() => break,
                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = &mut tick, if tracked.is_some() => {
                    tick = runtime::delay(period);
                    if self.fetch_until_interrupted(&mut states, &mut shutdown).await {
                        break;
                    }
                }
            }
        }
        debug!("balance poller stopped");
    }

    /// One fetch, abandoned as soon as the session state moves or shutdown
    /// fires. Returns true on shutdown.
    async fn fetch_until_interrupted(
        &self,
        states: &mut watch::Receiver<SessionState>,
        shutdown: &mut ShutdownSignal,
    ) -> bool {
        let fetch = self.refresh();
        tokio::pin!(fetch);
        tokio::select! {
            _ = &mut fetch => false,
            _ = states.changed() => false,
            _ = shutdown.wait() => true,
        }
    }
}

/// Clears a snapshot (and its error) that belongs to another account.
fn drop_foreign(view: &mut BalanceView, account: &AccountId) -> bool {
    if view.snapshot.as_ref().is_some_and(|s| &s.account_id != account) {
        view.snapshot = None;
        view.last_error = None;
        return true;
    }
    false
}

impl std::fmt::Debug for BalancePoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalancePoller")
            .field("interval", &self.inner.interval)
            .field("view", &*self.inner.view.borrow())
            .finish()
    }
}
