use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::{ConnectionStatus, Shared};

/// Outstanding call into a wallet or the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    Connect,
    Disconnect,
    Sign,
    Send,
    Refresh,
}

impl PendingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingKind::Connect => "connect",
            PendingKind::Disconnect => "disconnect",
            PendingKind::Sign => "sign",
            PendingKind::Send => "send",
            PendingKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for PendingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    /// connect / disconnect
    Lifecycle,
    /// sign / send
    Prompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Pending {
    pub kind: PendingKind,
    token: u64,
}

/// Lifecycle calls exclude each other, wallet prompts exclude each other.
/// The two slots are independent.
#[derive(Debug, Default)]
pub(crate) struct PendingSlots {
    lifecycle: Option<Pending>,
    prompt: Option<Pending>,
    next_token: u64,
}

impl PendingSlots {
    pub fn get(&self, slot: Slot) -> Option<PendingKind> {
        self.slot(slot).map(|p| p.kind)
    }

    pub fn all(&self) -> Vec<PendingKind> {
        self.lifecycle.iter().chain(self.prompt.iter()).map(|p| p.kind).collect()
    }

    /// Claim `slot`, failing with whatever already holds it.
    pub fn claim(&mut self, slot: Slot, kind: PendingKind) -> Result<u64, PendingKind> {
        if let Some(held) = self.slot(slot) {
            return Err(held.kind);
        }
        self.next_token += 1;
        let token = self.next_token;
        *self.slot_mut(slot) = Some(Pending { kind, token });
        Ok(token)
    }

    fn release(&mut self, slot: Slot, token: u64) {
        let entry = self.slot_mut(slot);
        if entry.map(|p| p.token) == Some(token) {
            *entry = None;
        }
    }

    pub fn reset(&mut self) {
        self.lifecycle = None;
        self.prompt = None;
    }

    fn slot(&self, slot: Slot) -> Option<Pending> {
        match slot {
            Slot::Lifecycle => self.lifecycle,
            Slot::Prompt => self.prompt,
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<Pending> {
        match slot {
            Slot::Lifecycle => &mut self.lifecycle,
            Slot::Prompt => &mut self.prompt,
        }
    }
}

/// Releases its slot when dropped, including when the owning future is
/// dropped mid-call. An abandoned connect/disconnect also puts a
/// still-transitional session back to `Disconnected`.
pub(crate) struct PendingLease {
    shared: Arc<Shared>,
    slot: Slot,
    kind: PendingKind,
    token: u64,
    generation: u64,
}

impl PendingLease {
    pub fn new(shared: Arc<Shared>, slot: Slot, kind: PendingKind, token: u64, generation: u64) -> Self {
        Self { shared, slot, kind, token, generation }
    }
}

impl Drop for PendingLease {
    fn drop(&mut self) {
        let mut core = self.shared.core();
        core.pending.release(self.slot, self.token);
        let stranded = match self.kind {
            PendingKind::Connect => core.status == ConnectionStatus::Connecting,
            PendingKind::Disconnect => core.status == ConnectionStatus::Disconnecting,
            _ => false,
        };
        if stranded && core.generation == self.generation {
            tracing::debug!("{} abandoned, session back to disconnected", self.kind);
            core.status = ConnectionStatus::Disconnected;
            core.account = None;
            self.shared.publish(&core);
        }
    }
}
