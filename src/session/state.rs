use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::AccountId;
use crate::error::LastError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnecting => "disconnecting",
        }
    }

    pub fn is_transitional(&self) -> bool {
        matches!(self, ConnectionStatus::Connecting | ConnectionStatus::Disconnecting)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Published view of the session. `account_id` is set iff `status` is `Connected`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub selected_provider_name: Option<String>,
    pub account_id: Option<AccountId>,
    pub status: ConnectionStatus,
    pub last_error: Option<LastError>,
}

impl SessionState {
    pub fn connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
    pub fn connecting(&self) -> bool {
        self.status == ConnectionStatus::Connecting
    }
    pub fn disconnecting(&self) -> bool {
        self.status == ConnectionStatus::Disconnecting
    }

    /// Account, only while connected.
    pub fn active_account(&self) -> Option<&AccountId> {
        if self.connected() {
            self.account_id.as_ref()
        } else {
            None
        }
    }
}
