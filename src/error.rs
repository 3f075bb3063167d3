//! Session errors and their stable presentation tags.
//!
//! Every variant's `Display` is a short message fit for a toast. Presentation
//! layers that localize or style should match on [`ErrorKind`] instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::network::NetworkFailure;
use crate::provider::{Capability, ProviderFailure};
use crate::session::{ConnectionStatus, PendingKind};

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("wallet \"{0}\" is not available")]
    NotFound(String),

    #[error("cannot {operation}: {reason}")]
    InvalidState {
        operation: &'static str,
        reason: String,
    },

    #[error("another wallet request is in progress ({0})")]
    Busy(PendingKind),

    #[error("wallet not connected")]
    NotConnected,

    #[error("wallet does not support {}", .0.describe())]
    Unsupported(Capability),

    #[error("wallet error: {0}")]
    Provider(#[from] ProviderFailure),

    #[error("transaction failed during {stage}: {reason}")]
    TransactionFailed {
        stage: TransactionStage,
        reason: String,
    },

    #[error("network error: {0}")]
    Network(#[from] NetworkFailure),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::NotFound(_) => ErrorKind::NotFound,
            SessionError::InvalidState { .. } => ErrorKind::InvalidState,
            SessionError::Busy(_) => ErrorKind::Busy,
            SessionError::NotConnected => ErrorKind::NotConnected,
            SessionError::Unsupported(_) => ErrorKind::UnsupportedOperation,
            SessionError::Provider(_) => ErrorKind::ProviderError,
            SessionError::TransactionFailed { .. } => ErrorKind::TransactionFailed,
            SessionError::Network(_) => ErrorKind::NetworkError,
        }
    }

    /// Stage carried by a `TransactionFailed`, if any.
    pub fn stage(&self) -> Option<TransactionStage> {
        match self {
            SessionError::TransactionFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub(crate) fn invalid(operation: &'static str, status: ConnectionStatus) -> Self {
        SessionError::InvalidState { operation, reason: format!("wallet is {}", status) }
    }

    pub(crate) fn failed_at(stage: TransactionStage, cause: impl std::fmt::Display) -> Self {
        SessionError::TransactionFailed { stage, reason: cause.to_string() }
    }
}

/// Stable error tag. Serialized names never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Busy,
    NotConnected,
    UnsupportedOperation,
    ProviderError,
    TransactionFailed,
    NetworkError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Busy => "busy",
            ErrorKind::NotConnected => "not_connected",
            ErrorKind::UnsupportedOperation => "unsupported_operation",
            ErrorKind::ProviderError => "provider_error",
            ErrorKind::TransactionFailed => "transaction_failed",
            ErrorKind::NetworkError => "network_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step of `send_transaction` that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionStage {
    QuoteFetch,
    Signing,
    Submission,
    Confirmation,
}

impl TransactionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStage::QuoteFetch => "quote-fetch",
            TransactionStage::Signing => "signing",
            TransactionStage::Submission => "submission",
            TransactionStage::Confirmation => "confirmation",
        }
    }
}

impl std::fmt::Display for TransactionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error remembered on the session after a provider failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&SessionError> for LastError {
    fn from(err: &SessionError) -> Self {
        Self { kind: err.kind(), message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_stable() {
        assert_eq!(SessionError::NotFound("Ledger".into()).kind().as_str(), "not_found");
        assert_eq!(SessionError::NotConnected.kind(), ErrorKind::NotConnected);
        assert_eq!(
            SessionError::Unsupported(Capability::SignMessage).kind().as_str(),
            "unsupported_operation"
        );
        assert_eq!(
            serde_json::to_string(&ErrorKind::TransactionFailed).unwrap(),
            "\"transaction_failed\""
        );
    }

    #[test]
    fn messages_are_presentable() {
        let err = SessionError::Unsupported(Capability::SignMessage);
        assert_eq!(err.to_string(), "wallet does not support message signing");

        let err = SessionError::failed_at(TransactionStage::Confirmation, "blockhash expired");
        assert_eq!(err.to_string(), "transaction failed during confirmation: blockhash expired");
        assert_eq!(err.stage(), Some(TransactionStage::Confirmation));

        let err = SessionError::invalid("connect", ConnectionStatus::Connected);
        assert_eq!(err.to_string(), "cannot connect: wallet is connected");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn provider_failures_convert() {
        let err: SessionError = ProviderFailure::Rejected.into();
        assert_eq!(err.kind(), ErrorKind::ProviderError);
        let last = LastError::from(&err);
        assert_eq!(last.kind, ErrorKind::ProviderError);
        assert!(last.message.contains("rejected"));
    }
}
