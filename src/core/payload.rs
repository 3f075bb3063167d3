//! Opaque transaction payloads and submission ids.
//!
//! The session never interprets `message`. The only fields it touches are the
//! envelope slots `send_transaction` stamps before asking for a signature.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::account::AccountId;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionPayload {
    /// Caller-built transaction body.
    pub message: Vec<u8>,
    /// Network reference bounding the payload's validity window.
    pub recent_reference: Option<String>,
    pub fee_payer: Option<AccountId>,
    /// Signatures attached by wallets, in attachment order.
    pub signatures: Vec<Vec<u8>>,
}

impl TransactionPayload {
    pub fn new(message: impl Into<Vec<u8>>) -> Self {
        Self { message: message.into(), ..Default::default() }
    }

    pub fn stamp(&mut self, reference: &str, payer: &AccountId) {
        self.recent_reference = Some(reference.to_string());
        self.fee_payer = Some(payer.clone());
    }

    pub fn is_signed(&self) -> bool {
        !self.signatures.is_empty()
    }
}

/// Identifier the network assigns to a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(String);

impl SubmissionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
