//! Network client contract consumed by the gateway and the balance poller.
//!
//! The RPC client itself lives outside this crate. Only the four calls below
//! are used: balance, latest reference, submit, confirm.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::keys::balance::LAMPORTS_PER_SOL;
use crate::core::{AccountId, SubmissionId, TransactionPayload};

/// Transport or RPC failure reported by the network client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct NetworkFailure(pub String);

impl NetworkFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Short-lived token bounding how long a signed payload stays valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestReference {
    pub reference: String,
    pub valid_until_height: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    Confirmed,
    /// Validity window passed before the network confirmed the submission.
    Expired,
}

#[async_trait]
pub trait NetworkClient: Send + Sync {
    async fn get_balance(&self, account: &AccountId) -> Result<u64, NetworkFailure>;
    async fn latest_reference(&self) -> Result<LatestReference, NetworkFailure>;
    async fn submit(&self, signed: &TransactionPayload) -> Result<SubmissionId, NetworkFailure>;
    /// Waits per the client's own validity-window policy.
    async fn confirm(
        &self,
        id: &SubmissionId,
        reference: &LatestReference,
    ) -> Result<Confirmation, NetworkFailure>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    #[default]
    Devnet,
    Testnet,
    MainnetBeta,
}

impl Cluster {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cluster::Devnet => "devnet",
            Cluster::Testnet => "testnet",
            Cluster::MainnetBeta => "mainnet-beta",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "devnet" => Some(Cluster::Devnet),
            "testnet" => Some(Cluster::Testnet),
            "mainnet-beta" | "mainnet" => Some(Cluster::MainnetBeta),
            _ => None,
        }
    }

    /// Public RPC endpoint for the cluster.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Cluster::Devnet => "https://api.devnet.solana.com",
            Cluster::Testnet => "https://api.testnet.solana.com",
            Cluster::MainnetBeta => "https://api.mainnet-beta.solana.com",
        }
    }

    pub(crate) fn explorer_suffix(&self) -> &'static str {
        match self {
            Cluster::Devnet => "?cluster=devnet",
            Cluster::Testnet => "?cluster=testnet",
            Cluster::MainnetBeta => "",
        }
    }
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// `1.2346 SOL`
pub fn format_sol(lamports: u64) -> String {
    format!("{:.4} SOL", lamports_to_sol(lamports))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_parsing() {
        assert_eq!(Cluster::from_str("devnet"), Some(Cluster::Devnet));
        assert_eq!(Cluster::from_str(" Mainnet "), Some(Cluster::MainnetBeta));
        assert_eq!(Cluster::from_str("mainnet-beta"), Some(Cluster::MainnetBeta));
        assert_eq!(Cluster::from_str("localnet"), None);
        assert_eq!(Cluster::Testnet.endpoint(), "https://api.testnet.solana.com");
    }

    #[test]
    fn sol_formatting() {
        assert_eq!(format_sol(0), "0.0000 SOL");
        assert_eq!(format_sol(1_500_000_000), "1.5000 SOL");
        assert_eq!(format_sol(123_456_789), "0.1235 SOL");
    }
}
