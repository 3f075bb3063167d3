//! Context Configuration - passed from higher layers

use std::time::Duration;

use crate::core::keys::{balance, env, storage};
use crate::network::Cluster;

/// Context configuration. Higher layers construct this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Namespaces the native store directory.
    pub app: String,
    /// Storage key the selected wallet is remembered under.
    pub storage_key: String,
    /// Silently reconnect the remembered wallet during `init`.
    pub auto_connect: bool,
    pub balance_interval: Duration,
    pub cluster: Cluster,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            app: "wallet-session".into(),
            storage_key: storage::SELECTION_KEY.into(),
            auto_connect: false,
            balance_interval: Duration::from_millis(balance::DEFAULT_INTERVAL_MS),
            cluster: Cluster::default(),
        }
    }
}

impl ContextConfig {
    pub fn new(app: impl Into<String>) -> Self {
        Self { app: app.into(), ..Default::default() }
    }
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self { self.storage_key = key.into(); self }
    pub fn with_auto_connect(mut self, on: bool) -> Self { self.auto_connect = on; self }
    /// Zero keeps the current interval.
    pub fn with_balance_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.balance_interval = interval;
        }
        self
    }
    pub fn with_cluster(mut self, cluster: Cluster) -> Self { self.cluster = cluster; self }

    /// Defaults overridden by `WALLET_SESSION_*` variables. Malformed values are ignored.
    pub fn from_env(app: impl Into<String>) -> Self {
        let mut config = Self::new(app);
        if let Some(on) = read(env::AUTO_CONNECT).and_then(|v| parse_flag(&v)) {
            config.auto_connect = on;
        }
        if let Some(cluster) = read(env::CLUSTER).and_then(|v| Cluster::from_str(&v)) {
            config.cluster = cluster;
        }
        if let Some(ms) = read(env::BALANCE_INTERVAL_MS).and_then(|v| v.trim().parse::<u64>().ok()) {
            if ms > 0 {
                config.balance_interval = Duration::from_millis(ms);
            }
        }
        config
    }
}

fn read(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
