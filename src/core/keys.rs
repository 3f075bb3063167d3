//! Storage keys, environment variables and defaults shared across modules.

/// Persistence keys
pub mod storage {
    /// Key the selected wallet name lives under in client storage.
    pub const SELECTION_KEY: &str = "walletName";
    /// File name of the native key/value store under `<root>/<app>/`.
    pub const FILE_NAME: &str = "session.json";
    /// Overrides the native store root (defaults to the local data dir).
    pub const ROOT_ENV: &str = "WALLET_SESSION_ROOT";
}

/// Environment overrides read by `ContextConfig::from_env`
pub mod env {
    pub const AUTO_CONNECT: &str = "WALLET_SESSION_AUTO_CONNECT";
    pub const CLUSTER: &str = "WALLET_SESSION_CLUSTER";
    pub const BALANCE_INTERVAL_MS: &str = "WALLET_SESSION_BALANCE_INTERVAL_MS";
    pub const LOG_JSON: &str = "WALLET_SESSION_LOG_JSON";
}

/// Log filter applied when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "info,wallet_session=debug";

/// Balance polling
pub mod balance {
    pub const DEFAULT_INTERVAL_MS: u64 = 30_000;
    pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;
}

/// Block explorer used for account links.
pub const EXPLORER_BASE: &str = "https://explorer.solana.com";
