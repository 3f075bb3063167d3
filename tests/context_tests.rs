//! Context Tests: assembly, auto-connect restore, teardown, file persistence
//!
//! These tests verify:
//! 1. `init` with auto_connect silently restores the remembered wallet
//! 2. A wallet that refuses a silent connect leaves a clean disconnected session
//! 3. teardown stops polling, disconnects and forgets the selection
//! 4. `open` remembers the wallet on disk across restarts

use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use wallet_session::simulated::{
    demo_cluster, demo_registry, SimulatedCluster, SimulatedWallet, PHANTOM_ACCOUNT,
    SOLFLARE_ACCOUNT,
};
use wallet_session::{
    AccountId, ConnectionStatus, ContextConfig, KeyValueStore, MemoryStore, ProviderRegistry,
    TransactionPayload, WalletContext, WalletProvider,
};

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn registry_of(wallet: &Arc<SimulatedWallet>) -> ProviderRegistry {
    ProviderRegistry::new(vec![wallet.clone() as Arc<dyn WalletProvider>])
}

async fn context(
    config: ContextConfig,
    wallet: &Arc<SimulatedWallet>,
    store: &Arc<MemoryStore>,
) -> WalletContext {
    let cluster = Arc::new(SimulatedCluster::new().with_balance(PHANTOM_ACCOUNT, 1_000_000_000));
    WalletContext::init(config, registry_of(wallet), store.clone(), cluster).await
}

#[tokio::test]
async fn auto_connect_restores_remembered_wallet() {
    let store = Arc::new(MemoryStore::new());
    let wallet = Arc::new(SimulatedWallet::new("Phantom", PHANTOM_ACCOUNT));

    let first = context(ContextConfig::new("shop"), &wallet, &store).await;
    first.select("Phantom").unwrap();
    first.connect().await.unwrap();
    assert!(wallet.is_connected());

    // next page load: same store, same (now trusting) wallet
    let second = context(ContextConfig::new("shop").with_auto_connect(true), &wallet, &store).await;
    assert_eq!(second.state().status, ConnectionStatus::Connected);
    assert_eq!(second.session().account(), Some(AccountId::new(PHANTOM_ACCOUNT)));
    assert!(second.explorer_url().unwrap().contains(PHANTOM_ACCOUNT));
}

#[tokio::test]
async fn without_auto_connect_nothing_is_restored() {
    let store = Arc::new(MemoryStore::new());
    store.set("walletName", "Phantom").unwrap();
    let wallet = Arc::new(SimulatedWallet::new("Phantom", PHANTOM_ACCOUNT).trusted(true));

    let ctx = context(ContextConfig::new("shop"), &wallet, &store).await;
    assert_eq!(ctx.state().status, ConnectionStatus::Disconnected);
    assert_eq!(ctx.state().selected_provider_name, None);
    assert_eq!(wallet.connect_calls(), 0);
    // still remembered for later
    assert_eq!(ctx.session().resolve_persisted().map(|d| d.name().to_string()), Some("Phantom".into()));
}

#[tokio::test]
async fn untrusted_restore_is_quiet() {
    let store = Arc::new(MemoryStore::new());
    store.set("walletName", "Phantom").unwrap();
    let wallet = Arc::new(SimulatedWallet::new("Phantom", PHANTOM_ACCOUNT));

    let ctx = context(ContextConfig::new("shop").with_auto_connect(true), &wallet, &store).await;
    let state = ctx.state();
    assert_eq!(state.status, ConnectionStatus::Disconnected);
    assert_eq!(state.selected_provider_name.as_deref(), Some("Phantom"));
    assert!(state.last_error.is_none());
    assert_eq!(wallet.connect_calls(), 1);

    // an explicit connect still works
    ctx.connect().await.unwrap();
    assert!(ctx.state().connected());
}

#[tokio::test]
async fn custom_storage_key() {
    let store = Arc::new(MemoryStore::new());
    let wallet = Arc::new(SimulatedWallet::new("Phantom", PHANTOM_ACCOUNT));

    let ctx = context(ContextConfig::new("shop").with_storage_key("shop.wallet"), &wallet, &store)
        .await;
    ctx.select("Phantom").unwrap();
    assert!(store.get("shop.wallet").unwrap().is_some());
    assert!(store.get("walletName").unwrap().is_none());
}

#[tokio::test]
async fn teardown_signs_out() {
    let store = Arc::new(MemoryStore::new());
    let wallet = Arc::new(SimulatedWallet::new("Phantom", PHANTOM_ACCOUNT));
    let ctx = context(
        ContextConfig::new("shop").with_balance_interval(Duration::from_millis(20)),
        &wallet,
        &store,
    )
    .await;
    ctx.select("Phantom").unwrap();
    ctx.connect().await.unwrap();
    assert!(ctx.refresh_balance().await.is_some());

    ctx.teardown().await;
    assert!(ctx.is_torn_down());
    assert_eq!(ctx.state().status, ConnectionStatus::Disconnected);
    assert_eq!(ctx.state().selected_provider_name, None);
    assert!(ctx.balance().is_none());
    assert!(!wallet.is_connected());
    assert_eq!(wallet.listener_count(), 0);
    assert!(ctx.session().persisted().is_none());

    // idempotent
    ctx.teardown().await;
    assert_eq!(wallet.disconnect_calls(), 1);
}

#[tokio::test]
async fn demo_send_end_to_end() {
    let ctx = WalletContext::init(
        ContextConfig::new("shop"),
        demo_registry(),
        Arc::new(MemoryStore::new()),
        Arc::new(demo_cluster()),
    )
    .await;
    assert_eq!(ctx.wallets().len(), 3);

    ctx.select("Backpack").unwrap();
    ctx.connect().await.unwrap();
    let id = ctx.send_transaction(TransactionPayload::new(b"coffee".to_vec())).await.unwrap();
    assert!(!id.as_str().is_empty());
    assert_eq!(ctx.balance().map(|b| b.lamports), Some(12_000_000_000));
}

#[tokio::test]
async fn file_store_remembers_across_restarts() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
    let dir = TempDir::new().expect("tempdir");
    std::env::set_var("WALLET_SESSION_ROOT", dir.path());

    let open = |auto_connect: bool| {
        WalletContext::open(
            ContextConfig::new("shop").with_auto_connect(auto_connect),
            demo_registry(),
            Arc::new(demo_cluster()),
        )
    };

    let first = open(false).await.expect("open");
    first.select("Solflare").unwrap();
    first.connect().await.unwrap();
    assert!(dir.path().join("shop").join("session.json").exists());
    drop(first);

    // fresh wallets, same disk
    let second = open(true).await.expect("reopen");
    assert_eq!(second.session().account(), Some(AccountId::new(SOLFLARE_ACCOUNT)));

    second.disconnect().await.unwrap();
    let third = open(true).await.expect("reopen");
    assert_eq!(third.state().status, ConnectionStatus::Disconnected);
    assert!(third.session().persisted().is_none());

    std::env::remove_var("WALLET_SESSION_ROOT");
}
