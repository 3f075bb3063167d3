//! Gateway Tests: state-checked signing and the send pipeline
//!
//! These tests verify:
//! 1. Check order: Busy, then NotConnected, then UnsupportedOperation
//! 2. Pass-through of sign_transaction / sign_all_transactions / sign_message
//! 3. send_transaction through sign-and-send and through sign-then-submit
//! 4. Stage tagging of send failures, and no balance refresh on expiry

use std::sync::Arc;
use std::time::Duration;

use wallet_session::simulated::{SimulatedCluster, SimulatedWallet};
use wallet_session::{
    AccountId, BalancePoller, Capabilities, Capability, Confirmation, ErrorKind, MemoryStore,
    NetworkClient, OperationGateway, PendingKind, ProviderFailure, ProviderRegistry,
    SelectionStore, Session, SessionError, TransactionPayload, TransactionStage, WalletProvider,
};

const ACCOUNT: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";

struct Fixture {
    gateway: OperationGateway,
    wallet: Arc<SimulatedWallet>,
    cluster: Arc<SimulatedCluster>,
}

fn fixture_with(wallet: SimulatedWallet) -> Fixture {
    let wallet = Arc::new(wallet);
    let cluster = Arc::new(SimulatedCluster::new().with_balance(ACCOUNT, 5_000_000_000));
    let session = Session::new(
        ProviderRegistry::new(vec![wallet.clone() as Arc<dyn WalletProvider>]),
        SelectionStore::new(Arc::new(MemoryStore::new())),
    );
    let network: Arc<dyn NetworkClient> = cluster.clone();
    let poller = BalancePoller::new(session.clone(), network, Duration::from_secs(30));
    Fixture { gateway: OperationGateway::new(session, poller), wallet, cluster }
}

fn fixture() -> Fixture {
    fixture_with(SimulatedWallet::new("Phantom", ACCOUNT))
}

async fn connected(fx: &Fixture) {
    fx.gateway.select("Phantom").unwrap();
    fx.gateway.connect().await.unwrap();
}

async fn wait_for_pending(fx: &Fixture, kind: PendingKind) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !fx.gateway.session().pending().contains(&kind) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for pending operation");
}

#[tokio::test]
async fn sign_message_requires_connection() {
    let fx = fixture();
    fx.gateway.select("Phantom").unwrap();

    let err = fx.gateway.sign_message(b"hello").await.unwrap_err();
    assert!(matches!(err, SessionError::NotConnected));
    assert_eq!(fx.wallet.sign_calls(), 0);
}

#[tokio::test]
async fn sign_message_passes_through() {
    let fx = fixture();
    connected(&fx).await;

    let signature = fx.gateway.sign_message(b"hello").await.unwrap();
    assert_eq!(signature.len(), 64);
    assert_eq!(fx.gateway.sign_text("hello").await.unwrap(), signature);
    assert_eq!(fx.wallet.sign_calls(), 2);
}

#[tokio::test]
async fn missing_capability_is_unsupported() {
    let fx = fixture_with(
        SimulatedWallet::new("Phantom", ACCOUNT)
            .with_capabilities(Capabilities::NONE.with(Capability::SignTransaction)),
    );
    connected(&fx).await;

    let err = fx.gateway.sign_message(b"hello").await.unwrap_err();
    assert!(matches!(err, SessionError::Unsupported(Capability::SignMessage)));
    assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
    let err = fx.gateway.sign_all_transactions(vec![]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
    assert_eq!(fx.wallet.sign_calls(), 0);
    assert!(fx.gateway.session().pending().is_empty());
}

#[tokio::test]
async fn overlapping_sign_is_busy() {
    let fx = fixture();
    connected(&fx).await;
    let gate = fx.wallet.hold_signing();

    let gateway = fx.gateway.clone();
    let first = tokio::spawn(async move { gateway.sign_message(b"first").await });
    wait_for_pending(&fx, PendingKind::Sign).await;

    let err = fx.gateway.sign_message(b"second").await.unwrap_err();
    assert!(matches!(err, SessionError::Busy(PendingKind::Sign)));
    let err = fx
        .gateway
        .send_transaction(TransactionPayload::new(b"x".to_vec()), fx.cluster.as_ref())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Busy);

    gate.open();
    assert!(first.await.unwrap().is_ok());
    assert_eq!(fx.wallet.sign_calls(), 1);
    assert!(fx.gateway.session().pending().is_empty());
}

#[tokio::test]
async fn busy_is_reported_before_not_connected() {
    let fx = fixture();
    connected(&fx).await;
    let gate = fx.wallet.hold_signing();

    let gateway = fx.gateway.clone();
    let first = tokio::spawn(async move { gateway.sign_message(b"first").await });
    wait_for_pending(&fx, PendingKind::Sign).await;

    fx.wallet.revoke();
    let err = fx.gateway.sign_message(b"second").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Busy);

    gate.open();
    let err = first.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProviderError);
    let err = fx.gateway.sign_message(b"third").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotConnected);
}

#[tokio::test]
async fn sign_transaction_returns_wallet_result() {
    let fx = fixture();
    connected(&fx).await;

    let payload = TransactionPayload::new(b"transfer".to_vec());
    let signed = fx.gateway.sign_transaction(payload.clone()).await.unwrap();
    assert_eq!(signed.message, payload.message);
    assert!(signed.is_signed());
    assert!(signed.recent_reference.is_none());

    let batch = fx
        .gateway
        .sign_all_transactions(vec![payload.clone(), TransactionPayload::new(b"b".to_vec())])
        .await
        .unwrap();
    assert_eq!(batch.len(), 2);
    assert!(batch.iter().all(|p| p.is_signed()));
}

#[tokio::test]
async fn rejected_signature_is_provider_error() {
    let fx = fixture();
    connected(&fx).await;
    fx.wallet.reject_next_sign(ProviderFailure::Rejected);

    let err = fx.gateway.sign_message(b"hello").await.unwrap_err();
    assert!(matches!(err, SessionError::Provider(ProviderFailure::Rejected)));
    // the session itself is untouched
    assert!(fx.gateway.session().state().connected());
}

#[tokio::test]
async fn send_through_wallet() {
    let fx = fixture();
    connected(&fx).await;

    let id = fx
        .gateway
        .send_transaction(TransactionPayload::new(b"pay".to_vec()), fx.cluster.as_ref())
        .await
        .unwrap();
    assert!(!id.as_str().is_empty());

    let sent = fx.wallet.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].fee_payer, Some(AccountId::new(ACCOUNT)));
    assert!(sent[0].recent_reference.is_some());
    assert!(fx.cluster.submissions().is_empty());
    assert_eq!(fx.cluster.confirm_calls(), 1);

    // confirmed: balance refreshed before returning
    assert_eq!(fx.cluster.balance_calls(), 1);
    assert_eq!(fx.gateway.balance().map(|b| b.lamports), Some(5_000_000_000));
}

#[tokio::test]
async fn send_through_network_when_wallet_only_signs() {
    let fx = fixture_with(
        SimulatedWallet::new("Phantom", ACCOUNT)
            .with_capabilities(Capabilities::ALL.without(Capability::SignAndSendTransaction)),
    );
    connected(&fx).await;

    fx.gateway
        .send_transaction(TransactionPayload::new(b"pay".to_vec()), fx.cluster.as_ref())
        .await
        .unwrap();

    assert!(fx.wallet.sent().is_empty());
    let submitted = fx.cluster.submissions();
    assert_eq!(submitted.len(), 1);
    assert!(submitted[0].is_signed());
    assert_eq!(submitted[0].fee_payer, Some(AccountId::new(ACCOUNT)));
}

#[tokio::test]
async fn send_needs_a_signing_capability() {
    let fx = fixture_with(
        SimulatedWallet::new("Phantom", ACCOUNT)
            .with_capabilities(Capabilities::NONE.with(Capability::SignMessage)),
    );
    connected(&fx).await;

    let err = fx
        .gateway
        .send_transaction(TransactionPayload::new(b"pay".to_vec()), fx.cluster.as_ref())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
    assert_eq!(fx.cluster.quote_calls(), 0);
}

#[tokio::test]
async fn expired_confirmation_fails_without_refresh() {
    let fx = fixture();
    connected(&fx).await;
    fx.cluster.set_confirmation(Confirmation::Expired);

    let err = fx
        .gateway
        .send_transaction(TransactionPayload::new(b"pay".to_vec()), fx.cluster.as_ref())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransactionFailed);
    assert_eq!(err.stage(), Some(TransactionStage::Confirmation));
    assert_eq!(fx.cluster.balance_calls(), 0);
    assert!(fx.gateway.session().pending().is_empty());
}

#[tokio::test]
async fn send_failures_carry_their_stage() {
    let fx = fixture_with(
        SimulatedWallet::new("Phantom", ACCOUNT)
            .with_capabilities(Capabilities::ALL.without(Capability::SignAndSendTransaction)),
    );
    connected(&fx).await;
    let send = || {
        fx.gateway
            .send_transaction(TransactionPayload::new(b"pay".to_vec()), fx.cluster.as_ref())
    };

    fx.cluster.fail_quotes(Some("node unreachable"));
    let err = send().await.unwrap_err();
    assert_eq!(err.stage(), Some(TransactionStage::QuoteFetch));
    assert!(err.to_string().contains("node unreachable"));
    fx.cluster.fail_quotes(None);

    fx.wallet.reject_next_sign(ProviderFailure::Rejected);
    let err = send().await.unwrap_err();
    assert_eq!(err.stage(), Some(TransactionStage::Signing));

    fx.cluster.fail_submits(Some("blockhash not found"));
    let err = send().await.unwrap_err();
    assert_eq!(err.stage(), Some(TransactionStage::Submission));
    fx.cluster.fail_submits(None);

    // nothing was retried behind the caller's back
    assert_eq!(fx.cluster.quote_calls(), 3);
    assert!(fx.cluster.submissions().is_empty());
    assert_eq!(fx.cluster.confirm_calls(), 0);
}

#[tokio::test]
async fn disconnect_clears_balance() {
    let fx = fixture();
    connected(&fx).await;
    assert!(fx.gateway.refresh_balance().await.is_some());

    fx.gateway.disconnect().await.unwrap();
    assert!(fx.gateway.balance().is_none());
    assert!(fx.gateway.poller().view().snapshot.is_none());
}
