//! Operation Gateway - single-flight, state-checked wallet operations
//!
//! Every signing call is checked in the same order before anything reaches
//! the wallet:
//!
//! 1. `Busy` if another sign/send is outstanding
//! 2. `NotConnected` unless the session is connected
//! 3. `UnsupportedOperation` unless the wallet declares the capability
//!
//! Payloads pass through untouched, except that `send_transaction` stamps
//! the latest reference and fee payer before asking for a signature.

use tracing::{debug, info, warn};

use crate::balance::{BalancePoller, BalanceSnapshot};
use crate::core::{AccountId, SubmissionId, TransactionPayload};
use crate::error::{SessionError, SessionResult, TransactionStage};
use crate::network::{Confirmation, NetworkClient};
use crate::provider::{Capability, ProviderDescriptor};
use crate::session::{PendingKind, Session, Signing};

#[derive(Clone)]
pub struct OperationGateway {
    session: Session,
    poller: BalancePoller,
}

impl OperationGateway {
    pub fn new(session: Session, poller: BalancePoller) -> Self {
        Self { session, poller }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn poller(&self) -> &BalancePoller {
        &self.poller
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub fn select(&self, name: &str) -> SessionResult<ProviderDescriptor> {
        self.session.select(name)
    }

    pub async fn connect(&self) -> SessionResult<AccountId> {
        self.session.connect().await
    }

    pub async fn disconnect(&self) -> SessionResult<()> {
        let result = self.session.disconnect().await;
        self.poller.clear();
        result
    }

    // ------------------------------------------------------------------
    // Signing
    // ------------------------------------------------------------------

    pub async fn sign_transaction(
        &self,
        payload: TransactionPayload,
    ) -> SessionResult<TransactionPayload> {
        let signing = self.begin(PendingKind::Sign, Capability::SignTransaction)?;
        Ok(signing.descriptor.provider().sign_transaction(payload).await?)
    }

    /// Atomicity is up to the wallet; its result is returned as is.
    pub async fn sign_all_transactions(
        &self,
        payloads: Vec<TransactionPayload>,
    ) -> SessionResult<Vec<TransactionPayload>> {
        let signing = self.begin(PendingKind::Sign, Capability::SignAllTransactions)?;
        Ok(signing.descriptor.provider().sign_all_transactions(payloads).await?)
    }

    pub async fn sign_message(&self, message: &[u8]) -> SessionResult<Vec<u8>> {
        let signing = self.begin(PendingKind::Sign, Capability::SignMessage)?;
        Ok(signing.descriptor.provider().sign_message(message).await?)
    }

    /// UTF-8 encodes `text` and signs it as a message.
    pub async fn sign_text(&self, text: &str) -> SessionResult<Vec<u8>> {
        self.sign_message(text.as_bytes()).await
    }

    /// Quote, stamp, sign, submit, confirm. No step is retried. On
    /// confirmation the balance is refreshed before the id is returned.
    pub async fn send_transaction(
        &self,
        mut payload: TransactionPayload,
        network: &dyn NetworkClient,
    ) -> SessionResult<SubmissionId> {
        let signing = self.session.begin_signing(PendingKind::Send)?;
        let via_wallet = signing.descriptor.supports(Capability::SignAndSendTransaction);
        if !via_wallet && !signing.descriptor.supports(Capability::SignTransaction) {
            return Err(SessionError::Unsupported(Capability::SignTransaction));
        }
        let provider = signing.descriptor.provider();

        let reference = network
            .latest_reference()
            .await
            .map_err(|e| SessionError::failed_at(TransactionStage::QuoteFetch, e))?;
        payload.stamp(&reference.reference, &signing.account);

        let id = if via_wallet {
            provider
                .sign_and_send_transaction(payload)
                .await
                .map_err(|e| SessionError::failed_at(TransactionStage::Signing, e))?
        } else {
            let signed = provider
                .sign_transaction(payload)
                .await
                .map_err(|e| SessionError::failed_at(TransactionStage::Signing, e))?;
            network
                .submit(&signed)
                .await
                .map_err(|e| SessionError::failed_at(TransactionStage::Submission, e))?
        };
        debug!("submitted {} (valid until height {})", id, reference.valid_until_height);

        let confirmation = network
            .confirm(&id, &reference)
            .await
            .map_err(|e| SessionError::failed_at(TransactionStage::Confirmation, e))?;
        if confirmation == Confirmation::Expired {
            warn!("{} expired before confirmation", id);
            return Err(SessionError::failed_at(
                TransactionStage::Confirmation,
                "reference expired before the transaction was confirmed",
            ));
        }

        drop(signing);
        info!("confirmed {}", id);
        self.poller.refresh().await;
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Balance
    // ------------------------------------------------------------------

    pub async fn refresh_balance(&self) -> Option<BalanceSnapshot> {
        self.poller.refresh().await
    }

    pub fn balance(&self) -> Option<BalanceSnapshot> {
        self.poller.current()
    }

    fn begin(&self, kind: PendingKind, capability: Capability) -> SessionResult<Signing> {
        let signing = self.session.begin_signing(kind)?;
        if !signing.descriptor.supports(capability) {
            return Err(SessionError::Unsupported(capability));
        }
        Ok(signing)
    }
}

impl std::fmt::Debug for OperationGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationGateway").field("session", &self.session).finish()
    }
}
