//! The single entry point for token operations.
//!
//! [`Dispatcher::execute`] runs capability lookup, surface decision, build,
//! signing, submission and normalization in that order. Every outcome is a
//! [`TransactionResponse`]; nothing below this module escapes as a raw error.

use std::sync::Arc;

use tokenops_signer::{SigningRequest, SigningStrategy};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::builder::{self, BuildError, DEFAULT_MAX_FEE_TINYBARS, UnsignedTransaction};
use crate::capability::{CapabilitySource, Decision, TokenRef, decide};
use crate::error::DispatchError;
use crate::explorer::Explorer;
use crate::id::{EntityId, TransactionId};
use crate::ledger::{ExecutionHandle, Ledger, LedgerError, SignedArtifact};
use crate::operation::OperationRequest;
use crate::response::{ExecutionResult, ResponseKind, TransactionResponse, normalize};

pub struct Dispatcher {
    ledger: Arc<dyn Ledger>,
    signer: SigningStrategy,
    capabilities: Arc<dyn CapabilitySource>,
    account: EntityId,
    explorer: Explorer,
    max_fee_tinybars: u64,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("signer", &self.signer.name())
            .field("account", &self.account)
            .field("explorer", &self.explorer)
            .field("max_fee_tinybars", &self.max_fee_tinybars)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        signer: SigningStrategy,
        capabilities: Arc<dyn CapabilitySource>,
        account: EntityId,
        explorer: Explorer,
    ) -> Self {
        Self {
            ledger,
            signer,
            capabilities,
            account,
            explorer,
            max_fee_tinybars: DEFAULT_MAX_FEE_TINYBARS,
        }
    }

    #[must_use]
    pub fn with_max_fee(mut self, tinybars: u64) -> Self {
        self.max_fee_tinybars = tinybars;
        self
    }

    pub const fn account(&self) -> EntityId {
        self.account
    }

    pub async fn execute(&self, token: &TokenRef, request: &OperationRequest) -> TransactionResponse {
        self.execute_with_cancel(token, request, &CancellationToken::new())
            .await
    }

    /// Like [`Self::execute`], aborting at the next suspension point once
    /// `cancel` fires. Cancellation after submission does not undo the
    /// transaction; the response then carries its id.
    #[tracing::instrument(
        skip_all,
        fields(
            account = %self.account,
            token = %token.token_id,
            operation = %request.operation(),
            signer = self.signer.name(),
        ),
        level = tracing::Level::INFO
    )]
    pub async fn execute_with_cancel(
        &self,
        token: &TokenRef,
        request: &OperationRequest,
        cancel: &CancellationToken,
    ) -> TransactionResponse {
        let mut submitted = None;

        let response = match self.run(token, request, cancel, &mut submitted).await {
            Ok(response) => response,
            Err(error) => {
                let mut domain = error.classify();
                if let Some(id) = submitted {
                    domain = domain.with_transaction(id);
                }
                warn!(kind = %domain.kind, retryable = domain.is_retryable(), "{error}");
                TransactionResponse::failure(domain)
            }
        };

        match response.error().and_then(|error| error.transaction_id) {
            Some(id) => match self.explorer_link(id) {
                Some(url) => response.with_explorer_url(url),
                None => response,
            },
            None => response,
        }
    }

    async fn run(
        &self,
        token: &TokenRef,
        request: &OperationRequest,
        cancel: &CancellationToken,
        submitted: &mut Option<TransactionId>,
    ) -> Result<TransactionResponse, DispatchError> {
        let operation = request.operation();

        let capabilities = tokio::select! {
            () = cancel.cancelled() => {
                return Err(DispatchError::Cancelled { stage: "looking up capabilities" });
            }
            result = self.capabilities.capabilities(self.account, token) => result?,
        };

        let surface = match decide(&capabilities, operation) {
            Decision::Forbidden => {
                return Err(DispatchError::NotAllowed {
                    account: self.account,
                    operation,
                    token: token.token_id,
                });
            }
            Decision::Use(surface) => surface,
        };
        debug!(?surface, "Resolved execution surface");

        if !builder::supports(surface, operation) {
            return Err(BuildError::NoBuilder { operation, surface }.into());
        }

        let built = builder::build(surface, request, token)?;
        let transaction_id = TransactionId::generate(self.account);
        let body = UnsignedTransaction {
            transaction_id,
            max_fee_tinybars: self.max_fee_tinybars,
            body: built.body,
        }
        .to_bytes()?;

        let signature = self
            .signer
            .sign(&SigningRequest::new(body.clone()), cancel)
            .await?;

        if cancel.is_cancelled() {
            return Err(DispatchError::Cancelled { stage: "submitting" });
        }

        *submitted = Some(transaction_id);
        let handle = self
            .ledger
            .submit(SignedArtifact {
                transaction_id,
                body,
                signature,
            })
            .await?;

        match self.explorer_link(transaction_id) {
            Some(url) => info!(%transaction_id, %url, "Submitted transaction"),
            None => info!(%transaction_id, "Submitted transaction"),
        }

        let result = tokio::select! {
            () = cancel.cancelled() => {
                return Err(DispatchError::Cancelled { stage: "awaiting settlement" });
            }
            result = self.settle(&handle, built.response) => result?,
        };

        let response = normalize(result, built.response, built.decode.as_ref())?;
        if response.is_success() {
            info!(%transaction_id, "Transaction settled");
        }
        Ok(response)
    }

    async fn settle(
        &self,
        handle: &ExecutionHandle,
        kind: ResponseKind,
    ) -> Result<ExecutionResult, LedgerError> {
        Ok(match kind {
            ResponseKind::ReceiptOnly => ExecutionResult::Receipt(self.ledger.receipt(handle).await?),
            ResponseKind::FullRecord => ExecutionResult::Record(self.ledger.record(handle).await?),
        })
    }

    fn explorer_link(&self, id: TransactionId) -> Option<Url> {
        self.explorer
            .transaction_url(&id)
            .inspect_err(|error| warn!(%id, "Failed to build explorer link: {error}"))
            .ok()
    }
}
