//! Fireblocks RAW signing.
//!
//! The payload is submitted as a RAW operation from a vault account. Fireblocks
//! answers with a transaction id that is polled until the MPC signature is
//! attached to `signedMessages[0].signature.fullSig`.

use alloy::hex;
use async_trait::async_trait;
use fireblocks_sdk::apis::transactions_api::{CreateTransactionParams, GetTransactionParams};
use fireblocks_sdk::models::{self, TransactionStatus};
use fireblocks_sdk::{Client, ClientBuilder};
use serde::Deserialize;
use tracing::debug;

use crate::custodial::{CustodialApi, CustodialError, SignatureMaterial};
use crate::poll::RemoteStatus;

/// Fireblocks environment selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FireblocksEnvironment {
    Production,
    Sandbox,
}

/// Credentials and routing for one Fireblocks vault account.
#[derive(Clone)]
pub struct FireblocksCtx {
    pub api_user_id: String,
    pub secret: Vec<u8>,
    pub vault_account_id: String,
    pub asset_id: String,
    pub environment: FireblocksEnvironment,
}

impl std::fmt::Debug for FireblocksCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FireblocksCtx")
            .field("api_user_id", &self.api_user_id)
            .field("secret", &"[REDACTED]")
            .field("vault_account_id", &self.vault_account_id)
            .field("asset_id", &self.asset_id)
            .field("environment", &self.environment)
            .finish()
    }
}

pub struct FireblocksClient {
    client: Client,
    vault_account_id: String,
    asset_id: String,
}

impl std::fmt::Debug for FireblocksClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FireblocksClient")
            .field("vault_account_id", &self.vault_account_id)
            .field("asset_id", &self.asset_id)
            .finish_non_exhaustive()
    }
}

impl FireblocksClient {
    pub fn new(ctx: &FireblocksCtx) -> Result<Self, CustodialError> {
        let mut builder = ClientBuilder::new(&ctx.api_user_id, &ctx.secret);
        if ctx.environment == FireblocksEnvironment::Sandbox {
            builder = builder.use_sandbox();
        }
        let client = builder
            .build()
            .map_err(|e| CustodialError::Provider(e.to_string()))?;

        Ok(Self {
            client,
            vault_account_id: ctx.vault_account_id.clone(),
            asset_id: ctx.asset_id.clone(),
        })
    }
}

fn build_raw_signing_request(
    asset_id: &str,
    vault_account_id: &str,
    content_hex: &str,
) -> models::TransactionRequest {
    let unsigned_msg = models::UnsignedMessage {
        content: content_hex.to_string(),
        bip44address_index: None,
        bip44change: None,
        derivation_path: None,
        r#type: None,
        pre_hash: None,
    };

    let extra_parameters = models::ExtraParameters {
        raw_message_data: Some(models::ExtraParametersRawMessageData {
            messages: Some(vec![unsigned_msg]),
            algorithm: Some(
                models::extra_parameters_raw_message_data::Algorithm::MpcEcdsaSecp256K1,
            ),
        }),
        contract_call_data: None,
        inputs_selection: None,
        node_controls: None,
        program_call_data: None,
    };

    models::TransactionRequest {
        operation: Some(models::TransactionOperation::Raw),
        asset_id: Some(asset_id.to_string()),
        source: Some(models::SourceTransferPeerPath {
            r#type: models::TransferPeerPathType::VaultAccount,
            id: Some(vault_account_id.to_string()),
            sub_type: None,
            name: None,
            wallet_id: None,
            is_collateral: None,
        }),
        extra_parameters: Some(extra_parameters),
        external_tx_id: Some(uuid::Uuid::new_v4().to_string()),
        note: Some("token operation signature".to_string()),
        destination: None,
        destinations: None,
        amount: None,
        treat_as_gross_amount: None,
        force_sweep: None,
        fee_level: None,
        fee: None,
        priority_fee: None,
        fail_on_low_fee: None,
        max_fee: None,
        gas_limit: None,
        gas_price: None,
        network_fee: None,
        replace_tx_by_hash: None,
        customer_ref_id: None,
        travel_rule_message: None,
        auto_staking: None,
        network_staking: None,
        cpu_staking: None,
        use_gasless: None,
    }
}

fn is_still_pending(status: TransactionStatus) -> bool {
    use TransactionStatus::*;

    match status {
        Submitted
        | PendingAmlScreening
        | PendingEnrichment
        | PendingAuthorization
        | Queued
        | PendingSignature
        | Pending3RdPartyManualApproval
        | Pending3RdParty
        | Broadcasting
        | Confirming => true,

        Completed | Cancelling | Cancelled | Blocked | Rejected | Failed => false,
    }
}

/// Map a polled status and the first signed message's `fullSig`.
fn classify(status: TransactionStatus, full_sig: Option<&str>) -> RemoteStatus<SignatureMaterial> {
    if is_still_pending(status) {
        return RemoteStatus::Pending;
    }

    match (status, full_sig) {
        (TransactionStatus::Completed, Some(sig)) => {
            RemoteStatus::Signed(SignatureMaterial::FullSig(sig.to_string()))
        }
        (TransactionStatus::Completed, None) => {
            RemoteStatus::Failed("completed without a signed message".to_string())
        }
        (other, _) => RemoteStatus::Failed(format!("{other:?}")),
    }
}

fn first_full_sig(response: &models::TransactionResponse) -> Option<&str> {
    response
        .signed_messages
        .as_ref()
        .and_then(|messages| messages.first())
        .and_then(|message| message.signature.as_ref())
        .and_then(|signature| signature.full_sig.as_deref())
}

#[async_trait]
impl CustodialApi for FireblocksClient {
    fn provider(&self) -> &'static str {
        "fireblocks"
    }

    async fn create_signature_request(&self, payload: &[u8]) -> Result<String, CustodialError> {
        let request =
            build_raw_signing_request(&self.asset_id, &self.vault_account_id, &hex::encode(payload));

        let params = CreateTransactionParams::builder()
            .transaction_request(request)
            .build();

        let created = self
            .client
            .transactions_api()
            .create_transaction(params)
            .await
            .map_err(|e| CustodialError::Provider(e.to_string()))?;

        let tx_id = created.id.ok_or(CustodialError::MissingRequestId)?;

        debug!(fireblocks_tx_id = %tx_id, "Fireblocks RAW signing transaction created");

        Ok(tx_id)
    }

    async fn signature_status(
        &self,
        request_id: &str,
    ) -> Result<RemoteStatus<SignatureMaterial>, CustodialError> {
        let params = GetTransactionParams::builder()
            .tx_id(request_id.to_string())
            .build();

        let response = self
            .client
            .transactions_api()
            .get_transaction(params)
            .await
            .map_err(|e| CustodialError::Provider(e.to_string()))?;

        debug!(
            fireblocks_tx_id = %request_id,
            status = ?response.status,
            "Polled Fireblocks transaction"
        );

        Ok(classify(response.status, first_full_sig(&response)))
    }
}
