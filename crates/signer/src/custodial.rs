//! Remote custodial signing.
//!
//! A custodial provider holds the key and signs asynchronously: the caller
//! creates a signature request, receives an id, and polls until the provider
//! reports a terminal status. Providers differ only in transport and in the
//! shape of the returned signature material, so both are hidden behind
//! [`CustodialApi`] and [`SignatureMaterial`].

use std::sync::Arc;

use alloy::hex;
use alloy::primitives::Bytes;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::poll::{PollConfig, RemoteStatus, poll_until_terminal};
use crate::{SigningError, SigningRequest};

/// Width of one secp256k1 signature component.
const COMPONENT_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum CustodialError {
    #[error("HTTP request to custodial provider failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("custodial provider returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("custodial provider response did not include a request id")]
    MissingRequestId,
    #[error("custodial provider returned an unknown status: {0}")]
    UnknownStatus(String),
    #[error("custodial provider error: {0}")]
    Provider(String),
}

impl CustodialError {
    /// A client error that repeating the same request cannot fix, such as a
    /// revoked credential or an unknown request id.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::Api { status, .. } => {
                status.is_client_error()
                    && *status != reqwest::StatusCode::REQUEST_TIMEOUT
                    && *status != reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

/// Raw signature as returned by a provider, before reconstruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureMaterial {
    /// Separate `r` and `s` hex components, with or without `0x` prefix.
    Components { r: String, s: String },
    /// One opaque hex field holding the full signature.
    FullSig(String),
}

impl SignatureMaterial {
    /// Reconstruct the byte layout the ledger expects.
    ///
    /// Components are left-padded to 32 bytes each and concatenated as
    /// `r || s`. A full signature is decoded as-is.
    pub fn reconstruct(&self) -> Result<Bytes, SigningError> {
        match self {
            Self::Components { r, s } => {
                let mut out = Vec::with_capacity(COMPONENT_LEN * 2);
                out.extend_from_slice(&decode_component(r)?);
                out.extend_from_slice(&decode_component(s)?);
                Ok(out.into())
            }
            Self::FullSig(full) => {
                let bytes = hex::decode(full.trim_start_matches("0x"))
                    .map_err(|e| SigningError::MalformedSignature(e.to_string()))?;
                if bytes.is_empty() {
                    return Err(SigningError::MalformedSignature(
                        "empty full signature".to_string(),
                    ));
                }
                Ok(bytes.into())
            }
        }
    }
}

fn decode_component(component: &str) -> Result<[u8; COMPONENT_LEN], SigningError> {
    let bytes = hex::decode(component.trim_start_matches("0x"))
        .map_err(|e| SigningError::MalformedSignature(e.to_string()))?;

    if bytes.len() > COMPONENT_LEN {
        return Err(SigningError::MalformedSignature(format!(
            "signature component is {} bytes, expected at most {COMPONENT_LEN}",
            bytes.len()
        )));
    }

    let mut padded = [0u8; COMPONENT_LEN];
    padded[COMPONENT_LEN - bytes.len()..].copy_from_slice(&bytes);
    Ok(padded)
}

/// Transport seam for one custodial provider.
///
/// Routing (wallet id, vault account id) is bound at construction.
#[async_trait]
pub trait CustodialApi: Send + Sync {
    fn provider(&self) -> &'static str;

    async fn create_signature_request(&self, payload: &[u8]) -> Result<String, CustodialError>;

    async fn signature_status(
        &self,
        request_id: &str,
    ) -> Result<RemoteStatus<SignatureMaterial>, CustodialError>;
}

/// Signing strategy backed by a [`CustodialApi`] and the signature poller.
#[derive(Clone)]
pub struct CustodialSigner {
    api: Arc<dyn CustodialApi>,
    poll: PollConfig,
}

impl std::fmt::Debug for CustodialSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustodialSigner")
            .field("provider", &self.api.provider())
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}

impl CustodialSigner {
    pub fn new(api: Arc<dyn CustodialApi>, poll: PollConfig) -> Self {
        Self { api, poll }
    }

    pub fn provider(&self) -> &'static str {
        self.api.provider()
    }

    pub async fn sign(
        &self,
        request: &SigningRequest,
        cancel: &CancellationToken,
    ) -> Result<Bytes, SigningError> {
        if request.payload.is_empty() {
            return Err(SigningError::MalformedPayload(
                "payload is empty".to_string(),
            ));
        }

        let provider = self.api.provider();

        let request_id = tokio::select! {
            () = cancel.cancelled() => {
                return Err(SigningError::Cancelled { request_id: None });
            }
            created = self.api.create_signature_request(&request.payload) => {
                created.map_err(|e| SigningError::Provider {
                    provider,
                    message: e.to_string(),
                })?
            }
        };

        info!(provider, %request_id, "Signature request created, polling");

        let api = &self.api;
        let id = request_id.as_str();
        let material = poll_until_terminal(id, self.poll, cancel, move || async move {
            match api.signature_status(id).await {
                Err(error) if error.is_permanent() => Ok(RemoteStatus::Failed(error.to_string())),
                other => other,
            }
        })
        .await?;

        material.reconstruct()
    }
}
