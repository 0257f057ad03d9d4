//! Signing strategies for token operations.
//!
//! [`SigningStrategy`] decouples what gets signed from who holds the key. The
//! variant is chosen once, from configuration, and every call goes through
//! [`SigningStrategy::sign`]:
//!
//! - [`LocalKeySigner`]: in-process secp256k1, no network.
//! - [`CustodialSigner`] over DFNS or Fireblocks: create a signature request,
//!   then poll with a bounded [`Poller`] until the provider answers.
//! - [`WalletSessionSigner`]: hand the transaction to a paired wallet and wait.

use std::time::Duration;

use alloy::primitives::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info_span};

pub mod custodial;
pub mod dfns;
#[cfg(feature = "fireblocks")]
pub mod fireblocks;
pub mod local;
pub mod mock;
mod poll;
pub mod session;

pub use custodial::{CustodialApi, CustodialError, CustodialSigner, SignatureMaterial};
pub use local::{LocalKeySigner, verify_secp256k1};
pub use poll::{PollConfig, PollState, Poller, RemoteStatus, poll_until_terminal};
pub use session::{ChannelSession, SessionRemote, WalletSession, WalletSessionSigner};

/// Bytes that need authorization. Opaque to the signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    pub payload: Bytes,
}

impl SigningRequest {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

/// A detached signature over the payload, or the wallet's fully signed
/// transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningResult {
    Signature(Bytes),
    SignedTransaction(Bytes),
}

impl SigningResult {
    pub fn bytes(&self) -> &Bytes {
        match self {
            Self::Signature(bytes) | Self::SignedTransaction(bytes) => bytes,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("signature request {request_id} was rejected: {reason}")]
    Rejected { request_id: String, reason: String },
    #[error(
        "signature request {request_id} still pending after {attempts} attempts \
         ({elapsed:?}); {}",
        timeout_hint(.last_error)
    )]
    TimedOut {
        request_id: String,
        attempts: u32,
        elapsed: Duration,
        /// Set when the final status query failed rather than reporting pending.
        last_error: Option<String>,
    },
    #[error("signing was cancelled (request {request_id:?})")]
    Cancelled { request_id: Option<String> },
    #[error("{provider} signing provider error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },
    #[error("malformed signing payload: {0}")]
    MalformedPayload(String),
    #[error("malformed signature from signer: {0}")]
    MalformedSignature(String),
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    #[error("no wallet session has been initialized")]
    NotInitialized,
    #[error("wallet session disconnected")]
    SessionDisconnected,
    #[error("wallet rejected the request: {0}")]
    SessionRejected(String),
}

fn timeout_hint(last_error: &Option<String>) -> String {
    match last_error {
        Some(error) => format!("last status query failed: {error}"),
        None => "increase poll attempts or interval".to_string(),
    }
}

/// The active signer, selected at construction.
#[derive(Debug, Clone)]
pub enum SigningStrategy {
    LocalKey(LocalKeySigner),
    Dfns(CustodialSigner),
    Fireblocks(CustodialSigner),
    WalletSession(WalletSessionSigner),
}

impl SigningStrategy {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::LocalKey(_) => "local",
            Self::Dfns(_) => "dfns",
            Self::Fireblocks(_) => "fireblocks",
            Self::WalletSession(_) => "wallet-session",
        }
    }

    pub async fn sign(
        &self,
        request: &SigningRequest,
        cancel: &CancellationToken,
    ) -> Result<SigningResult, SigningError> {
        let span = info_span!("sign", strategy = self.name(), payload_len = request.payload.len());

        async {
            match self {
                Self::LocalKey(signer) => signer.sign(request).map(SigningResult::Signature),
                Self::Dfns(signer) | Self::Fireblocks(signer) => signer
                    .sign(request, cancel)
                    .await
                    .map(SigningResult::Signature),
                Self::WalletSession(signer) => signer
                    .sign(request, cancel)
                    .await
                    .map(SigningResult::SignedTransaction),
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy::signers::local::PrivateKeySigner;

    use super::*;
    use crate::mock::ScriptedApi;

    #[tokio::test]
    async fn local_key_yields_detached_signature() {
        let signer = LocalKeySigner::new(PrivateKeySigner::random());
        let address = signer.address();
        let strategy = SigningStrategy::LocalKey(signer);
        let request = SigningRequest::new(b"wipe".to_vec());

        let result = strategy
            .sign(&request, &CancellationToken::new())
            .await
            .unwrap();

        let SigningResult::Signature(signature) = result else {
            panic!("expected detached signature");
        };
        assert!(verify_secp256k1(&request.payload, &signature, address).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn custodial_variants_share_the_poller() {
        let api = Arc::new(ScriptedApi::new(vec![RemoteStatus::Signed(
            SignatureMaterial::FullSig("01".repeat(64)),
        )]));
        let strategy =
            SigningStrategy::Fireblocks(CustodialSigner::new(api.clone(), PollConfig::default()));

        let result = strategy
            .sign(&SigningRequest::new(b"burn".to_vec()), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.bytes().len(), 64);
        assert_eq!(api.status_calls(), 1);
        assert_eq!(strategy.name(), "fireblocks");
    }

    #[tokio::test]
    async fn uninitialized_session_is_distinct_error() {
        let strategy = SigningStrategy::WalletSession(WalletSessionSigner::uninitialized());

        let err = strategy
            .sign(&SigningRequest::new(b"freeze".to_vec()), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SigningError::NotInitialized));
    }

    #[test]
    fn timeout_message_is_actionable() {
        let err = SigningError::TimedOut {
            request_id: "sig-1".to_string(),
            attempts: 3,
            elapsed: Duration::from_secs(3),
            last_error: None,
        };
        assert_eq!(
            err.to_string(),
            "signature request sig-1 still pending after 3 attempts (3s); \
             increase poll attempts or interval"
        );
    }

    #[test]
    fn timeout_message_names_failing_query() {
        let err = SigningError::TimedOut {
            request_id: "sig-2".to_string(),
            attempts: 3,
            elapsed: Duration::from_secs(3),
            last_error: Some("503 Service Unavailable".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "signature request sig-2 still pending after 3 attempts (3s); \
             last status query failed: 503 Service Unavailable"
        );
    }
}
