//! Interactive wallet sessions.
//!
//! A wallet session is negotiated out of band (pairing, QR code, browser
//! extension). Once paired, the remote wallet receives each transaction, asks
//! its user, and answers with a fully signed transaction or a rejection.

use std::sync::Arc;

use alloy::primitives::Bytes;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{SigningError, SigningRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionReply {
    Signed(Bytes),
    Rejected(String),
}

#[async_trait]
pub trait WalletSession: Send + Sync {
    /// Account the remote wallet signs for.
    fn account(&self) -> &str;

    /// Send the transaction to the wallet and wait for its answer.
    async fn request_signature(&self, payload: Bytes) -> Result<SessionReply, SigningError>;
}

/// Signing strategy that delegates to a paired wallet.
///
/// Constructed without a session when pairing has not happened yet; every
/// `sign` then fails with [`SigningError::NotInitialized`].
#[derive(Clone, Default)]
pub struct WalletSessionSigner {
    session: Option<Arc<dyn WalletSession>>,
}

impl std::fmt::Debug for WalletSessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSessionSigner")
            .field("account", &self.session.as_ref().map(|s| s.account()))
            .finish()
    }
}

impl WalletSessionSigner {
    pub fn new(session: Arc<dyn WalletSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn uninitialized() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    pub async fn sign(
        &self,
        request: &SigningRequest,
        cancel: &CancellationToken,
    ) -> Result<Bytes, SigningError> {
        let session = self.session.as_ref().ok_or(SigningError::NotInitialized)?;

        if request.payload.is_empty() {
            return Err(SigningError::MalformedPayload(
                "payload is empty".to_string(),
            ));
        }

        info!(account = session.account(), "Requesting wallet signature");

        let reply = tokio::select! {
            () = cancel.cancelled() => {
                return Err(SigningError::Cancelled { request_id: None });
            }
            reply = session.request_signature(request.payload.clone()) => reply?,
        };

        match reply {
            SessionReply::Signed(signed) => Ok(signed),
            SessionReply::Rejected(reason) => Err(SigningError::SessionRejected(reason)),
        }
    }
}

/// Request delivered to the wallet side of a [`ChannelSession`].
#[derive(Debug)]
pub struct PendingSignature {
    pub payload: Bytes,
    reply: oneshot::Sender<SessionReply>,
}

impl PendingSignature {
    pub fn approve(self, signed: Bytes) {
        // The requester may have been cancelled; nothing to do then.
        let _ = self.reply.send(SessionReply::Signed(signed));
    }

    pub fn reject(self, reason: impl Into<String>) {
        let _ = self.reply.send(SessionReply::Rejected(reason.into()));
    }
}

/// In-process session backed by channels.
///
/// Created together with its [`SessionRemote`] by [`ChannelSession::pair`].
/// Dropping the remote disconnects the session.
#[derive(Debug, Clone)]
pub struct ChannelSession {
    account: String,
    requests: mpsc::Sender<PendingSignature>,
}

/// Wallet side of a [`ChannelSession`].
#[derive(Debug)]
pub struct SessionRemote {
    requests: mpsc::Receiver<PendingSignature>,
}

impl SessionRemote {
    /// Next request, or `None` once every session handle is dropped.
    pub async fn next(&mut self) -> Option<PendingSignature> {
        self.requests.recv().await
    }
}

impl ChannelSession {
    pub fn pair(account: impl Into<String>) -> (Self, SessionRemote) {
        let (tx, rx) = mpsc::channel(8);
        (
            Self {
                account: account.into(),
                requests: tx,
            },
            SessionRemote { requests: rx },
        )
    }
}

#[async_trait]
impl WalletSession for ChannelSession {
    fn account(&self) -> &str {
        &self.account
    }

    async fn request_signature(&self, payload: Bytes) -> Result<SessionReply, SigningError> {
        let (reply, answer) = oneshot::channel();

        self.requests
            .send(PendingSignature { payload, reply })
            .await
            .map_err(|_| SigningError::SessionDisconnected)?;

        answer.await.map_err(|_| SigningError::SessionDisconnected)
    }
}
