//! Error taxonomy and classification.
//!
//! Every failure inside the pipeline is a [`DispatchError`]. At the dispatcher
//! boundary it is classified once into a [`DomainError`] with a stable
//! [`ErrorKind`]; provider and transport error types never leave the crate.

use std::fmt;

use serde::Serialize;
use tokenops_signer::SigningError;
use url::Url;

use crate::builder::BuildError;
use crate::capability::CapabilityError;
use crate::id::{EntityId, TransactionId};
use crate::ledger::LedgerError;
use crate::operation::Operation;
use crate::response::NormalizeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The token does not allow the operation on any surface.
    OperationNotAllowed,
    /// The request cannot be built for this token (amount scale, fee shape).
    InvalidRequest,
    SigningError,
    /// Wallet-session strategy selected but no session is paired.
    SessionNotInitialized,
    InvalidResponse,
    NetworkSubmissionFailed,
    /// Accepted by the network, settled with a non-success status.
    SettlementFailed,
    /// The caller aborted outside the signing step.
    Cancelled,
    InternalInvariantViolation,
}

impl ErrorKind {
    /// Whether issuing a fresh `execute()` might succeed.
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::SigningError | Self::NetworkSubmissionFailed | Self::Cancelled
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OperationNotAllowed => "operation_not_allowed",
            Self::InvalidRequest => "invalid_request",
            Self::SigningError => "signing_error",
            Self::SessionNotInitialized => "session_not_initialized",
            Self::InvalidResponse => "invalid_response",
            Self::NetworkSubmissionFailed => "network_submission_failed",
            Self::SettlementFailed => "settlement_failed",
            Self::Cancelled => "cancelled",
            Self::InternalInvariantViolation => "internal_invariant_violation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller sees when an operation fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct DomainError {
    pub kind: ErrorKind,
    pub message: String,
    pub transaction_id: Option<TransactionId>,
    pub explorer_url: Option<Url>,
}

impl DomainError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            transaction_id: None,
            explorer_url: None,
        }
    }

    #[must_use]
    pub fn with_transaction(mut self, id: TransactionId) -> Self {
        self.transaction_id = Some(id);
        self
    }

    #[must_use]
    pub fn with_explorer_url(mut self, url: Url) -> Self {
        self.explorer_url = Some(url);
        self
    }

    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("account {account} is not allowed to {operation} token {token}")]
    NotAllowed {
        account: EntityId,
        operation: Operation,
        token: EntityId,
    },
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error("cancelled while {stage}")]
    Cancelled { stage: &'static str },
}

impl DispatchError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAllowed { .. } => ErrorKind::OperationNotAllowed,
            // The capability source is remote I/O like any other hop.
            Self::Capability(_) => ErrorKind::NetworkSubmissionFailed,
            Self::Build(err) if err.is_invariant_violation() => {
                ErrorKind::InternalInvariantViolation
            }
            Self::Build(_) => ErrorKind::InvalidRequest,
            Self::Signing(SigningError::NotInitialized) => ErrorKind::SessionNotInitialized,
            Self::Signing(_) => ErrorKind::SigningError,
            Self::Ledger(_) => ErrorKind::NetworkSubmissionFailed,
            Self::Normalize(_) => ErrorKind::InvalidResponse,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    pub fn classify(&self) -> DomainError {
        DomainError::new(self.kind(), self.to_string())
    }
}
