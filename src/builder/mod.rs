//! Surface-specific transaction builders.
//!
//! Each `(surface, operation)` pair has exactly one pure builder. Builders
//! never touch the network; they validate the request against the token and
//! produce the body that gets signed, plus how its outcome must be read back.

use alloy::primitives::Bytes;
use serde::Serialize;
use tokenops_amount::AmountError;

use crate::capability::{Surface, TokenRef};
use crate::id::{EntityId, TransactionId};
use crate::operation::{Operation, OperationRequest};
use crate::response::{DecodeContext, ResponseKind};

pub mod contract;
pub mod native;

pub use contract::ContractCall;
pub use native::NativeTransaction;

/// Upper bound the payer accepts for a native transaction fee, in tinybars.
pub const DEFAULT_MAX_FEE_TINYBARS: u64 = 200_000_000;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no {surface:?} builder for {operation}")]
    NoBuilder {
        operation: Operation,
        surface: Surface,
    },
    #[error("token {token} has no token manager contract")]
    MissingContract { token: EntityId },
    #[error("failed to load contract interface: {0}")]
    Interface(String),
    #[error("amount has {actual} decimals, token {token} uses {expected}")]
    DecimalsMismatch {
        token: EntityId,
        expected: u8,
        actual: u8,
    },
    #[error(transparent)]
    Amount(#[from] AmountError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("failed to serialize transaction: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl BuildError {
    /// Defects in wiring rather than in the caller's request.
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::NoBuilder { .. } | Self::MissingContract { .. } | Self::Interface(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "surface", rename_all = "snake_case")]
pub enum TransactionBody {
    Native(NativeTransaction),
    Contract(ContractCall),
}

impl TransactionBody {
    pub const fn surface(&self) -> Surface {
        match self {
            Self::Native(_) => Surface::Native,
            Self::Contract(_) => Surface::Contract,
        }
    }
}

/// Builder output: the body plus how to interpret its execution.
#[derive(Debug, Clone)]
pub struct BuiltOperation {
    pub body: TransactionBody,
    pub response: ResponseKind,
    pub decode: Option<DecodeContext>,
}

/// Everything that gets signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsignedTransaction {
    pub transaction_id: TransactionId,
    pub max_fee_tinybars: u64,
    pub body: TransactionBody,
}

impl UnsignedTransaction {
    pub fn to_bytes(&self) -> Result<Bytes, BuildError> {
        Ok(serde_json::to_vec(self)?.into())
    }
}

/// Route a request to the builder registered for `surface`.
pub fn build(
    surface: Surface,
    request: &OperationRequest,
    token: &TokenRef,
) -> Result<BuiltOperation, BuildError> {
    match surface {
        Surface::Native => native::build(request, token),
        Surface::Contract => contract::build(request, token),
    }
}

/// Whether a builder exists for the pair.
pub const fn supports(surface: Surface, operation: Operation) -> bool {
    match surface {
        Surface::Native => native::supports(operation),
        Surface::Contract => contract::supports(operation),
    }
}
