//! Response normalization.
//!
//! Turns a settled receipt or record into the caller-facing
//! [`TransactionResponse`], decoding contract return data when the builder
//! asked for it.

use std::fmt;
use std::sync::Arc;

use alloy::dyn_abi::{DynSolValue, FunctionExt};
use alloy::json_abi::JsonAbi;
use alloy::primitives::Bytes;
use url::Url;

use crate::error::{DomainError, ErrorKind};
use crate::id::TransactionId;
use crate::ledger::{Receipt, Record, Status};

/// Which settlement artifact the pipeline must fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    ReceiptOnly,
    FullRecord,
}

/// Function whose outputs should be decoded from the record's return data.
#[derive(Clone)]
pub struct DecodeContext {
    function: String,
    interface: Arc<JsonAbi>,
}

impl DecodeContext {
    pub fn new(function: &str, interface: Arc<JsonAbi>) -> Self {
        Self {
            function: function.to_string(),
            interface,
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }
}

impl fmt::Debug for DecodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeContext")
            .field("function", &self.function)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    Receipt(Receipt),
    Record(Record),
}

impl ExecutionResult {
    fn receipt(&self) -> &Receipt {
        match self {
            Self::Receipt(receipt) => receipt,
            Self::Record(record) => &record.receipt,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Settled with success; nothing else to report.
    Settled,
    /// Record return data with no decode context.
    Raw(Bytes),
    Decoded(Vec<DynSolValue>),
}

/// Exactly one of payload or error.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionResponse {
    id: Option<TransactionId>,
    result: Result<Payload, DomainError>,
}

impl TransactionResponse {
    pub const fn success(id: TransactionId, payload: Payload) -> Self {
        Self {
            id: Some(id),
            result: Ok(payload),
        }
    }

    pub fn failure(error: DomainError) -> Self {
        Self {
            id: error.transaction_id,
            result: Err(error),
        }
    }

    pub const fn id(&self) -> Option<TransactionId> {
        self.id
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&DomainError> {
        self.result.as_ref().err()
    }

    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<Payload, DomainError> {
        self.result
    }

    #[must_use]
    pub(crate) fn with_explorer_url(mut self, url: Url) -> Self {
        if let Err(error) = &mut self.result {
            error.explorer_url = Some(url);
        }
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("{transaction_id}: expected a record but the ledger returned a receipt")]
    MissingRecord { transaction_id: TransactionId },
    #[error("{transaction_id}: {function} returned empty data")]
    EmptyReturnData {
        transaction_id: TransactionId,
        function: String,
    },
    #[error("{transaction_id}: {function} is not part of the decode interface")]
    UnknownFunction {
        transaction_id: TransactionId,
        function: String,
    },
    #[error("{transaction_id}: failed to decode {function} output: {source}")]
    Decode {
        transaction_id: TransactionId,
        function: String,
        source: alloy::dyn_abi::Error,
    },
}

impl NormalizeError {
    pub const fn transaction_id(&self) -> TransactionId {
        match self {
            Self::MissingRecord { transaction_id }
            | Self::EmptyReturnData { transaction_id, .. }
            | Self::UnknownFunction { transaction_id, .. }
            | Self::Decode { transaction_id, .. } => *transaction_id,
        }
    }
}

/// Settlement failures become failure responses; malformed results become
/// `Err` so the dispatcher can classify them as invalid responses.
pub fn normalize(
    result: ExecutionResult,
    kind: ResponseKind,
    decode: Option<&DecodeContext>,
) -> Result<TransactionResponse, NormalizeError> {
    let receipt = result.receipt();
    let transaction_id = receipt.transaction_id;

    if let Status::Failed(code) = &receipt.status {
        return Ok(TransactionResponse::failure(
            DomainError::new(
                ErrorKind::SettlementFailed,
                format!("transaction settled with status {code}"),
            )
            .with_transaction(transaction_id),
        ));
    }

    let record = match (kind, result) {
        (ResponseKind::ReceiptOnly, _) => {
            return Ok(TransactionResponse::success(transaction_id, Payload::Settled));
        }
        (ResponseKind::FullRecord, ExecutionResult::Receipt(_)) => {
            return Err(NormalizeError::MissingRecord { transaction_id });
        }
        (ResponseKind::FullRecord, ExecutionResult::Record(record)) => record,
    };

    let Some(context) = decode else {
        let payload = record
            .call_result
            .map_or(Payload::Settled, Payload::Raw);
        return Ok(TransactionResponse::success(transaction_id, payload));
    };

    let data = record.call_result.unwrap_or_default();
    if data.is_empty() {
        return Err(NormalizeError::EmptyReturnData {
            transaction_id,
            function: context.function.clone(),
        });
    }

    let function = context
        .interface
        .function(&context.function)
        .and_then(|overloads| overloads.first())
        .ok_or_else(|| NormalizeError::UnknownFunction {
            transaction_id,
            function: context.function.clone(),
        })?;

    let values = function
        .abi_decode_output(&data)
        .map_err(|source| NormalizeError::Decode {
            transaction_id,
            function: context.function.clone(),
            source,
        })?;

    Ok(TransactionResponse::success(
        transaction_id,
        Payload::Decoded(values),
    ))
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;
    use alloy::sol_types::SolValue;
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::id::EntityId;

    fn transaction_id() -> TransactionId {
        TransactionId::new(
            EntityId::new(0, 0, 1001),
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        )
    }

    fn receipt(status: Status) -> Receipt {
        Receipt {
            transaction_id: transaction_id(),
            status,
        }
    }

    fn record(call_result: Option<Bytes>) -> ExecutionResult {
        ExecutionResult::Record(Record {
            receipt: receipt(Status::Success),
            call_result,
        })
    }

    fn create_hold_context() -> DecodeContext {
        let abi = JsonAbi::parse([
            "function createHold((int64,uint256,address,address,bytes) hold) returns (bool success, uint256 holdId)",
        ])
        .unwrap();
        DecodeContext::new("createHold", Arc::new(abi))
    }

    #[test]
    fn receipt_only_success_settles() {
        let response = normalize(
            ExecutionResult::Receipt(receipt(Status::Success)),
            ResponseKind::ReceiptOnly,
            None,
        )
        .unwrap();

        assert!(response.is_success());
        assert!(response.error().is_none());
        assert_eq!(response.payload(), Some(&Payload::Settled));
        assert_eq!(response.id(), Some(transaction_id()));
    }

    #[test]
    fn failed_status_becomes_settlement_failure_with_id() {
        let response = normalize(
            ExecutionResult::Receipt(receipt(Status::Failed(
                "CONTRACT_REVERT_EXECUTED".to_string(),
            ))),
            ResponseKind::ReceiptOnly,
            None,
        )
        .unwrap();

        assert!(!response.is_success());
        assert!(response.payload().is_none());
        let error = response.error().unwrap();
        assert_eq!(error.kind, ErrorKind::SettlementFailed);
        assert_eq!(error.transaction_id, Some(transaction_id()));
        assert!(error.message.contains("CONTRACT_REVERT_EXECUTED"));
    }

    #[test]
    fn record_return_data_is_decoded() {
        let data = Bytes::from((true, U256::from(7)).abi_encode_params());
        let context = create_hold_context();

        let response = normalize(
            record(Some(data)),
            ResponseKind::FullRecord,
            Some(&context),
        )
        .unwrap();

        let Some(Payload::Decoded(values)) = response.payload() else {
            panic!("expected decoded payload, got {response:?}");
        };
        assert_eq!(
            values,
            &vec![DynSolValue::Bool(true), DynSolValue::Uint(U256::from(7), 256)]
        );
    }

    #[test]
    fn empty_return_data_is_rejected_when_decoding_is_requested() {
        let context = create_hold_context();

        let error = normalize(
            record(Some(Bytes::new())),
            ResponseKind::FullRecord,
            Some(&context),
        )
        .unwrap_err();

        assert!(
            matches!(&error, NormalizeError::EmptyReturnData { function, .. } if function == "createHold"),
            "{error:?}"
        );
        assert_eq!(error.transaction_id(), transaction_id());
    }

    #[test]
    fn missing_return_data_is_rejected_when_decoding_is_requested() {
        let context = create_hold_context();

        let error = normalize(record(None), ResponseKind::FullRecord, Some(&context)).unwrap_err();

        assert!(matches!(error, NormalizeError::EmptyReturnData { .. }));
    }

    #[test]
    fn receipt_where_record_expected_is_invalid() {
        let error = normalize(
            ExecutionResult::Receipt(receipt(Status::Success)),
            ResponseKind::FullRecord,
            None,
        )
        .unwrap_err();

        assert!(matches!(error, NormalizeError::MissingRecord { .. }));
    }

    #[test]
    fn truncated_return_data_fails_to_decode() {
        let context = create_hold_context();

        let error = normalize(
            record(Some(Bytes::from(vec![0u8; 5]))),
            ResponseKind::FullRecord,
            Some(&context),
        )
        .unwrap_err();

        assert!(matches!(error, NormalizeError::Decode { .. }), "{error:?}");
    }

    #[test]
    fn unknown_function_fails() {
        let context = DecodeContext::new("releaseHold", create_hold_context().interface);

        let error = normalize(
            record(Some(Bytes::from(vec![1u8; 64]))),
            ResponseKind::FullRecord,
            Some(&context),
        )
        .unwrap_err();

        assert!(matches!(error, NormalizeError::UnknownFunction { .. }));
    }

    #[test]
    fn record_without_decode_context_passes_raw_bytes() {
        let data = Bytes::from(vec![0xde, 0xad]);

        let response = normalize(record(Some(data.clone())), ResponseKind::FullRecord, None)
            .unwrap();

        assert_eq!(response.payload(), Some(&Payload::Raw(data)));
    }
}
