//! Network submission seam.
//!
//! The pipeline never talks to consensus nodes directly. A [`Ledger`] takes a
//! signed artifact, hands back a handle, and later resolves the handle to a
//! receipt (status only) or a record (status plus contract return data).

use alloy::primitives::Bytes;
use async_trait::async_trait;
use tokenops_signer::SigningResult;

use crate::id::TransactionId;

/// Transaction body bytes together with their authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedArtifact {
    pub transaction_id: TransactionId,
    pub body: Bytes,
    pub signature: SigningResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionHandle {
    pub transaction_id: TransactionId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Success,
    /// Network response code, e.g. `CONTRACT_REVERT_EXECUTED`.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_id: TransactionId,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub receipt: Receipt,
    pub call_result: Option<Bytes>,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("submission failed: {0}")]
    Submit(String),
    #[error("failed to fetch receipt for {transaction_id}: {message}")]
    Receipt {
        transaction_id: TransactionId,
        message: String,
    },
    #[error("failed to fetch record for {transaction_id}: {message}")]
    Record {
        transaction_id: TransactionId,
        message: String,
    },
}

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn submit(&self, artifact: SignedArtifact) -> Result<ExecutionHandle, LedgerError>;

    /// Wait for settlement and return the status-only receipt.
    async fn receipt(&self, handle: &ExecutionHandle) -> Result<Receipt, LedgerError>;

    /// Wait for settlement and return the full record.
    async fn record(&self, handle: &ExecutionHandle) -> Result<Record, LedgerError>;
}

pub mod mock {
    //! In-memory ledger that records every submission.

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Scripted outcome for every submission.
    #[derive(Debug, Clone)]
    pub enum MockOutcome {
        Success { call_result: Option<Bytes> },
        SettlementFailure(String),
        SubmitError(String),
        ReceiptError(String),
    }

    #[derive(Debug)]
    pub struct MockLedger {
        outcome: MockOutcome,
        submissions: AtomicUsize,
        submitted: Mutex<Vec<SignedArtifact>>,
    }

    impl MockLedger {
        pub fn new(outcome: MockOutcome) -> Self {
            Self {
                outcome,
                submissions: AtomicUsize::new(0),
                submitted: Mutex::new(Vec::new()),
            }
        }

        pub fn succeeding() -> Self {
            Self::new(MockOutcome::Success { call_result: None })
        }

        pub fn submissions(&self) -> usize {
            self.submissions.load(Ordering::SeqCst)
        }

        pub fn submitted(&self) -> Vec<SignedArtifact> {
            self.submitted
                .lock()
                .map(|submitted| submitted.clone())
                .unwrap_or_default()
        }

        fn status(&self) -> Status {
            match &self.outcome {
                MockOutcome::SettlementFailure(code) => Status::Failed(code.clone()),
                _ => Status::Success,
            }
        }
    }

    #[async_trait]
    impl Ledger for MockLedger {
        async fn submit(&self, artifact: SignedArtifact) -> Result<ExecutionHandle, LedgerError> {
            self.submissions.fetch_add(1, Ordering::SeqCst);

            if let MockOutcome::SubmitError(message) = &self.outcome {
                return Err(LedgerError::Submit(message.clone()));
            }

            let transaction_id = artifact.transaction_id;
            if let Ok(mut submitted) = self.submitted.lock() {
                submitted.push(artifact);
            }

            Ok(ExecutionHandle { transaction_id })
        }

        async fn receipt(&self, handle: &ExecutionHandle) -> Result<Receipt, LedgerError> {
            if let MockOutcome::ReceiptError(message) = &self.outcome {
                return Err(LedgerError::Receipt {
                    transaction_id: handle.transaction_id,
                    message: message.clone(),
                });
            }

            Ok(Receipt {
                transaction_id: handle.transaction_id,
                status: self.status(),
            })
        }

        async fn record(&self, handle: &ExecutionHandle) -> Result<Record, LedgerError> {
            let receipt = self.receipt(handle).await.map_err(|e| match e {
                LedgerError::Receipt {
                    transaction_id,
                    message,
                } => LedgerError::Record {
                    transaction_id,
                    message,
                },
                other => other,
            })?;

            let call_result = match &self.outcome {
                MockOutcome::Success { call_result } => call_result.clone(),
                _ => None,
            };

            Ok(Record {
                receipt,
                call_result,
            })
        }
    }
}
