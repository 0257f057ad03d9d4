//! Native token service transactions.

use serde::Serialize;
use tokenops_amount::Amount;

use super::{BuildError, BuiltOperation, TransactionBody};
use crate::capability::{Surface, TokenRef};
use crate::id::EntityId;
use crate::operation::{CustomFee, Operation, OperationRequest, Transfer};
use crate::response::ResponseKind;

/// Decimals of the network's native currency.
const HBAR_DECIMALS: u8 = 8;

/// Upper bound on custom fees per token.
const MAX_CUSTOM_FEES: usize = 10;

/// Upper bound on account adjustments in one token transfer list, debit included.
const MAX_TRANSFER_ENTRIES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NativeTransaction {
    TokenMint {
        token: EntityId,
        amount: i64,
    },
    TokenBurn {
        token: EntityId,
        amount: i64,
    },
    TokenWipe {
        token: EntityId,
        account: EntityId,
        amount: i64,
    },
    TokenFreeze {
        token: EntityId,
        account: EntityId,
    },
    TokenUnfreeze {
        token: EntityId,
        account: EntityId,
    },
    TokenPause {
        token: EntityId,
    },
    TokenUnpause {
        token: EntityId,
    },
    TokenGrantKyc {
        token: EntityId,
        account: EntityId,
    },
    TokenRevokeKyc {
        token: EntityId,
        account: EntityId,
    },
    TokenFeeScheduleUpdate {
        token: EntityId,
        custom_fees: Vec<NativeCustomFee>,
    },
    /// Adjustments sum to zero; the debit comes last.
    CryptoTransfer {
        token: EntityId,
        transfers: Vec<TokenTransfer>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenTransfer {
    pub account: EntityId,
    pub amount: i64,
}

/// Custom fee with amounts in base units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NativeCustomFee {
    Fixed {
        amount: i64,
        denominating_token: Option<EntityId>,
        collector: EntityId,
        collectors_exempt: bool,
    },
    Fractional {
        numerator: i64,
        denominator: i64,
        minimum: i64,
        maximum: i64,
        net_of_transfers: bool,
        collector: EntityId,
        collectors_exempt: bool,
    },
}

pub const fn supports(operation: Operation) -> bool {
    matches!(
        operation,
        Operation::CashIn
            | Operation::Burn
            | Operation::Wipe
            | Operation::Freeze
            | Operation::Unfreeze
            | Operation::Pause
            | Operation::Unpause
            | Operation::GrantKyc
            | Operation::RevokeKyc
            | Operation::UpdateCustomFees
            | Operation::Transfers
    )
}

fn token_units(amount: Amount, token: &TokenRef) -> Result<i64, BuildError> {
    if amount.decimals() != token.decimals {
        return Err(BuildError::DecimalsMismatch {
            token: token.token_id,
            expected: token.decimals,
            actual: amount.decimals(),
        });
    }
    Ok(amount.to_units()?)
}

fn convert_fee(fee: &CustomFee, token: &TokenRef) -> Result<NativeCustomFee, BuildError> {
    match fee {
        CustomFee::Fixed {
            amount,
            denominating_token,
            collector,
            collectors_exempt,
        } => {
            let expected = match denominating_token {
                None => HBAR_DECIMALS,
                Some(id) if *id == token.token_id => token.decimals,
                Some(_) => amount.decimals(),
            };
            if amount.decimals() != expected {
                return Err(BuildError::InvalidRequest(format!(
                    "fixed fee amount has {} decimals, expected {expected}",
                    amount.decimals()
                )));
            }

            Ok(NativeCustomFee::Fixed {
                amount: amount.to_units()?,
                denominating_token: *denominating_token,
                collector: *collector,
                collectors_exempt: *collectors_exempt,
            })
        }
        CustomFee::Fractional {
            numerator,
            denominator,
            minimum,
            maximum,
            net_of_transfers,
            collector,
            collectors_exempt,
        } => {
            if *denominator <= 0 || *numerator < 0 {
                return Err(BuildError::InvalidRequest(format!(
                    "fractional fee {numerator}/{denominator} is not a valid fraction"
                )));
            }

            let minimum = token_units(*minimum, token)?;
            let maximum = token_units(*maximum, token)?;
            if maximum != 0 && minimum > maximum {
                return Err(BuildError::InvalidRequest(format!(
                    "fractional fee minimum {minimum} exceeds maximum {maximum}"
                )));
            }

            Ok(NativeCustomFee::Fractional {
                numerator: *numerator,
                denominator: *denominator,
                minimum,
                maximum,
                net_of_transfers: *net_of_transfers,
                collector: *collector,
                collectors_exempt: *collectors_exempt,
            })
        }
    }
}

fn transfer_list(
    from: EntityId,
    transfers: &[Transfer],
    token: &TokenRef,
) -> Result<Vec<TokenTransfer>, BuildError> {
    if transfers.is_empty() {
        return Err(BuildError::InvalidRequest(
            "transfer list is empty".to_string(),
        ));
    }
    if transfers.len() >= MAX_TRANSFER_ENTRIES {
        return Err(BuildError::InvalidRequest(format!(
            "{} recipients exceed the limit of {}",
            transfers.len(),
            MAX_TRANSFER_ENTRIES - 1
        )));
    }

    let mut total: i64 = 0;
    let mut list = Vec::with_capacity(transfers.len() + 1);
    for transfer in transfers {
        if transfer.to == from {
            return Err(BuildError::InvalidRequest(format!(
                "{from} cannot transfer to itself"
            )));
        }

        let amount = token_units(transfer.amount, token)?;
        if amount == 0 {
            return Err(BuildError::InvalidRequest(format!(
                "transfer to {} has a zero amount",
                transfer.to
            )));
        }

        total = total.checked_add(amount).ok_or_else(|| {
            BuildError::InvalidRequest("transfer total overflows 64-bit base units".to_string())
        })?;
        list.push(TokenTransfer {
            account: transfer.to,
            amount,
        });
    }

    list.push(TokenTransfer {
        account: from,
        amount: -total,
    });
    Ok(list)
}

pub fn build(request: &OperationRequest, token: &TokenRef) -> Result<BuiltOperation, BuildError> {
    let id = token.token_id;

    let transaction = match request {
        OperationRequest::CashIn { target, amount } => {
            // A mint credits the treasury; moving it elsewhere is a second
            // transaction.
            if *target != token.treasury {
                return Err(BuildError::InvalidRequest(format!(
                    "native cash-in mints to treasury {}, not {target}",
                    token.treasury
                )));
            }
            NativeTransaction::TokenMint {
                token: id,
                amount: token_units(*amount, token)?,
            }
        }
        OperationRequest::Burn { amount } => NativeTransaction::TokenBurn {
            token: id,
            amount: token_units(*amount, token)?,
        },
        OperationRequest::Wipe { target, amount } => NativeTransaction::TokenWipe {
            token: id,
            account: *target,
            amount: token_units(*amount, token)?,
        },
        OperationRequest::Freeze { target } => NativeTransaction::TokenFreeze {
            token: id,
            account: *target,
        },
        OperationRequest::Unfreeze { target } => NativeTransaction::TokenUnfreeze {
            token: id,
            account: *target,
        },
        OperationRequest::Pause => NativeTransaction::TokenPause { token: id },
        OperationRequest::Unpause => NativeTransaction::TokenUnpause { token: id },
        OperationRequest::GrantKyc { target } => NativeTransaction::TokenGrantKyc {
            token: id,
            account: *target,
        },
        OperationRequest::RevokeKyc { target } => NativeTransaction::TokenRevokeKyc {
            token: id,
            account: *target,
        },
        OperationRequest::UpdateCustomFees { fees } => {
            if fees.len() > MAX_CUSTOM_FEES {
                return Err(BuildError::InvalidRequest(format!(
                    "{} custom fees exceed the limit of {MAX_CUSTOM_FEES}",
                    fees.len()
                )));
            }
            NativeTransaction::TokenFeeScheduleUpdate {
                token: id,
                custom_fees: fees
                    .iter()
                    .map(|fee| convert_fee(fee, token))
                    .collect::<Result<_, _>>()?,
            }
        }
        OperationRequest::Transfers { from, transfers } => NativeTransaction::CryptoTransfer {
            token: id,
            transfers: transfer_list(*from, transfers, token)?,
        },
        other => {
            return Err(BuildError::NoBuilder {
                operation: other.operation(),
                surface: Surface::Native,
            });
        }
    };

    Ok(BuiltOperation {
        body: TransactionBody::Native(transaction),
        response: ResponseKind::ReceiptOnly,
        decode: None,
    })
}
