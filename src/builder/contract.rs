//! Token manager contract calls.

use std::sync::{Arc, LazyLock};

use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, Bytes, I256, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use serde::Serialize;
use tokenops_amount::Amount;

use super::{BuildError, BuiltOperation, TransactionBody};
use crate::capability::{Surface, TokenRef};
use crate::id::EntityId;
use crate::operation::{Hold, HoldRef, Operation, OperationRequest};
use crate::response::{DecodeContext, ResponseKind};

sol! {
    interface IHederaTokenManager {
        struct Hold {
            int64 amount;
            uint256 expirationTimestamp;
            address escrow;
            address to;
            bytes data;
        }

        struct HoldIdentifier {
            address tokenHolder;
            uint256 holdId;
        }

        function mint(address account, int64 amount) external returns (bool);
        function burn(int64 amount) external returns (bool);
        function wipe(address account, int64 amount) external returns (bool);
        function freeze(address account) external returns (bool);
        function unfreeze(address account) external returns (bool);
        function pause() external returns (bool);
        function unpause() external returns (bool);
        function deleteToken() external returns (bool);
        function rescue(int64 amount) external returns (bool);
        function rescueHBAR(uint256 amount) external returns (bool);
        function grantKyc(address account) external returns (bool);
        function revokeKyc(address account) external returns (bool);
        function grantRole(bytes32 role, address account) external;
        function revokeRole(bytes32 role, address account) external;
        function createHold(Hold hold) external returns (bool success, uint256 holdId);
        function createHoldByController(address from, Hold hold, bytes operatorData) external returns (bool success, uint256 holdId);
        function executeHold(HoldIdentifier holdIdentifier, address to, int64 amount) external returns (bool success);
        function releaseHold(HoldIdentifier holdIdentifier, int64 amount) external returns (bool success);
        function reclaimHold(HoldIdentifier holdIdentifier) external returns (bool success);
        function grantSupplierRole(address account, uint256 amount) external;
        function grantUnlimitedSupplierRole(address account) external;
        function revokeSupplierRole(address account) external;
        function increaseSupplierAllowance(address account, uint256 amount) external;
        function decreaseSupplierAllowance(address account, uint256 amount) external;
        function resetSupplierAllowance(address account) external;
        function updateReserveAddress(address newAddress) external;
    }

    interface IHederaReserve {
        function setAmount(int256 newValue) external;
    }
}

use IHederaTokenManager::{Hold as SolHold, HoldIdentifier};

/// Decimals of the network's native currency.
const HBAR_DECIMALS: u8 = 8;

/// Output signatures of the functions whose return data is read back.
const RETURN_INTERFACE: &[&str] = &[
    "function createHold((int64,uint256,address,address,bytes) hold) returns (bool success, uint256 holdId)",
    "function createHoldByController(address from, (int64,uint256,address,address,bytes) hold, bytes operatorData) returns (bool success, uint256 holdId)",
];

static RETURN_ABI: LazyLock<Result<Arc<JsonAbi>, String>> = LazyLock::new(|| {
    JsonAbi::parse(RETURN_INTERFACE.iter().copied())
        .map(Arc::new)
        .map_err(|e| e.to_string())
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractCall {
    pub contract: EntityId,
    pub function: &'static str,
    pub gas: u64,
    pub calldata: Bytes,
}

/// Gas budget per operation. `None` means the contract has no entry point.
pub const fn gas(operation: Operation) -> Option<u64> {
    match operation {
        Operation::CashIn => Some(120_000),
        Operation::Burn | Operation::Wipe | Operation::Rescue | Operation::RescueHbar => {
            Some(70_000)
        }
        Operation::Freeze
        | Operation::Unfreeze
        | Operation::Pause
        | Operation::Unpause
        | Operation::Delete
        | Operation::GrantKyc
        | Operation::RevokeKyc => Some(65_000),
        Operation::GrantRole
        | Operation::GrantSupplierRole
        | Operation::GrantUnlimitedSupplierRole => Some(150_000),
        Operation::RevokeRole | Operation::RevokeSupplierRole => Some(85_000),
        Operation::IncreaseSupplierAllowance
        | Operation::DecreaseSupplierAllowance
        | Operation::ResetSupplierAllowance => Some(130_000),
        Operation::UpdateReserveAddress | Operation::UpdateReserveAmount => Some(65_000),
        Operation::CreateHold | Operation::CreateHoldByController => Some(250_000),
        Operation::ExecuteHold | Operation::ReleaseHold | Operation::ReclaimHold => Some(200_000),
        Operation::UpdateCustomFees | Operation::Transfers => None,
    }
}

pub const fn supports(operation: Operation) -> bool {
    gas(operation).is_some()
}

fn token_amount(amount: Amount, token: &TokenRef) -> Result<i64, BuildError> {
    if amount.decimals() != token.decimals {
        return Err(BuildError::DecimalsMismatch {
            token: token.token_id,
            expected: token.decimals,
            actual: amount.decimals(),
        });
    }
    Ok(amount.to_units()?)
}

fn token_word(amount: Amount, token: &TokenRef) -> Result<U256, BuildError> {
    token_amount(amount, token)?;
    Ok(amount.to_u256()?)
}

fn sol_hold(hold: &Hold, token: &TokenRef) -> Result<SolHold, BuildError> {
    let expiration = u64::try_from(hold.expiration.timestamp()).map_err(|_| {
        BuildError::InvalidRequest(format!(
            "hold expiration {} is before the epoch",
            hold.expiration
        ))
    })?;

    Ok(SolHold {
        amount: token_amount(hold.amount, token)?,
        expirationTimestamp: U256::from(expiration),
        escrow: hold.escrow.to_evm_address(),
        to: hold
            .destination
            .map_or(Address::ZERO, EntityId::to_evm_address),
        data: hold.data.clone(),
    })
}

fn hold_identifier(hold: HoldRef) -> HoldIdentifier {
    HoldIdentifier {
        tokenHolder: hold.token_holder.to_evm_address(),
        holdId: U256::from(hold.hold_id),
    }
}

fn decode_context(function: &str) -> Result<DecodeContext, BuildError> {
    let interface = RETURN_ABI.as_ref().map_err(|e| BuildError::Interface(e.clone()))?;
    Ok(DecodeContext::new(function, Arc::clone(interface)))
}

pub fn build(request: &OperationRequest, token: &TokenRef) -> Result<BuiltOperation, BuildError> {
    let operation = request.operation();
    let gas = gas(operation).ok_or(BuildError::NoBuilder {
        operation,
        surface: Surface::Contract,
    })?;
    // The reserve amount lives on the reserve contract, not the token manager.
    let contract = match request {
        OperationRequest::UpdateReserveAmount { reserve, .. } => *reserve,
        _ => token.contract.ok_or(BuildError::MissingContract {
            token: token.token_id,
        })?,
    };

    let account = |id: &EntityId| -> Address { id.to_evm_address() };

    let (function, calldata): (&'static str, Vec<u8>) = match request {
        OperationRequest::CashIn { target, amount } => (
            "mint",
            IHederaTokenManager::mintCall {
                account: account(target),
                amount: token_amount(*amount, token)?,
            }
            .abi_encode(),
        ),
        OperationRequest::Burn { amount } => (
            "burn",
            IHederaTokenManager::burnCall {
                amount: token_amount(*amount, token)?,
            }
            .abi_encode(),
        ),
        OperationRequest::Wipe { target, amount } => (
            "wipe",
            IHederaTokenManager::wipeCall {
                account: account(target),
                amount: token_amount(*amount, token)?,
            }
            .abi_encode(),
        ),
        OperationRequest::Freeze { target } => (
            "freeze",
            IHederaTokenManager::freezeCall {
                account: account(target),
            }
            .abi_encode(),
        ),
        OperationRequest::Unfreeze { target } => (
            "unfreeze",
            IHederaTokenManager::unfreezeCall {
                account: account(target),
            }
            .abi_encode(),
        ),
        OperationRequest::Pause => ("pause", IHederaTokenManager::pauseCall {}.abi_encode()),
        OperationRequest::Unpause => ("unpause", IHederaTokenManager::unpauseCall {}.abi_encode()),
        OperationRequest::Delete => (
            "deleteToken",
            IHederaTokenManager::deleteTokenCall {}.abi_encode(),
        ),
        OperationRequest::Rescue { amount } => (
            "rescue",
            IHederaTokenManager::rescueCall {
                amount: token_amount(*amount, token)?,
            }
            .abi_encode(),
        ),
        OperationRequest::RescueHbar { amount } => {
            if amount.decimals() != HBAR_DECIMALS {
                return Err(BuildError::InvalidRequest(format!(
                    "HBAR amounts use {HBAR_DECIMALS} decimals, got {}",
                    amount.decimals()
                )));
            }
            (
                "rescueHBAR",
                IHederaTokenManager::rescueHBARCall {
                    amount: amount.to_u256()?,
                }
                .abi_encode(),
            )
        }
        OperationRequest::GrantKyc { target } => (
            "grantKyc",
            IHederaTokenManager::grantKycCall {
                account: account(target),
            }
            .abi_encode(),
        ),
        OperationRequest::RevokeKyc { target } => (
            "revokeKyc",
            IHederaTokenManager::revokeKycCall {
                account: account(target),
            }
            .abi_encode(),
        ),
        OperationRequest::GrantRole { target, role } => (
            "grantRole",
            IHederaTokenManager::grantRoleCall {
                role: role.id(),
                account: account(target),
            }
            .abi_encode(),
        ),
        OperationRequest::RevokeRole { target, role } => (
            "revokeRole",
            IHederaTokenManager::revokeRoleCall {
                role: role.id(),
                account: account(target),
            }
            .abi_encode(),
        ),
        OperationRequest::CreateHold { hold } => (
            "createHold",
            IHederaTokenManager::createHoldCall {
                hold: sol_hold(hold, token)?,
            }
            .abi_encode(),
        ),
        OperationRequest::CreateHoldByController { source, hold } => (
            "createHoldByController",
            IHederaTokenManager::createHoldByControllerCall {
                from: account(source),
                hold: sol_hold(hold, token)?,
                operatorData: Bytes::new(),
            }
            .abi_encode(),
        ),
        OperationRequest::ExecuteHold { hold, to, amount } => (
            "executeHold",
            IHederaTokenManager::executeHoldCall {
                holdIdentifier: hold_identifier(*hold),
                to: account(to),
                amount: token_amount(*amount, token)?,
            }
            .abi_encode(),
        ),
        OperationRequest::ReleaseHold { hold, amount } => (
            "releaseHold",
            IHederaTokenManager::releaseHoldCall {
                holdIdentifier: hold_identifier(*hold),
                amount: token_amount(*amount, token)?,
            }
            .abi_encode(),
        ),
        OperationRequest::ReclaimHold { hold } => (
            "reclaimHold",
            IHederaTokenManager::reclaimHoldCall {
                holdIdentifier: hold_identifier(*hold),
            }
            .abi_encode(),
        ),
        OperationRequest::GrantSupplierRole { target, allowance } => (
            "grantSupplierRole",
            IHederaTokenManager::grantSupplierRoleCall {
                account: account(target),
                amount: token_word(*allowance, token)?,
            }
            .abi_encode(),
        ),
        OperationRequest::GrantUnlimitedSupplierRole { target } => (
            "grantUnlimitedSupplierRole",
            IHederaTokenManager::grantUnlimitedSupplierRoleCall {
                account: account(target),
            }
            .abi_encode(),
        ),
        OperationRequest::RevokeSupplierRole { target } => (
            "revokeSupplierRole",
            IHederaTokenManager::revokeSupplierRoleCall {
                account: account(target),
            }
            .abi_encode(),
        ),
        OperationRequest::IncreaseSupplierAllowance { target, amount } => (
            "increaseSupplierAllowance",
            IHederaTokenManager::increaseSupplierAllowanceCall {
                account: account(target),
                amount: token_word(*amount, token)?,
            }
            .abi_encode(),
        ),
        OperationRequest::DecreaseSupplierAllowance { target, amount } => (
            "decreaseSupplierAllowance",
            IHederaTokenManager::decreaseSupplierAllowanceCall {
                account: account(target),
                amount: token_word(*amount, token)?,
            }
            .abi_encode(),
        ),
        OperationRequest::ResetSupplierAllowance { target } => (
            "resetSupplierAllowance",
            IHederaTokenManager::resetSupplierAllowanceCall {
                account: account(target),
            }
            .abi_encode(),
        ),
        OperationRequest::UpdateReserveAddress { reserve } => (
            "updateReserveAddress",
            IHederaTokenManager::updateReserveAddressCall {
                newAddress: account(reserve),
            }
            .abi_encode(),
        ),
        // Scaled by the reserve's own decimals, which the caller supplies.
        OperationRequest::UpdateReserveAmount { amount, .. } => (
            "setAmount",
            IHederaReserve::setAmountCall {
                newValue: I256::try_from(amount.to_units()?).map_err(|e| {
                    BuildError::InvalidRequest(format!("reserve amount {amount}: {e}"))
                })?,
            }
            .abi_encode(),
        ),
        OperationRequest::UpdateCustomFees { .. } | OperationRequest::Transfers { .. } => {
            return Err(BuildError::NoBuilder {
                operation,
                surface: Surface::Contract,
            });
        }
    };

    let (response, decode) = match operation {
        Operation::CreateHold | Operation::CreateHoldByController => {
            (ResponseKind::FullRecord, Some(decode_context(function)?))
        }
        _ => (ResponseKind::ReceiptOnly, None),
    };

    Ok(BuiltOperation {
        body: TransactionBody::Contract(ContractCall {
            contract,
            function,
            gas,
            calldata: calldata.into(),
        }),
        response,
        decode,
    })
}
