//! Token operations and their surface-agnostic parameters.

use std::fmt;

use alloy::primitives::{B256, Bytes, keccak256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokenops_amount::Amount;

use crate::id::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CashIn,
    Burn,
    Wipe,
    Freeze,
    Unfreeze,
    Pause,
    Unpause,
    Delete,
    Rescue,
    RescueHbar,
    GrantKyc,
    RevokeKyc,
    GrantRole,
    RevokeRole,
    UpdateCustomFees,
    CreateHold,
    CreateHoldByController,
    ExecuteHold,
    ReleaseHold,
    ReclaimHold,
    GrantSupplierRole,
    GrantUnlimitedSupplierRole,
    RevokeSupplierRole,
    IncreaseSupplierAllowance,
    DecreaseSupplierAllowance,
    ResetSupplierAllowance,
    UpdateReserveAddress,
    UpdateReserveAmount,
    Transfers,
}

impl Operation {
    pub const ALL: [Self; 29] = [
        Self::CashIn,
        Self::Burn,
        Self::Wipe,
        Self::Freeze,
        Self::Unfreeze,
        Self::Pause,
        Self::Unpause,
        Self::Delete,
        Self::Rescue,
        Self::RescueHbar,
        Self::GrantKyc,
        Self::RevokeKyc,
        Self::GrantRole,
        Self::RevokeRole,
        Self::UpdateCustomFees,
        Self::CreateHold,
        Self::CreateHoldByController,
        Self::ExecuteHold,
        Self::ReleaseHold,
        Self::ReclaimHold,
        Self::GrantSupplierRole,
        Self::GrantUnlimitedSupplierRole,
        Self::RevokeSupplierRole,
        Self::IncreaseSupplierAllowance,
        Self::DecreaseSupplierAllowance,
        Self::ResetSupplierAllowance,
        Self::UpdateReserveAddress,
        Self::UpdateReserveAmount,
        Self::Transfers,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CashIn => "cash_in",
            Self::Burn => "burn",
            Self::Wipe => "wipe",
            Self::Freeze => "freeze",
            Self::Unfreeze => "unfreeze",
            Self::Pause => "pause",
            Self::Unpause => "unpause",
            Self::Delete => "delete",
            Self::Rescue => "rescue",
            Self::RescueHbar => "rescue_hbar",
            Self::GrantKyc => "grant_kyc",
            Self::RevokeKyc => "revoke_kyc",
            Self::GrantRole => "grant_role",
            Self::RevokeRole => "revoke_role",
            Self::UpdateCustomFees => "update_custom_fees",
            Self::CreateHold => "create_hold",
            Self::CreateHoldByController => "create_hold_by_controller",
            Self::ExecuteHold => "execute_hold",
            Self::ReleaseHold => "release_hold",
            Self::ReclaimHold => "reclaim_hold",
            Self::GrantSupplierRole => "grant_supplier_role",
            Self::GrantUnlimitedSupplierRole => "grant_unlimited_supplier_role",
            Self::RevokeSupplierRole => "revoke_supplier_role",
            Self::IncreaseSupplierAllowance => "increase_supplier_allowance",
            Self::DecreaseSupplierAllowance => "decrease_supplier_allowance",
            Self::ResetSupplierAllowance => "reset_supplier_allowance",
            Self::UpdateReserveAddress => "update_reserve_address",
            Self::UpdateReserveAmount => "update_reserve_amount",
            Self::Transfers => "transfers",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Roles managed by the token manager contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    DefaultAdmin,
    CashIn,
    Burn,
    Wipe,
    Rescue,
    Pause,
    Freeze,
    Delete,
    Kyc,
    CustomFees,
    HoldCreator,
}

impl Role {
    const fn label(self) -> &'static str {
        match self {
            Self::DefaultAdmin => "DEFAULT_ADMIN_ROLE",
            Self::CashIn => "CASHIN_ROLE",
            Self::Burn => "BURN_ROLE",
            Self::Wipe => "WIPE_ROLE",
            Self::Rescue => "RESCUE_ROLE",
            Self::Pause => "PAUSE_ROLE",
            Self::Freeze => "FREEZE_ROLE",
            Self::Delete => "DELETE_ROLE",
            Self::Kyc => "KYC_ROLE",
            Self::CustomFees => "CUSTOM_FEES_ROLE",
            Self::HoldCreator => "HOLD_CREATOR_ROLE",
        }
    }

    /// On-chain role id: `keccak256(label)`, zero for the admin role.
    pub fn id(self) -> B256 {
        match self {
            Self::DefaultAdmin => B256::ZERO,
            other => keccak256(other.label()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CustomFee {
    Fixed {
        amount: Amount,
        /// `None` charges the fee in HBAR.
        denominating_token: Option<EntityId>,
        collector: EntityId,
        collectors_exempt: bool,
    },
    Fractional {
        numerator: i64,
        denominator: i64,
        minimum: Amount,
        maximum: Amount,
        net_of_transfers: bool,
        collector: EntityId,
        collectors_exempt: bool,
    },
}

impl CustomFee {
    pub const fn collector(&self) -> EntityId {
        match self {
            Self::Fixed { collector, .. } | Self::Fractional { collector, .. } => *collector,
        }
    }
}

/// Escrow hold placed on a holder's balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hold {
    pub amount: Amount,
    pub escrow: EntityId,
    pub expiration: DateTime<Utc>,
    pub destination: Option<EntityId>,
    pub data: Bytes,
}

/// A hold is addressed by the holder's account and the id the contract
/// returned from `createHold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HoldRef {
    pub token_holder: EntityId,
    pub hold_id: u64,
}

/// One credit in a batch transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub to: EntityId,
    pub amount: Amount,
}

/// What the caller wants done, independent of how it gets executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OperationRequest {
    CashIn { target: EntityId, amount: Amount },
    Burn { amount: Amount },
    Wipe { target: EntityId, amount: Amount },
    Freeze { target: EntityId },
    Unfreeze { target: EntityId },
    Pause,
    Unpause,
    Delete,
    Rescue { amount: Amount },
    /// Amount in HBAR with 8 decimals.
    RescueHbar { amount: Amount },
    GrantKyc { target: EntityId },
    RevokeKyc { target: EntityId },
    GrantRole { target: EntityId, role: Role },
    RevokeRole { target: EntityId, role: Role },
    UpdateCustomFees { fees: Vec<CustomFee> },
    CreateHold { hold: Hold },
    /// A hold placed on `source`'s balance by a controller.
    CreateHoldByController { source: EntityId, hold: Hold },
    ExecuteHold {
        hold: HoldRef,
        to: EntityId,
        amount: Amount,
    },
    ReleaseHold { hold: HoldRef, amount: Amount },
    ReclaimHold { hold: HoldRef },
    GrantSupplierRole { target: EntityId, allowance: Amount },
    GrantUnlimitedSupplierRole { target: EntityId },
    RevokeSupplierRole { target: EntityId },
    IncreaseSupplierAllowance { target: EntityId, amount: Amount },
    DecreaseSupplierAllowance { target: EntityId, amount: Amount },
    ResetSupplierAllowance { target: EntityId },
    UpdateReserveAddress { reserve: EntityId },
    /// Sets the reserve contract's reported amount.
    UpdateReserveAmount { reserve: EntityId, amount: Amount },
    /// Debits `from` by the sum of all credits in one transaction.
    Transfers {
        from: EntityId,
        transfers: Vec<Transfer>,
    },
}

impl OperationRequest {
    pub const fn operation(&self) -> Operation {
        match self {
            Self::CashIn { .. } => Operation::CashIn,
            Self::Burn { .. } => Operation::Burn,
            Self::Wipe { .. } => Operation::Wipe,
            Self::Freeze { .. } => Operation::Freeze,
            Self::Unfreeze { .. } => Operation::Unfreeze,
            Self::Pause => Operation::Pause,
            Self::Unpause => Operation::Unpause,
            Self::Delete => Operation::Delete,
            Self::Rescue { .. } => Operation::Rescue,
            Self::RescueHbar { .. } => Operation::RescueHbar,
            Self::GrantKyc { .. } => Operation::GrantKyc,
            Self::RevokeKyc { .. } => Operation::RevokeKyc,
            Self::GrantRole { .. } => Operation::GrantRole,
            Self::RevokeRole { .. } => Operation::RevokeRole,
            Self::UpdateCustomFees { .. } => Operation::UpdateCustomFees,
            Self::CreateHold { .. } => Operation::CreateHold,
            Self::CreateHoldByController { .. } => Operation::CreateHoldByController,
            Self::ExecuteHold { .. } => Operation::ExecuteHold,
            Self::ReleaseHold { .. } => Operation::ReleaseHold,
            Self::ReclaimHold { .. } => Operation::ReclaimHold,
            Self::GrantSupplierRole { .. } => Operation::GrantSupplierRole,
            Self::GrantUnlimitedSupplierRole { .. } => Operation::GrantUnlimitedSupplierRole,
            Self::RevokeSupplierRole { .. } => Operation::RevokeSupplierRole,
            Self::IncreaseSupplierAllowance { .. } => Operation::IncreaseSupplierAllowance,
            Self::DecreaseSupplierAllowance { .. } => Operation::DecreaseSupplierAllowance,
            Self::ResetSupplierAllowance { .. } => Operation::ResetSupplierAllowance,
            Self::UpdateReserveAddress { .. } => Operation::UpdateReserveAddress,
            Self::UpdateReserveAmount { .. } => Operation::UpdateReserveAmount,
            Self::Transfers { .. } => Operation::Transfers,
        }
    }
}
