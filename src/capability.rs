//! Per-token capabilities and the surface decision.
//!
//! A token lists which operations it supports and on which execution surface.
//! [`decide`] turns that list into a [`Decision`] for one operation; it never
//! fails, a missing entry simply means the operation is forbidden.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::id::EntityId;
use crate::operation::Operation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    /// The ledger's built-in token service.
    Native,
    /// The token manager smart contract.
    Contract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
    pub operation: Operation,
    pub surface: Surface,
}

impl Capability {
    pub const fn new(operation: Operation, surface: Surface) -> Self {
        Self { operation, surface }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Forbidden,
    Use(Surface),
}

/// First matching entry wins.
pub fn decide(capabilities: &[Capability], operation: Operation) -> Decision {
    capabilities
        .iter()
        .find(|capability| capability.operation == operation)
        .map_or(Decision::Forbidden, |capability| {
            Decision::Use(capability.surface)
        })
}

/// The token an operation acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRef {
    pub token_id: EntityId,
    /// Token manager contract, when the token has one.
    pub contract: Option<EntityId>,
    pub treasury: EntityId,
    pub decimals: u8,
}

#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("capability lookup for token {token} failed: {message}")]
    Lookup { token: EntityId, message: String },
}

/// Read-only capability lookup. The result is a snapshot for one call.
#[async_trait]
pub trait CapabilitySource: Send + Sync {
    async fn capabilities(
        &self,
        account: EntityId,
        token: &TokenRef,
    ) -> Result<Vec<Capability>, CapabilityError>;
}

/// Fixed capability lists keyed by token id.
#[derive(Debug, Clone, Default)]
pub struct StaticCapabilities {
    by_token: HashMap<EntityId, Vec<Capability>>,
}

impl StaticCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(mut self, token: EntityId, capabilities: Vec<Capability>) -> Self {
        self.by_token.insert(token, capabilities);
        self
    }
}

#[async_trait]
impl CapabilitySource for StaticCapabilities {
    async fn capabilities(
        &self,
        _account: EntityId,
        token: &TokenRef,
    ) -> Result<Vec<Capability>, CapabilityError> {
        Ok(self
            .by_token
            .get(&token.token_id)
            .cloned()
            .unwrap_or_default())
    }
}
