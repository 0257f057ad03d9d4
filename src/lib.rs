//! Token operation pipeline: capability check, transaction build, signing,
//! submission and response normalization behind a single
//! [`Dispatcher::execute`] call.

pub mod builder;
pub mod capability;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod explorer;
pub mod id;
pub mod ledger;
pub mod operation;
pub mod response;

pub use capability::{Capability, CapabilitySource, Decision, StaticCapabilities, Surface, TokenRef};
pub use config::{Ctx, setup_tracing};
pub use dispatcher::Dispatcher;
pub use error::{DomainError, ErrorKind};
pub use explorer::{Explorer, Network};
pub use id::{EntityId, TransactionId};
pub use operation::{Operation, OperationRequest};
pub use response::{Payload, TransactionResponse};
pub use tokenops_amount::Amount;
pub use tokenops_signer::{SigningError, SigningStrategy};
