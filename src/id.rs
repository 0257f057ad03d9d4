//! Ledger entity and transaction identifiers.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("invalid entity id {0:?}, expected shard.realm.num")]
    Entity(String),
    #[error("invalid transaction id {0:?}, expected payer@seconds.nanos")]
    Transaction(String),
}

/// `shard.realm.num` identifier for accounts, tokens and contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    pub shard: u32,
    pub realm: u64,
    pub num: u64,
}

impl EntityId {
    pub const fn new(shard: u32, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }

    /// The 20-byte "long-zero" address: 4 bytes shard, 8 realm, 8 num.
    pub fn to_evm_address(self) -> Address {
        let mut bytes = [0u8; 20];
        bytes[..4].copy_from_slice(&self.shard.to_be_bytes());
        bytes[4..12].copy_from_slice(&self.realm.to_be_bytes());
        bytes[12..].copy_from_slice(&self.num.to_be_bytes());
        Address::from(bytes)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl FromStr for EntityId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IdError::Entity(s.to_string());
        let mut parts = s.split('.');

        let (Some(shard), Some(realm), Some(num), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        Ok(Self {
            shard: shard.parse().map_err(|_| invalid())?,
            realm: realm.parse().map_err(|_| invalid())?,
            num: num.parse().map_err(|_| invalid())?,
        })
    }
}

impl TryFrom<String> for EntityId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}

/// Payer account plus valid-start timestamp, e.g. `0.0.2@1700000000.000000123`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId {
    pub payer: EntityId,
    pub seconds: i64,
    pub nanos: u32,
}

impl TransactionId {
    pub fn new(payer: EntityId, valid_start: DateTime<Utc>) -> Self {
        Self {
            payer,
            seconds: valid_start.timestamp(),
            nanos: valid_start.timestamp_subsec_nanos(),
        }
    }

    pub fn generate(payer: EntityId) -> Self {
        Self::new(payer, Utc::now())
    }

    /// `payer-seconds-nanos`, the form explorers use in paths.
    pub fn to_path_segment(&self) -> String {
        format!("{}-{}-{:09}", self.payer, self.seconds, self.nanos)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}.{:09}", self.payer, self.seconds, self.nanos)
    }
}

impl FromStr for TransactionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IdError::Transaction(s.to_string());

        let (payer, start) = s.split_once('@').ok_or_else(invalid)?;
        let (seconds, nanos) = start.split_once('.').ok_or_else(invalid)?;

        let nanos: u32 = nanos.parse().map_err(|_| invalid())?;
        if nanos >= 1_000_000_000 {
            return Err(invalid());
        }

        Ok(Self {
            payer: payer.parse().map_err(|_| invalid())?,
            seconds: seconds.parse().map_err(|_| invalid())?,
            nanos,
        })
    }
}

impl Serialize for TransactionId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TransactionId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn entity_id_parses_and_displays() {
        let id: EntityId = "0.0.1234".parse().unwrap();
        assert_eq!(id, EntityId::new(0, 0, 1234));
        assert_eq!(id.to_string(), "0.0.1234");
    }

    #[test]
    fn entity_id_rejects_malformed_input() {
        for input in ["", "0.0", "0.0.1.2", "a.b.c", "0.0.-1", "0..1"] {
            assert!(input.parse::<EntityId>().is_err(), "{input:?} should fail");
        }
    }

    #[test]
    fn long_zero_address_encodes_num_in_low_bytes() {
        let address = EntityId::new(0, 0, 0x1234).to_evm_address();
        assert_eq!(
            address,
            "0x0000000000000000000000000000000000001234"
                .parse::<Address>()
                .unwrap()
        );
    }

    #[test]
    fn long_zero_address_places_shard_and_realm() {
        let address = EntityId::new(1, 2, 3).to_evm_address();
        assert_eq!(
            address,
            "0x0000000100000000000000020000000000000003"
                .parse::<Address>()
                .unwrap()
        );
    }

    #[test]
    fn entity_id_serde_is_string() {
        let id = EntityId::new(0, 0, 42);
        assert_eq!(serde_json::to_value(id).unwrap(), serde_json::json!("0.0.42"));
        assert_eq!(
            serde_json::from_value::<EntityId>(serde_json::json!("0.0.42")).unwrap(),
            id
        );
    }

    #[test]
    fn transaction_id_pads_nanos() {
        let start = Utc.timestamp_opt(1_700_000_000, 123).unwrap();
        let id = TransactionId::new(EntityId::new(0, 0, 2), start);

        assert_eq!(id.to_string(), "0.0.2@1700000000.000000123");
        assert_eq!(id.to_path_segment(), "0.0.2-1700000000-000000123");
    }

    #[test]
    fn transaction_id_round_trips_through_display() {
        let id: TransactionId = "0.0.98@1690000000.500000000".parse().unwrap();
        assert_eq!(id.payer, EntityId::new(0, 0, 98));
        assert_eq!(id.seconds, 1_690_000_000);
        assert_eq!(id.nanos, 500_000_000);
        assert_eq!(id.to_string().parse::<TransactionId>().unwrap(), id);
    }

    #[test]
    fn transaction_id_rejects_out_of_range_nanos() {
        assert!("0.0.2@1.1000000000".parse::<TransactionId>().is_err());
        assert!("0.0.2-1-1".parse::<TransactionId>().is_err());
    }
}
