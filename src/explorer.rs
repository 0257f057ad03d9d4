//! Explorer links attached to diagnostics.

use std::fmt;

use serde::Deserialize;
use url::Url;

use crate::id::TransactionId;

pub const DEFAULT_EXPLORER_URL: &str = "https://hashscan.io/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Previewnet,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Previewnet => "previewnet",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explorer {
    base: Url,
    network: Network,
}

impl Explorer {
    /// `base` is normalized to end with `/` so paths append instead of
    /// replacing its last segment.
    pub fn new(mut base: Url, network: Network) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self { base, network }
    }

    pub fn hashscan(network: Network) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(DEFAULT_EXPLORER_URL)?, network))
    }

    pub const fn network(&self) -> Network {
        self.network
    }

    pub fn transaction_url(&self, id: &TransactionId) -> Result<Url, url::ParseError> {
        self.base.join(&format!(
            "{}/transactionsById/{}",
            self.network,
            id.to_path_segment()
        ))
    }
}
