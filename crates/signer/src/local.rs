//! In-process secp256k1 signing with a local private key.

use alloy::primitives::{Address, B256, Bytes, U256, keccak256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::{Signature, SignerSync};
use tracing::debug;

use crate::{SigningError, SigningRequest};

const SIGNATURE_LEN: usize = 64;

/// Signs `keccak256(payload)` and returns the 64-byte `r || s` layout.
#[derive(Clone)]
pub struct LocalKeySigner {
    signer: PrivateKeySigner,
}

impl std::fmt::Debug for LocalKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeySigner")
            .field("address", &self.signer.address())
            .finish_non_exhaustive()
    }
}

impl LocalKeySigner {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    /// Parse a hex-encoded private key, with or without `0x` prefix.
    pub fn from_hex(key: &str) -> Result<Self, SigningError> {
        let key: B256 = key
            .trim_start_matches("0x")
            .parse()
            .map_err(|e: alloy::hex::FromHexError| SigningError::InvalidKey(e.to_string()))?;

        let signer = PrivateKeySigner::from_bytes(&key)
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;

        Ok(Self::new(signer))
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn sign(&self, request: &SigningRequest) -> Result<Bytes, SigningError> {
        if request.payload.is_empty() {
            return Err(SigningError::MalformedPayload(
                "payload is empty".to_string(),
            ));
        }

        let hash = keccak256(&request.payload);
        let signature = self
            .signer
            .sign_hash_sync(&hash)
            .map_err(|e| SigningError::MalformedPayload(e.to_string()))?;

        debug!(signer = %self.signer.address(), %hash, "Signed payload with local key");

        Ok(compact_bytes(&signature))
    }
}

fn compact_bytes(signature: &Signature) -> Bytes {
    let mut out = Vec::with_capacity(SIGNATURE_LEN);
    out.extend_from_slice(&signature.r().to_be_bytes::<32>());
    out.extend_from_slice(&signature.s().to_be_bytes::<32>());
    out.into()
}

/// Check that a 64-byte `r || s` signature over `keccak256(payload)` was
/// produced by `expected`.
///
/// The recovery id is not part of the layout, so both parities are tried.
pub fn verify_secp256k1(
    payload: &[u8],
    signature: &[u8],
    expected: Address,
) -> Result<bool, SigningError> {
    if signature.len() != SIGNATURE_LEN {
        return Err(SigningError::MalformedSignature(format!(
            "expected {SIGNATURE_LEN} bytes, got {}",
            signature.len()
        )));
    }

    let r = U256::from_be_slice(&signature[..32]);
    let s = U256::from_be_slice(&signature[32..]);
    let hash = keccak256(payload);

    Ok([false, true].into_iter().any(|parity| {
        Signature::new(r, s, parity)
            .recover_address_from_prehash(&hash)
            .is_ok_and(|recovered| recovered == expected)
    }))
}
