//! The signing capability shared by the local and MPC-backed signers.
//!
//! Both variants sign a 32-byte prehash and hand back a
//! [`CanonicalSignature`]. The local one never suspends, the remote one
//! waits on the MPC network; callers await either way.

use alloy_primitives::{Address, B256};
use alloy_signer::Signer as _;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use std::str::FromStr;

use super::codec::CanonicalSignature;
use crate::{Error, Result};

/// Something that can sign a message hash for a fixed identity.
#[async_trait]
pub trait Signer: Send + Sync {
    /// The identity whose signature this signer produces.
    fn address(&self) -> Address;

    /// Sign a 32-byte message hash.
    async fn sign(&self, message_hash: B256) -> Result<CanonicalSignature>;
}

/// Signer with direct access to a secp256k1 private key.
#[derive(Clone)]
pub struct LocalSigner {
    signer: PrivateKeySigner,
}

impl LocalSigner {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    /// Create a signer from a hex-encoded private key, optionally `0x`-prefixed.
    pub fn from_private_key(key: &str) -> Result<Self> {
        let key_clean = key.trim().trim_start_matches("0x");

        let signer = PrivateKeySigner::from_str(key_clean).map_err(|e| Error::Config {
            message: format!("Invalid private key format - expected 64 hex characters: {}", e),
        })?;

        Ok(Self { signer })
    }
}

#[async_trait]
impl Signer for LocalSigner {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn sign(&self, message_hash: B256) -> Result<CanonicalSignature> {
        let signature = self
            .signer
            .sign_hash(&message_hash)
            .await
            .map_err(|e| Error::Signing {
                message: format!("Failed to sign hash: {}", e),
            })?;

        CanonicalSignature::from_bytes(signature.as_bytes())
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose the private key in debug output
        f.debug_struct("LocalSigner")
            .field("address", &format!("{:?}", self.signer.address()))
            .finish()
    }
}
