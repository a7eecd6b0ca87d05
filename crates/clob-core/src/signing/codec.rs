//! Canonical ECDSA signature handling.
//!
//! The MPC network returns signatures as a compressed curve point, a scalar
//! and a recovery id. The CLOB only accepts the 65-byte `r || s || v` form,
//! so everything that leaves a [`Signer`](super::Signer) goes through
//! [`reconstruct`] first.

use alloy_primitives::{keccak256, Address, B256};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Length of a hex-encoded 32-byte scalar.
const SCALAR_HEX_LEN: usize = 64;

/// Offset added to the recovery id to form the legacy `v` byte.
const V_OFFSET: u8 = 27;

/// Signature as returned by the MPC contract, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureComponents {
    pub big_r: AffinePoint,
    pub s: Scalar,
    pub recovery_id: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffinePoint {
    pub affine_point: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scalar {
    pub scalar: String,
}

impl SignatureComponents {
    pub fn new(
        affine_point: impl Into<String>,
        scalar: impl Into<String>,
        recovery_id: u8,
    ) -> Self {
        Self {
            big_r: AffinePoint {
                affine_point: affine_point.into(),
            },
            s: Scalar {
                scalar: scalar.into(),
            },
            recovery_id,
        }
    }
}

/// A 65-byte `r || s || v` signature with `v` in `{27, 28}`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanonicalSignature([u8; 65]);

impl CanonicalSignature {
    /// Build from raw bytes, checking that `v` is 27 or 28.
    pub fn from_bytes(bytes: [u8; 65]) -> Result<Self> {
        match bytes[64] {
            27 | 28 => Ok(Self(bytes)),
            v => Err(Error::MalformedSignatureComponents {
                message: format!("v must be 27 or 28, got {}", v),
            }),
        }
    }

    pub fn r(&self) -> &[u8] {
        &self.0[..32]
    }

    pub fn s(&self) -> &[u8] {
        &self.0[32..64]
    }

    pub fn v(&self) -> u8 {
        self.0[64]
    }

    /// Recovery id (`v - 27`).
    pub fn recovery_id(&self) -> u8 {
        self.0[64] - V_OFFSET
    }

    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    /// Lowercase hex without prefix (130 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Transport form used in headers and order payloads.
    pub fn to_prefixed_hex(&self) -> String {
        format!("0x{}", self.to_hex())
    }

    /// Recover the address that produced this signature over `hash`.
    pub fn recover_address(&self, hash: &B256) -> Result<Address> {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(self.r());
        s.copy_from_slice(self.s());
        recover_address(hash, &r, &s, self.recovery_id())
    }
}

impl fmt::Display for CanonicalSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for CanonicalSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CanonicalSignature({})", self)
    }
}

/// Normalize MPC signature components into a [`CanonicalSignature`].
pub fn reconstruct(components: &SignatureComponents) -> Result<CanonicalSignature> {
    if components.recovery_id > 1 {
        return Err(Error::MalformedSignatureComponents {
            message: format!("recovery id must be 0 or 1, got {}", components.recovery_id),
        });
    }

    let r_hex = strip_parity_marker(strip_hex_prefix(&components.big_r.affine_point));
    let s_hex = strip_hex_prefix(&components.s.scalar);

    let r = decode_scalar("r", r_hex)?;
    let s = decode_scalar("s", s_hex)?;

    let mut bytes = [0u8; 65];
    bytes[..32].copy_from_slice(&r);
    bytes[32..64].copy_from_slice(&s);
    bytes[64] = V_OFFSET + components.recovery_id;

    Ok(CanonicalSignature(bytes))
}

/// Reconstruct and check that the signature recovers to `expected`.
///
/// A mismatch is an error: the signature would be rejected by the venue, or
/// worse, attributed to another identity.
pub fn reconstruct_verified(
    components: &SignatureComponents,
    hash: &B256,
    expected: Address,
) -> Result<CanonicalSignature> {
    let signature = reconstruct(components)?;
    verify(&signature, hash, expected)?;
    Ok(signature)
}

/// Check that `signature` over `hash` was produced by `expected`.
pub fn verify(signature: &CanonicalSignature, hash: &B256, expected: Address) -> Result<()> {
    let recovered = signature.recover_address(hash)?;

    // Address equality is byte equality, which is the case-insensitive hex comparison.
    if recovered != expected {
        return Err(Error::SignatureVerificationFailed {
            expected: format!("{:?}", expected),
            recovered: format!("{:?}", recovered),
        });
    }

    Ok(())
}

/// Recover an address from a prehashed message using secp256k1.
pub fn recover_address(
    hash: &B256,
    r: &[u8; 32],
    s: &[u8; 32],
    recovery_id: u8,
) -> Result<Address> {
    let mut recovery_id = RecoveryId::from_byte(recovery_id).ok_or_else(|| {
        Error::MalformedSignatureComponents {
            message: format!("invalid recovery id: {}", recovery_id),
        }
    })?;

    let mut sig_bytes = [0u8; 64];
    sig_bytes[..32].copy_from_slice(r);
    sig_bytes[32..].copy_from_slice(s);

    let mut signature =
        Signature::from_slice(&sig_bytes).map_err(|e| Error::MalformedSignatureComponents {
            message: format!("invalid signature: {}", e),
        })?;

    // k256 only recovers low-s signatures; flipping s flips the parity bit.
    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let verifying_key = VerifyingKey::recover_from_prehash(hash.as_slice(), &signature, recovery_id)
        .map_err(|e| Error::SignatureVerificationFailed {
            expected: "recoverable signature".to_string(),
            recovered: format!("nothing ({})", e),
        })?;

    // keccak256 of the uncompressed public key, last 20 bytes
    let public_key = verifying_key.to_encoded_point(false);
    let public_key_hash = keccak256(&public_key.as_bytes()[1..]);

    Ok(Address::from_slice(&public_key_hash[12..]))
}

fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Drop the one-byte parity marker of a compressed point.
///
/// A point of exactly 64 hex characters is already a bare x-coordinate and is
/// left alone, even when it starts with `02` or `03`.
fn strip_parity_marker(point: &str) -> &str {
    if point.len() == SCALAR_HEX_LEN {
        return point;
    }
    point
        .strip_prefix("02")
        .or_else(|| point.strip_prefix("03"))
        .unwrap_or(point)
}

fn decode_scalar(name: &str, value: &str) -> Result<[u8; 32]> {
    if value.len() > SCALAR_HEX_LEN {
        return Err(Error::MalformedSignatureComponents {
            message: format!(
                "{} has {} hex characters, at most {} allowed",
                name,
                value.len(),
                SCALAR_HEX_LEN
            ),
        });
    }

    let padded = format!("{:0>64}", value.to_ascii_lowercase());
    let mut out = [0u8; 32];
    hex::decode_to_slice(&padded, &mut out).map_err(|e| Error::MalformedSignatureComponents {
        message: format!("{} is not valid hex: {}", name, e),
    })?;

    Ok(out)
}
