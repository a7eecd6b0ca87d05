//! EIP-712 domains and struct hashes for CLOB signing.
//!
//! Two domains are in play: `ClobAuthDomain` for L1 challenge signing (no
//! verifying contract) and the CTF Exchange domain for orders.

use alloy_primitives::{address, keccak256, Address, B256, U256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Chain ID for Polygon mainnet.
pub const POLYGON_CHAIN_ID: u64 = 137;

/// Chain ID for Polygon Amoy testnet.
pub const POLYGON_AMOY_CHAIN_ID: u64 = 80002;

/// CTF Exchange contract address on Polygon mainnet.
pub const CTF_EXCHANGE_ADDRESS: Address = address!("4bfb41d5b3570defd03c39a9a4d8de6bd8b8982e");

/// Neg Risk CTF Exchange contract address (Polygon mainnet and Amoy).
pub const NEG_RISK_CTF_EXCHANGE_ADDRESS: Address =
    address!("c5d563a36ae78145c45a50134d48a1215220f80a");

/// CTF Exchange contract address on Polygon Amoy.
pub const AMOY_CTF_EXCHANGE_ADDRESS: Address =
    address!("dfe02eb6733538f8ea35d585af8de5958ad99e40");

/// Attestation string embedded in every L1 challenge.
pub const CLOB_AUTH_MESSAGE: &str = "This message attests that I control the given wallet";

const CLOB_DOMAIN_NAME: &str = "ClobAuthDomain";
const CLOB_DOMAIN_VERSION: &str = "1";
const EXCHANGE_DOMAIN_NAME: &str = "Polymarket CTF Exchange";
const EXCHANGE_DOMAIN_VERSION: &str = "1";

/// EIP-712 domain separator for order signing.
#[derive(Debug, Clone)]
pub struct Eip712Domain {
    /// Domain name.
    pub name: String,
    /// Domain version.
    pub version: String,
    /// Chain ID.
    pub chain_id: U256,
    /// Verifying contract address.
    pub verifying_contract: Address,
}

/// EIP-712 domain separator for CLOB authentication (no verifyingContract).
#[derive(Debug, Clone)]
pub struct ClobAuthDomain {
    pub name: String,
    pub version: String,
    pub chain_id: U256,
}

impl ClobAuthDomain {
    /// Create the auth domain for the given chain.
    pub fn new(chain_id: u64) -> Self {
        Self {
            name: CLOB_DOMAIN_NAME.to_string(),
            version: CLOB_DOMAIN_VERSION.to_string(),
            chain_id: U256::from(chain_id),
        }
    }

    /// Compute the EIP-712 domain separator hash.
    pub fn separator(&self) -> B256 {
        let domain_type_hash =
            keccak256(b"EIP712Domain(string name,string version,uint256 chainId)");

        let name_hash = keccak256(self.name.as_bytes());
        let version_hash = keccak256(self.version.as_bytes());

        let encoded =
            (domain_type_hash, name_hash, version_hash, self.chain_id).abi_encode_packed();

        keccak256(&encoded)
    }
}

impl Eip712Domain {
    /// Exchange domain for `chain_id`, picking the neg-risk exchange when asked.
    pub fn exchange(chain_id: u64, neg_risk: bool) -> Result<Self> {
        let verifying_contract = match (chain_id, neg_risk) {
            (POLYGON_CHAIN_ID | POLYGON_AMOY_CHAIN_ID, true) => NEG_RISK_CTF_EXCHANGE_ADDRESS,
            (POLYGON_CHAIN_ID, false) => CTF_EXCHANGE_ADDRESS,
            (POLYGON_AMOY_CHAIN_ID, false) => AMOY_CTF_EXCHANGE_ADDRESS,
            _ => {
                return Err(Error::Config {
                    message: format!("No exchange contract known for chain {}", chain_id),
                })
            }
        };

        Ok(Self::custom(
            EXCHANGE_DOMAIN_NAME,
            EXCHANGE_DOMAIN_VERSION,
            chain_id,
            verifying_contract,
        ))
    }

    /// Create domain with custom parameters.
    pub fn custom(
        name: impl Into<String>,
        version: impl Into<String>,
        chain_id: u64,
        verifying_contract: Address,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            chain_id: U256::from(chain_id),
            verifying_contract,
        }
    }

    /// Compute the EIP-712 domain separator hash.
    pub fn separator(&self) -> B256 {
        let domain_type_hash = keccak256(
            b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
        );

        let name_hash = keccak256(self.name.as_bytes());
        let version_hash = keccak256(self.version.as_bytes());
        let contract_padded = B256::left_padding_from(self.verifying_contract.as_slice());

        let encoded = (
            domain_type_hash,
            name_hash,
            version_hash,
            self.chain_id,
            contract_padded,
        )
            .abi_encode_packed();

        keccak256(&encoded)
    }
}

/// Compute the EIP-712 typed data hash.
pub fn typed_data_hash(domain_separator: B256, struct_hash: B256) -> B256 {
    let prefix = [0x19u8, 0x01u8];
    let data = (prefix, domain_separator, struct_hash).abi_encode_packed();
    keccak256(&data)
}

/// EIP-712 struct hash for ClobAuth.
///
/// ClobAuth(address address, string timestamp, uint256 nonce, string message)
pub fn clob_auth_struct_hash(address: Address, timestamp: u64, nonce: u64) -> B256 {
    let type_hash =
        keccak256(b"ClobAuth(address address,string timestamp,uint256 nonce,string message)");

    let timestamp_hash = keccak256(timestamp.to_string().as_bytes());
    let message_hash = keccak256(CLOB_AUTH_MESSAGE.as_bytes());

    // encodeData left-pads the address to 32 bytes
    let address_padded = B256::left_padding_from(address.as_slice());

    let encoded = (
        type_hash,
        address_padded,
        timestamp_hash,
        U256::from(nonce),
        message_hash,
    )
        .abi_encode_packed();

    keccak256(&encoded)
}

/// The hash an identity signs to prove control for one timestamp/nonce pair.
pub fn clob_auth_hash(chain_id: u64, address: Address, timestamp: u64, nonce: u64) -> B256 {
    typed_data_hash(
        ClobAuthDomain::new(chain_id).separator(),
        clob_auth_struct_hash(address, timestamp, nonce),
    )
}

/// Order side (buy/sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy = 0,
    Sell = 1,
}

impl OrderSide {
    /// Get the numeric value for signing.
    pub fn as_u8(&self) -> u8 {
        match self {
            OrderSide::Buy => 0,
            OrderSide::Sell => 1,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Signature type for orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignatureType {
    /// EOA signature (most common).
    #[default]
    Eoa = 0,
    /// Polymarket proxy wallet signature.
    PolyProxy = 1,
    /// Polymarket Gnosis Safe signature.
    PolyGnosisSafe = 2,
}

impl SignatureType {
    /// Get the numeric value for signing.
    pub fn as_u8(&self) -> u8 {
        match self {
            SignatureType::Eoa => 0,
            SignatureType::PolyProxy => 1,
            SignatureType::PolyGnosisSafe => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SignatureType::Eoa),
            1 => Some(SignatureType::PolyProxy),
            2 => Some(SignatureType::PolyGnosisSafe),
            _ => None,
        }
    }
}
