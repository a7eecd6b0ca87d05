//! Order payloads for EIP-712 signing and submission.

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

use super::codec::CanonicalSignature;
use super::domain::{typed_data_hash, Eip712Domain, OrderSide, SignatureType};

const ORDER_TYPE: &[u8] = b"Order(uint256 salt,address maker,address signer,address taker,uint256 tokenId,uint256 makerAmount,uint256 takerAmount,uint256 expiration,uint256 nonce,uint256 feeRateBps,uint8 side,uint8 signatureType)";

/// The exchange's `Order` struct, in signing units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderData {
    pub salt: U256,
    /// Funds source; the funder for proxy wallets, otherwise the signer.
    pub maker: Address,
    pub signer: Address,
    /// Zero for any taker.
    pub taker: Address,
    pub token_id: U256,
    /// Amounts in 6-decimal base units.
    pub maker_amount: U256,
    pub taker_amount: U256,
    /// Unix seconds; zero for orders that do not expire.
    pub expiration: U256,
    pub nonce: U256,
    pub fee_rate_bps: U256,
    pub side: OrderSide,
    pub signature_type: SignatureType,
}

impl OrderData {
    /// Compute the EIP-712 struct hash for this order.
    pub fn struct_hash(&self) -> B256 {
        // encodeData pads every member, addresses included, to 32 bytes
        let encoded = (
            keccak256(ORDER_TYPE),
            self.salt,
            B256::left_padding_from(self.maker.as_slice()),
            B256::left_padding_from(self.signer.as_slice()),
            B256::left_padding_from(self.taker.as_slice()),
            self.token_id,
            self.maker_amount,
            self.taker_amount,
            self.expiration,
            self.nonce,
            self.fee_rate_bps,
            U256::from(self.side.as_u8()),
            U256::from(self.signature_type.as_u8()),
        )
            .abi_encode_packed();

        keccak256(&encoded)
    }

    /// The digest the maker signs under `domain`.
    pub fn signing_hash(&self, domain: &Eip712Domain) -> B256 {
        typed_data_hash(domain.separator(), self.struct_hash())
    }
}

/// Salt for order uniqueness.
///
/// Masked to 2^53-1 so it survives a round trip through a JSON number.
pub fn generate_salt() -> u64 {
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default() as u64;
    let mixed = nanos ^ ((std::process::id() as u64) << 32);
    mixed & ((1u64 << 53) - 1)
}

/// A signed order ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedOrder {
    /// Must be a JSON number.
    pub salt: u64,
    pub maker: String,
    pub signer: String,
    pub taker: String,
    #[serde(rename = "tokenId")]
    pub token_id: String,
    #[serde(rename = "makerAmount")]
    pub maker_amount: String,
    #[serde(rename = "takerAmount")]
    pub taker_amount: String,
    pub expiration: String,
    pub nonce: String,
    #[serde(rename = "feeRateBps")]
    pub fee_rate_bps: String,
    pub side: OrderSide,
    #[serde(rename = "signatureType")]
    pub signature_type: u8,
    /// `0x`-prefixed r ‖ s ‖ v.
    pub signature: String,
}

impl SignedOrder {
    pub fn from_order_data(order: &OrderData, signature: &CanonicalSignature) -> Self {
        Self {
            salt: order.salt.saturating_to::<u64>(),
            maker: order.maker.to_string(),
            signer: order.signer.to_string(),
            taker: order.taker.to_string(),
            token_id: order.token_id.to_string(),
            maker_amount: order.maker_amount.to_string(),
            taker_amount: order.taker_amount.to_string(),
            expiration: order.expiration.to_string(),
            nonce: order.nonce.to_string(),
            fee_rate_bps: order.fee_rate_bps.to_string(),
            side: order.side,
            signature_type: order.signature_type.as_u8(),
            signature: signature.to_prefixed_hex(),
        }
    }
}
