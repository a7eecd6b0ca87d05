//! Signing for CLOB authentication and orders.
//!
//! # Architecture
//!
//! ```text
//! LocalSigner ──┐
//!               ├── Signer::sign(hash) ──► CanonicalSignature
//! MpcSigner ────┘         ▲
//!     │                   │ reconstruct + verify (codec)
//!     ▼                   │
//! MpcNetwork (NearRpcNetwork) ── sign_hash ──► MPC contract
//!
//! CanonicalSignature ──► headers (L1 EIP-712 ClobAuth)
//!                    ──► order_builder (EIP-712 Order)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use clob_core::signing::{build_l1_headers, LocalSigner, POLYGON_CHAIN_ID};
//!
//! let signer = LocalSigner::from_private_key("0x...")?;
//! let headers = build_l1_headers(&signer, POLYGON_CHAIN_ID, None).await?;
//! ```

pub mod codec;
pub mod domain;
pub mod headers;
pub mod near;
pub mod order_builder;
pub mod order_types;
pub mod remote;
pub mod signer;

pub use codec::{reconstruct, reconstruct_verified, CanonicalSignature, SignatureComponents};

pub use domain::{
    Eip712Domain, OrderSide, SignatureType, AMOY_CTF_EXCHANGE_ADDRESS, CTF_EXCHANGE_ADDRESS,
    NEG_RISK_CTF_EXCHANGE_ADDRESS, POLYGON_AMOY_CHAIN_ID, POLYGON_CHAIN_ID,
};

pub use headers::{build_l1_headers, build_l2_headers, ClobHeaders, RequestArgs};

pub use near::NearRpcNetwork;

pub use order_builder::{buy_market_price, sell_market_price, ExchangeOrderBuilder, OrderBuilder};

pub use order_types::{OrderData, SignedOrder};

pub use remote::{ExecutionStatus, FunctionCall, MpcNetwork, MpcSigner};

pub use signer::{LocalSigner, Signer};
