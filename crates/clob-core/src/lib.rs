//! CLOB Client Core Library
//!
//! Authentication levels, request and order signing through a local key or an
//! MPC network, and market-order pricing against the live order book.

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod market_cache;
pub mod pricing;
pub mod signing;
pub mod types;

pub use auth::{ApiCredentials, AuthContext, AuthLevel};
pub use client::MpcClobClient;
pub use config::{Config, MpcConfig};
pub use error::{Error, Result};
pub use market_cache::MarketCache;
pub use pricing::{price_valid, PricingEngine};
