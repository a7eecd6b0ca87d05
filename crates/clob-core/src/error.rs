//! Error types for the CLOB client core.

use crate::auth::AuthLevel;
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("API error: {message}")]
    Api { message: String, status: Option<u16> },

    #[error("Authentication level {actual} is insufficient, {required} required")]
    AuthLevel { required: AuthLevel, actual: AuthLevel },

    #[error("Unexpected remote signer result: {message}")]
    SignerProtocol { message: String },

    #[error("Remote signer did not respond within {elapsed:?}")]
    SignerTimeout { elapsed: Duration },

    #[error("Malformed signature components: {message}")]
    MalformedSignatureComponents { message: String },

    #[error("Signature verification failed: recovered {recovered} but expected {expected}")]
    SignatureVerificationFailed { expected: String, recovered: String },

    #[error("Invalid tick size ({requested}), minimum for the market is {minimum}")]
    TickSizeTooSmall { requested: Decimal, minimum: Decimal },

    #[error("Price ({price}) out of range, min: {min} - max: {max}")]
    PriceOutOfRange {
        price: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("No matching liquidity for {side} on token {token_id}")]
    NoMatchingLiquidity { token_id: String, side: String },

    /// Venue has no book for the token. Pricing reports it as
    /// `NoMatchingLiquidity`; only direct `VenueApi` callers see this.
    #[error("No order book for token {token_id}")]
    NoOrderBook { token_id: String },

    #[error("Signing error: {message}")]
    Signing { message: String },

    #[error("Order error: {message}")]
    Order { message: String },
}

impl Error {
    /// Whether the failure came from the signing pipeline itself.
    ///
    /// Retrying the same request through another endpoint would hit the same
    /// signer and fail the same way.
    pub fn is_signer_failure(&self) -> bool {
        matches!(
            self,
            Error::SignerProtocol { .. }
                | Error::SignerTimeout { .. }
                | Error::MalformedSignatureComponents { .. }
                | Error::SignatureVerificationFailed { .. }
                | Error::Signing { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
