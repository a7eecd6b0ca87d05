//! Authentication headers for CLOB requests.
//!
//! L1 headers prove control of the signing identity with an EIP-712
//! `ClobAuth` signature. L2 headers sign each request with HMAC-SHA256 keyed
//! by the API secret.

use alloy_primitives::Address;
use base64::Engine;
use hmac::{Hmac, KeyInit, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;
use tracing::debug;

use super::domain::clob_auth_hash;
use super::signer::Signer;
use crate::auth::ApiCredentials;
use crate::{Error, Result};

pub const POLY_ADDRESS: &str = "POLY_ADDRESS";
pub const POLY_SIGNATURE: &str = "POLY_SIGNATURE";
pub const POLY_TIMESTAMP: &str = "POLY_TIMESTAMP";
pub const POLY_NONCE: &str = "POLY_NONCE";
pub const POLY_API_KEY: &str = "POLY_API_KEY";
pub const POLY_PASSPHRASE: &str = "POLY_PASSPHRASE";

/// The parts of an outbound request covered by the L2 signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestArgs {
    pub method: String,
    /// Path only, without host or query string.
    pub request_path: String,
    pub body: Option<String>,
}

impl RequestArgs {
    pub fn new(method: impl Into<String>, request_path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            request_path: request_path.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Header name to value, iterated in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClobHeaders(BTreeMap<&'static str, String>);

impl ClobHeaders {
    fn insert(&mut self, name: &'static str, value: impl Into<String>) {
        self.0.insert(name, value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Current Unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Build L1 headers for the current time.
pub async fn build_l1_headers(
    signer: &dyn Signer,
    chain_id: u64,
    nonce: Option<u64>,
) -> Result<ClobHeaders> {
    build_l1_headers_at(signer, chain_id, nonce, current_timestamp()).await
}

/// Build L1 headers for a fixed timestamp.
pub async fn build_l1_headers_at(
    signer: &dyn Signer,
    chain_id: u64,
    nonce: Option<u64>,
    timestamp: u64,
) -> Result<ClobHeaders> {
    let address = signer.address();
    let nonce = nonce.unwrap_or(0);

    let hash = clob_auth_hash(chain_id, address, timestamp, nonce);
    let signature = signer.sign(hash).await?;

    debug!(address = %address, timestamp, nonce, "Built L1 headers");

    let mut headers = ClobHeaders::default();
    headers.insert(POLY_ADDRESS, address.to_string());
    headers.insert(POLY_SIGNATURE, signature.to_prefixed_hex());
    headers.insert(POLY_TIMESTAMP, timestamp.to_string());
    headers.insert(POLY_NONCE, nonce.to_string());
    Ok(headers)
}

/// Build L2 headers for the current time.
pub fn build_l2_headers(
    address: Address,
    credentials: &ApiCredentials,
    request: &RequestArgs,
) -> Result<ClobHeaders> {
    build_l2_headers_at(address, credentials, request, current_timestamp())
}

/// Build L2 headers for a fixed timestamp.
pub fn build_l2_headers_at(
    address: Address,
    credentials: &ApiCredentials,
    request: &RequestArgs,
    timestamp: u64,
) -> Result<ClobHeaders> {
    let timestamp = timestamp.to_string();
    let signature = sign_l2_request(
        credentials,
        &request.method,
        &request.request_path,
        &timestamp,
        request.body.as_deref(),
    )?;

    let mut headers = ClobHeaders::default();
    headers.insert(POLY_ADDRESS, address.to_string());
    headers.insert(POLY_SIGNATURE, signature);
    headers.insert(POLY_TIMESTAMP, timestamp);
    headers.insert(POLY_API_KEY, credentials.api_key.clone());
    headers.insert(POLY_PASSPHRASE, credentials.api_passphrase.clone());
    Ok(headers)
}

/// Sign a request with HMAC-SHA256 for L2 authentication.
pub fn sign_l2_request(
    credentials: &ApiCredentials,
    method: &str,
    path: &str,
    timestamp: &str,
    body: Option<&str>,
) -> Result<String> {
    // timestamp + method + path + body
    let message = match body {
        Some(b) => format!("{}{}{}{}", timestamp, method, path, b),
        None => format!("{}{}{}", timestamp, method, path),
    };

    // Secrets are URL-safe base64; accept the unpadded and standard alphabets too
    let secret_bytes = base64::engine::general_purpose::URL_SAFE
        .decode(&credentials.api_secret)
        .or_else(|_| {
            base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(&credentials.api_secret)
        })
        .or_else(|_| base64::engine::general_purpose::STANDARD.decode(&credentials.api_secret))
        .map_err(|e| Error::Signing {
            message: format!("Invalid API secret encoding: {}", e),
        })?;

    let mut mac = Hmac::<Sha256>::new_from_slice(&secret_bytes).map_err(|e| Error::Signing {
        message: format!("Failed to create HMAC: {}", e),
    })?;

    mac.update(message.as_bytes());
    let result = mac.finalize();

    Ok(base64::engine::general_purpose::URL_SAFE.encode(result.into_bytes()))
}
