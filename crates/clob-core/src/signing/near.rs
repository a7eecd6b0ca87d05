//! JSON-RPC transport to the NEAR network hosting the MPC contract.
//!
//! Each call looks up the access-key nonce and a recent block hash, builds a
//! single-action function-call transaction, signs its SHA-256 with the
//! account's ed25519 key and waits for the final status via
//! `broadcast_tx_commit`.
//!
//! Calls through one [`NearRpcNetwork`] are serialized: the nonce lookup and
//! the broadcast happen under a single lock, and the last nonce sent is
//! remembered so a node that has not caught up cannot hand it out twice.

use async_trait::async_trait;
use base64::Engine;
use ed25519_dalek::{Signer as _, SigningKey};
use serde::{de::DeserializeOwned, Deserialize};
use sha2::{Digest, Sha256};
use std::time::Duration as StdDuration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::remote::{ExecutionStatus, FunctionCall, MpcNetwork};
use crate::{Error, Result};

/// Public RPC endpoint for mainnet.
pub const MAINNET_RPC_URL: &str = "https://near.drpc.org";

/// Public RPC endpoint for testnet.
pub const TESTNET_RPC_URL: &str = "https://test.rpc.fastnear.com";

const ED25519_KEY_PREFIX: &str = "ed25519:";
const ED25519_KEY_TYPE: u8 = 0;
const FUNCTION_CALL_ACTION: u8 = 2;

/// `broadcast_tx_commit` blocks until the transaction is final.
const RPC_TIMEOUT_SECS: u64 = 90;

/// RPC endpoint for a network name; anything other than `mainnet` is testnet.
pub fn rpc_url_for(network: &str) -> &'static str {
    if network == "mainnet" {
        MAINNET_RPC_URL
    } else {
        TESTNET_RPC_URL
    }
}

/// A NEAR account able to sign function-call transactions.
pub struct NearRpcNetwork {
    rpc_url: String,
    account_id: String,
    signing_key: SigningKey,
    http_client: reqwest::Client,
    /// Last access-key nonce used; held for the whole call.
    last_nonce: Mutex<u64>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct AccessKeyView {
    nonce: u64,
    block_hash: String,
}

#[derive(Debug, Deserialize)]
struct FinalExecutionOutcome {
    status: ExecutionStatus,
}

impl NearRpcNetwork {
    /// Create a transport for `account_id` using an `ed25519:<base58>` secret key.
    pub fn new(account_id: impl Into<String>, private_key: &str, network: &str) -> Result<Self> {
        Self::with_rpc_url(account_id, private_key, rpc_url_for(network))
    }

    pub fn with_rpc_url(
        account_id: impl Into<String>,
        private_key: &str,
        rpc_url: impl Into<String>,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(RPC_TIMEOUT_SECS))
            .connect_timeout(StdDuration::from_secs(10))
            .build()?;

        Ok(Self {
            rpc_url: rpc_url.into(),
            account_id: account_id.into(),
            signing_key: parse_secret_key(private_key)?,
            http_client,
            last_nonce: Mutex::new(0),
        })
    }

    /// Public key in `ed25519:<base58>` form.
    pub fn public_key(&self) -> String {
        format!(
            "{}{}",
            ED25519_KEY_PREFIX,
            bs58::encode(self.signing_key.verifying_key().to_bytes()).into_string()
        )
    }

    async fn rpc<T: DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> Result<T> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": "clob-core",
            "method": method,
            "params": params,
        });

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                message: format!("RPC {} failed: {} - {}", method, status, text),
                status: Some(status),
            });
        }

        let body: RpcResponse<serde_json::Value> = response.json().await?;
        if let Some(error) = body.error {
            return Err(Error::Api {
                message: format!("RPC {} returned error: {}", method, error),
                status: None,
            });
        }

        let result = body.result.ok_or_else(|| Error::Api {
            message: format!("RPC {} returned neither result nor error", method),
            status: None,
        })?;

        // Query errors arrive inside `result`
        if let Some(error) = result.get("error") {
            return Err(Error::Api {
                message: format!("RPC {} query error: {}", method, error),
                status: None,
            });
        }

        Ok(serde_json::from_value(result)?)
    }

    async fn access_key(&self) -> Result<AccessKeyView> {
        self.rpc(
            "query",
            serde_json::json!({
                "request_type": "view_access_key",
                "finality": "final",
                "account_id": self.account_id,
                "public_key": self.public_key(),
            }),
        )
        .await
    }
}

#[async_trait]
impl MpcNetwork for NearRpcNetwork {
    async fn function_call(&self, call: FunctionCall) -> Result<ExecutionStatus> {
        let mut last_nonce = self.last_nonce.lock().await;

        let access_key = self.access_key().await?;
        let block_hash = decode_block_hash(&access_key.block_hash)?;
        let nonce = next_nonce(access_key.nonce, *last_nonce);
        *last_nonce = nonce;

        let transaction = TransactionParts {
            signer_id: &self.account_id,
            public_key: self.signing_key.verifying_key().to_bytes(),
            nonce,
            receiver_id: &call.receiver_id,
            block_hash,
            method_name: &call.method_name,
            args: serde_json::to_vec(&call.args)?,
            gas: call.gas,
            deposit: call.deposit,
        };

        let signed = sign_transaction(&transaction, &self.signing_key);
        let encoded = base64::engine::general_purpose::STANDARD.encode(&signed);

        debug!(
            receiver = %call.receiver_id,
            method = %call.method_name,
            nonce = transaction.nonce,
            "Broadcasting function call"
        );

        let outcome: FinalExecutionOutcome = self
            .rpc("broadcast_tx_commit", serde_json::json!([encoded]))
            .await
            .map_err(|e| {
                warn!(error = %e, receiver = %call.receiver_id, "Function call broadcast failed");
                e
            })?;

        info!(
            receiver = %call.receiver_id,
            method = %call.method_name,
            "Function call finalized"
        );

        Ok(outcome.status)
    }
}

impl std::fmt::Debug for NearRpcNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NearRpcNetwork")
            .field("rpc_url", &self.rpc_url)
            .field("account_id", &self.account_id)
            .field("public_key", &self.public_key())
            .finish()
    }
}

/// Fields of a single-action function-call transaction.
struct TransactionParts<'a> {
    signer_id: &'a str,
    public_key: [u8; 32],
    nonce: u64,
    receiver_id: &'a str,
    block_hash: [u8; 32],
    method_name: &'a str,
    args: Vec<u8>,
    gas: u64,
    deposit: u128,
}

impl TransactionParts<'_> {
    /// Binary encoding: little-endian integers, u32-length-prefixed strings and
    /// vectors, one-byte enum tags.
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256 + self.args.len());

        put_bytes(&mut out, self.signer_id.as_bytes());
        out.push(ED25519_KEY_TYPE);
        out.extend_from_slice(&self.public_key);
        out.extend_from_slice(&self.nonce.to_le_bytes());
        put_bytes(&mut out, self.receiver_id.as_bytes());
        out.extend_from_slice(&self.block_hash);

        // actions: one FunctionCall
        out.extend_from_slice(&1u32.to_le_bytes());
        out.push(FUNCTION_CALL_ACTION);
        put_bytes(&mut out, self.method_name.as_bytes());
        put_bytes(&mut out, &self.args);
        out.extend_from_slice(&self.gas.to_le_bytes());
        out.extend_from_slice(&self.deposit.to_le_bytes());

        out
    }
}

/// Next access-key nonce: above both the chain's view and the last one sent.
fn next_nonce(chain_nonce: u64, last_sent: u64) -> u64 {
    chain_nonce.max(last_sent) + 1
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

/// Encode and sign a transaction, returning the signed-transaction bytes.
fn sign_transaction(transaction: &TransactionParts<'_>, key: &SigningKey) -> Vec<u8> {
    let mut encoded = transaction.encode();
    let hash = Sha256::digest(&encoded);
    let signature = key.sign(hash.as_slice());

    encoded.push(ED25519_KEY_TYPE);
    encoded.extend_from_slice(&signature.to_bytes());
    encoded
}

/// Parse an `ed25519:<base58>` secret key (64-byte keypair or 32-byte seed).
fn parse_secret_key(key: &str) -> Result<SigningKey> {
    let encoded = key.trim().strip_prefix(ED25519_KEY_PREFIX).ok_or_else(|| Error::Config {
        message: "MPC account key must start with \"ed25519:\"".to_string(),
    })?;

    let bytes = bs58::decode(encoded).into_vec().map_err(|e| Error::Config {
        message: format!("MPC account key is not base58: {}", e),
    })?;

    let seed: [u8; 32] = match bytes.len() {
        32 | 64 => {
            let mut seed = [0u8; 32];
            seed.copy_from_slice(&bytes[..32]);
            seed
        }
        n => {
            return Err(Error::Config {
                message: format!("MPC account key has {} bytes, expected 32 or 64", n),
            })
        }
    };

    Ok(SigningKey::from_bytes(&seed))
}

fn decode_block_hash(encoded: &str) -> Result<[u8; 32]> {
    let bytes = bs58::decode(encoded).into_vec().map_err(|e| Error::Api {
        message: format!("Invalid block hash {}: {}", encoded, e),
        status: None,
    })?;

    bytes.try_into().map_err(|_| Error::Api {
        message: format!("Block hash {} is not 32 bytes", encoded),
        status: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier};
    use httpmock::prelude::*;

    const SEED: [u8; 32] = [7u8; 32];

    fn secret_key() -> String {
        let key = SigningKey::from_bytes(&SEED);
        let mut pair = SEED.to_vec();
        pair.extend_from_slice(&key.verifying_key().to_bytes());
        format!("ed25519:{}", bs58::encode(pair).into_string())
    }

    fn sample_call() -> FunctionCall {
        FunctionCall {
            receiver_id: "mpc.testnet".to_string(),
            method_name: "sign_hash".to_string(),
            args: serde_json::json!({"hash": "00", "path": "ethereum-1"}),
            gas: 300_000_000_000_000,
            deposit: 1,
        }
    }

    #[test]
    fn test_rpc_url_for_network() {
        assert_eq!(rpc_url_for("mainnet"), MAINNET_RPC_URL);
        assert_eq!(rpc_url_for("testnet"), TESTNET_RPC_URL);
        assert_eq!(rpc_url_for("anything"), TESTNET_RPC_URL);
    }

    #[test]
    fn test_parse_secret_key_forms() {
        let from_pair = parse_secret_key(&secret_key()).unwrap();
        let from_seed =
            parse_secret_key(&format!("ed25519:{}", bs58::encode(SEED).into_string())).unwrap();
        assert_eq!(from_pair.to_bytes(), from_seed.to_bytes());

        assert!(parse_secret_key("secp256k1:abc").is_err());
        assert!(parse_secret_key("ed25519:111").is_err());
    }

    #[test]
    fn test_transaction_layout_and_signature() {
        let key = SigningKey::from_bytes(&SEED);
        let transaction = TransactionParts {
            signer_id: "agent.testnet",
            public_key: key.verifying_key().to_bytes(),
            nonce: 42,
            receiver_id: "mpc.testnet",
            block_hash: [9u8; 32],
            method_name: "sign_hash",
            args: b"{}".to_vec(),
            gas: 5,
            deposit: 1,
        };

        let encoded = transaction.encode();
        // signer id length prefix + bytes
        assert_eq!(&encoded[..4], &13u32.to_le_bytes());
        assert_eq!(&encoded[4..17], b"agent.testnet");
        assert_eq!(encoded[17], ED25519_KEY_TYPE);
        // tail: gas (8) + deposit (16)
        let tail = &encoded[encoded.len() - 24..];
        assert_eq!(&tail[..8], &5u64.to_le_bytes());
        assert_eq!(&tail[8..], &1u128.to_le_bytes());

        let signed = sign_transaction(&transaction, &key);
        assert_eq!(signed.len(), encoded.len() + 65);
        assert_eq!(signed[encoded.len()], ED25519_KEY_TYPE);

        let signature = Signature::from_slice(&signed[encoded.len() + 1..]).unwrap();
        let hash = Sha256::digest(&encoded);
        assert!(key.verifying_key().verify(hash.as_slice(), &signature).is_ok());
    }

    #[tokio::test]
    async fn test_function_call_returns_final_status() {
        let server = MockServer::start_async().await;

        // One body serves both the access-key query and the broadcast
        let rpc = server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(200).json_body(serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": "clob-core",
                    "result": {
                        "nonce": 10,
                        "permission": "FullAccess",
                        "block_hash": bs58::encode([1u8; 32]).into_string(),
                        "status": { "SuccessValue": "e30=" },
                    }
                }));
            })
            .await;

        let network =
            NearRpcNetwork::with_rpc_url("agent.testnet", &secret_key(), server.url("/")).unwrap();
        let status = network.function_call(sample_call()).await.unwrap();

        assert_eq!(status, ExecutionStatus::SuccessValue("e30=".to_string()));
        rpc.assert_hits_async(2).await;
    }

    #[test]
    fn test_next_nonce_never_repeats() {
        assert_eq!(next_nonce(10, 0), 11);
        assert_eq!(next_nonce(10, 11), 12);
        assert_eq!(next_nonce(20, 12), 21);
    }

    #[tokio::test]
    async fn test_concurrent_calls_use_distinct_nonces() {
        let server = MockServer::start_async().await;

        // The node keeps reporting nonce 10, as if neither call had landed yet
        let rpc = server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(200).json_body(serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": "clob-core",
                    "result": {
                        "nonce": 10,
                        "permission": "FullAccess",
                        "block_hash": bs58::encode([1u8; 32]).into_string(),
                        "status": { "SuccessValue": "e30=" },
                    }
                }));
            })
            .await;

        let network =
            NearRpcNetwork::with_rpc_url("agent.testnet", &secret_key(), server.url("/")).unwrap();
        let (first, second) = tokio::join!(
            network.function_call(sample_call()),
            network.function_call(sample_call())
        );

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(*network.last_nonce.lock().await, 12);
        rpc.assert_hits_async(4).await;
    }

    #[tokio::test]
    async fn test_query_error_surfaces_as_api_error() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(200).json_body(serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": "clob-core",
                    "result": { "error": "access key does not exist", "block_height": 1 }
                }));
            })
            .await;

        let network =
            NearRpcNetwork::with_rpc_url("agent.testnet", &secret_key(), server.url("/")).unwrap();
        let err = network.function_call(sample_call()).await.unwrap_err();

        assert!(matches!(err, Error::Api { .. }));
    }

    #[test]
    fn test_debug_does_not_expose_key() {
        let network =
            NearRpcNetwork::with_rpc_url("agent.testnet", &secret_key(), "http://localhost")
                .unwrap();
        let debug_str = format!("{:?}", network);

        assert!(debug_str.contains("agent.testnet"));
        assert!(!debug_str.contains(&secret_key()["ed25519:".len()..]));
    }
}
