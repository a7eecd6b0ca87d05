//! MPC-backed signer.
//!
//! The private key never exists in one place: the hash is submitted as a
//! function call to an MPC contract, which answers with raw signature
//! components. Those are reconstructed and checked against the expected
//! identity before anything downstream sees them.
//!
//! ```text
//! MpcSigner::sign(hash)
//!       │  FunctionCall { sign_hash, {hash, path}, gas, deposit }
//!       ▼
//! MpcNetwork ──► ExecutionStatus::SuccessValue(base64)
//!       │
//!       ▼  base64 → JSON → SignatureComponents
//! codec::reconstruct_verified ──► CanonicalSignature
//! ```

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::codec::{reconstruct_verified, CanonicalSignature, SignatureComponents};
use super::signer::Signer;
use crate::{Error, Result};

/// Gas attached to every `sign_hash` call (300 Tgas).
pub const DEFAULT_SIGN_GAS: u64 = 300_000_000_000_000;

/// Deposit attached to every `sign_hash` call, in the host chain's smallest unit.
pub const DEFAULT_SIGN_DEPOSIT: u128 = 1;

/// Default MPC contract receiving `sign_hash` calls.
pub const DEFAULT_MPC_CONTRACT: &str = "polymarket_agent.testnet";

/// Default bound on a single remote signature round-trip.
pub const DEFAULT_SIGN_TIMEOUT: Duration = Duration::from_secs(60);

const SIGN_METHOD: &str = "sign_hash";

/// A contract call submitted to the MPC host chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub receiver_id: String,
    pub method_name: String,
    pub args: serde_json::Value,
    pub gas: u64,
    pub deposit: u128,
}

/// Final status of a submitted call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Base64-encoded return value of the call.
    SuccessValue(String),
    /// The call scheduled a further receipt instead of returning a value.
    SuccessReceiptId(String),
    Failure(serde_json::Value),
    NotStarted,
    Started,
}

/// Transport to the network hosting the MPC contract.
#[async_trait]
pub trait MpcNetwork: Send + Sync {
    /// Submit a signed function call and wait for its final status.
    async fn function_call(&self, call: FunctionCall) -> Result<ExecutionStatus>;
}

/// Signer that delegates to the MPC network.
pub struct MpcSigner {
    network: Arc<dyn MpcNetwork>,
    /// EVM identity controlled by `path` on the MPC contract.
    address: Address,
    contract_id: String,
    path: String,
    gas: u64,
    deposit: u128,
    timeout: Duration,
}

impl MpcSigner {
    pub fn new(network: Arc<dyn MpcNetwork>, address: Address, path: impl Into<String>) -> Self {
        Self {
            network,
            address,
            contract_id: DEFAULT_MPC_CONTRACT.to_string(),
            path: path.into(),
            gas: DEFAULT_SIGN_GAS,
            deposit: DEFAULT_SIGN_DEPOSIT,
            timeout: DEFAULT_SIGN_TIMEOUT,
        }
    }

    pub fn with_contract(mut self, contract_id: impl Into<String>) -> Self {
        self.contract_id = contract_id.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_gas(mut self, gas: u64, deposit: u128) -> Self {
        self.gas = gas;
        self.deposit = deposit;
        self
    }

    /// Ask the MPC contract for raw signature components over `message_hash`.
    pub async fn request_components(&self, message_hash: B256) -> Result<SignatureComponents> {
        let call = FunctionCall {
            receiver_id: self.contract_id.clone(),
            method_name: SIGN_METHOD.to_string(),
            args: serde_json::json!({
                "hash": hex::encode(message_hash),
                "path": self.path,
            }),
            gas: self.gas,
            deposit: self.deposit,
        };

        debug!(
            contract = %self.contract_id,
            path = %self.path,
            hash = %message_hash,
            "Requesting MPC signature"
        );

        let status = tokio::time::timeout(self.timeout, self.network.function_call(call))
            .await
            .map_err(|_| {
                warn!(timeout = ?self.timeout, "MPC signature request timed out");
                Error::SignerTimeout {
                    elapsed: self.timeout,
                }
            })??;

        extract_components(status)
    }
}

/// Pull [`SignatureComponents`] out of a call outcome.
///
/// Only a success value carrying base64 JSON is accepted.
pub fn extract_components(status: ExecutionStatus) -> Result<SignatureComponents> {
    let encoded = match status {
        ExecutionStatus::SuccessValue(value) => value,
        other => {
            return Err(Error::SignerProtocol {
                message: format!("expected SuccessValue, got {:?}", other),
            })
        }
    };

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| Error::SignerProtocol {
            message: format!("success value is not base64: {}", e),
        })?;

    let text = String::from_utf8(decoded).map_err(|e| Error::SignerProtocol {
        message: format!("success value is not UTF-8: {}", e),
    })?;

    serde_json::from_str(&text).map_err(|e| Error::SignerProtocol {
        message: format!("success value is not a signature payload: {}", e),
    })
}

#[async_trait]
impl Signer for MpcSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign(&self, message_hash: B256) -> Result<CanonicalSignature> {
        let components = self.request_components(message_hash).await?;
        let signature = reconstruct_verified(&components, &message_hash, self.address)?;

        debug!(signature = %signature, "Reconstructed MPC signature");
        Ok(signature)
    }
}

impl std::fmt::Debug for MpcSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpcSigner")
            .field("address", &format!("{:?}", self.address))
            .field("contract_id", &self.contract_id)
            .field("path", &self.path)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::keccak256;
    use alloy_signer::{Signer as _, SignerSync};
    use alloy_signer_local::PrivateKeySigner;
    use std::str::FromStr;
    use std::sync::Mutex;

    const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    /// Network that answers like the MPC contract by signing with a local key.
    struct LocalMpc {
        key: PrivateKeySigner,
        calls: Mutex<Vec<FunctionCall>>,
    }

    impl LocalMpc {
        fn new() -> Self {
            Self {
                key: PrivateKeySigner::from_str(TEST_PRIVATE_KEY).unwrap(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MpcNetwork for LocalMpc {
        async fn function_call(&self, call: FunctionCall) -> Result<ExecutionStatus> {
            let hash: B256 = call.args["hash"].as_str().unwrap().parse().unwrap();
            self.calls.lock().unwrap().push(call);

            let bytes = self.key.sign_hash_sync(&hash).unwrap().as_bytes();
            let payload = serde_json::json!({
                "big_r": { "affine_point": format!("03{}", hex::encode(&bytes[..32])) },
                "s": { "scalar": hex::encode(&bytes[32..64]) },
                "recovery_id": bytes[64] - 27,
            });
            Ok(ExecutionStatus::SuccessValue(
                base64::engine::general_purpose::STANDARD.encode(payload.to_string()),
            ))
        }
    }

    struct FixedStatus(ExecutionStatus);

    #[async_trait]
    impl MpcNetwork for FixedStatus {
        async fn function_call(&self, _call: FunctionCall) -> Result<ExecutionStatus> {
            Ok(self.0.clone())
        }
    }

    struct Stalled;

    #[async_trait]
    impl MpcNetwork for Stalled {
        async fn function_call(&self, _call: FunctionCall) -> Result<ExecutionStatus> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(ExecutionStatus::NotStarted)
        }
    }

    fn key_address() -> Address {
        PrivateKeySigner::from_str(TEST_PRIVATE_KEY)
            .unwrap()
            .address()
    }

    #[tokio::test]
    async fn test_mpc_sign_round_trip() {
        let network = Arc::new(LocalMpc::new());
        let signer = MpcSigner::new(network.clone(), key_address(), "ethereum-1");
        let hash = keccak256(b"clob auth");

        let signature = signer.sign(hash).await.unwrap();
        assert_eq!(signature.recover_address(&hash).unwrap(), key_address());

        let calls = network.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].receiver_id, DEFAULT_MPC_CONTRACT);
        assert_eq!(calls[0].method_name, "sign_hash");
        assert_eq!(calls[0].gas, DEFAULT_SIGN_GAS);
        assert_eq!(calls[0].deposit, 1);
        assert_eq!(calls[0].args["path"], "ethereum-1");
        assert_eq!(calls[0].args["hash"], hex::encode(hash));
    }

    #[tokio::test]
    async fn test_gas_and_deposit_override() {
        let network = Arc::new(LocalMpc::new());
        let signer = MpcSigner::new(network.clone(), key_address(), "ethereum-1")
            .with_contract("v1.signer")
            .with_gas(250_000_000_000_000, 5);

        signer.sign(keccak256(b"clob auth")).await.unwrap();

        let calls = network.calls.lock().unwrap();
        assert_eq!(calls[0].receiver_id, "v1.signer");
        assert_eq!(calls[0].gas, 250_000_000_000_000);
        assert_eq!(calls[0].deposit, 5);
    }

    #[tokio::test]
    async fn test_mpc_sign_rejects_wrong_identity() {
        let other: Address = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse().unwrap();
        let signer = MpcSigner::new(Arc::new(LocalMpc::new()), other, "ethereum-1");

        let err = signer.sign(keccak256(b"clob auth")).await.unwrap_err();
        assert!(matches!(err, Error::SignatureVerificationFailed { .. }));
    }

    #[tokio::test]
    async fn test_non_success_status_is_protocol_error() {
        for status in [
            ExecutionStatus::Failure(serde_json::json!({"ActionError": {}})),
            ExecutionStatus::SuccessReceiptId("receipt".to_string()),
            ExecutionStatus::NotStarted,
        ] {
            let signer = MpcSigner::new(Arc::new(FixedStatus(status)), key_address(), "p");
            let err = signer.sign(B256::ZERO).await.unwrap_err();
            assert!(matches!(err, Error::SignerProtocol { .. }));
        }
    }

    #[test]
    fn test_extract_rejects_garbage_payloads() {
        let not_base64 = ExecutionStatus::SuccessValue("!!!".to_string());
        assert!(matches!(
            extract_components(not_base64),
            Err(Error::SignerProtocol { .. })
        ));

        let wrong_json = ExecutionStatus::SuccessValue(
            base64::engine::general_purpose::STANDARD.encode(r#"{"signature":"0x"}"#),
        );
        assert!(matches!(
            extract_components(wrong_json),
            Err(Error::SignerProtocol { .. })
        ));
    }

    #[test]
    fn test_status_deserializes_tagged_shapes() {
        let success: ExecutionStatus =
            serde_json::from_str(r#"{"SuccessValue":"e30="}"#).unwrap();
        assert_eq!(success, ExecutionStatus::SuccessValue("e30=".to_string()));

        let started: ExecutionStatus = serde_json::from_str(r#""Started""#).unwrap();
        assert_eq!(started, ExecutionStatus::Started);
    }

    #[tokio::test]
    async fn test_timeout_maps_to_signer_timeout() {
        let signer = MpcSigner::new(Arc::new(Stalled), key_address(), "p")
            .with_timeout(Duration::from_millis(20));

        let err = signer.sign(B256::ZERO).await.unwrap_err();
        assert!(matches!(err, Error::SignerTimeout { .. }));
    }
}
