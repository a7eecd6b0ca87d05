//! Configuration for the CLOB client.
//!
//! Two sources: flat environment variables (with `.env` support) through
//! [`Config::from_env`], or a config file with `CLOB__`-prefixed overrides
//! through [`Config::from_file`].

use alloy_primitives::Address;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::api::ClobHttpClient;
use crate::signing::remote::{DEFAULT_MPC_CONTRACT, DEFAULT_SIGN_TIMEOUT};
use crate::signing::{SignatureType, POLYGON_CHAIN_ID};
use crate::{Error, Result};

/// Client configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// 0 = EOA, 1 = proxy wallet, 2 = Gnosis safe.
    #[serde(default)]
    pub signature_type: u8,
    /// Address holding the funds; also the MPC signer's Ethereum address.
    #[serde(default)]
    pub funder: Option<Address>,
    #[serde(default)]
    pub mpc: Option<MpcConfig>,
    /// Hex private key for local signing when no MPC account is configured.
    #[serde(default)]
    pub wallet_private_key: Option<String>,
}

/// Remote signer account on the MPC host chain.
#[derive(Clone, Deserialize)]
pub struct MpcConfig {
    pub account_id: String,
    /// `ed25519:<base58>` key of `account_id`.
    pub private_key: String,
    /// "mainnet" or "testnet".
    pub network: String,
    /// Derivation path passed to the MPC contract.
    pub path: String,
    #[serde(default = "default_contract_id")]
    pub contract_id: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    ClobHttpClient::DEFAULT_BASE_URL.to_string()
}

fn default_chain_id() -> u64 {
    POLYGON_CHAIN_ID
}

fn default_contract_id() -> String {
    DEFAULT_MPC_CONTRACT.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_SIGN_TIMEOUT.as_secs()
}

impl Config {
    /// Load configuration from environment variables.
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from a file, with `CLOB__SECTION__KEY` overrides.
    #[allow(clippy::result_large_err)]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix("CLOB").separator("__"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.signature_type()?;
        Ok(config)
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse_u64 = |name: &str| -> Result<Option<u64>> {
            lookup(name)
                .map(|raw| {
                    raw.trim().parse::<u64>().map_err(|_| Error::Config {
                        message: format!("{} must be an unsigned integer, got {:?}", name, raw),
                    })
                })
                .transpose()
        };

        let signature_type = match parse_u64("CLOB_SIGNATURE_TYPE")? {
            None => 0,
            Some(raw) => u8::try_from(raw).map_err(|_| Error::Config {
                message: format!("CLOB_SIGNATURE_TYPE out of range: {}", raw),
            })?,
        };

        let funder = lookup("CLOB_FUNDER")
            .map(|raw| {
                Address::from_str(raw.trim()).map_err(|e| Error::Config {
                    message: format!("CLOB_FUNDER is not an address: {}", e),
                })
            })
            .transpose()?;

        let mpc = match (
            lookup("MPC_ACCOUNT_ID"),
            lookup("MPC_PRIVATE_KEY"),
            lookup("MPC_NETWORK"),
            lookup("MPC_PATH"),
        ) {
            (Some(account_id), Some(private_key), Some(network), Some(path)) => Some(MpcConfig {
                account_id,
                private_key,
                network,
                path,
                contract_id: lookup("MPC_CONTRACT_ID").unwrap_or_else(default_contract_id),
                timeout_secs: parse_u64("MPC_TIMEOUT_SECS")?.unwrap_or_else(default_timeout_secs),
            }),
            _ => None,
        };

        let config = Self {
            host: lookup("CLOB_HOST").unwrap_or_else(default_host),
            chain_id: parse_u64("CLOB_CHAIN_ID")?.unwrap_or(POLYGON_CHAIN_ID),
            signature_type,
            funder,
            mpc,
            wallet_private_key: lookup("WALLET_PRIVATE_KEY"),
        };
        config.signature_type()?;
        Ok(config)
    }

    /// Parsed signature type.
    #[allow(clippy::result_large_err)]
    pub fn signature_type(&self) -> Result<SignatureType> {
        SignatureType::from_u8(self.signature_type).ok_or_else(|| Error::Config {
            message: format!("Unknown signature type {}", self.signature_type),
        })
    }
}

impl MpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("chain_id", &self.chain_id)
            .field("signature_type", &self.signature_type)
            .field("funder", &self.funder)
            .field("mpc", &self.mpc)
            .field(
                "wallet_private_key",
                &self.wallet_private_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl fmt::Debug for MpcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpcConfig")
            .field("account_id", &self.account_id)
            .field("private_key", &"<redacted>")
            .field("network", &self.network)
            .field("path", &self.path)
            .field("contract_id", &self.contract_id)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
