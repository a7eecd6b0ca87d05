//! High-level CLOB client.
//!
//! Ties the pieces together: the auth context decides what may be called,
//! the market cache and pricing engine fill in order parameters, and the
//! order builder produces the signed payload that `post_order` submits.

use alloy_primitives::{Address, B256};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{ClobHttpClient, PostOrderRequest, PostOrderResponse, VenueApi};
use crate::auth::{ApiCredentials, AuthContext, AuthLevel};
use crate::config::Config;
use crate::market_cache::MarketCache;
use crate::pricing::{ensure_price_valid, PricingEngine};
use crate::signing::{
    CanonicalSignature, ClobHeaders, ExchangeOrderBuilder, LocalSigner, MpcSigner,
    NearRpcNetwork, OrderBuilder, OrderSide, RequestArgs, SignatureType, SignedOrder, Signer,
};
use crate::types::{
    CreateOrderOptions, MarketOrderArgs, OrderBookSummary, OrderType, PartialCreateOrderOptions,
    TickSize,
};
use crate::{Error, Result};

const POST_ORDER: &str = "/order";

/// CLOB client whose capabilities follow its [`AuthLevel`].
pub struct MpcClobClient {
    host: String,
    auth: AuthContext,
    venue: Arc<dyn VenueApi>,
    cache: Arc<MarketCache>,
    builder: Option<Arc<dyn OrderBuilder>>,
    pricing: PricingEngine,
}

impl MpcClobClient {
    /// Unauthenticated (L0) client.
    pub fn new(host: impl Into<String>, venue: Arc<dyn VenueApi>, chain_id: u64) -> Self {
        let cache = Arc::new(MarketCache::new(venue.clone()));
        Self {
            host: host.into(),
            auth: AuthContext::new(None, None, chain_id),
            venue,
            pricing: PricingEngine::new(cache.clone(), None),
            cache,
            builder: None,
        }
    }

    /// Attach a signing identity, raising the client to L1 (or L2 when
    /// credentials are already installed).
    pub fn with_signer(
        mut self,
        signer: Arc<dyn Signer>,
        signature_type: SignatureType,
        funder: Option<Address>,
    ) -> Self {
        let chain_id = self.auth.chain_id();
        let builder = ExchangeOrderBuilder::new(signer.clone(), chain_id)
            .with_funder(signature_type, funder);

        self.auth = AuthContext::new(Some(signer), self.auth.credentials().cloned(), chain_id);
        self.with_order_builder(Arc::new(builder))
    }

    /// Replace the order builder used for pricing and order construction.
    pub fn with_order_builder(mut self, builder: Arc<dyn OrderBuilder>) -> Self {
        self.pricing = PricingEngine::new(self.cache.clone(), Some(builder.clone()));
        self.builder = Some(builder);
        self
    }

    pub fn with_credentials(mut self, credentials: ApiCredentials) -> Self {
        self.auth.install_credentials(credentials);
        self
    }

    /// Build a client from configuration.
    ///
    /// An MPC account takes precedence over a local wallet key. The MPC
    /// signer's Ethereum address is the configured funder.
    #[allow(clippy::result_large_err)]
    pub fn from_config(config: &Config, credentials: Option<ApiCredentials>) -> Result<Self> {
        let venue = Arc::new(ClobHttpClient::new(Some(&config.host))?);
        let signature_type = config.signature_type()?;

        let signer: Option<Arc<dyn Signer>> = match (&config.mpc, &config.wallet_private_key) {
            (Some(mpc), _) => {
                let address = config.funder.ok_or_else(|| Error::Config {
                    message: "CLOB_FUNDER must be set when signing through MPC".to_string(),
                })?;
                let network =
                    NearRpcNetwork::new(&mpc.account_id, &mpc.private_key, &mpc.network)?;
                let signer = MpcSigner::new(Arc::new(network), address, &mpc.path)
                    .with_contract(&mpc.contract_id)
                    .with_timeout(mpc.timeout());
                Some(Arc::new(signer))
            }
            (None, Some(key)) => Some(Arc::new(LocalSigner::from_private_key(key)?)),
            (None, None) => None,
        };

        let mut client = Self::new(&config.host, venue, config.chain_id);
        if let Some(signer) = signer {
            client = client.with_signer(signer, signature_type, config.funder);
        }
        if let Some(credentials) = credentials {
            client = client.with_credentials(credentials);
        }

        info!(
            host = %client.host,
            chain_id = config.chain_id,
            level = %client.level(),
            mpc = config.mpc.is_some(),
            "CLOB client configured"
        );
        Ok(client)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn chain_id(&self) -> u64 {
        self.auth.chain_id()
    }

    pub fn level(&self) -> AuthLevel {
        self.auth.level()
    }

    pub fn require_level(&self, required: AuthLevel) -> Result<()> {
        self.auth.require_level(required)
    }

    pub fn address(&self) -> Option<Address> {
        self.auth.address()
    }

    pub async fn build_headers(
        &self,
        level: AuthLevel,
        request: Option<&RequestArgs>,
    ) -> Result<ClobHeaders> {
        self.auth.build_headers(level, request).await
    }

    /// Sign a 32-byte hash with the configured identity. Requires L1.
    pub async fn sign(&self, message_hash: B256) -> Result<CanonicalSignature> {
        self.auth.require_level(AuthLevel::L1)?;
        let signer = self.auth.signer().ok_or(Error::AuthLevel {
            required: AuthLevel::L1,
            actual: self.level(),
        })?;
        signer.sign(message_hash).await
    }

    pub async fn get_tick_size(&self, token_id: &str) -> Result<TickSize> {
        self.cache.tick_size(token_id).await
    }

    pub async fn get_neg_risk(&self, token_id: &str) -> Result<bool> {
        self.cache.neg_risk(token_id).await
    }

    pub async fn get_order_book(&self, token_id: &str) -> Result<OrderBookSummary> {
        self.venue.get_order_book(token_id).await
    }

    pub async fn calculate_market_price(
        &self,
        token_id: &str,
        side: OrderSide,
        amount: Decimal,
        order_type: OrderType,
    ) -> Result<Decimal> {
        self.pricing
            .calculate_market_price(token_id, side, amount, order_type)
            .await
    }

    pub async fn create_api_key(&self, nonce: Option<u64>) -> Result<Option<ApiCredentials>> {
        self.auth.create_api_key(self.venue.as_ref(), nonce).await
    }

    pub async fn derive_api_key(&self, nonce: Option<u64>) -> Result<Option<ApiCredentials>> {
        self.auth.derive_api_key(self.venue.as_ref(), nonce).await
    }

    /// Create credentials for `nonce`, deriving the existing ones if creation
    /// fails. The result is not installed; see [`Self::set_api_creds`].
    pub async fn create_or_derive_api_creds(
        &self,
        nonce: Option<u64>,
    ) -> Result<Option<ApiCredentials>> {
        self.auth.obtain_credentials(self.venue.as_ref(), nonce).await
    }

    pub fn set_api_creds(&mut self, credentials: ApiCredentials) {
        self.auth.install_credentials(credentials);
    }

    /// Price, validate, and sign a market order. Requires L1.
    ///
    /// A missing or non-positive price is replaced by the price the current
    /// book clears `amount` at.
    pub async fn create_market_order(
        &self,
        mut args: MarketOrderArgs,
        options: PartialCreateOrderOptions,
    ) -> Result<SignedOrder> {
        self.auth.require_level(AuthLevel::L1)?;
        let builder = self.builder.as_ref().ok_or_else(|| Error::Order {
            message: "No order builder configured".to_string(),
        })?;

        let tick_size = self
            .pricing
            .resolve_tick_size(&args.token_id, options.tick_size)
            .await?;

        let price = match args.price {
            Some(price) if price > Decimal::ZERO => price,
            _ => {
                self.pricing
                    .calculate_market_price(&args.token_id, args.side, args.amount, args.order_type)
                    .await?
            }
        };
        ensure_price_valid(price, tick_size)?;
        args.price = Some(price);

        let neg_risk = match options.neg_risk {
            Some(true) => true,
            _ => self.cache.neg_risk(&args.token_id).await?,
        };

        builder
            .create_market_order(
                &args,
                CreateOrderOptions {
                    tick_size,
                    neg_risk,
                },
            )
            .await
    }

    /// Submit a signed order. Requires L2.
    pub async fn post_order(
        &self,
        order: &SignedOrder,
        order_type: OrderType,
    ) -> Result<PostOrderResponse> {
        self.auth.require_level(AuthLevel::L2)?;
        let credentials = self.auth.credentials().ok_or(Error::AuthLevel {
            required: AuthLevel::L2,
            actual: self.level(),
        })?;

        let body = serde_json::to_string(&PostOrderRequest {
            order: order.clone(),
            owner: credentials.api_key.clone(),
            order_type,
        })?;
        let headers = self
            .auth
            .l2_headers(&RequestArgs::new("POST", POST_ORDER).with_body(body.clone()))?;

        let response = self.venue.post_order(&headers, body).await?;

        if !response.success {
            warn!(
                error = %response.error_msg,
                status = %response.status,
                "Order rejected"
            );
        }
        Ok(response)
    }
}

impl std::fmt::Debug for MpcClobClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpcClobClient")
            .field("host", &self.host)
            .field("auth", &self.auth)
            .field("cache", &self.cache)
            .field("has_builder", &self.builder.is_some())
            .finish()
    }
}
