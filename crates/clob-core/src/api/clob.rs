//! CLOB venue HTTP API.
//!
//! [`VenueApi`] is the seam the rest of the crate talks to; [`ClobHttpClient`]
//! is its reqwest implementation. Authentication headers are built by the
//! caller and passed in ready to attach.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};

use crate::signing::{ClobHeaders, SignedOrder};
use crate::types::{OrderBookSummary, OrderType, PriceLevel, TickSize};
use crate::{Error, Result};

/// Venue operations used by the client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VenueApi: Send + Sync {
    /// Minimum tick size of a token's market.
    async fn get_tick_size(&self, token_id: &str) -> Result<TickSize>;

    /// Whether the token trades on the neg-risk exchange.
    async fn get_neg_risk(&self, token_id: &str) -> Result<bool>;

    /// Current book, normalized best-to-worst.
    async fn get_order_book(&self, token_id: &str) -> Result<OrderBookSummary>;

    /// `POST /auth/api-key` with L1 headers. Returns the raw response body.
    async fn create_api_key(&self, headers: &ClobHeaders) -> Result<serde_json::Value>;

    /// `GET /auth/derive-api-key` with L1 headers. Returns the raw response body.
    async fn derive_api_key(&self, headers: &ClobHeaders) -> Result<serde_json::Value>;

    /// `POST /order` with L2 headers over exactly `body`.
    async fn post_order(&self, headers: &ClobHeaders, body: String) -> Result<PostOrderResponse>;
}

/// Request body for posting an order.
#[derive(Debug, Clone, Serialize)]
pub struct PostOrderRequest {
    pub order: SignedOrder,
    /// API key of the order owner.
    pub owner: String,
    #[serde(rename = "orderType")]
    pub order_type: OrderType,
}

/// Response from posting an order.
#[derive(Debug, Clone, Deserialize)]
pub struct PostOrderResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(rename = "errorMsg", default)]
    pub error_msg: String,
    /// Order ID assigned by the CLOB.
    #[serde(rename = "orderID", default)]
    pub order_id: String,
    /// e.g. "matched", "live", "delayed", "unmatched".
    #[serde(default)]
    pub status: String,
}

impl PostOrderResponse {
    /// Check if the order was matched or is resting.
    pub fn is_filled(&self) -> bool {
        let s = self.status.to_lowercase();
        s == "matched" || s == "live" || s == "delayed"
    }
}

/// reqwest-backed CLOB client.
#[derive(Debug, Clone)]
pub struct ClobHttpClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl ClobHttpClient {
    /// Default CLOB API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://clob.polymarket.com";

    pub fn new(host: Option<&str>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(30))
            .connect_timeout(StdDuration::from_secs(10))
            .build()?;

        let base_url = host
            .unwrap_or(Self::DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            base_url,
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_headers(
        mut request: reqwest::RequestBuilder,
        headers: &ClobHeaders,
    ) -> reqwest::RequestBuilder {
        for (name, value) in headers.iter() {
            request = request.header(name, value);
        }
        request
    }

    /// Fail on any non-2xx status, keeping the body for the error message.
    async fn ensure_success(
        response: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        Err(Error::Api {
            message: format!("{} failed: {} - {}", context, status, text),
            status: Some(status),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TickSizeResponse {
    minimum_tick_size: TickSize,
}

#[derive(Debug, Deserialize)]
struct NegRiskResponse {
    neg_risk: bool,
}

#[derive(Debug, Deserialize)]
struct ClobOrderBook {
    #[serde(default)]
    market: String,
    #[serde(default)]
    asset_id: String,
    #[serde(default)]
    bids: Vec<ClobPriceLevel>,
    #[serde(default)]
    asks: Vec<ClobPriceLevel>,
    /// Milliseconds since the epoch, as a string.
    #[serde(default)]
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct ClobPriceLevel {
    price: String,
    size: String,
}

fn parse_levels(levels: Vec<ClobPriceLevel>, token_id: &str) -> Vec<PriceLevel> {
    levels
        .into_iter()
        .filter_map(|l| match (l.price.parse::<Decimal>(), l.size.parse::<Decimal>()) {
            (Ok(price), Ok(size)) => Some(PriceLevel { price, size }),
            _ => {
                warn!(
                    token_id,
                    price = %l.price,
                    size = %l.size,
                    "Skipping unparseable book level"
                );
                None
            }
        })
        .collect()
}

impl ClobOrderBook {
    fn into_summary(self, token_id: &str) -> OrderBookSummary {
        let timestamp = self
            .timestamp
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now);

        OrderBookSummary {
            market: self.market,
            asset_id: self.asset_id,
            timestamp,
            bids: parse_levels(self.bids, token_id),
            asks: parse_levels(self.asks, token_id),
        }
        .normalized()
    }
}

#[async_trait]
impl VenueApi for ClobHttpClient {
    async fn get_tick_size(&self, token_id: &str) -> Result<TickSize> {
        let response = self
            .http_client
            .get(self.url("/tick-size"))
            .query(&[("token_id", token_id)])
            .send()
            .await?;
        let response = Self::ensure_success(response, "Get tick size").await?;

        let body: TickSizeResponse = response.json().await?;
        debug!(token_id, tick_size = %body.minimum_tick_size, "Fetched tick size");
        Ok(body.minimum_tick_size)
    }

    async fn get_neg_risk(&self, token_id: &str) -> Result<bool> {
        let response = self
            .http_client
            .get(self.url("/neg-risk"))
            .query(&[("token_id", token_id)])
            .send()
            .await?;
        let response = Self::ensure_success(response, "Get neg-risk").await?;

        let body: NegRiskResponse = response.json().await?;
        debug!(token_id, neg_risk = body.neg_risk, "Fetched neg-risk status");
        Ok(body.neg_risk)
    }

    async fn get_order_book(&self, token_id: &str) -> Result<OrderBookSummary> {
        let response = self
            .http_client
            .get(self.url("/book"))
            .query(&[("token_id", token_id)])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NoOrderBook {
                token_id: token_id.to_string(),
            });
        }
        let response = Self::ensure_success(response, "Get order book").await?;

        let book: ClobOrderBook = response.json().await?;
        Ok(book.into_summary(token_id))
    }

    async fn create_api_key(&self, headers: &ClobHeaders) -> Result<serde_json::Value> {
        let request = self.http_client.post(self.url("/auth/api-key"));
        let response = Self::with_headers(request, headers).send().await?;
        let response = Self::ensure_success(response, "Create API key").await?;

        Ok(response.json().await?)
    }

    async fn derive_api_key(&self, headers: &ClobHeaders) -> Result<serde_json::Value> {
        let request = self.http_client.get(self.url("/auth/derive-api-key"));
        let response = Self::with_headers(request, headers).send().await?;
        let response = Self::ensure_success(response, "Derive API key").await?;

        Ok(response.json().await?)
    }

    async fn post_order(&self, headers: &ClobHeaders, body: String) -> Result<PostOrderResponse> {
        debug!(payload = %body, "POST /order request body");

        let request = self
            .http_client
            .post(self.url("/order"))
            .header("Content-Type", "application/json")
            .body(body);
        let response = Self::with_headers(request, headers).send().await?;
        let response = Self::ensure_success(response, "Post order").await?;

        let result: PostOrderResponse = response.json().await?;
        info!(order_id = %result.order_id, status = %result.status, "Order posted");
        Ok(result)
    }
}
