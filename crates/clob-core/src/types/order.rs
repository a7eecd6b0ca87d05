//! Order types for market-order assembly.

use alloy_primitives::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::signing::domain::OrderSide;
use crate::{Error, Result};

/// Minimum price increment of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickSize {
    /// 0.1
    Tenth,
    /// 0.01
    Hundredth,
    /// 0.001
    Thousandth,
    /// 0.0001
    TenThousandth,
}

/// Decimal places used when rounding an order's price, size and amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundConfig {
    pub price: u32,
    pub size: u32,
    pub amount: u32,
}

impl TickSize {
    pub fn as_decimal(&self) -> Decimal {
        match self {
            TickSize::Tenth => Decimal::new(1, 1),
            TickSize::Hundredth => Decimal::new(1, 2),
            TickSize::Thousandth => Decimal::new(1, 3),
            TickSize::TenThousandth => Decimal::new(1, 4),
        }
    }

    pub fn round_config(&self) -> RoundConfig {
        match self {
            TickSize::Tenth => RoundConfig {
                price: 1,
                size: 2,
                amount: 3,
            },
            TickSize::Hundredth => RoundConfig {
                price: 2,
                size: 2,
                amount: 4,
            },
            TickSize::Thousandth => RoundConfig {
                price: 3,
                size: 2,
                amount: 5,
            },
            TickSize::TenThousandth => RoundConfig {
                price: 4,
                size: 2,
                amount: 6,
            },
        }
    }

    /// Parse a venue-reported increment such as `0.01`.
    pub fn from_decimal(value: Decimal) -> Result<Self> {
        match value.normalize() {
            v if v == Decimal::new(1, 1) => Ok(TickSize::Tenth),
            v if v == Decimal::new(1, 2) => Ok(TickSize::Hundredth),
            v if v == Decimal::new(1, 3) => Ok(TickSize::Thousandth),
            v if v == Decimal::new(1, 4) => Ok(TickSize::TenThousandth),
            other => Err(Error::Order {
                message: format!("Unsupported tick size {}", other),
            }),
        }
    }
}

/// Ordered by increment: `TenThousandth < Thousandth < Hundredth < Tenth`.
impl Ord for TickSize {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_decimal().cmp(&other.as_decimal())
    }
}

impl PartialOrd for TickSize {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TickSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_decimal())
    }
}

impl FromStr for TickSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value = Decimal::from_str(s.trim()).map_err(|e| Error::Order {
            message: format!("Invalid tick size {:?}: {}", s, e),
        })?;
        Self::from_decimal(value)
    }
}

impl Serialize for TickSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Accepts both `"0.01"` and `0.01`; the venue has used both.
impl<'de> Deserialize<'de> for TickSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        let text = match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s,
            Raw::Number(n) => n.to_string(),
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Time in force for submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Good-till-cancelled limit order.
    Gtc,
    /// Fill-or-kill market order.
    #[default]
    Fok,
    /// Good-till-date limit order.
    Gtd,
    /// Fill-and-kill: fill what is available, cancel the rest.
    Fak,
}

/// Caller input for a market order.
#[derive(Debug, Clone)]
pub struct MarketOrderArgs {
    pub token_id: String,
    pub side: OrderSide,
    /// Collateral to spend on BUY, shares to sell on SELL.
    pub amount: Decimal,
    pub order_type: OrderType,
    /// Filled from the book when absent or not positive.
    pub price: Option<Decimal>,
    pub fee_rate_bps: u64,
    pub nonce: u64,
    /// Zero address for a public order.
    pub taker: Address,
}

impl MarketOrderArgs {
    pub fn new(token_id: impl Into<String>, side: OrderSide, amount: Decimal) -> Self {
        Self {
            token_id: token_id.into(),
            side,
            amount,
            order_type: OrderType::Fok,
            price: None,
            fee_rate_bps: 0,
            nonce: 0,
            taker: Address::ZERO,
        }
    }

    pub fn with_order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = order_type;
        self
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }
}

/// Optional per-order overrides supplied by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartialCreateOrderOptions {
    pub tick_size: Option<TickSize>,
    pub neg_risk: Option<bool>,
}

/// Options resolved for one order before it is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateOrderOptions {
    pub tick_size: TickSize,
    pub neg_risk: bool,
}
