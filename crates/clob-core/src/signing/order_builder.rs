//! Market-order assembly: book walking, amount rounding and signing.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use tracing::{debug, info};

use super::domain::{Eip712Domain, OrderSide, SignatureType};
use super::order_types::{generate_salt, OrderData, SignedOrder};
use super::signer::Signer;
use crate::types::{CreateOrderOptions, MarketOrderArgs, OrderType, PriceLevel, RoundConfig};
use crate::{Error, Result};

/// Collateral and conditional tokens both use 6 decimals.
const TOKEN_DECIMALS: u32 = 6;

/// Turns priced market-order requests into signed orders.
#[async_trait]
pub trait OrderBuilder: Send + Sync {
    /// Price that fills `amount` of collateral against `asks` (best first).
    ///
    /// `None` when there is no match: an empty side, or a FOK order the
    /// book cannot fill.
    fn calculate_buy_market_price(
        &self,
        asks: &[PriceLevel],
        amount: Decimal,
        order_type: OrderType,
    ) -> Option<Decimal> {
        buy_market_price(asks, amount, order_type)
    }

    /// Price that fills `amount` shares against `bids` (best first).
    fn calculate_sell_market_price(
        &self,
        bids: &[PriceLevel],
        amount: Decimal,
        order_type: OrderType,
    ) -> Option<Decimal> {
        sell_market_price(bids, amount, order_type)
    }

    /// Build and sign a market order whose price is already resolved.
    async fn create_market_order(
        &self,
        args: &MarketOrderArgs,
        options: CreateOrderOptions,
    ) -> Result<SignedOrder>;
}

/// Walk levels best to worst until the running total reaches `amount`.
///
/// `weight` gives each level's contribution to the total.
fn walk_book(
    levels: &[PriceLevel],
    amount: Decimal,
    order_type: OrderType,
    weight: impl Fn(&PriceLevel) -> Decimal,
) -> Option<Decimal> {
    let worst = levels.last()?;

    let mut total = Decimal::ZERO;
    for level in levels {
        total += weight(level);
        if total >= amount {
            return Some(level.price);
        }
    }

    match order_type {
        OrderType::Fok => None,
        _ => Some(worst.price),
    }
}

/// BUY walk: each ask contributes `size * price` of collateral.
pub fn buy_market_price(
    asks: &[PriceLevel],
    amount: Decimal,
    order_type: OrderType,
) -> Option<Decimal> {
    walk_book(asks, amount, order_type, |l| l.size * l.price)
}

/// SELL walk: each bid contributes `size` shares.
pub fn sell_market_price(
    bids: &[PriceLevel],
    amount: Decimal,
    order_type: OrderType,
) -> Option<Decimal> {
    walk_book(bids, amount, order_type, |l| l.size)
}

fn round_down(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::ToZero)
}

fn round_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::AwayFromZero)
}

fn round_normal(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

fn decimal_places(value: Decimal) -> u32 {
    value.normalize().scale()
}

/// Maker and taker amounts of a market order, in whole units.
///
/// BUY spends `amount` collateral for `amount / price` shares; SELL gives
/// `amount` shares for `amount * price` collateral.
pub fn market_order_amounts(
    side: OrderSide,
    amount: Decimal,
    price: Decimal,
    round_config: RoundConfig,
) -> Result<(Decimal, Decimal)> {
    let price = round_normal(price, round_config.price);
    if price <= Decimal::ZERO {
        return Err(Error::Order {
            message: format!("Market order price must be positive, got {}", price),
        });
    }

    let maker = round_down(amount, round_config.size);
    let mut taker = match side {
        OrderSide::Buy => maker / price,
        OrderSide::Sell => maker * price,
    };

    if decimal_places(taker) > round_config.amount {
        taker = round_up(taker, round_config.amount + 4);
        if decimal_places(taker) > round_config.amount {
            taker = round_down(taker, round_config.amount);
        }
    }

    Ok((maker, taker))
}

/// Convert whole units to 6-decimal base units.
pub fn to_token_decimals(value: Decimal) -> Result<U256> {
    let scaled = round_normal(value * Decimal::from(10u64.pow(TOKEN_DECIMALS)), 0);
    let units = scaled.to_u128().ok_or_else(|| Error::Order {
        message: format!("Amount {} is not representable in base units", value),
    })?;
    Ok(U256::from(units))
}

/// Builds orders for the CTF exchanges and signs them with a [`Signer`].
pub struct ExchangeOrderBuilder {
    signer: Arc<dyn Signer>,
    chain_id: u64,
    signature_type: SignatureType,
    /// Funds holder when it differs from the signing identity.
    funder: Option<Address>,
}

impl ExchangeOrderBuilder {
    pub fn new(signer: Arc<dyn Signer>, chain_id: u64) -> Self {
        Self {
            signer,
            chain_id,
            signature_type: SignatureType::Eoa,
            funder: None,
        }
    }

    pub fn with_funder(mut self, signature_type: SignatureType, funder: Option<Address>) -> Self {
        self.signature_type = signature_type;
        self.funder = funder;
        self
    }

    fn maker(&self) -> Address {
        self.funder.unwrap_or_else(|| self.signer.address())
    }
}

#[async_trait]
impl OrderBuilder for ExchangeOrderBuilder {
    async fn create_market_order(
        &self,
        args: &MarketOrderArgs,
        options: CreateOrderOptions,
    ) -> Result<SignedOrder> {
        let price = args.price.ok_or_else(|| Error::Order {
            message: format!("Market order for {} has no price", args.token_id),
        })?;

        let round_config = options.tick_size.round_config();
        let (maker_amount, taker_amount) =
            market_order_amounts(args.side, args.amount, price, round_config)?;

        let token_id = U256::from_str_radix(&args.token_id, 10).map_err(|e| Error::Order {
            message: format!("Invalid token id {}: {}", args.token_id, e),
        })?;

        let order = OrderData {
            salt: U256::from(generate_salt()),
            maker: self.maker(),
            signer: self.signer.address(),
            taker: args.taker,
            token_id,
            maker_amount: to_token_decimals(maker_amount)?,
            taker_amount: to_token_decimals(taker_amount)?,
            expiration: U256::ZERO,
            nonce: U256::from(args.nonce),
            fee_rate_bps: U256::from(args.fee_rate_bps),
            side: args.side,
            signature_type: self.signature_type,
        };

        debug!(
            token_id = %args.token_id,
            maker_amount = %order.maker_amount,
            taker_amount = %order.taker_amount,
            salt = %order.salt,
            "Order built with amounts"
        );

        let domain = Eip712Domain::exchange(self.chain_id, options.neg_risk)?;
        let signature = self.signer.sign(order.signing_hash(&domain)).await?;

        info!(
            token_id = %args.token_id,
            side = %args.side,
            price = %price,
            neg_risk = options.neg_risk,
            "Signed market order"
        );

        Ok(SignedOrder::from_order_data(&order, &signature))
    }
}

impl std::fmt::Debug for ExchangeOrderBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeOrderBuilder")
            .field("address", &self.signer.address())
            .field("chain_id", &self.chain_id)
            .field("signature_type", &self.signature_type)
            .field("funder", &self.funder)
            .finish()
    }
}
