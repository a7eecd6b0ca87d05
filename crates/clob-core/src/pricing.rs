//! Market-order price discovery and tick-size validation.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::market_cache::MarketCache;
use crate::signing::order_builder::{buy_market_price, sell_market_price, OrderBuilder};
use crate::signing::OrderSide;
use crate::types::{OrderType, TickSize};
use crate::{Error, Result};

/// Whether `price` lies in `[tick_size, 1 - tick_size]`.
pub fn price_valid(price: Decimal, tick_size: TickSize) -> bool {
    let tick = tick_size.as_decimal();
    price >= tick && price <= Decimal::ONE - tick
}

/// Fail with [`Error::PriceOutOfRange`] unless [`price_valid`] holds.
pub fn ensure_price_valid(price: Decimal, tick_size: TickSize) -> Result<()> {
    if price_valid(price, tick_size) {
        return Ok(());
    }

    let tick = tick_size.as_decimal();
    Err(Error::PriceOutOfRange {
        price,
        min: tick,
        max: Decimal::ONE - tick,
    })
}

/// Chooses tick sizes and clearing prices for market orders.
///
/// Side selection and the empty-book checks live here; the book walk
/// itself belongs to the order builder when one is configured.
#[derive(Clone)]
pub struct PricingEngine {
    cache: Arc<MarketCache>,
    builder: Option<Arc<dyn OrderBuilder>>,
}

impl PricingEngine {
    pub fn new(cache: Arc<MarketCache>, builder: Option<Arc<dyn OrderBuilder>>) -> Self {
        Self { cache, builder }
    }

    /// Tick size to build with: `requested` if it is not finer than the
    /// market minimum, otherwise an error.
    pub async fn resolve_tick_size(
        &self,
        token_id: &str,
        requested: Option<TickSize>,
    ) -> Result<TickSize> {
        let minimum = self.cache.tick_size(token_id).await?;

        match requested {
            None => Ok(minimum),
            Some(requested) if requested < minimum => {
                warn!(
                    token_id,
                    requested = %requested,
                    minimum = %minimum,
                    "Requested tick size is finer than the market allows"
                );
                Err(Error::TickSizeTooSmall {
                    requested: requested.as_decimal(),
                    minimum: minimum.as_decimal(),
                })
            }
            Some(requested) => Ok(requested),
        }
    }

    /// Price at which `amount` clears against the current book.
    ///
    /// BUY walks the asks with `amount` in collateral; SELL walks the bids
    /// with `amount` in shares.
    pub async fn calculate_market_price(
        &self,
        token_id: &str,
        side: OrderSide,
        amount: Decimal,
        order_type: OrderType,
    ) -> Result<Decimal> {
        let no_match = || Error::NoMatchingLiquidity {
            token_id: token_id.to_string(),
            side: side.to_string(),
        };

        let book = match self.cache.venue().get_order_book(token_id).await {
            Ok(book) => book,
            Err(Error::NoOrderBook { .. }) => return Err(no_match()),
            Err(e) => return Err(e),
        };

        let price = match side {
            OrderSide::Buy => {
                if book.asks.is_empty() {
                    return Err(no_match());
                }
                match &self.builder {
                    Some(builder) => {
                        builder.calculate_buy_market_price(&book.asks, amount, order_type)
                    }
                    None => buy_market_price(&book.asks, amount, order_type),
                }
            }
            OrderSide::Sell => {
                if book.bids.is_empty() {
                    return Err(no_match());
                }
                match &self.builder {
                    Some(builder) => {
                        builder.calculate_sell_market_price(&book.bids, amount, order_type)
                    }
                    None => sell_market_price(&book.bids, amount, order_type),
                }
            }
        }
        .ok_or_else(no_match)?;

        debug!(
            token_id,
            side = %side,
            amount = %amount,
            price = %price,
            "Calculated market price"
        );
        Ok(price)
    }
}

impl std::fmt::Debug for PricingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PricingEngine")
            .field("cache", &self.cache)
            .field("has_builder", &self.builder.is_some())
            .finish()
    }
}
