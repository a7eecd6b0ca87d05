//! Order book types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single price level in the order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Snapshot of one token's book.
///
/// Both sides are kept best-to-worst: bids by descending price, asks by
/// ascending price. Use [`OrderBookSummary::normalized`] after building one
/// from venue data, which does not guarantee an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSummary {
    pub market: String,
    pub asset_id: String,
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl OrderBookSummary {
    /// Sort both sides best-to-worst and drop empty levels.
    pub fn normalized(mut self) -> Self {
        self.bids.retain(|l| l.size > Decimal::ZERO);
        self.asks.retain(|l| l.size > Decimal::ZERO);
        self.bids.sort_by(|a, b| b.price.cmp(&a.price));
        self.asks.sort_by(|a, b| a.price.cmp(&b.price));
        self
    }

    /// Returns the best bid price (highest buy order).
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Returns the best ask price (lowest sell order).
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> OrderBookSummary {
        OrderBookSummary {
            market: "0xabc".to_string(),
            asset_id: "123".to_string(),
            timestamp: Utc::now(),
            bids,
            asks,
        }
    }

    #[test]
    fn test_normalized_orders_best_first() {
        // Venue order: worst-first on both sides
        let summary = book(
            vec![
                PriceLevel::new(Decimal::new(40, 2), Decimal::from(10)),
                PriceLevel::new(Decimal::new(45, 2), Decimal::from(5)),
                PriceLevel::new(Decimal::new(48, 2), Decimal::from(1)),
            ],
            vec![
                PriceLevel::new(Decimal::new(60, 2), Decimal::from(10)),
                PriceLevel::new(Decimal::new(55, 2), Decimal::from(5)),
                PriceLevel::new(Decimal::new(52, 2), Decimal::from(1)),
            ],
        )
        .normalized();

        assert_eq!(summary.best_bid(), Some(Decimal::new(48, 2)));
        assert_eq!(summary.best_ask(), Some(Decimal::new(52, 2)));
        assert_eq!(summary.bids.last().map(|l| l.price), Some(Decimal::new(40, 2)));
        assert_eq!(summary.asks.last().map(|l| l.price), Some(Decimal::new(60, 2)));
    }

    #[test]
    fn test_normalized_drops_empty_levels() {
        let summary = book(
            vec![PriceLevel::new(Decimal::new(40, 2), Decimal::ZERO)],
            vec![PriceLevel::new(Decimal::new(60, 2), Decimal::from(3))],
        )
        .normalized();

        assert!(summary.bids.is_empty());
        assert_eq!(summary.best_bid(), None);
        assert_eq!(summary.asks.len(), 1);
    }
}
