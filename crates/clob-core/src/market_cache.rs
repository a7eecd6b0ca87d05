//! Per-token market parameters, fetched once and kept.
//!
//! Tick sizes and neg-risk flags almost never change for a token, so entries
//! are never refreshed or evicted. A market that does change its tick size
//! needs a new client to be picked up. Two concurrent misses for one token may
//! both fetch; the values are the same either way.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::api::VenueApi;
use crate::types::TickSize;
use crate::Result;

/// Lazily populated tick-size and neg-risk lookups for one client.
pub struct MarketCache {
    venue: Arc<dyn VenueApi>,
    tick_sizes: DashMap<String, TickSize>,
    neg_risk: DashMap<String, bool>,
}

impl MarketCache {
    pub fn new(venue: Arc<dyn VenueApi>) -> Self {
        Self {
            venue,
            tick_sizes: DashMap::new(),
            neg_risk: DashMap::new(),
        }
    }

    pub fn venue(&self) -> &Arc<dyn VenueApi> {
        &self.venue
    }

    pub async fn tick_size(&self, token_id: &str) -> Result<TickSize> {
        // Copy out before awaiting so no shard lock is held across the fetch
        if let Some(tick_size) = self.tick_sizes.get(token_id).map(|e| *e) {
            return Ok(tick_size);
        }

        let tick_size = self.venue.get_tick_size(token_id).await?;
        self.tick_sizes.insert(token_id.to_string(), tick_size);

        debug!(token_id, tick_size = %tick_size, "Cached tick size");
        Ok(tick_size)
    }

    pub async fn neg_risk(&self, token_id: &str) -> Result<bool> {
        if let Some(neg_risk) = self.neg_risk.get(token_id).map(|e| *e) {
            return Ok(neg_risk);
        }

        let neg_risk = self.venue.get_neg_risk(token_id).await?;
        self.neg_risk.insert(token_id.to_string(), neg_risk);

        debug!(token_id, neg_risk, "Cached neg-risk status");
        Ok(neg_risk)
    }

    /// Number of tokens with a cached tick size.
    pub fn cached_tick_sizes(&self) -> usize {
        self.tick_sizes.len()
    }
}

impl std::fmt::Debug for MarketCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketCache")
            .field("tick_sizes", &self.tick_sizes.len())
            .field("neg_risk", &self.neg_risk.len())
            .finish()
    }
}
