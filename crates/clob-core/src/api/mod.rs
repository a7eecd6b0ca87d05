//! API clients for external services.

pub mod clob;

pub use clob::{ClobHttpClient, PostOrderRequest, PostOrderResponse, VenueApi};
