//! Core domain types for the CLOB client.

pub mod market;
pub mod order;

pub use market::*;
pub use order::*;
