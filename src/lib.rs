//! MPC CLOB Client
//!
//! Root crate for benchmarks and cross-module integration tests.
//! The functionality lives in `clob-core`.

pub use clob_core as core;
pub use clob_core::{ApiCredentials, AuthLevel, Config, Error, MpcClobClient, Result};
