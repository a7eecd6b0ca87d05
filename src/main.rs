//! Market Quote
//!
//! Prints the tick size, neg-risk flag and clearing price of a market order
//! using the client configured from the environment.
//!
//! Usage: `mpc-clob-client <token_id> <BUY|SELL> <amount>`

use anyhow::{bail, Context, Result};
use clob_core::signing::OrderSide;
use clob_core::types::OrderType;
use clob_core::{Config, MpcClobClient};
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mpc_clob_client=info,clob_core=info,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [token_id, side, amount] = args.as_slice() else {
        bail!("usage: mpc-clob-client <token_id> <BUY|SELL> <amount>");
    };

    let side = match side.to_ascii_uppercase().as_str() {
        "BUY" => OrderSide::Buy,
        "SELL" => OrderSide::Sell,
        other => bail!("side must be BUY or SELL, got {}", other),
    };
    let amount: Decimal = amount
        .parse()
        .with_context(|| format!("amount is not a decimal: {}", amount))?;

    let config = Config::from_env()?;
    let client = MpcClobClient::from_config(&config, None)?;

    let tick_size = client.get_tick_size(token_id).await?;
    let neg_risk = client.get_neg_risk(token_id).await?;
    let price = client
        .calculate_market_price(token_id, side, amount, OrderType::Fok)
        .await?;

    info!(
        token_id = %token_id,
        side = %side,
        amount = %amount,
        tick_size = %tick_size,
        neg_risk,
        price = %price,
        level = %client.level(),
        "Market quote"
    );

    Ok(())
}
