//! Latency benchmarks for the signing and pricing hot paths.
//!
//! Run with: `cargo bench --bench latency`

use alloy_primitives::B256;
use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_decimal::Decimal;

use clob_core::signing::headers::{build_l2_headers_at, sign_l2_request};
use clob_core::signing::order_builder::market_order_amounts;
use clob_core::signing::{
    buy_market_price, reconstruct, reconstruct_verified, sell_market_price, LocalSigner,
    OrderSide, RequestArgs, SignatureComponents, Signer,
};
use clob_core::types::{OrderBookSummary, OrderType, PriceLevel, TickSize};
use clob_core::{price_valid, ApiCredentials};

// Test private key (DO NOT USE IN PRODUCTION)
const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Generate a synthetic book with the specified depth, best levels first.
fn generate_book(depth: usize) -> OrderBookSummary {
    let mut bids = Vec::with_capacity(depth);
    let mut asks = Vec::with_capacity(depth);

    for i in 0..depth {
        let offset = Decimal::new(i as i64, 4);
        bids.push(PriceLevel::new(
            Decimal::new(4900, 4) - offset,
            Decimal::new(100 + i as i64 * 10, 0),
        ));
        asks.push(PriceLevel::new(
            Decimal::new(5100, 4) + offset,
            Decimal::new(100 + i as i64 * 10, 0),
        ));
    }

    OrderBookSummary {
        market: "0xbench".to_string(),
        asset_id: "1".to_string(),
        timestamp: Utc::now(),
        bids,
        asks,
    }
}

fn credentials() -> ApiCredentials {
    ApiCredentials::new(
        "bench-key".to_string(),
        "c2VjcmV0LXNlY3JldC1zZWNyZXQ=".to_string(),
        "bench-pass".to_string(),
    )
}

/// Benchmark walking the book for a market price.
fn bench_book_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("book_walk");

    for depth in [5, 10, 50, 100].iter() {
        let book = generate_book(*depth);
        // Large enough to reach the far end of the book
        let amount = Decimal::new(*depth as i64 * 60, 0);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("buy", depth), &book, |b, book| {
            b.iter(|| {
                black_box(buy_market_price(
                    black_box(&book.asks),
                    black_box(amount),
                    OrderType::Fak,
                ))
            })
        });
        group.bench_with_input(BenchmarkId::new("sell", depth), &book, |b, book| {
            b.iter(|| {
                black_box(sell_market_price(
                    black_box(&book.bids),
                    black_box(amount),
                    OrderType::Fak,
                ))
            })
        });
    }

    group.finish();
}

/// Benchmark amount rounding and price validation.
fn bench_order_amounts(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_amounts");
    let price = Decimal::new(33, 2);

    for tick in [TickSize::Tenth, TickSize::Hundredth, TickSize::TenThousandth] {
        let config = tick.round_config();
        group.bench_function(BenchmarkId::new("buy", tick.to_string()), |b| {
            b.iter(|| {
                black_box(market_order_amounts(
                    OrderSide::Buy,
                    black_box(Decimal::from(10)),
                    black_box(price),
                    config,
                ))
            })
        });
    }

    group.bench_function("price_valid", |b| {
        b.iter(|| black_box(price_valid(black_box(price), TickSize::Hundredth)))
    });

    group.finish();
}

/// Benchmark L2 HMAC header construction.
fn bench_l2_headers(c: &mut Criterion) {
    let mut group = c.benchmark_group("l2_headers");
    let creds = credentials();
    let address = LocalSigner::from_private_key(TEST_PRIVATE_KEY)
        .expect("valid key")
        .address();
    let body = serde_json::json!({ "order": { "salt": 1 }, "owner": "bench-key" }).to_string();
    let request = RequestArgs::new("POST", "/order").with_body(body.clone());

    group.throughput(Throughput::Elements(1));
    group.bench_function("hmac", |b| {
        b.iter(|| {
            black_box(sign_l2_request(
                &creds,
                "POST",
                "/order",
                "1700000000",
                Some(black_box(body.as_str())),
            ))
        })
    });
    group.bench_function("headers", |b| {
        b.iter(|| black_box(build_l2_headers_at(address, &creds, &request, 1_700_000_000)))
    });

    group.finish();
}

/// Benchmark turning MPC components into a checked signature.
fn bench_signature_reconstruction(c: &mut Criterion) {
    let mut group = c.benchmark_group("signature_reconstruction");

    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let signer = LocalSigner::from_private_key(TEST_PRIVATE_KEY).expect("valid key");
    let hash = B256::repeat_byte(0x42);
    let signature = runtime.block_on(signer.sign(hash)).expect("local signing");
    let components = SignatureComponents::new(
        format!("03{}", hex::encode(signature.r())),
        hex::encode(signature.s()),
        signature.recovery_id(),
    );
    let expected = signer.address();

    group.throughput(Throughput::Elements(1));
    group.bench_function("reconstruct", |b| {
        b.iter(|| black_box(reconstruct(black_box(&components))))
    });
    group.bench_function("reconstruct_verified", |b| {
        b.iter(|| {
            black_box(reconstruct_verified(
                black_box(&components),
                black_box(&hash),
                expected,
            ))
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_book_walk,
    bench_order_amounts,
    bench_l2_headers,
    bench_signature_reconstruction,
);

criterion_main!(benches);
