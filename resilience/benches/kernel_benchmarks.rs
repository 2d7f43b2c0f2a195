//! Resilience kernel benchmarks
//!
//! Overhead of the pieces every collaborator call goes through:
//! - Backoff: delay calculation per strategy
//! - CircuitBreaker: admission and outcome recording
//! - RateLimiter: non-blocking admission
//! - Executor: the full stack around a no-op thunk
//!
//! Run with: `cargo bench --bench kernel_benchmarks`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use beverage_inventor_core::{DependencyKind, InventorError};
use beverage_inventor_resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use beverage_inventor_resilience::executor::Executor;
use beverage_inventor_resilience::rate_limiter::{RateLimitConfig, RateLimiter};
use beverage_inventor_resilience::registry::ResilienceRegistry;
use beverage_inventor_resilience::retry::Backoff;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use std::time::Duration;

/// Benchmark backoff delay calculation
fn benchmark_backoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("backoff");
    group.throughput(Throughput::Elements(1));

    let base = Duration::from_millis(100);
    let cap = Duration::from_secs(5);
    let strategies = [
        ("fixed", Backoff::Fixed { delay: base }),
        ("linear", Backoff::Linear { base, step: base, cap }),
        ("exponential", Backoff::exponential(base, cap)),
        ("decorrelated", Backoff::DecorrelatedJitter { base, cap }),
    ];

    for (name, backoff) in strategies {
        group.bench_with_input(BenchmarkId::new("delay", name), &backoff, |b, backoff| {
            let mut rng = rand::thread_rng();
            b.iter(|| black_box(backoff.delay(black_box(3), base, &mut rng)));
        });
    }

    group.finish();
}

/// Benchmark circuit breaker overhead
fn benchmark_circuit_breaker(c: &mut Criterion) {
    let mut group = c.benchmark_group("circuit_breaker");
    group.throughput(Throughput::Elements(1));

    group.bench_function("acquire_success", |b| {
        let breaker = CircuitBreaker::new("bench", CircuitBreakerConfig::default());
        b.iter(|| {
            if let Ok(permit) = breaker.try_acquire() {
                permit.success();
            }
        });
    });

    group.bench_function("reject_open", |b| {
        let config = CircuitBreakerConfig::builder().max_failures(1).build();
        let breaker = CircuitBreaker::new("bench", config);
        if let Ok(permit) = breaker.try_acquire() {
            permit.failure();
        }
        b.iter(|| black_box(breaker.try_acquire().is_err()));
    });

    group.finish();
}

/// Benchmark rate limiter admission
fn benchmark_rate_limiter(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limiter");
    group.throughput(Throughput::Elements(1));

    group.bench_function("token_bucket_allow", |b| {
        let limiter = RateLimiter::new(
            "bench",
            RateLimitConfig::token_bucket(u32::MAX, Duration::from_secs(1), u32::MAX),
        );
        b.iter(|| black_box(limiter.allow()));
    });

    group.bench_function("sliding_window_allow", |b| {
        let limiter = RateLimiter::new("bench", RateLimitConfig::sliding_window(1000, Duration::from_millis(10)));
        b.iter(|| black_box(limiter.allow()));
    });

    group.finish();
}

/// Benchmark the composed executor around a no-op call
fn benchmark_executor(c: &mut Criterion) {
    let mut group = c.benchmark_group("executor");
    group.throughput(Throughput::Elements(1));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime");

    group.bench_function("execute_success", |b| {
        let mut profile = beverage_inventor_resilience::ResilienceProfile::for_kind(DependencyKind::Database);
        profile.rate_limit = RateLimitConfig::token_bucket(u32::MAX, Duration::from_secs(1), u32::MAX);
        let registry = ResilienceRegistry::with_profiles([(DependencyKind::Database, profile)]);
        let executor = Executor::new(Arc::new(registry));

        b.to_async(&runtime).iter(|| async {
            let _ = executor
                .execute("repository.find_by_id", DependencyKind::Database, |_| async {
                    Ok::<_, InventorError>(42)
                })
                .await;
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_backoff,
    benchmark_circuit_breaker,
    benchmark_rate_limiter,
    benchmark_executor
);
criterion_main!(benches);
