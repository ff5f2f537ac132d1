use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;
use textproc_core::cache::{CompressionCodec, InMemoryCacheService, L2Backend, TieredCache};
use textproc_core::config::CacheConfig;
use textproc_core::errors::ServiceError;
use textproc_core::resilience::{CircuitBreaker, CircuitBreakerConfig, ResilienceOrchestrator};

fn benchmark_codec(c: &mut Criterion) {
    let codec = CompressionCodec::new(1000, 6);
    let small = vec![b'a'; 512];
    let large = "lorem ipsum dolor sit amet ".repeat(400).into_bytes();
    let encoded_large = codec.encode(&large).unwrap_or_default();

    c.bench_function("codec_encode_raw", |b| b.iter(|| codec.encode(black_box(&small))));
    c.bench_function("codec_encode_compressed", |b| {
        b.iter(|| codec.encode(black_box(&large)))
    });
    c.bench_function("codec_decode_compressed", |b| {
        b.iter(|| codec.decode(black_box(&encoded_large)))
    });
}

fn benchmark_circuit_breaker(c: &mut Criterion) {
    let breaker = CircuitBreaker::new("bench", CircuitBreakerConfig::default());
    c.bench_function("circuit_breaker_acquire_success", |b| {
        b.iter(|| {
            if breaker.try_acquire() {
                breaker.record_success(Duration::from_micros(10));
            }
        })
    });
}

fn benchmark_orchestrator(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let orchestrator = ResilienceOrchestrator::default();

    c.bench_function("orchestrator_execute_success", |b| {
        b.iter(|| {
            runtime.block_on(async {
                orchestrator
                    .execute("bench", || async { Ok::<_, ServiceError>(black_box(1)) })
                    .await
            })
        })
    });
}

fn benchmark_tiered_cache(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let cache = TieredCache::with_backend(
        CacheConfig::default(),
        L2Backend::InMemory(InMemoryCacheService::default()),
    );
    runtime.block_on(cache.set("hot", &"a cached summary", None));

    c.bench_function("tiered_cache_l1_hit", |b| {
        b.iter(|| runtime.block_on(cache.get::<String>(black_box("hot"))))
    });
    c.bench_function("tiered_cache_miss", |b| {
        b.iter(|| runtime.block_on(cache.get::<String>(black_box("cold"))))
    });
}

criterion_group!(
    benches,
    benchmark_codec,
    benchmark_circuit_breaker,
    benchmark_orchestrator,
    benchmark_tiered_cache
);
criterion_main!(benches);
