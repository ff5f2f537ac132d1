//! Property tests for breaker thresholds and backoff bounds

use proptest::prelude::*;
use std::time::Duration;
use textproc_core::cache::CompressionCodec;
use textproc_core::resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, RetryConfig, RetryPolicy,
};

fn breaker(threshold: u32) -> CircuitBreaker {
    CircuitBreaker::new(
        "prop",
        CircuitBreakerConfig {
            failure_threshold: threshold,
            recovery_timeout_seconds: 3600.0,
            half_open_max_calls: 1,
        },
    )
}

proptest! {
    /// Property: the circuit opens exactly at the threshold, never before
    #[test]
    fn circuit_opens_at_threshold(threshold in 1u32..50) {
        let cb = breaker(threshold);
        for _ in 0..threshold - 1 {
            cb.record_failure(Duration::ZERO);
            prop_assert_eq!(cb.state(), CircuitState::Closed);
        }
        cb.record_failure(Duration::ZERO);
        prop_assert_eq!(cb.state(), CircuitState::Open);
        prop_assert!(!cb.try_acquire());
    }

    /// Property: a success resets the consecutive failure count
    #[test]
    fn success_resets_failure_streak(threshold in 2u32..50, failures in 1u32..49) {
        let failures = failures.min(threshold - 1);
        let cb = breaker(threshold);
        for _ in 0..failures {
            cb.record_failure(Duration::ZERO);
        }
        cb.record_success(Duration::ZERO);
        prop_assert_eq!(cb.failure_count(), 0);
        prop_assert_eq!(cb.state(), CircuitState::Closed);
    }

    /// Property: the capped exponential term plus jitter bounds every delay
    #[test]
    fn backoff_delay_is_bounded(
        attempt in 1u32..64,
        multiplier in 0.0f64..10.0,
        min in 0.0f64..30.0,
        spread in 0.0f64..60.0,
        jitter_max in 0.0f64..5.0,
        max_delay in 0.0f64..120.0,
    ) {
        let config = RetryConfig {
            max_attempts: 10,
            max_delay_seconds: max_delay,
            exponential_multiplier: multiplier,
            exponential_min: min,
            exponential_max: min + spread,
            jitter: true,
            jitter_max,
        };
        let policy = RetryPolicy::new(config);
        let delay = policy.delay_for_attempt(attempt).as_secs_f64();

        prop_assert!(delay <= max_delay + jitter_max + 1e-6);
        prop_assert!(delay <= min + spread + jitter_max + 1e-6);
        prop_assert!(delay + 1e-6 >= min.min(max_delay));
    }

    /// Property: decoding an encoded payload yields the original bytes
    #[test]
    fn codec_preserves_payload(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let codec = CompressionCodec::new(256, 6);
        let encoded = codec.encode(&data).unwrap();
        prop_assert_eq!(codec.decode(&encoded).unwrap(), data);
    }
}
