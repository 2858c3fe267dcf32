//! Limiter construction from [`RateLimitConfig`].

use std::sync::Arc;

use zsdk_common::{GlobalLimiter, RequestLimiter, SlidingWindowLimiter, Unlimited};
use zsdk_domain::RateLimitConfig;

/// Build the limiter a client shares across all of its requests.
pub fn limiter_from_config(config: &RateLimitConfig) -> Arc<dyn RequestLimiter> {
    match *config {
        RateLimitConfig::Dual {
            read_limit,
            write_limit,
            read_period_secs,
            write_period_secs,
            read_hourly_limit,
            write_hourly_limit,
            delete_hourly_limit,
        } => Arc::new(SlidingWindowLimiter::with_hourly(
            read_limit,
            write_limit,
            read_period_secs,
            write_period_secs,
            read_hourly_limit,
            write_hourly_limit,
            delete_hourly_limit,
        )),
        RateLimitConfig::Global { limit, period_secs } => {
            Arc::new(GlobalLimiter::new(limit, period_secs))
        }
        RateLimitConfig::Disabled => Arc::new(Unlimited),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zsdk_common::{Admission, OperationClass};

    #[test]
    fn test_dual_config_keeps_classes_independent() {
        let limiter = limiter_from_config(&RateLimitConfig::dual(1, 1, 60, 60));

        assert_eq!(limiter.wait(OperationClass::Read), Admission::Admitted);
        assert!(limiter.wait(OperationClass::Read).must_wait());
        assert_eq!(limiter.wait(OperationClass::Write), Admission::Admitted);
    }

    #[test]
    fn test_global_config_shares_one_bucket() {
        let limiter = limiter_from_config(&RateLimitConfig::Global { limit: 1, period_secs: 60 });

        assert_eq!(limiter.wait(OperationClass::Read), Admission::Admitted);
        assert!(limiter.wait(OperationClass::Delete).must_wait());
    }

    #[test]
    fn test_disabled_config_always_admits() {
        let limiter = limiter_from_config(&RateLimitConfig::Disabled);
        for _ in 0..1000 {
            assert_eq!(limiter.wait(OperationClass::Write), Admission::Admitted);
        }
    }
}
