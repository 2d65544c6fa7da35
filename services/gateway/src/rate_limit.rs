use crate::error::AppError;
use dashmap::DashMap;
use std::time::Instant;
use types::ids::UserId;

/// Token bucket for one (user, action) pair.
#[derive(Clone)]
struct Bucket {
    capacity: u32,
    tokens: f64,
    refill_per_sec: f64,
    last_update: Instant,
}

impl Bucket {
    fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            capacity,
            tokens: capacity as f64,
            refill_per_sec,
            last_update: Instant::now(),
        }
    }

    fn allow(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = f64::min(
            self.capacity as f64,
            self.tokens + elapsed * self.refill_per_sec,
        );
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-user request budgets for the trading endpoints.
pub struct RateLimiter {
    buckets: DashMap<(UserId, &'static str), Bucket>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    pub fn check(
        &self,
        user: &UserId,
        action: &'static str,
        capacity: u32,
        refill_per_sec: f64,
    ) -> Result<(), AppError> {
        let mut bucket = self
            .buckets
            .entry((*user, action))
            .or_insert_with(|| Bucket::new(capacity, refill_per_sec));
        if bucket.allow() {
            Ok(())
        } else {
            Err(AppError::RateLimitExceeded(format!(
                "rate limit for {action}"
            )))
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_exhausts_and_refills() {
        let limiter = RateLimiter::new();
        let user = UserId::new();

        assert!(limiter.check(&user, "order", 2, 0.0).is_ok());
        assert!(limiter.check(&user, "order", 2, 0.0).is_ok());
        assert!(limiter.check(&user, "order", 2, 0.0).is_err());

        // Independent action budget.
        assert!(limiter.check(&user, "cancel", 2, 0.0).is_ok());
    }

    #[test]
    fn test_buckets_are_per_user() {
        let limiter = RateLimiter::new();
        let a = UserId::new();
        let b = UserId::new();

        assert!(limiter.check(&a, "order", 1, 0.0).is_ok());
        assert!(limiter.check(&a, "order", 1, 0.0).is_err());
        assert!(limiter.check(&b, "order", 1, 0.0).is_ok());
    }
}
