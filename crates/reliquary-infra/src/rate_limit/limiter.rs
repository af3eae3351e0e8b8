use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use reliquary_core::models::JobType;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64, // tokens per second
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn time_until_next_token(&self) -> Duration {
        if self.tokens >= 1.0 {
            Duration::from_secs(0)
        } else {
            let seconds = (1.0 - self.tokens) / self.refill_rate;
            Duration::from_secs_f64(seconds.max(0.0))
        }
    }
}

/// Limits how often jobs of each type may start.
///
/// A rate of zero (or less) leaves that job type unlimited. Limited types get
/// a bucket with a burst capacity of twice their per-second rate.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<JobType, TokenBucket>>>,
    rates: HashMap<JobType, f64>,
}

impl RateLimiter {
    /// Derivative generation is CPU-heavy; ingest is left unlimited.
    pub fn new(derivative_rate: f64) -> Self {
        Self::unlimited().with_rate(JobType::CreateDerivatives, derivative_rate)
    }

    pub fn unlimited() -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            rates: HashMap::new(),
        }
    }

    pub fn with_rate(mut self, job_type: JobType, rate: f64) -> Self {
        if rate > 0.0 {
            self.rates.insert(job_type, rate);
        } else {
            self.rates.remove(&job_type);
        }
        self
    }

    fn rate_for(&self, job_type: &JobType) -> Option<f64> {
        self.rates.get(job_type).copied()
    }

    /// Acquire a token for the given job type, waiting until one is available
    #[tracing::instrument(skip(self))]
    pub async fn acquire(&self, job_type: &JobType) {
        let Some(rate) = self.rate_for(job_type) else {
            return;
        };

        loop {
            let wait_duration = {
                let mut buckets = self.buckets.lock().await;
                let bucket = buckets
                    .entry(*job_type)
                    .or_insert_with(|| TokenBucket::new(rate * 2.0, rate));

                if bucket.try_acquire() {
                    tracing::trace!(
                        job_type = %job_type,
                        tokens_remaining = bucket.tokens,
                        "Rate limit token acquired"
                    );
                    return;
                }

                bucket.time_until_next_token()
            };

            if wait_duration > Duration::from_secs(0) {
                tracing::debug!(
                    job_type = %job_type,
                    wait_ms = wait_duration.as_millis(),
                    "Rate limit reached, waiting for token"
                );
                tokio::time::sleep(wait_duration).await;
            }
        }
    }

    /// Try to acquire a token without waiting
    pub async fn try_acquire(&self, job_type: &JobType) -> bool {
        let Some(rate) = self.rate_for(job_type) else {
            return true;
        };

        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry(*job_type)
            .or_insert_with(|| TokenBucket::new(rate * 2.0, rate));
        bucket.try_acquire()
    }

    /// Tokens currently available, or `None` for unlimited job types.
    pub async fn available_tokens(&self, job_type: &JobType) -> Option<f64> {
        let rate = self.rate_for(job_type)?;

        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry(*job_type)
            .or_insert_with(|| TokenBucket::new(rate * 2.0, rate));
        bucket.refill();
        Some(bucket.tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn limited_bucket_starts_at_twice_the_rate() {
        let limiter = RateLimiter::new(2.0);

        let tokens = limiter
            .available_tokens(&JobType::CreateDerivatives)
            .await
            .unwrap();
        assert_eq!(tokens, 4.0);
        assert!(limiter.available_tokens(&JobType::IngestFile).await.is_none());
    }

    #[tokio::test]
    async fn try_acquire_drains_without_blocking() {
        let limiter = RateLimiter::new(1.0);

        assert!(limiter.try_acquire(&JobType::CreateDerivatives).await);
        assert!(limiter.try_acquire(&JobType::CreateDerivatives).await);
        assert!(!limiter.try_acquire(&JobType::CreateDerivatives).await);

        // Unlimited types are never refused
        for _ in 0..10 {
            assert!(limiter.try_acquire(&JobType::IngestFile).await);
        }
    }

    #[tokio::test]
    async fn tokens_refill_over_time() {
        let limiter = RateLimiter::new(10.0);
        for _ in 0..20 {
            limiter.acquire(&JobType::CreateDerivatives).await;
        }

        let drained = limiter
            .available_tokens(&JobType::CreateDerivatives)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let refilled = limiter
            .available_tokens(&JobType::CreateDerivatives)
            .await
            .unwrap();

        assert!(drained < 1.0);
        assert!(refilled > drained);
    }

    #[tokio::test]
    async fn zero_rate_means_unlimited() {
        let limiter = RateLimiter::new(0.0);
        assert!(limiter
            .available_tokens(&JobType::CreateDerivatives)
            .await
            .is_none());
        limiter.acquire(&JobType::CreateDerivatives).await;
    }
}
