//! Rate limiting service
//!
//! Token buckets keyed by job type.

pub use limiter::RateLimiter;

mod limiter;
