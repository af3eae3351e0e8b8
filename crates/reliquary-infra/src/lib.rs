//! Reliquary Infrastructure Library
//!
//! Shared infrastructure used by the pipeline crates:
//! - Event bus (publisher and listeners)
//! - Telemetry initialization
//! - Per-job-type rate limiting

pub mod events;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

// Re-export commonly used types
pub use events::{
    ChannelListener, EventListener, LoggingListener, Publisher, RecordingListener, SubscriptionId,
};

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry};

#[cfg(feature = "rate-limit")]
pub use rate_limit::RateLimiter;
