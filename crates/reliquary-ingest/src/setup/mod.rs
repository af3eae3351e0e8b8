//! Service construction
//!
//! Builds the [`AppState`](crate::AppState) from configuration and starts the
//! job queue's worker pool against it.

pub mod services;
