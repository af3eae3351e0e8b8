//! Telemetry initialization
//!
//! Installs a `tracing` subscriber filtered by `RUST_LOG`.

mod init_basic;

pub use init_basic::{init_telemetry, shutdown_telemetry};
