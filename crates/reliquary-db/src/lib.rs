//! Reliquary persistence layer
//!
//! The persistence gateway (resources and atomic change sets), the job store
//! backing the worker queue, and the search index the derivative job updates.

pub mod db;

pub use db::*;
