//! Reliquary Transactions
//!
//! A transaction is an ordered list of named steps resolved against a
//! [`Container`] when it is built. Calling it threads one value through every
//! step and stops at the first failure. Nothing is rolled back: steps that
//! already ran keep their effects.

pub mod container;
pub mod destroy;
pub mod step;
pub mod steps;
pub mod transaction;

pub use container::{default_container, Container};
pub use destroy::{FileSetDestroy, WorkDestroy};
pub use step::{Step, StepOptions};
pub use steps::{DeleteAccessControl, DeleteFiles, DeleteResource};
pub use transaction::{StepFailure, Transaction, TransactionError};
