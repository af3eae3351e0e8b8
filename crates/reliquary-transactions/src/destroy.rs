//! Destroy transactions for works and file sets.

use reliquary_core::models::Resource;

use crate::container::Container;
use crate::transaction::{Transaction, TransactionError};

/// Deletes a Work and the ACLs that point at it.
pub struct WorkDestroy;

impl WorkDestroy {
    pub const DEFAULT_STEPS: &'static [&'static str] =
        &["work_resource.delete", "work_resource.delete_acl"];

    pub fn build(
        container: &Container<Resource>,
    ) -> Result<Transaction<Resource>, TransactionError> {
        Transaction::build(Self::DEFAULT_STEPS, container)
    }
}

/// Deletes a FileSet's files (records and bytes), its ACLs, then the FileSet.
///
/// The FileSet record goes last so a run that fails part way can be retried
/// from the FileSet, which still lists whatever files are left.
pub struct FileSetDestroy;

impl FileSetDestroy {
    pub const DEFAULT_STEPS: &'static [&'static str] = &[
        "file_set.delete_files",
        "file_set.delete_acl",
        "file_set.delete",
    ];

    pub fn build(
        container: &Container<Resource>,
    ) -> Result<Transaction<Resource>, TransactionError> {
        Transaction::build(Self::DEFAULT_STEPS, container)
    }
}
