//! Built-in steps operating on persisted resources.

mod delete_acl;
mod delete_files;
mod delete_resource;

pub use delete_acl::DeleteAccessControl;
pub use delete_files::DeleteFiles;
pub use delete_resource::DeleteResource;
