//! Host-side resources
//!
//! aptly objects, keys, the package and the service are all
//! [`declarative::GuardedCommand`]s. Files the tool renders itself (the
//! aptly config, the apt source list, the API unit) are [`ManagedFile`]s.

mod managed_file;

pub use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};
pub use managed_file::ManagedFile;
