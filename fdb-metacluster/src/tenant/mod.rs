//! Provides types and functions for managing tenants.
//!
//! A tenant is a named, isolated slice of the key-space addressed
//! through an 8-byte prefix derived from its id. Tenant metadata lives
//! under a configurable root, see [`TenantMetadata`].
//!
//! Clients should in most cases use the `_db` functions of
//! [`TenantManagement`]. These implement a proper retry loop around
//! the corresponding `_tr` function.

mod tenant_entry;
mod tenant_management;
mod tenant_metadata;

pub(crate) mod tenant_inner;

pub use tenant_entry::{
    id_to_prefix, prefix_to_id, TenantGroupEntry, TenantMapEntry, TenantState, TENANT_PREFIX_SIZE,
};
pub use tenant_inner::{printable, TenantGroupName, TenantName};
pub use tenant_management::TenantManagement;
pub use tenant_metadata::TenantMetadata;

pub(crate) use tenant_management::apply_options;
pub(crate) use tenant_metadata::{name_tuple, read_range};
