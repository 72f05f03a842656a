//! Provides types and functions for managing a metacluster.
//!
//! A metacluster is a set of registered data clusters together with
//! the tenant metadata that places tenants on them. Capacity is
//! counted in tenant groups. Every tenant group and every ungrouped
//! tenant occupies one unit on the cluster it is placed on.
//!
//! Clients should in most cases go through [`MetaclusterManagement`].

mod cluster_name;
mod data_cluster;
mod metacluster_management;
mod metacluster_metadata;

pub use cluster_name::ClusterName;
pub use data_cluster::{ClusterConfiguration, ClusterUsage, DataClusterEntry, DataClusterMetadata};
pub use metacluster_management::{MetaclusterManagement, TenantConfig};
pub use metacluster_metadata::MetaclusterMetadata;
