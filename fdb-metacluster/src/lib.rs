#![warn(
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    unreachable_pub
)]

//! Tenant and metacluster metadata management for Tokio
//!
//! A metacluster is a set of data clusters together with a shared
//! tenant metadata namespace that places tenants on them. This crate
//! provides the metadata layout, the management operations and the
//! administrative `metacluster` command. Every operation runs inside
//! a retry loop over a transactional key-value store abstracted by
//! the [`Database`] and [`Transaction`] traits. [`MemDatabase`] is an
//! in-memory implementation of these traits.
//!
//! [`Database`]: crate::database::Database
//! [`Transaction`]: crate::transaction::Transaction
//! [`MemDatabase`]: crate::database::MemDatabase

mod key_value;
mod option;

pub mod codec;
pub mod command;
pub mod config;
pub mod database;
pub mod error;
pub mod future;
pub mod metacluster;
pub mod range;
pub mod subspace;
pub mod tenant;
pub mod transaction;
pub mod tuple;

pub use crate::key_value::{Key, KeyValue, Value};

pub use crate::config::MetaclusterConfig;

pub use crate::metacluster::{ClusterName, MetaclusterManagement};

pub use crate::tenant::{TenantGroupName, TenantName};
