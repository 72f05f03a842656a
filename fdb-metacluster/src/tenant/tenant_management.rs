use bytes::Bytes;
use tracing::info;

use crate::config::MetaclusterConfig;
use crate::database::{self, Database};
use crate::error::{
    FdbError, FdbResult, INVALID_TENANT_CONFIGURATION, TENANT_ALREADY_EXISTS, TENANT_NOT_FOUND,
    TENANT_PREFIX_ALLOCATOR_CONFLICT,
};
use crate::range::Range;
use crate::tenant::{
    id_to_prefix, read_range, TenantGroupEntry, TenantGroupName, TenantMapEntry, TenantMetadata,
    TenantName, TenantState,
};
use crate::transaction::{ReadTransaction, Transaction};
use crate::tuple::key_util;

/// Functions to manage the set of tenants of a single cluster.
///
/// The `_tr` functions do their work inside the caller's transaction
/// and never commit. The `_db` functions run the corresponding `_tr`
/// function inside [`database::run`], applying the configured
/// transaction options on every attempt.
#[derive(Debug)]
pub struct TenantManagement;

impl TenantManagement {
    /// Allocate the next tenant id.
    ///
    /// Reads and advances the last tenant id. Concurrent allocations
    /// conflict on that key, so an id is never issued twice. Fails
    /// with `tenant_prefix_allocator_conflict` if the candidate id was
    /// retired or if data is already stored under its prefix.
    pub async fn allocate_tenant_id_tr<T>(tr: &T, metadata: &TenantMetadata) -> FdbResult<i64>
    where
        T: Transaction,
    {
        let candidate = metadata
            .get_last_tenant_id(tr)
            .await?
            .unwrap_or(-1)
            .checked_add(1)
            .ok_or_else(|| FdbError::new(TENANT_PREFIX_ALLOCATOR_CONFLICT))?;

        if metadata.is_tombstoned(tr, candidate).await? {
            return Err(FdbError::new(TENANT_PREFIX_ALLOCATOR_CONFLICT));
        }

        let prefix = id_to_prefix(candidate);
        let prefix_range = Range::new(prefix.clone(), key_util::strinc(prefix)?);
        let prefix_in_use = !read_range(tr, prefix_range, 1).await?.is_empty();

        if prefix_in_use {
            return Err(FdbError::new(TENANT_PREFIX_ALLOCATOR_CONFLICT));
        }

        metadata.set_last_tenant_id(tr, candidate);

        Ok(candidate)
    }

    /// Creates a new tenant in the cluster.
    ///
    /// The tenant is created in [`TenantState::Ready`]. Fails with
    /// `tenant_already_exists` if `name` is taken.
    pub async fn create_tenant_tr<T>(
        tr: &T,
        metadata: &TenantMetadata,
        name: &TenantName,
        tenant_group: Option<TenantGroupName>,
    ) -> FdbResult<TenantMapEntry>
    where
        T: Transaction,
    {
        if metadata.get_tenant(tr, name).await?.is_some() {
            return Err(FdbError::new(TENANT_ALREADY_EXISTS));
        }

        let id = TenantManagement::allocate_tenant_id_tr(tr, metadata).await?;
        let entry = TenantMapEntry::with_group(id, tenant_group, TenantState::Ready);

        metadata.set_tenant(tr, name, &entry);

        if let Some(group) = entry.tenant_group() {
            TenantManagement::join_tenant_group_tr(tr, metadata, group, name).await?;
        }

        Ok(entry)
    }

    /// Creates a new tenant in the cluster using a transaction
    /// created on the specified [`Database`].
    pub async fn create_tenant_db<D>(
        db: &D,
        config: &MetaclusterConfig,
        name: impl Into<TenantName>,
        tenant_group: Option<TenantGroupName>,
    ) -> FdbResult<TenantMapEntry>
    where
        D: Database,
    {
        let metadata = TenantMetadata::new(config.root().clone());
        let name = name.into();

        let metadata_ref = &metadata;
        let name_ref = &name;
        let tenant_group_ref = &tenant_group;

        let entry = database::run(db, |tr| async move {
            apply_options(&tr, config)?;
            TenantManagement::create_tenant_tr(&tr, metadata_ref, name_ref, tenant_group_ref.clone())
                .await
        })
        .await?;

        info!(tenant = %name, id = entry.id(), "tenant created");

        Ok(entry)
    }

    /// Deletes a tenant from the cluster.
    ///
    /// The id of the tenant is tombstoned and the tenant leaves its
    /// group. A group without tenants is removed. Fails with
    /// `tenant_not_found` if `name` does not exist.
    pub async fn delete_tenant_tr<T>(
        tr: &T,
        metadata: &TenantMetadata,
        name: &TenantName,
    ) -> FdbResult<TenantMapEntry>
    where
        T: Transaction,
    {
        let entry = metadata
            .get_tenant(tr, name)
            .await?
            .ok_or_else(|| FdbError::new(TENANT_NOT_FOUND))?;

        metadata.clear_tenant(tr, name);
        metadata.add_tombstone(tr, entry.id());

        if let Some(group) = entry.tenant_group() {
            TenantManagement::leave_tenant_group_tr(tr, metadata, group, name).await?;
        }

        Ok(entry)
    }

    /// Deletes a tenant from the cluster using a transaction created
    /// on the specified [`Database`].
    pub async fn delete_tenant_db<D>(
        db: &D,
        config: &MetaclusterConfig,
        name: impl Into<TenantName>,
    ) -> FdbResult<()>
    where
        D: Database,
    {
        let metadata = TenantMetadata::new(config.root().clone());
        let name = name.into();

        let metadata_ref = &metadata;
        let name_ref = &name;

        let entry = database::run(db, |tr| async move {
            apply_options(&tr, config)?;
            TenantManagement::delete_tenant_tr(&tr, metadata_ref, name_ref).await
        })
        .await?;

        info!(tenant = %name, id = entry.id(), "tenant deleted");

        Ok(())
    }

    /// Reads a tenant map entry.
    pub async fn try_get_tenant_tr<T>(
        tr: &T,
        metadata: &TenantMetadata,
        name: &TenantName,
    ) -> FdbResult<Option<TenantMapEntry>>
    where
        T: ReadTransaction,
    {
        metadata.get_tenant(tr, name).await
    }

    /// Reads a tenant map entry using a transaction created on the
    /// specified [`Database`]. Fails with `tenant_not_found` if
    /// `name` does not exist.
    pub async fn get_tenant_db<D>(
        db: &D,
        config: &MetaclusterConfig,
        name: impl Into<TenantName>,
    ) -> FdbResult<TenantMapEntry>
    where
        D: Database,
    {
        let metadata = TenantMetadata::new(config.root().clone());
        let name = name.into();

        let metadata_ref = &metadata;
        let name_ref = &name;

        database::run(db, |tr| async move {
            apply_options(&tr, config)?;
            TenantManagement::try_get_tenant_tr(&tr, metadata_ref, name_ref)
                .await?
                .ok_or_else(|| FdbError::new(TENANT_NOT_FOUND))
        })
        .await
    }

    /// Lists tenants with names in `[begin, end)`, in name order.
    pub async fn list_tenants_tr<T>(
        tr: &T,
        metadata: &TenantMetadata,
        begin: &TenantName,
        end: &TenantName,
        limit: i32,
    ) -> FdbResult<Vec<(TenantName, TenantMapEntry)>>
    where
        T: ReadTransaction,
    {
        metadata.list_tenants(tr, begin, end, limit).await
    }

    /// Lists tenants using a transaction created on the specified
    /// [`Database`].
    pub async fn list_tenants_db<D>(
        db: &D,
        config: &MetaclusterConfig,
        begin: impl Into<TenantName>,
        end: impl Into<TenantName>,
        limit: i32,
    ) -> FdbResult<Vec<(TenantName, TenantMapEntry)>>
    where
        D: Database,
    {
        let metadata = TenantMetadata::new(config.root().clone());
        let (begin, end) = (begin.into(), end.into());

        let metadata_ref = &metadata;
        let begin_ref = &begin;
        let end_ref = &end;

        database::run(db, |tr| async move {
            apply_options(&tr, config)?;
            TenantManagement::list_tenants_tr(&tr, metadata_ref, begin_ref, end_ref, limit).await
        })
        .await
    }

    /// Applies configuration changes to a tenant.
    ///
    /// Only `tenant_group` can be changed outside of a metacluster.
    /// Changing the group moves the tenant between group index
    /// entries and bumps the configuration sequence number. Returns
    /// the updated entry.
    pub async fn configure_tenant_tr<T>(
        tr: &T,
        metadata: &TenantMetadata,
        name: &TenantName,
        parameters: &[(Bytes, Option<Bytes>)],
    ) -> FdbResult<TenantMapEntry>
    where
        T: Transaction,
    {
        let entry = metadata
            .get_tenant(tr, name)
            .await?
            .ok_or_else(|| FdbError::new(TENANT_NOT_FOUND))?;

        let mut updated = entry.clone();
        for (parameter, value) in parameters {
            if &parameter[..] == b"assigned_cluster" {
                return Err(FdbError::new(INVALID_TENANT_CONFIGURATION));
            }
            updated.configure(&parameter[..], value.clone())?;
        }

        if updated.matches_configuration(&entry) {
            return Ok(entry);
        }

        if let Some(group) = entry.tenant_group() {
            TenantManagement::leave_tenant_group_tr(tr, metadata, group, name).await?;
        }
        if let Some(group) = updated.tenant_group() {
            TenantManagement::join_tenant_group_tr(tr, metadata, group, name).await?;
        }

        updated.bump_configuration_sequence_num();
        metadata.set_tenant(tr, name, &updated);

        Ok(updated)
    }

    // Returns `true` if the group was created.
    pub(crate) async fn join_tenant_group_tr<T>(
        tr: &T,
        metadata: &TenantMetadata,
        group: &TenantGroupName,
        name: &TenantName,
    ) -> FdbResult<bool>
    where
        T: Transaction,
    {
        metadata.add_tenant_group_index(tr, group, name);

        if metadata.get_tenant_group(tr, group).await?.is_none() {
            metadata.set_tenant_group(tr, group, &TenantGroupEntry::default());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    // Returns `true` if the group became empty and was removed.
    pub(crate) async fn leave_tenant_group_tr<T>(
        tr: &T,
        metadata: &TenantMetadata,
        group: &TenantGroupName,
        name: &TenantName,
    ) -> FdbResult<bool>
    where
        T: Transaction,
    {
        metadata.clear_tenant_group_index(tr, group, name);

        if metadata
            .list_tenant_group_tenants(tr, group, 1)
            .await?
            .is_empty()
        {
            metadata.clear_tenant_group(tr, group);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

pub(crate) fn apply_options<T>(tr: &T, config: &MetaclusterConfig) -> FdbResult<()>
where
    T: ReadTransaction,
{
    config
        .transaction_options()
        .iter()
        .try_for_each(|option| tr.set_option(*option))
}
