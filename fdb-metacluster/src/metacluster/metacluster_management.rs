use bytes::Bytes;
use tracing::{info, warn};

use crate::config::MetaclusterConfig;
use crate::database::{self, Database};
use crate::error::{
    FdbError, FdbResult, CLUSTER_ALREADY_EXISTS, CLUSTER_NOT_EMPTY, CLUSTER_NOT_FOUND,
    CLUSTER_NO_CAPACITY, CONNECTION_STRING_REQUIRED, INVALID_LIMIT,
    INVALID_METACLUSTER_OPERATION, INVALID_TENANT_CONFIGURATION, INVALID_TENANT_STATE,
    METACLUSTER_NO_CAPACITY, TENANT_ALREADY_EXISTS, TENANT_NOT_FOUND, TENANT_REMOVED,
};
use crate::metacluster::{
    ClusterConfiguration, ClusterName, ClusterUsage, DataClusterEntry, DataClusterMetadata,
    MetaclusterMetadata,
};
use crate::tenant::{
    apply_options, TenantGroupEntry, TenantGroupName, TenantManagement, TenantMapEntry,
    TenantMetadata, TenantName, TenantState,
};
use crate::transaction::{ReadTransaction, Transaction};

/// Placement requested for a new tenant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TenantConfig {
    tenant_group: Option<TenantGroupName>,
    assigned_cluster: Option<ClusterName>,
}

impl TenantConfig {
    /// Create an empty [`TenantConfig`].
    pub fn new() -> TenantConfig {
        TenantConfig::default()
    }

    /// Place the tenant in `tenant_group`.
    pub fn with_tenant_group(mut self, tenant_group: impl Into<TenantGroupName>) -> TenantConfig {
        self.tenant_group = Some(tenant_group.into());
        self
    }

    /// Place the tenant on `assigned_cluster`.
    pub fn with_assigned_cluster(mut self, assigned_cluster: impl Into<ClusterName>) -> TenantConfig {
        self.assigned_cluster = Some(assigned_cluster.into());
        self
    }

    /// Get tenant group.
    pub fn tenant_group(&self) -> Option<&TenantGroupName> {
        self.tenant_group.as_ref()
    }

    /// Get assigned cluster.
    pub fn assigned_cluster(&self) -> Option<&ClusterName> {
        self.assigned_cluster.as_ref()
    }
}

/// Management of the data clusters of a metacluster, and of the
/// tenants placed on them.
///
/// Every operation runs inside [`database::run`] or
/// [`database::read`], so conflicting operations serialize through
/// commit-time conflict detection and each attempt re-reads all the
/// state it uses. The transaction options of the
/// [`MetaclusterConfig`] are applied to every attempt.
///
/// Tenant operations that change the tenant state run in two
/// transactions. The first records the intent (for example
/// [`TenantState::Registering`]) and the second completes it.
#[derive(Debug)]
pub struct MetaclusterManagement<D> {
    db: D,
    config: MetaclusterConfig,
    tenant_metadata: TenantMetadata,
    metacluster_metadata: MetaclusterMetadata,
}

impl<D> MetaclusterManagement<D>
where
    D: Database,
    <D::Transaction as Transaction>::Snapshot: Clone,
{
    /// Create a [`MetaclusterManagement`] over `db`.
    pub fn new(db: D, config: MetaclusterConfig) -> MetaclusterManagement<D> {
        let tenant_metadata = TenantMetadata::new(config.root().clone());
        let metacluster_metadata = MetaclusterMetadata::new(config.root().clone());

        MetaclusterManagement {
            db,
            config,
            tenant_metadata,
            metacluster_metadata,
        }
    }

    /// Get a reference to the [`Database`].
    pub fn database(&self) -> &D {
        &self.db
    }

    /// Get a reference to the [`MetaclusterConfig`].
    pub fn config(&self) -> &MetaclusterConfig {
        &self.config
    }

    /// Get a reference to the [`TenantMetadata`].
    pub fn tenant_metadata(&self) -> &TenantMetadata {
        &self.tenant_metadata
    }

    /// Get a reference to the [`MetaclusterMetadata`].
    pub fn metacluster_metadata(&self) -> &MetaclusterMetadata {
        &self.metacluster_metadata
    }

    /// Read a cluster record.
    pub async fn try_get_cluster_tr<T>(
        &self,
        tr: &T,
        name: &ClusterName,
    ) -> FdbResult<Option<DataClusterMetadata>>
    where
        T: ReadTransaction,
    {
        self.metacluster_metadata.get_cluster(tr, name).await
    }

    /// Apply `changes` to a cluster record and return the updated
    /// record.
    ///
    /// Fails with `cluster_not_found` if `name` is not registered, and
    /// with `cluster_no_capacity` if the new capacity is below the
    /// current allocation.
    pub async fn update_cluster_metadata_tr<T>(
        &self,
        tr: &T,
        name: &ClusterName,
        changes: &ClusterConfiguration,
    ) -> FdbResult<DataClusterMetadata>
    where
        T: Transaction,
    {
        let mut metadata = self
            .try_get_cluster_tr(tr, name)
            .await?
            .ok_or_else(|| FdbError::new(CLUSTER_NOT_FOUND))?;

        changes.apply(&mut metadata)?;

        self.metacluster_metadata.set_cluster(tr, name, &metadata);

        Ok(metadata)
    }

    /// Register a data cluster.
    ///
    /// The allocation of `entry` is ignored, a new cluster starts with
    /// nothing allocated. Fails with `connection_string_required` if
    /// `connection_string` is empty and with `cluster_already_exists`
    /// if `name` is taken.
    pub async fn register_cluster(
        &self,
        name: impl Into<ClusterName>,
        connection_string: impl Into<Bytes>,
        entry: DataClusterEntry,
    ) -> FdbResult<()> {
        let name = name.into();
        let connection_string = connection_string.into();

        if connection_string.is_empty() {
            return Err(FdbError::new(CONNECTION_STRING_REQUIRED));
        }

        let metadata = DataClusterMetadata::new(DataClusterEntry::new(entry.capacity()), connection_string);

        let name_ref = &name;
        let metadata_ref = &metadata;

        database::run(&self.db, |tr| async move {
            apply_options(&tr, &self.config)?;

            if self.try_get_cluster_tr(&tr, name_ref).await?.is_some() {
                return Err(FdbError::new(CLUSTER_ALREADY_EXISTS));
            }

            self.metacluster_metadata.set_cluster(&tr, name_ref, metadata_ref);
            Ok(())
        })
        .await?;

        info!(
            cluster = %name,
            max_tenant_groups = metadata.entry().capacity().num_tenant_groups(),
            "cluster registered"
        );

        Ok(())
    }

    /// Remove a data cluster.
    ///
    /// Fails with `cluster_not_found` if `name` is not registered.
    /// Without `force`, fails with `cluster_not_empty` while tenant
    /// groups are allocated on the cluster.
    ///
    /// With `force` the cluster is detached in the same transaction.
    /// Tenants in [`TenantState::Removing`] are deleted. Every other
    /// tenant of the cluster loses its assigned cluster and moves to
    /// [`TenantState::Error`]. Tenant groups of the cluster lose their
    /// assigned cluster.
    pub async fn remove_cluster(&self, name: impl Into<ClusterName>, force: bool) -> FdbResult<()> {
        let name = name.into();
        let name_ref = &name;

        let detached = database::run(&self.db, |tr| async move {
            apply_options(&tr, &self.config)?;
            self.remove_cluster_tr(&tr, name_ref, force).await
        })
        .await?;

        if detached > 0 {
            warn!(cluster = %name, tenants = detached, "forcibly detached tenants");
        }
        info!(cluster = %name, force, "cluster removed");

        Ok(())
    }

    async fn remove_cluster_tr<T>(&self, tr: &T, name: &ClusterName, force: bool) -> FdbResult<usize>
    where
        T: Transaction,
    {
        let metadata = self
            .try_get_cluster_tr(tr, name)
            .await?
            .ok_or_else(|| FdbError::new(CLUSTER_NOT_FOUND))?;

        if !force && metadata.entry().allocated().num_tenant_groups() > 0 {
            return Err(FdbError::new(CLUSTER_NOT_EMPTY));
        }

        let mut detached = 0;

        for tenant in self.metacluster_metadata.list_cluster_tenants(tr, name).await? {
            let mut entry = match self.tenant_metadata.get_tenant(tr, &tenant).await? {
                Some(entry) if entry.assigned_cluster() == Some(name) => entry,
                _ => continue,
            };

            if entry.tenant_state() == TenantState::Removing {
                if let Some(cluster) = self.erase_tenant_tr(tr, &tenant, &entry).await? {
                    self.update_allocation_tr(tr, &cluster, -1).await?;
                }
            } else {
                entry.set_assigned_cluster(None);
                entry.set_tenant_state(TenantState::Error);
                entry.bump_configuration_sequence_num();
                self.tenant_metadata.set_tenant(tr, &tenant, &entry);
            }

            detached += 1;
        }

        for group in self
            .metacluster_metadata
            .list_cluster_tenant_groups(tr, name)
            .await?
        {
            if let Some(mut group_entry) = self.tenant_metadata.get_tenant_group(tr, &group).await? {
                if group_entry.assigned_cluster() == Some(name) {
                    group_entry.set_assigned_cluster(None);
                    self.tenant_metadata.set_tenant_group(tr, &group, &group_entry);
                }
            }
        }

        self.metacluster_metadata.clear_cluster_indexes(tr, name);
        self.metacluster_metadata.clear_cluster(tr, name);

        Ok(detached)
    }

    /// List data clusters with names in `[begin, end)`, in name order.
    ///
    /// At most `limit` entries are returned. Without a `limit` the
    /// configured default list limit applies.
    pub async fn list_clusters(
        &self,
        begin: impl Into<ClusterName>,
        end: impl Into<ClusterName>,
        limit: Option<i32>,
    ) -> FdbResult<Vec<(ClusterName, DataClusterMetadata)>> {
        let limit = self.list_limit(limit)?;
        let (begin, end) = (begin.into(), end.into());

        let begin_ref = &begin;
        let end_ref = &end;

        database::read(&self.db, |rtr| async move {
            apply_options(&rtr, &self.config)?;
            self.metacluster_metadata
                .list_clusters(&rtr, begin_ref, end_ref, limit)
                .await
        })
        .await
    }

    /// Read a data cluster. Fails with `cluster_not_found` if `name`
    /// is not registered.
    pub async fn get_cluster(&self, name: impl Into<ClusterName>) -> FdbResult<DataClusterMetadata> {
        let name = name.into();
        let name_ref = &name;

        database::read(&self.db, |rtr| async move {
            apply_options(&rtr, &self.config)?;
            self.try_get_cluster_tr(&rtr, name_ref)
                .await?
                .ok_or_else(|| FdbError::new(CLUSTER_NOT_FOUND))
        })
        .await
    }

    /// Apply `changes` to a data cluster. Parameters absent from
    /// `changes` keep their values.
    pub async fn configure_cluster(
        &self,
        name: impl Into<ClusterName>,
        changes: &ClusterConfiguration,
    ) -> FdbResult<DataClusterMetadata> {
        let name = name.into();
        let name_ref = &name;

        let metadata = database::run(&self.db, |tr| async move {
            apply_options(&tr, &self.config)?;
            self.update_cluster_metadata_tr(&tr, name_ref, changes).await
        })
        .await?;

        info!(
            cluster = %name,
            max_tenant_groups = metadata.entry().capacity().num_tenant_groups(),
            "cluster configured"
        );

        Ok(metadata)
    }

    /// Create a tenant on a data cluster.
    ///
    /// A tenant joining an existing group is placed on the cluster of
    /// the group. Otherwise it is placed on the requested cluster, or
    /// on the cluster with the most free capacity, and a unit of
    /// capacity is allocated for it. Fails with
    /// `metacluster_no_capacity` if no cluster has free capacity.
    pub async fn create_tenant(
        &self,
        name: impl Into<TenantName>,
        config: TenantConfig,
    ) -> FdbResult<TenantMapEntry> {
        let name = name.into();
        let name_ref = &name;
        let config_ref = &config;

        let reserved = database::run(&self.db, |tr| async move {
            apply_options(&tr, &self.config)?;
            self.create_tenant_reserve_tr(&tr, name_ref, config_ref).await
        })
        .await?;

        let reserved_ref = &reserved;

        let entry = database::run(&self.db, |tr| async move {
            apply_options(&tr, &self.config)?;

            let mut entry = match self.tenant_metadata.get_tenant(&tr, name_ref).await? {
                Some(entry) if entry.id() == reserved_ref.id() => entry,
                _ => return Err(FdbError::new(TENANT_REMOVED)),
            };

            match entry.tenant_state() {
                TenantState::Registering => {
                    entry.set_tenant_state(TenantState::Ready);
                    self.tenant_metadata.set_tenant(&tr, name_ref, &entry);
                    Ok(entry)
                }
                TenantState::Ready => Ok(entry),
                _ => Err(FdbError::new(INVALID_TENANT_STATE)),
            }
        })
        .await?;

        info!(
            tenant = %name,
            id = entry.id(),
            cluster = %entry.assigned_cluster().map(|c| c.to_string()).unwrap_or_default(),
            "tenant created"
        );

        Ok(entry)
    }

    async fn create_tenant_reserve_tr<T>(
        &self,
        tr: &T,
        name: &TenantName,
        config: &TenantConfig,
    ) -> FdbResult<TenantMapEntry>
    where
        T: Transaction,
    {
        if self.tenant_metadata.get_tenant(tr, name).await?.is_some() {
            return Err(FdbError::new(TENANT_ALREADY_EXISTS));
        }

        let group_cluster = match config.tenant_group() {
            Some(group) => self
                .tenant_metadata
                .get_tenant_group(tr, group)
                .await?
                .and_then(|g| g.assigned_cluster().cloned()),
            None => None,
        };

        let (cluster, allocate) = match group_cluster {
            Some(cluster) => {
                if config.assigned_cluster().map_or(false, |c| c != &cluster) {
                    return Err(FdbError::new(INVALID_TENANT_CONFIGURATION));
                }
                if self.try_get_cluster_tr(tr, &cluster).await?.is_none() {
                    return Err(FdbError::new(CLUSTER_NOT_FOUND));
                }
                (cluster, false)
            }
            None => match config.assigned_cluster() {
                Some(cluster) => {
                    let metadata = self
                        .try_get_cluster_tr(tr, cluster)
                        .await?
                        .ok_or_else(|| FdbError::new(CLUSTER_NOT_FOUND))?;
                    if !metadata.entry().has_capacity() {
                        return Err(FdbError::new(CLUSTER_NO_CAPACITY));
                    }
                    (cluster.clone(), true)
                }
                None => (self.find_cluster_with_capacity_tr(tr).await?, true),
            },
        };

        if allocate {
            self.update_allocation_tr(tr, &cluster, 1).await?;
        }

        let id = TenantManagement::allocate_tenant_id_tr(tr, &self.tenant_metadata).await?;

        let mut entry = TenantMapEntry::with_group(
            id,
            config.tenant_group().cloned(),
            TenantState::Registering,
        );
        entry.set_assigned_cluster(Some(cluster.clone()));

        self.tenant_metadata.set_tenant(tr, name, &entry);
        self.metacluster_metadata.add_cluster_tenant(tr, &cluster, name);

        if let Some(group) = config.tenant_group() {
            self.tenant_metadata.add_tenant_group_index(tr, group, name);
            if allocate {
                self.tenant_metadata.set_tenant_group(
                    tr,
                    group,
                    &TenantGroupEntry::new(Some(cluster.clone())),
                );
                self.metacluster_metadata
                    .add_cluster_tenant_group(tr, &cluster, group);
            }
        }

        Ok(entry)
    }

    // Cluster with the most free capacity. Ties go to the smallest
    // name.
    async fn find_cluster_with_capacity_tr<T>(&self, tr: &T) -> FdbResult<ClusterName>
    where
        T: ReadTransaction,
    {
        let clusters = self.metacluster_metadata.list_all_clusters(tr).await?;

        clusters
            .into_iter()
            .filter(|(_, metadata)| metadata.entry().has_capacity())
            .fold(None, |best: Option<(ClusterName, i32)>, (name, metadata)| {
                let free = metadata.entry().free_capacity();
                match best {
                    Some((_, best_free)) if best_free >= free => best,
                    _ => Some((name, free)),
                }
            })
            .map(|(name, _)| name)
            .ok_or_else(|| FdbError::new(METACLUSTER_NO_CAPACITY))
    }

    // Adjust the allocation of `cluster` by `delta` tenant groups. A
    // cluster that is no longer registered is skipped.
    async fn update_allocation_tr<T>(&self, tr: &T, cluster: &ClusterName, delta: i32) -> FdbResult<()>
    where
        T: Transaction,
    {
        if delta == 0 {
            return Ok(());
        }

        let mut metadata = match self.try_get_cluster_tr(tr, cluster).await? {
            Some(metadata) => metadata,
            None => return Ok(()),
        };

        let entry = metadata.entry_mut();
        let allocated = (entry.allocated().num_tenant_groups() + delta).max(0);

        if delta > 0 && allocated > entry.capacity().num_tenant_groups() {
            return Err(FdbError::new(CLUSTER_NO_CAPACITY));
        }

        entry.set_allocated(ClusterUsage::new(allocated));
        self.metacluster_metadata.set_cluster(tr, cluster, &metadata);

        Ok(())
    }

    /// Delete a tenant.
    ///
    /// The tenant is first moved to [`TenantState::Removing`]. A
    /// second transaction deletes it, tombstones its id and releases
    /// its capacity. The capacity of a group is released with its
    /// last tenant.
    pub async fn delete_tenant(&self, name: impl Into<TenantName>) -> FdbResult<()> {
        let name = name.into();
        let name_ref = &name;

        let id = database::run(&self.db, |tr| async move {
            apply_options(&tr, &self.config)?;

            let mut entry = self
                .tenant_metadata
                .get_tenant(&tr, name_ref)
                .await?
                .ok_or_else(|| FdbError::new(TENANT_NOT_FOUND))?;

            if entry.tenant_state() != TenantState::Removing {
                entry.set_tenant_state(TenantState::Removing);
                self.tenant_metadata.set_tenant(&tr, name_ref, &entry);
            }

            Ok(entry.id())
        })
        .await?;

        database::run(&self.db, |tr| async move {
            apply_options(&tr, &self.config)?;

            let entry = match self.tenant_metadata.get_tenant(&tr, name_ref).await? {
                Some(entry) if entry.id() == id => entry,
                // Already deleted.
                _ => return Ok(()),
            };

            if let Some(cluster) = self.erase_tenant_tr(&tr, name_ref, &entry).await? {
                self.update_allocation_tr(&tr, &cluster, -1).await?;
            }

            Ok(())
        })
        .await?;

        info!(tenant = %name, id, "tenant deleted");

        Ok(())
    }

    // Erase `entry` and tombstone its id. Returns the cluster that
    // releases a unit of capacity, if any. For a grouped tenant this
    // is the cluster of the group, which differs from the assigned
    // cluster of a tenant detached by a forced cluster removal.
    async fn erase_tenant_tr<T>(
        &self,
        tr: &T,
        name: &TenantName,
        entry: &TenantMapEntry,
    ) -> FdbResult<Option<ClusterName>>
    where
        T: Transaction,
    {
        self.tenant_metadata.clear_tenant(tr, name);
        self.tenant_metadata.add_tombstone(tr, entry.id());

        if let Some(cluster) = entry.assigned_cluster() {
            self.metacluster_metadata.clear_cluster_tenant(tr, cluster, name);
        }

        match entry.tenant_group() {
            Some(group) => {
                let group_cluster = self
                    .tenant_metadata
                    .get_tenant_group(tr, group)
                    .await?
                    .and_then(|g| g.assigned_cluster().cloned());

                if TenantManagement::leave_tenant_group_tr(tr, &self.tenant_metadata, group, name)
                    .await?
                {
                    if let Some(cluster) = &group_cluster {
                        self.metacluster_metadata
                            .clear_cluster_tenant_group(tr, cluster, group);
                    }
                    return Ok(group_cluster);
                }
                Ok(None)
            }
            None => Ok(entry.assigned_cluster().cloned()),
        }
    }

    /// Apply configuration changes to a tenant.
    ///
    /// The tenant must be [`TenantState::Ready`]. Moving a tenant to
    /// another cluster fails with `invalid_metacluster_operation`. If
    /// the changes leave the configuration unchanged nothing is
    /// written. Otherwise the tenant passes through
    /// [`TenantState::UpdatingConfiguration`] while its group
    /// membership and capacity are moved, and is restored to
    /// [`TenantState::Ready`] if that fails.
    pub async fn configure_tenant(
        &self,
        name: impl Into<TenantName>,
        parameters: &[(Bytes, Option<Bytes>)],
    ) -> FdbResult<TenantMapEntry> {
        let name = name.into();
        let name_ref = &name;

        let (entry, updated) = database::run(&self.db, |tr| async move {
            apply_options(&tr, &self.config)?;

            let mut entry = self
                .tenant_metadata
                .get_tenant(&tr, name_ref)
                .await?
                .ok_or_else(|| FdbError::new(TENANT_NOT_FOUND))?;

            if entry.tenant_state() != TenantState::Ready {
                return Err(FdbError::new(INVALID_TENANT_STATE));
            }

            let mut updated = entry.clone();
            for (parameter, value) in parameters {
                updated.configure(&parameter[..], value.clone())?;
            }

            if updated.assigned_cluster() != entry.assigned_cluster() {
                return Err(FdbError::new(INVALID_METACLUSTER_OPERATION));
            }

            if updated.matches_configuration(&entry) {
                return Ok((entry, None));
            }

            entry.set_tenant_state(TenantState::UpdatingConfiguration);
            entry.bump_configuration_sequence_num();
            self.tenant_metadata.set_tenant(&tr, name_ref, &entry);

            Ok((entry, Some(updated)))
        })
        .await?;

        let updated = match updated {
            Some(updated) => updated,
            None => return Ok(entry),
        };

        let entry_ref = &entry;
        let updated_ref = &updated;

        let res = database::run(&self.db, |tr| async move {
            apply_options(&tr, &self.config)?;
            self.configure_tenant_apply_tr(&tr, name_ref, entry_ref, updated_ref)
                .await
        })
        .await;

        match res {
            Ok(entry) => {
                info!(
                    tenant = %name,
                    tenant_group = %entry.tenant_group().map(|g| g.to_string()).unwrap_or_default(),
                    "tenant configured"
                );
                Ok(entry)
            }
            Err(e) => {
                warn!(tenant = %name, error = %e, "tenant configuration failed");
                if let Err(restore) = self.restore_ready(name_ref, entry_ref).await {
                    warn!(tenant = %name, error = %restore, "failed to restore tenant state");
                }
                Err(e)
            }
        }
    }

    async fn configure_tenant_apply_tr<T>(
        &self,
        tr: &T,
        name: &TenantName,
        expected: &TenantMapEntry,
        updated: &TenantMapEntry,
    ) -> FdbResult<TenantMapEntry>
    where
        T: Transaction,
    {
        let mut entry = match self.tenant_metadata.get_tenant(tr, name).await? {
            Some(entry) if entry.id() == expected.id() => entry,
            _ => return Err(FdbError::new(TENANT_REMOVED)),
        };

        if entry.tenant_state() != TenantState::UpdatingConfiguration
            || entry.configuration_sequence_num() != expected.configuration_sequence_num()
        {
            return Err(FdbError::new(INVALID_TENANT_STATE));
        }

        let mut delta = 0;

        if let Some(cluster) = entry.assigned_cluster() {
            // Join first, a group placed on another cluster rejects the
            // tenant before anything is released.
            match updated.tenant_group() {
                Some(group) => {
                    let group_cluster = self
                        .tenant_metadata
                        .get_tenant_group(tr, group)
                        .await?
                        .and_then(|g| g.assigned_cluster().cloned());

                    match group_cluster {
                        Some(c) if &c != cluster => {
                            return Err(FdbError::new(INVALID_METACLUSTER_OPERATION))
                        }
                        Some(_) => self.tenant_metadata.add_tenant_group_index(tr, group, name),
                        None => {
                            self.tenant_metadata.add_tenant_group_index(tr, group, name);
                            self.tenant_metadata.set_tenant_group(
                                tr,
                                group,
                                &TenantGroupEntry::new(Some(cluster.clone())),
                            );
                            self.metacluster_metadata
                                .add_cluster_tenant_group(tr, cluster, group);
                            delta += 1;
                        }
                    }
                }
                None => delta += 1,
            }

            match entry.tenant_group() {
                Some(group) => {
                    if TenantManagement::leave_tenant_group_tr(tr, &self.tenant_metadata, group, name)
                        .await?
                    {
                        self.metacluster_metadata
                            .clear_cluster_tenant_group(tr, cluster, group);
                        delta -= 1;
                    }
                }
                None => delta -= 1,
            }

            self.update_allocation_tr(tr, cluster, delta).await?;
        } else {
            if let Some(group) = entry.tenant_group() {
                TenantManagement::leave_tenant_group_tr(tr, &self.tenant_metadata, group, name)
                    .await?;
            }
            if let Some(group) = updated.tenant_group() {
                TenantManagement::join_tenant_group_tr(tr, &self.tenant_metadata, group, name)
                    .await?;
            }
        }

        entry.set_tenant_group(updated.tenant_group().cloned());
        entry.set_tenant_state(TenantState::Ready);
        self.tenant_metadata.set_tenant(tr, name, &entry);

        Ok(entry)
    }

    // Return a tenant left in `UpdatingConfiguration` by `expected` to
    // `Ready`.
    async fn restore_ready(&self, name: &TenantName, expected: &TenantMapEntry) -> FdbResult<()> {
        database::run(&self.db, |tr| async move {
            apply_options(&tr, &self.config)?;

            if let Some(mut entry) = self.tenant_metadata.get_tenant(&tr, name).await? {
                if entry.id() == expected.id()
                    && entry.tenant_state() == TenantState::UpdatingConfiguration
                    && entry.configuration_sequence_num() == expected.configuration_sequence_num()
                {
                    entry.set_tenant_state(TenantState::Ready);
                    self.tenant_metadata.set_tenant(&tr, name, &entry);
                }
            }

            Ok(())
        })
        .await
    }

    /// Read a tenant. Fails with `tenant_not_found` if `name` does not
    /// exist.
    pub async fn get_tenant(&self, name: impl Into<TenantName>) -> FdbResult<TenantMapEntry> {
        let name = name.into();
        let name_ref = &name;

        database::read(&self.db, |rtr| async move {
            apply_options(&rtr, &self.config)?;
            self.tenant_metadata
                .get_tenant(&rtr, name_ref)
                .await?
                .ok_or_else(|| FdbError::new(TENANT_NOT_FOUND))
        })
        .await
    }

    /// List tenants with names in `[begin, end)`, in name order.
    pub async fn list_tenants(
        &self,
        begin: impl Into<TenantName>,
        end: impl Into<TenantName>,
        limit: Option<i32>,
    ) -> FdbResult<Vec<(TenantName, TenantMapEntry)>> {
        let limit = self.list_limit(limit)?;
        let (begin, end) = (begin.into(), end.into());

        let begin_ref = &begin;
        let end_ref = &end;

        database::read(&self.db, |rtr| async move {
            apply_options(&rtr, &self.config)?;
            self.tenant_metadata
                .list_tenants(&rtr, begin_ref, end_ref, limit)
                .await
        })
        .await
    }

    fn list_limit(&self, limit: Option<i32>) -> FdbResult<i32> {
        match limit {
            Some(limit) if limit < 0 => Err(FdbError::new(INVALID_LIMIT)),
            Some(limit) => Ok(limit),
            None => Ok(self.config.default_list_limit()),
        }
    }
}
