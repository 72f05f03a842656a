use bytes::Bytes;

use crate::error::FdbResult;
use crate::metacluster::{ClusterName, DataClusterMetadata};
use crate::range::Range;
use crate::subspace::Subspace;
use crate::tenant::{name_tuple, read_range, TenantGroupName, TenantName};
use crate::transaction::{ReadTransaction, Transaction};
use crate::Key;

/// Key-space layout and typed accessors of the cluster directory and
/// the cluster indexes.
///
/// | Collection                   | Key                                                         | Value                   |
/// |------------------------------|-------------------------------------------------------------|-------------------------|
/// | cluster directory            | `<root>cluster/(name)`                                      | [`DataClusterMetadata`] |
/// | cluster tenant index         | `<root>metacluster/clusterTenantIndex/(cluster, name)`      | empty                   |
/// | cluster tenant group index   | `<root>metacluster/clusterTenantGroupIndex/(cluster, group)` | empty                  |
#[derive(Clone, Debug)]
pub struct MetaclusterMetadata {
    cluster_map: Subspace,
    cluster_tenant_index: Subspace,
    cluster_tenant_group_index: Subspace,
}

impl MetaclusterMetadata {
    /// Create [`MetaclusterMetadata`] rooted at `root`.
    pub fn new(root: Bytes) -> MetaclusterMetadata {
        let root = Subspace::new(root);

        MetaclusterMetadata {
            cluster_map: root.with_suffix(b"cluster/"),
            cluster_tenant_index: root.with_suffix(b"metacluster/clusterTenantIndex/"),
            cluster_tenant_group_index: root.with_suffix(b"metacluster/clusterTenantGroupIndex/"),
        }
    }

    /// Raw prefixes of every collection.
    pub fn raw_prefixes(&self) -> Vec<Bytes> {
        vec![
            self.cluster_map.raw_prefix(),
            self.cluster_tenant_index.raw_prefix(),
            self.cluster_tenant_group_index.raw_prefix(),
        ]
    }

    /// Key of `name` in the cluster directory.
    pub fn cluster_key(&self, name: &ClusterName) -> Key {
        self.cluster_map.pack(&name_tuple(name.as_bytes()))
    }

    /// Key of the `(cluster, name)` pair in the cluster tenant index.
    pub fn cluster_tenant_key(&self, cluster: &ClusterName, name: &TenantName) -> Key {
        self.cluster_tenant_index.pack(&{
            let mut t = name_tuple(cluster.as_bytes());
            t.add_bytes(Bytes::copy_from_slice(name.as_bytes()));
            t
        })
    }

    /// Key of the `(cluster, group)` pair in the cluster tenant group
    /// index.
    pub fn cluster_tenant_group_key(&self, cluster: &ClusterName, group: &TenantGroupName) -> Key {
        self.cluster_tenant_group_index.pack(&{
            let mut t = name_tuple(cluster.as_bytes());
            t.add_bytes(Bytes::copy_from_slice(group.as_bytes()));
            t
        })
    }

    /// Read a cluster record.
    pub async fn get_cluster<T>(
        &self,
        tr: &T,
        name: &ClusterName,
    ) -> FdbResult<Option<DataClusterMetadata>>
    where
        T: ReadTransaction,
    {
        match tr.get(self.cluster_key(name)).await? {
            Some(v) => DataClusterMetadata::decode(v.as_bytes()).map(Some),
            None => Ok(None),
        }
    }

    /// Write a cluster record.
    pub fn set_cluster<T>(&self, tr: &T, name: &ClusterName, metadata: &DataClusterMetadata)
    where
        T: Transaction,
    {
        tr.set(self.cluster_key(name), metadata.encode());
    }

    /// Remove a cluster record.
    pub fn clear_cluster<T>(&self, tr: &T, name: &ClusterName)
    where
        T: Transaction,
    {
        tr.clear(self.cluster_key(name));
    }

    /// Read cluster records with names in `[begin, end)`, in name
    /// order. A `limit` of zero means no limit.
    pub async fn list_clusters<T>(
        &self,
        tr: &T,
        begin: &ClusterName,
        end: &ClusterName,
        limit: i32,
    ) -> FdbResult<Vec<(ClusterName, DataClusterMetadata)>>
    where
        T: ReadTransaction,
    {
        self.read_clusters(
            tr,
            Range::new(self.cluster_key(begin), self.cluster_key(end)),
            limit,
        )
        .await
    }

    /// Read every cluster record, in name order.
    pub async fn list_all_clusters<T>(&self, tr: &T) -> FdbResult<Vec<(ClusterName, DataClusterMetadata)>>
    where
        T: ReadTransaction,
    {
        self.read_clusters(tr, self.cluster_map.all(), 0).await
    }

    async fn read_clusters<T>(
        &self,
        tr: &T,
        range: Range,
        limit: i32,
    ) -> FdbResult<Vec<(ClusterName, DataClusterMetadata)>>
    where
        T: ReadTransaction,
    {
        let mut res = Vec::new();
        for kv in read_range(tr, range, limit).await? {
            let (k, v) = kv.into_parts();
            let t = self.cluster_map.unpack(&k.into())?;
            res.push((
                ClusterName::from(t.get_bytes_ref(0)?.clone()),
                DataClusterMetadata::decode(v.as_bytes())?,
            ));
        }

        Ok(res)
    }

    /// Add the `(cluster, name)` pair to the cluster tenant index.
    pub fn add_cluster_tenant<T>(&self, tr: &T, cluster: &ClusterName, name: &TenantName)
    where
        T: Transaction,
    {
        tr.set(self.cluster_tenant_key(cluster, name), Bytes::new());
    }

    /// Remove the `(cluster, name)` pair from the cluster tenant index.
    pub fn clear_cluster_tenant<T>(&self, tr: &T, cluster: &ClusterName, name: &TenantName)
    where
        T: Transaction,
    {
        tr.clear(self.cluster_tenant_key(cluster, name));
    }

    /// Read the names of the tenants assigned to `cluster`, in name
    /// order.
    pub async fn list_cluster_tenants<T>(
        &self,
        tr: &T,
        cluster: &ClusterName,
    ) -> FdbResult<Vec<TenantName>>
    where
        T: ReadTransaction,
    {
        let range = self
            .cluster_tenant_index
            .range(&name_tuple(cluster.as_bytes()));

        let mut res = Vec::new();
        for kv in read_range(tr, range, 0).await? {
            let t = self.cluster_tenant_index.unpack(&kv.into_key().into())?;
            res.push(TenantName::from(t.get_bytes_ref(1)?.clone()));
        }
        Ok(res)
    }

    /// Add the `(cluster, group)` pair to the cluster tenant group
    /// index.
    pub fn add_cluster_tenant_group<T>(&self, tr: &T, cluster: &ClusterName, group: &TenantGroupName)
    where
        T: Transaction,
    {
        tr.set(self.cluster_tenant_group_key(cluster, group), Bytes::new());
    }

    /// Remove the `(cluster, group)` pair from the cluster tenant
    /// group index.
    pub fn clear_cluster_tenant_group<T>(
        &self,
        tr: &T,
        cluster: &ClusterName,
        group: &TenantGroupName,
    ) where
        T: Transaction,
    {
        tr.clear(self.cluster_tenant_group_key(cluster, group));
    }

    /// Read the tenant groups assigned to `cluster`, in name order.
    pub async fn list_cluster_tenant_groups<T>(
        &self,
        tr: &T,
        cluster: &ClusterName,
    ) -> FdbResult<Vec<TenantGroupName>>
    where
        T: ReadTransaction,
    {
        let range = self
            .cluster_tenant_group_index
            .range(&name_tuple(cluster.as_bytes()));

        let mut res = Vec::new();
        for kv in read_range(tr, range, 0).await? {
            let t = self
                .cluster_tenant_group_index
                .unpack(&kv.into_key().into())?;
            res.push(TenantGroupName::from(t.get_bytes_ref(1)?.clone()));
        }
        Ok(res)
    }

    /// Remove every index entry of `cluster`.
    pub fn clear_cluster_indexes<T>(&self, tr: &T, cluster: &ClusterName)
    where
        T: Transaction,
    {
        let t = name_tuple(cluster.as_bytes());
        tr.clear_range(self.cluster_tenant_index.range(&t));
        tr.clear_range(self.cluster_tenant_group_index.range(&t));
    }
}
