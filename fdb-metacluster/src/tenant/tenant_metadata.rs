use bytes::Bytes;
use tokio_stream::StreamExt;

use crate::error::FdbResult;
use crate::range::{Range, RangeOptions};
use crate::subspace::Subspace;
use crate::tenant::{
    id_to_prefix, prefix_to_id, TenantGroupEntry, TenantGroupName, TenantMapEntry, TenantName,
};
use crate::transaction::{ReadTransaction, Transaction};
use crate::tuple::Tuple;
use crate::{Key, KeyValue};

/// Key-space layout and typed accessors of the tenant metadata
/// collections.
///
/// | Collection                  | Key                                               | Value               |
/// |-----------------------------|---------------------------------------------------|---------------------|
/// | tenant map                  | `<root>tenant/map/(name)`                         | [`TenantMapEntry`]  |
/// | last tenant id              | `<root>tenant/lastId`                             | [`id_to_prefix`]    |
/// | tenant tombstones           | `<root>tenant/tombstones/(id)`                    | empty               |
/// | tenant group tenant index   | `<root>tenant/tenantGroup/tenantIndex/(group, name)` | empty            |
/// | tenant group map            | `<root>tenant/tenantGroup/map/(group)`            | [`TenantGroupEntry`] |
///
/// Parenthesized components are tuple encoded. Every accessor works
/// inside the caller's transaction and never commits.
#[derive(Clone, Debug)]
pub struct TenantMetadata {
    tenant_map: Subspace,
    last_tenant_id: Key,
    tenant_tombstones: Subspace,
    tenant_group_tenant_index: Subspace,
    tenant_group_map: Subspace,
}

impl TenantMetadata {
    /// Create [`TenantMetadata`] rooted at `root`.
    pub fn new(root: Bytes) -> TenantMetadata {
        let root = Subspace::new(root);

        TenantMetadata {
            tenant_map: root.with_suffix(b"tenant/map/"),
            last_tenant_id: root.with_suffix(b"tenant/lastId").raw_prefix().into(),
            tenant_tombstones: root.with_suffix(b"tenant/tombstones/"),
            tenant_group_tenant_index: root.with_suffix(b"tenant/tenantGroup/tenantIndex/"),
            tenant_group_map: root.with_suffix(b"tenant/tenantGroup/map/"),
        }
    }

    /// Raw prefixes of every collection.
    pub fn raw_prefixes(&self) -> Vec<Bytes> {
        vec![
            self.tenant_map.raw_prefix(),
            self.last_tenant_id.clone().into(),
            self.tenant_tombstones.raw_prefix(),
            self.tenant_group_tenant_index.raw_prefix(),
            self.tenant_group_map.raw_prefix(),
        ]
    }

    /// Key of `name` in the tenant map.
    pub fn tenant_map_key(&self, name: &TenantName) -> Key {
        self.tenant_map.pack(&name_tuple(name.as_bytes()))
    }

    /// Key of the last allocated tenant id.
    pub fn last_tenant_id_key(&self) -> Key {
        self.last_tenant_id.clone()
    }

    /// Key of the tombstone of `id`.
    pub fn tenant_tombstone_key(&self, id: i64) -> Key {
        self.tenant_tombstones.pack(&{
            let mut t = Tuple::new();
            t.add_i64(id);
            t
        })
    }

    /// Key of the `(group, name)` pair in the tenant group index.
    pub fn tenant_group_index_key(&self, group: &TenantGroupName, name: &TenantName) -> Key {
        self.tenant_group_tenant_index.pack(&{
            let mut t = name_tuple(group.as_bytes());
            t.add_bytes(Bytes::copy_from_slice(name.as_bytes()));
            t
        })
    }

    /// Key of `group` in the tenant group map.
    pub fn tenant_group_key(&self, group: &TenantGroupName) -> Key {
        self.tenant_group_map.pack(&name_tuple(group.as_bytes()))
    }

    /// Read a tenant map entry.
    pub async fn get_tenant<T>(&self, tr: &T, name: &TenantName) -> FdbResult<Option<TenantMapEntry>>
    where
        T: ReadTransaction,
    {
        match tr.get(self.tenant_map_key(name)).await? {
            Some(v) => TenantMapEntry::decode(v.as_bytes()).map(Some),
            None => Ok(None),
        }
    }

    /// Write a tenant map entry.
    pub fn set_tenant<T>(&self, tr: &T, name: &TenantName, entry: &TenantMapEntry)
    where
        T: Transaction,
    {
        tr.set(self.tenant_map_key(name), entry.encode());
    }

    /// Remove a tenant map entry.
    pub fn clear_tenant<T>(&self, tr: &T, name: &TenantName)
    where
        T: Transaction,
    {
        tr.clear(self.tenant_map_key(name));
    }

    /// Read tenant map entries with names in `[begin, end)`, in name
    /// order. A `limit` of zero means no limit.
    pub async fn list_tenants<T>(
        &self,
        tr: &T,
        begin: &TenantName,
        end: &TenantName,
        limit: i32,
    ) -> FdbResult<Vec<(TenantName, TenantMapEntry)>>
    where
        T: ReadTransaction,
    {
        let range = Range::new(
            self.tenant_map_key(begin),
            self.tenant_map_key(end),
        );

        let mut res = Vec::new();
        for kv in read_range(tr, range, limit).await? {
            let (k, v) = kv.into_parts();
            let t = self.tenant_map.unpack(&k.into())?;
            res.push((
                TenantName::from(t.get_bytes_ref(0)?.clone()),
                TenantMapEntry::decode(v.as_bytes())?,
            ));
        }

        Ok(res)
    }

    /// Read the last allocated tenant id, if any.
    pub async fn get_last_tenant_id<T>(&self, tr: &T) -> FdbResult<Option<i64>>
    where
        T: ReadTransaction,
    {
        match tr.get(self.last_tenant_id.clone()).await? {
            Some(v) => prefix_to_id(v.as_bytes()).map(Some),
            None => Ok(None),
        }
    }

    /// Write the last allocated tenant id.
    pub fn set_last_tenant_id<T>(&self, tr: &T, id: i64)
    where
        T: Transaction,
    {
        tr.set(self.last_tenant_id.clone(), id_to_prefix(id));
    }

    /// Returns `true` if `id` has been retired.
    pub async fn is_tombstoned<T>(&self, tr: &T, id: i64) -> FdbResult<bool>
    where
        T: ReadTransaction,
    {
        Ok(tr.get(self.tenant_tombstone_key(id)).await?.is_some())
    }

    /// Retire `id`.
    pub fn add_tombstone<T>(&self, tr: &T, id: i64)
    where
        T: Transaction,
    {
        tr.set(self.tenant_tombstone_key(id), Bytes::new());
    }

    /// Read every retired id, in ascending order.
    pub async fn list_tombstones<T>(&self, tr: &T) -> FdbResult<Vec<i64>>
    where
        T: ReadTransaction,
    {
        let mut res = Vec::new();
        for kv in read_range(tr, self.tenant_tombstones.all(), 0).await? {
            let t = self.tenant_tombstones.unpack(&kv.into_key().into())?;
            res.push(t.get_i64(0)?);
        }
        Ok(res)
    }

    /// Add the `(group, name)` pair to the tenant group index.
    pub fn add_tenant_group_index<T>(&self, tr: &T, group: &TenantGroupName, name: &TenantName)
    where
        T: Transaction,
    {
        tr.set(self.tenant_group_index_key(group, name), Bytes::new());
    }

    /// Remove the `(group, name)` pair from the tenant group index.
    pub fn clear_tenant_group_index<T>(
        &self,
        tr: &T,
        group: &TenantGroupName,
        name: &TenantName,
    ) where
        T: Transaction,
    {
        tr.clear(self.tenant_group_index_key(group, name));
    }

    /// Read the names of the tenants in `group`, in name order. A
    /// `limit` of zero means no limit.
    pub async fn list_tenant_group_tenants<T>(
        &self,
        tr: &T,
        group: &TenantGroupName,
        limit: i32,
    ) -> FdbResult<Vec<TenantName>>
    where
        T: ReadTransaction,
    {
        let range = self
            .tenant_group_tenant_index
            .range(&name_tuple(group.as_bytes()));

        let mut res = Vec::new();
        for kv in read_range(tr, range, limit).await? {
            let t = self.tenant_group_tenant_index.unpack(&kv.into_key().into())?;
            res.push(TenantName::from(t.get_bytes_ref(1)?.clone()));
        }
        Ok(res)
    }

    /// Read every `(group, name)` pair of the tenant group index.
    pub async fn list_tenant_group_index<T>(
        &self,
        tr: &T,
    ) -> FdbResult<Vec<(TenantGroupName, TenantName)>>
    where
        T: ReadTransaction,
    {
        let mut res = Vec::new();
        for kv in read_range(tr, self.tenant_group_tenant_index.all(), 0).await? {
            let t = self.tenant_group_tenant_index.unpack(&kv.into_key().into())?;
            res.push((
                TenantGroupName::from(t.get_bytes_ref(0)?.clone()),
                TenantName::from(t.get_bytes_ref(1)?.clone()),
            ));
        }
        Ok(res)
    }

    /// Read a tenant group map entry.
    pub async fn get_tenant_group<T>(
        &self,
        tr: &T,
        group: &TenantGroupName,
    ) -> FdbResult<Option<TenantGroupEntry>>
    where
        T: ReadTransaction,
    {
        match tr.get(self.tenant_group_key(group)).await? {
            Some(v) => TenantGroupEntry::decode(v.as_bytes()).map(Some),
            None => Ok(None),
        }
    }

    /// Write a tenant group map entry.
    pub fn set_tenant_group<T>(&self, tr: &T, group: &TenantGroupName, entry: &TenantGroupEntry)
    where
        T: Transaction,
    {
        tr.set(self.tenant_group_key(group), entry.encode());
    }

    /// Remove a tenant group map entry.
    pub fn clear_tenant_group<T>(&self, tr: &T, group: &TenantGroupName)
    where
        T: Transaction,
    {
        tr.clear(self.tenant_group_key(group));
    }
}

pub(crate) fn name_tuple(name: &[u8]) -> Tuple {
    let mut t = Tuple::new();
    t.add_bytes(Bytes::copy_from_slice(name));
    t
}

pub(crate) async fn read_range<T>(tr: &T, range: Range, limit: i32) -> FdbResult<Vec<KeyValue>>
where
    T: ReadTransaction,
{
    let mut range_stream = range.into_stream(tr, {
        let mut ro = RangeOptions::default();
        ro.set_limit(limit);
        ro
    });

    let mut res = Vec::new();
    while let Some(x) = range_stream.next().await {
        res.push(x?);
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use crate::database::{run, MemDatabase};
    use crate::tenant::{TenantGroupEntry, TenantGroupName, TenantMapEntry, TenantName, TenantState};

    use super::TenantMetadata;

    fn metadata() -> TenantMetadata {
        TenantMetadata::new(Bytes::from_static(&b"\xFF/"[..]))
    }

    #[test]
    fn layout() {
        let m = metadata();

        assert_eq!(
            Bytes::from(m.tenant_map_key(&TenantName::from("t"))),
            Bytes::from_static(&b"\xFF/tenant/map/\x01t\x00"[..])
        );
        assert_eq!(
            Bytes::from(m.last_tenant_id_key()),
            Bytes::from_static(&b"\xFF/tenant/lastId"[..])
        );
        assert_eq!(
            Bytes::from(m.tenant_tombstone_key(1)),
            Bytes::from_static(&b"\xFF/tenant/tombstones/\x15\x01"[..])
        );
        assert_eq!(
            Bytes::from(m.tenant_group_index_key(&TenantGroupName::from("g"), &TenantName::from("t"))),
            Bytes::from_static(&b"\xFF/tenant/tenantGroup/tenantIndex/\x01g\x00\x01t\x00"[..])
        );
    }

    #[test]
    fn prefixes_are_collision_free() {
        let prefixes = metadata().raw_prefixes();

        for (i, a) in prefixes.iter().enumerate() {
            for (j, b) in prefixes.iter().enumerate() {
                if i != j {
                    assert!(!b.starts_with(&a[..]), "{:?} is a prefix of {:?}", a, b);
                }
            }
        }
    }

    #[tokio::test]
    async fn accessors() {
        let db = MemDatabase::new();
        let m = metadata();
        let m_ref = &m;

        let g = TenantGroupName::from("g");
        let g_ref = &g;

        run(&db, |tr| async move {
            for name in ["a", "b", "c"].iter() {
                let name = TenantName::from(*name);
                m_ref.set_tenant(
                    &tr,
                    &name,
                    &TenantMapEntry::with_group(0, Some(g_ref.clone()), TenantState::Ready),
                );
                m_ref.add_tenant_group_index(&tr, g_ref, &name);
            }
            m_ref.set_tenant_group(&tr, g_ref, &TenantGroupEntry::default());
            m_ref.set_last_tenant_id(&tr, 9);
            m_ref.add_tombstone(&tr, 3);
            m_ref.add_tombstone(&tr, 1);
            Ok(())
        })
        .await
        .unwrap();

        run(&db, |tr| async move {
            let tenants = m_ref
                .list_tenants(&tr, &TenantName::from(""), &TenantName::from("c"), 0)
                .await?;
            assert_eq!(
                tenants.iter().map(|(n, _)| n.clone()).collect::<Vec<_>>(),
                vec![TenantName::from("a"), TenantName::from("b")]
            );

            assert_eq!(
                m_ref.list_tenant_group_tenants(&tr, g_ref, 2).await?,
                vec![TenantName::from("a"), TenantName::from("b")]
            );
            assert_eq!(m_ref.list_tenant_group_index(&tr).await?.len(), 3);

            assert_eq!(m_ref.get_last_tenant_id(&tr).await?, Some(9));
            assert!(m_ref.is_tombstoned(&tr, 3).await?);
            assert!(!m_ref.is_tombstoned(&tr, 2).await?);
            assert_eq!(m_ref.list_tombstones(&tr).await?, vec![1, 3]);

            assert_eq!(
                m_ref.get_tenant_group(&tr, g_ref).await?,
                Some(TenantGroupEntry::default())
            );

            m_ref.clear_tenant(&tr, &TenantName::from("a"));
            assert_eq!(m_ref.get_tenant(&tr, &TenantName::from("a")).await?, None);
            Ok(())
        })
        .await
        .unwrap();
    }
}
