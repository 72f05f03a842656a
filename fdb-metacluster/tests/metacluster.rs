use bytes::Bytes;

use fdb_metacluster::database::{self, MemDatabase};
use fdb_metacluster::error::{
    FdbError, CLUSTER_ALREADY_EXISTS, CLUSTER_NOT_EMPTY, CLUSTER_NOT_FOUND, CLUSTER_NO_CAPACITY,
    TRANSACTION_TIMED_OUT,
};
use fdb_metacluster::metacluster::{
    ClusterConfiguration, ClusterUsage, DataClusterEntry, TenantConfig,
};
use fdb_metacluster::tenant::{id_to_prefix, prefix_to_id, TenantMapEntry, TenantState};
use fdb_metacluster::transaction::TransactionOption;
use fdb_metacluster::{ClusterName, MetaclusterConfig, MetaclusterManagement, TenantName};

fn management() -> MetaclusterManagement<MemDatabase> {
    MetaclusterManagement::new(MemDatabase::new(), MetaclusterConfig::default())
}

async fn register(m: &MetaclusterManagement<MemDatabase>, name: &'static str, groups: i32) {
    m.register_cluster(
        name,
        Bytes::from_static(&b"X"[..]),
        DataClusterEntry::new(ClusterUsage::new(groups)),
    )
    .await
    .unwrap();
}

async fn check_invariants(m: &MetaclusterManagement<MemDatabase>) {
    let metadata = m.tenant_metadata();

    let (tenants, tombstones, index) = database::read(m.database(), |rtr| async move {
        Ok((
            metadata
                .list_tenants(&rtr, &TenantName::from(""), &TenantName::from("\u{7f}"), 0)
                .await?,
            metadata.list_tombstones(&rtr).await?,
            metadata.list_tenant_group_index(&rtr).await?,
        ))
    })
    .await
    .unwrap();

    for (_, entry) in tenants.iter() {
        assert!(!tombstones.contains(&entry.id()));
    }

    let mut grouped = tenants
        .iter()
        .filter_map(|(name, entry)| entry.tenant_group().map(|g| (g.clone(), name.clone())))
        .collect::<Vec<_>>();
    grouped.sort();
    assert_eq!(grouped, index);

    let mut groups = index.iter().map(|(group, _)| group.clone()).collect::<Vec<_>>();
    groups.dedup();

    let group_clusters = database::read(m.database(), |rtr| {
        let groups = groups.clone();
        async move {
            let mut clusters = Vec::new();
            for group in groups {
                if let Some(entry) = metadata.get_tenant_group(&rtr, &group).await? {
                    clusters.extend(entry.assigned_cluster().cloned());
                }
            }
            Ok(clusters)
        }
    })
    .await
    .unwrap();

    for (name, cluster) in m.list_clusters("", "\u{7f}", Some(0)).await.unwrap() {
        let ungrouped = tenants
            .iter()
            .filter(|(_, entry)| {
                entry.tenant_group().is_none() && entry.assigned_cluster() == Some(&name)
            })
            .count();
        let grouped = group_clusters.iter().filter(|c| **c == name).count();

        assert_eq!(
            cluster.entry().allocated().num_tenant_groups() as usize,
            ungrouped + grouped,
            "allocation of cluster {}",
            name
        );
        assert!(
            cluster.entry().allocated().num_tenant_groups()
                <= cluster.entry().capacity().num_tenant_groups()
        );
    }
}

#[test]
fn prefix_round_trip() {
    for n in [0, 1, 255, 256, 1 << 32, i64::MAX].iter() {
        assert_eq!(prefix_to_id(&id_to_prefix(*n)[..]), Ok(*n));
    }
}

#[test]
fn tenant_entry_round_trip() {
    let mut entry = TenantMapEntry::with_group(
        7,
        Some(Bytes::from_static(&b"g\x00"[..]).into()),
        TenantState::UpdatingConfiguration,
    );
    entry.set_assigned_cluster(Some(ClusterName::from("a")));
    entry.bump_configuration_sequence_num();

    let decoded = TenantMapEntry::decode(&entry.encode()[..]).unwrap();
    assert_eq!(decoded, entry);
    assert_eq!(decoded.prefix(), &id_to_prefix(7));
}

#[tokio::test]
async fn register_then_get() {
    let m = management();

    m.register_cluster(
        "clusterA",
        Bytes::from_static(&b"X"[..]),
        DataClusterEntry::new(ClusterUsage::new(5)),
    )
    .await
    .unwrap();

    let cluster = m.get_cluster("clusterA").await.unwrap();
    assert_eq!(cluster.entry().capacity(), ClusterUsage::new(5));
    assert_eq!(cluster.entry().allocated(), ClusterUsage::new(0));
}

#[tokio::test]
async fn remove_is_idempotently_not_found() {
    let m = management();

    register(&m, "a", 1).await;
    m.remove_cluster("a", false).await.unwrap();

    for force in [false, true, false].iter() {
        assert_eq!(
            m.remove_cluster("a", *force).await,
            Err(FdbError::new(CLUSTER_NOT_FOUND))
        );
    }
}

#[tokio::test]
async fn concurrent_register() {
    let m = management();

    let entry = DataClusterEntry::new(ClusterUsage::new(1));
    let (r1, r2) = tokio::join!(
        m.register_cluster("a", Bytes::from_static(&b"X"[..]), entry),
        m.register_cluster("a", Bytes::from_static(&b"Y"[..]), entry),
    );

    let mut results = vec![r1, r2];
    results.sort_by_key(|r| r.is_err());
    assert_eq!(
        results,
        vec![Ok(()), Err(FdbError::new(CLUSTER_ALREADY_EXISTS))]
    );

    assert_eq!(m.list_clusters("", "\u{7f}", None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn remove_non_empty_cluster() {
    let m = management();

    register(&m, "clusterA", 2).await;

    m.create_tenant("t1", TenantConfig::new().with_tenant_group("g1"))
        .await
        .unwrap();
    m.create_tenant("t2", TenantConfig::new().with_tenant_group("g2"))
        .await
        .unwrap();
    m.create_tenant("t3", TenantConfig::new().with_tenant_group("g2"))
        .await
        .unwrap();

    assert_eq!(
        m.get_cluster("clusterA")
            .await
            .unwrap()
            .entry()
            .allocated()
            .num_tenant_groups(),
        2
    );

    // Leave `t3` half deleted.
    let metadata = m.tenant_metadata();
    database::run(m.database(), |tr| async move {
        let name = TenantName::from("t3");
        if let Some(mut entry) = metadata.get_tenant(&tr, &name).await? {
            entry.set_tenant_state(TenantState::Removing);
            metadata.set_tenant(&tr, &name, &entry);
        }
        Ok(())
    })
    .await
    .unwrap();

    assert_eq!(
        m.remove_cluster("clusterA", false).await,
        Err(FdbError::new(CLUSTER_NOT_EMPTY))
    );

    m.remove_cluster("clusterA", true).await.unwrap();

    assert_eq!(
        m.get_cluster("clusterA").await,
        Err(FdbError::new(CLUSTER_NOT_FOUND))
    );

    for name in ["t1", "t2"].iter() {
        let entry = m.get_tenant(*name).await.unwrap();
        assert_eq!(entry.tenant_state(), TenantState::Error);
        assert_eq!(entry.assigned_cluster(), None);
    }

    let remaining = m
        .list_tenants("", "\u{7f}", None)
        .await
        .unwrap()
        .into_iter()
        .map(|(name, _)| name)
        .collect::<Vec<_>>();
    assert_eq!(remaining, vec![TenantName::from("t1"), TenantName::from("t2")]);

    check_invariants(&m).await;
}

#[tokio::test]
async fn configure_below_allocation() {
    let m = management();

    register(&m, "clusterA", 2).await;
    m.create_tenant("t1", TenantConfig::new()).await.unwrap();
    m.create_tenant("t2", TenantConfig::new()).await.unwrap();

    assert_eq!(
        m.configure_cluster(
            "clusterA",
            &ClusterConfiguration::new().with_capacity(ClusterUsage::new(1))
        )
        .await,
        Err(FdbError::new(CLUSTER_NO_CAPACITY))
    );

    let cluster = m.get_cluster("clusterA").await.unwrap();
    assert_eq!(cluster.entry().capacity(), ClusterUsage::new(2));
    assert_eq!(cluster.connection_string(), &Bytes::from_static(&b"X"[..]));

    let cluster = m
        .configure_cluster(
            "clusterA",
            &ClusterConfiguration::new().with_connection_string(Bytes::from_static(&b"Y"[..])),
        )
        .await
        .unwrap();
    assert_eq!(cluster.entry().capacity(), ClusterUsage::new(2));
    assert_eq!(cluster.connection_string(), &Bytes::from_static(&b"Y"[..]));
}

#[tokio::test]
async fn list_in_name_order() {
    let m = management();

    for name in ["b", "c", "a"].iter() {
        register(&m, *name, 1).await;
    }

    let clusters = m
        .list_clusters(
            ClusterName::from(""),
            ClusterName::from(Bytes::from_static(&b"\xFF"[..])),
            Some(100),
        )
        .await
        .unwrap();

    assert_eq!(
        clusters.into_iter().map(|(name, _)| name).collect::<Vec<_>>(),
        vec![
            ClusterName::from("a"),
            ClusterName::from("b"),
            ClusterName::from("c")
        ]
    );
}

#[tokio::test]
async fn tombstoned_ids_are_never_reused() {
    let m = management();

    register(&m, "a", 3).await;
    register(&m, "b", 3).await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        for (name, group) in [("t1", "g"), ("t2", "g"), ("t3", "h")].iter() {
            let entry = m
                .create_tenant(*name, TenantConfig::new().with_tenant_group(*group))
                .await
                .unwrap();
            ids.push(entry.id());
        }
        check_invariants(&m).await;

        for name in ["t2", "t1", "t3"].iter() {
            m.delete_tenant(*name).await.unwrap();
        }
        check_invariants(&m).await;
    }

    let mut unique = ids.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), ids.len());

    for (_, cluster) in m.list_clusters("", "\u{7f}", None).await.unwrap() {
        assert_eq!(cluster.entry().allocated(), ClusterUsage::new(0));
    }
}

#[tokio::test]
async fn conflicts_are_retried() {
    let m = management();

    m.database().fail_next_commits(3);
    register(&m, "a", 1).await;

    let config = MetaclusterConfig::default().with_transaction_option(TransactionOption::RetryLimit(2));
    let limited = MetaclusterManagement::new(MemDatabase::new(), config);

    limited.database().fail_next_commits(10);
    assert_eq!(
        limited
            .register_cluster(
                "a",
                Bytes::from_static(&b"X"[..]),
                DataClusterEntry::default()
            )
            .await,
        Err(FdbError::new(TRANSACTION_TIMED_OUT))
    );
}

#[tokio::test]
async fn detached_group_releases_capacity_on_new_cluster() {
    for order in [["t1", "t2"], ["t2", "t1"]].iter() {
        let m = management();

        register(&m, "a", 2).await;
        m.create_tenant("t1", TenantConfig::new().with_tenant_group("g"))
            .await
            .unwrap();
        m.remove_cluster("a", true).await.unwrap();
        check_invariants(&m).await;

        register(&m, "b", 1).await;
        let entry = m
            .create_tenant("t2", TenantConfig::new().with_tenant_group("g"))
            .await
            .unwrap();
        assert_eq!(entry.assigned_cluster(), Some(&ClusterName::from("b")));
        check_invariants(&m).await;

        for name in order.iter() {
            m.delete_tenant(*name).await.unwrap();
            check_invariants(&m).await;
        }

        assert!(m.list_tenants("", "\u{7f}", None).await.unwrap().is_empty());
        assert_eq!(
            m.get_cluster("b").await.unwrap().entry().allocated(),
            ClusterUsage::new(0)
        );
        m.remove_cluster("b", false).await.unwrap();
    }
}
