use bytes::Bytes;
use serde_json::{json, Map, Value as JsonValue};
use tracing::warn;

use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use crate::codec::{self, parser, ProtocolVersion, RecordWriter};
use crate::error::{
    FdbError, FdbResult, INVALID_TENANT_CONFIGURATION, TENANT_ENTRY_INVALID_STATE,
    TENANT_PREFIX_INVALID_LENGTH,
};
use crate::metacluster::ClusterName;
use crate::tenant::{printable, TenantGroupName};

/// Width in bytes of a tenant prefix.
pub const TENANT_PREFIX_SIZE: usize = 8;

/// Lifecycle state of a tenant.
///
/// ```text
/// REGISTERING --> READY --> REMOVING --> [deleted]
/// READY --> UPDATING_CONFIGURATION --> READY
/// any state --> ERROR
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TenantState {
    /// An id has been allocated and the tenant is being initialized.
    Registering,
    /// The tenant is usable.
    Ready,
    /// Deletion has begun.
    Removing,
    /// A configuration change is being applied.
    UpdatingConfiguration,
    /// The tenant hit an unrecoverable fault, such as its data
    /// cluster being forcibly removed. Requires administrative
    /// remediation.
    Error,
}

impl TenantState {
    fn code(self) -> i32 {
        match self {
            TenantState::Registering => 0,
            TenantState::Ready => 1,
            TenantState::Removing => 2,
            TenantState::UpdatingConfiguration => 3,
            TenantState::Error => 4,
        }
    }
}

impl TryFrom<i32> for TenantState {
    type Error = FdbError;

    fn try_from(code: i32) -> FdbResult<TenantState> {
        match code {
            0 => Ok(TenantState::Registering),
            1 => Ok(TenantState::Ready),
            2 => Ok(TenantState::Removing),
            3 => Ok(TenantState::UpdatingConfiguration),
            4 => Ok(TenantState::Error),
            _ => Err(FdbError::new(TENANT_ENTRY_INVALID_STATE)),
        }
    }
}

impl fmt::Display for TenantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TenantState::Registering => "registering",
            TenantState::Ready => "ready",
            TenantState::Removing => "removing",
            TenantState::UpdatingConfiguration => "updating configuration",
            TenantState::Error => "error",
        })
    }
}

impl FromStr for TenantState {
    type Err = FdbError;

    fn from_str(s: &str) -> FdbResult<TenantState> {
        match s {
            "registering" => Ok(TenantState::Registering),
            "ready" => Ok(TenantState::Ready),
            "removing" => Ok(TenantState::Removing),
            "updating configuration" => Ok(TenantState::UpdatingConfiguration),
            "error" => Ok(TenantState::Error),
            _ => Err(FdbError::new(TENANT_ENTRY_INVALID_STATE)),
        }
    }
}

/// Compute the key-space prefix of the tenant with id `id`.
///
/// The prefix is the 8-byte big-endian encoding of `id`, so tenant
/// prefixes sort in id order.
pub fn id_to_prefix(id: i64) -> Bytes {
    Bytes::copy_from_slice(&id.to_be_bytes()[..])
}

/// Inverse of [`id_to_prefix`].
///
/// Fails with [`TENANT_PREFIX_INVALID_LENGTH`] unless `prefix` is
/// exactly [`TENANT_PREFIX_SIZE`] bytes.
///
/// [`TENANT_PREFIX_INVALID_LENGTH`]: crate::error::TENANT_PREFIX_INVALID_LENGTH
pub fn prefix_to_id(prefix: &[u8]) -> FdbResult<i64> {
    <[u8; TENANT_PREFIX_SIZE]>::try_from(prefix)
        .map(i64::from_be_bytes)
        .map_err(|_| FdbError::new(TENANT_PREFIX_INVALID_LENGTH))
}

/// Metadata of a single tenant, stored in the tenant map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantMapEntry {
    id: i64,
    // Always `id_to_prefix(id)`.
    prefix: Bytes,
    tenant_group: Option<TenantGroupName>,
    tenant_state: TenantState,
    assigned_cluster: Option<ClusterName>,
    configuration_sequence_num: i64,
}

impl TenantMapEntry {
    /// Create a new [`TenantMapEntry`] without a tenant group.
    pub fn new(id: i64, tenant_state: TenantState) -> TenantMapEntry {
        TenantMapEntry::with_group(id, None, tenant_state)
    }

    /// Create a new [`TenantMapEntry`] in `tenant_group`.
    pub fn with_group(
        id: i64,
        tenant_group: Option<TenantGroupName>,
        tenant_state: TenantState,
    ) -> TenantMapEntry {
        TenantMapEntry {
            id,
            prefix: id_to_prefix(id),
            tenant_group,
            tenant_state,
            assigned_cluster: None,
            configuration_sequence_num: 0,
        }
    }

    /// Get the tenant id.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Get the tenant prefix.
    pub fn prefix(&self) -> &Bytes {
        &self.prefix
    }

    /// Get the tenant group.
    pub fn tenant_group(&self) -> Option<&TenantGroupName> {
        self.tenant_group.as_ref()
    }

    /// Get the tenant state.
    pub fn tenant_state(&self) -> TenantState {
        self.tenant_state
    }

    /// Get the data cluster the tenant is assigned to.
    pub fn assigned_cluster(&self) -> Option<&ClusterName> {
        self.assigned_cluster.as_ref()
    }

    /// Get the configuration sequence number.
    pub fn configuration_sequence_num(&self) -> i64 {
        self.configuration_sequence_num
    }

    /// Set the tenant state.
    pub fn set_tenant_state(&mut self, tenant_state: TenantState) {
        self.tenant_state = tenant_state;
    }

    /// Set the tenant group.
    pub fn set_tenant_group(&mut self, tenant_group: Option<TenantGroupName>) {
        self.tenant_group = tenant_group;
    }

    /// Set the assigned data cluster.
    pub fn set_assigned_cluster(&mut self, assigned_cluster: Option<ClusterName>) {
        self.assigned_cluster = assigned_cluster;
    }

    /// Increment the configuration sequence number. Called on every
    /// configuration-changing write.
    pub fn bump_configuration_sequence_num(&mut self) {
        self.configuration_sequence_num += 1;
    }

    /// Returns `true` if `other` has the same configuration, that is
    /// the same tenant group and assigned cluster.
    pub fn matches_configuration(&self, other: &TenantMapEntry) -> bool {
        self.tenant_group == other.tenant_group && self.assigned_cluster == other.assigned_cluster
    }

    /// Apply one configuration change.
    ///
    /// Recognized parameters are `tenant_group` and
    /// `assigned_cluster`. A `None` value unsets the parameter. Other
    /// parameters fail with [`INVALID_TENANT_CONFIGURATION`].
    ///
    /// [`INVALID_TENANT_CONFIGURATION`]: crate::error::INVALID_TENANT_CONFIGURATION
    pub fn configure(&mut self, parameter: &[u8], value: Option<Bytes>) -> FdbResult<()> {
        match parameter {
            b"tenant_group" => {
                self.tenant_group = value.map(TenantGroupName::from);
                Ok(())
            }
            b"assigned_cluster" => {
                self.assigned_cluster = value.map(ClusterName::from);
                Ok(())
            }
            _ => {
                warn!(
                    parameter = %printable(parameter),
                    "unknown tenant configuration parameter"
                );
                Err(FdbError::new(INVALID_TENANT_CONFIGURATION))
            }
        }
    }

    /// Encode the entry at [`ProtocolVersion::CURRENT`].
    pub fn encode(&self) -> Bytes {
        RecordWriter::new(ProtocolVersion::CURRENT)
            .put_i64(self.id)
            .put_optional_bytes(self.tenant_group.as_ref().map(|g| g.as_bytes()))
            .put_i32(self.tenant_state.code())
            .put_optional_bytes(self.assigned_cluster.as_ref().map(|c| c.as_bytes()))
            .put_i64(self.configuration_sequence_num)
            .finish()
    }

    /// Decode an entry written at any protocol version since
    /// [`ProtocolVersion::WITH_TENANTS`].
    ///
    /// The prefix is always derived from the id. A prefix stored by
    /// older versions is read and ignored.
    pub fn decode(value: &[u8]) -> FdbResult<TenantMapEntry> {
        let (id, tenant_group, state_code, assigned_cluster, configuration_sequence_num) =
            codec::decode_record(value, ProtocolVersion::WITH_TENANTS, |version, i| {
                if version.has_tenant_groups() {
                    let (i, id) = parser::i64(i)?;
                    let (i, tenant_group) = parser::optional_bytes(i)?;
                    let (i, state_code) = parser::i32(i)?;
                    let (i, assigned_cluster) = parser::optional_bytes(i)?;
                    let (i, seq) = parser::i64(i)?;
                    Ok((i, (id, tenant_group, state_code, assigned_cluster, seq)))
                } else {
                    let (i, id) = parser::i64(i)?;
                    let (i, _stored_prefix) = parser::bytes(i)?;
                    Ok((i, (id, None, TenantState::Ready.code(), None, 0)))
                }
            })?;

        Ok(TenantMapEntry {
            id,
            prefix: id_to_prefix(id),
            tenant_group: tenant_group.map(TenantGroupName::from),
            tenant_state: TenantState::try_from(state_code)?,
            assigned_cluster: assigned_cluster.map(ClusterName::from),
            configuration_sequence_num,
        })
    }

    /// Render the entry as a JSON object.
    pub fn to_json(&self) -> JsonValue {
        let mut obj = Map::new();

        obj.insert("id".to_string(), json!(self.id));
        obj.insert("prefix".to_string(), json!(printable(&self.prefix[..])));
        obj.insert(
            "tenant_state".to_string(),
            json!(self.tenant_state.to_string()),
        );

        if let Some(g) = &self.tenant_group {
            obj.insert("tenant_group".to_string(), json!(g.to_string()));
        }

        if let Some(c) = &self.assigned_cluster {
            obj.insert("assigned_cluster".to_string(), json!(c.to_string()));
        }

        JsonValue::Object(obj)
    }
}

/// Metadata of a tenant group, stored in the tenant group map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TenantGroupEntry {
    assigned_cluster: Option<ClusterName>,
}

impl TenantGroupEntry {
    /// Create a new [`TenantGroupEntry`].
    pub fn new(assigned_cluster: Option<ClusterName>) -> TenantGroupEntry {
        TenantGroupEntry { assigned_cluster }
    }

    /// Get the data cluster the group is assigned to.
    pub fn assigned_cluster(&self) -> Option<&ClusterName> {
        self.assigned_cluster.as_ref()
    }

    /// Set the assigned data cluster.
    pub fn set_assigned_cluster(&mut self, assigned_cluster: Option<ClusterName>) {
        self.assigned_cluster = assigned_cluster;
    }

    /// Encode the entry at [`ProtocolVersion::CURRENT`].
    pub fn encode(&self) -> Bytes {
        RecordWriter::new(ProtocolVersion::CURRENT)
            .put_optional_bytes(self.assigned_cluster.as_ref().map(|c| c.as_bytes()))
            .finish()
    }

    /// Decode an entry.
    pub fn decode(value: &[u8]) -> FdbResult<TenantGroupEntry> {
        let assigned_cluster =
            codec::decode_record(value, ProtocolVersion::WITH_TENANT_GROUPS, |_, i| {
                parser::optional_bytes(i)
            })?;

        Ok(TenantGroupEntry {
            assigned_cluster: assigned_cluster.map(ClusterName::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use serde_json::json;

    use std::convert::TryFrom;

    use crate::codec::{ProtocolVersion, RecordWriter};
    use crate::error::{
        FdbError, INVALID_TENANT_CONFIGURATION, RECORD_DECODE, TENANT_ENTRY_INVALID_STATE,
        TENANT_PREFIX_INVALID_LENGTH,
    };
    use crate::metacluster::ClusterName;
    use crate::tenant::TenantGroupName;

    use super::{id_to_prefix, prefix_to_id, TenantGroupEntry, TenantMapEntry, TenantState};

    #[test]
    fn prefix() {
        for id in [0, 1, 255, 256, 1 << 40, i64::MAX].iter() {
            assert_eq!(prefix_to_id(&id_to_prefix(*id)[..]), Ok(*id));
        }

        assert_eq!(
            id_to_prefix(1),
            Bytes::from_static(&b"\x00\x00\x00\x00\x00\x00\x00\x01"[..])
        );
        assert!(id_to_prefix(255) < id_to_prefix(256));

        assert_eq!(
            prefix_to_id(&b"\x00\x01"[..]),
            Err(FdbError::new(TENANT_PREFIX_INVALID_LENGTH))
        );
        assert_eq!(
            prefix_to_id(&b"\x00\x00\x00\x00\x00\x00\x00\x00\x01"[..]),
            Err(FdbError::new(TENANT_PREFIX_INVALID_LENGTH))
        );
    }

    #[test]
    fn tenant_state_strings() {
        for state in [
            TenantState::Registering,
            TenantState::Ready,
            TenantState::Removing,
            TenantState::UpdatingConfiguration,
            TenantState::Error,
        ]
        .iter()
        {
            assert_eq!(state.to_string().parse::<TenantState>(), Ok(*state));
        }

        assert_eq!(
            TenantState::UpdatingConfiguration.to_string(),
            "updating configuration"
        );
        assert_eq!(
            "unknown".parse::<TenantState>(),
            Err(FdbError::new(TENANT_ENTRY_INVALID_STATE))
        );
        assert_eq!(
            TenantState::try_from(5),
            Err(FdbError::new(TENANT_ENTRY_INVALID_STATE))
        );
    }

    #[test]
    fn encode_decode() {
        let mut entry = TenantMapEntry::with_group(
            42,
            Some(TenantGroupName::from("group")),
            TenantState::UpdatingConfiguration,
        );
        entry.set_assigned_cluster(Some(ClusterName::from("cluster_a")));
        entry.bump_configuration_sequence_num();

        let decoded = TenantMapEntry::decode(&entry.encode()[..]).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(decoded.prefix(), &id_to_prefix(42));
        assert_eq!(decoded.configuration_sequence_num(), 1);
    }

    #[test]
    fn decode_legacy_version() {
        // Stored prefix is ignored.
        let value = RecordWriter::new(ProtocolVersion::WITH_TENANTS)
            .put_i64(7)
            .put_bytes(&b"bogus"[..])
            .finish();

        let entry = TenantMapEntry::decode(&value[..]).unwrap();
        assert_eq!(entry.id(), 7);
        assert_eq!(entry.prefix(), &id_to_prefix(7));
        assert_eq!(entry.tenant_state(), TenantState::Ready);
        assert_eq!(entry.tenant_group(), None);
        assert_eq!(entry.assigned_cluster(), None);
    }

    #[test]
    fn decode_rejects_invalid_state() {
        let value = RecordWriter::new(ProtocolVersion::CURRENT)
            .put_i64(1)
            .put_optional_bytes(None)
            .put_i32(5)
            .put_optional_bytes(None)
            .put_i64(0)
            .finish();

        assert_eq!(
            TenantMapEntry::decode(&value[..]),
            Err(FdbError::new(TENANT_ENTRY_INVALID_STATE))
        );

        let value = TenantMapEntry::new(1, TenantState::Ready).encode();
        assert_eq!(
            TenantMapEntry::decode(&value[..value.len() - 1]),
            Err(FdbError::new(RECORD_DECODE))
        );
    }

    #[test]
    fn configure() {
        let mut entry = TenantMapEntry::new(1, TenantState::Ready);
        let other = entry.clone();

        entry
            .configure(&b"tenant_group"[..], Some(Bytes::from_static(&b"g"[..])))
            .unwrap();
        assert_eq!(entry.tenant_group(), Some(&TenantGroupName::from("g")));
        assert!(!entry.matches_configuration(&other));

        entry.configure(&b"tenant_group"[..], None).unwrap();
        assert!(entry.matches_configuration(&other));

        entry
            .configure(
                &b"assigned_cluster"[..],
                Some(Bytes::from_static(&b"c"[..])),
            )
            .unwrap();
        assert!(!entry.matches_configuration(&other));

        assert_eq!(
            entry.configure(&b"bogus"[..], None),
            Err(FdbError::new(INVALID_TENANT_CONFIGURATION))
        );
    }

    #[test]
    fn to_json() {
        let mut entry =
            TenantMapEntry::with_group(1, Some(TenantGroupName::from("g")), TenantState::Ready);
        assert_eq!(
            entry.to_json(),
            json!({
                "id": 1,
                "prefix": "\\x00\\x00\\x00\\x00\\x00\\x00\\x00\\x01",
                "tenant_state": "ready",
                "tenant_group": "g",
            })
        );

        entry.set_tenant_group(None);
        entry.set_assigned_cluster(Some(ClusterName::from("c")));
        assert_eq!(entry.to_json()["assigned_cluster"], json!("c"));
        assert!(entry.to_json().get("tenant_group").is_none());
    }

    #[test]
    fn tenant_group_entry() {
        let entry = TenantGroupEntry::new(Some(ClusterName::from("c")));
        assert_eq!(TenantGroupEntry::decode(&entry.encode()[..]), Ok(entry));
        assert_eq!(
            TenantGroupEntry::decode(&TenantGroupEntry::default().encode()[..]),
            Ok(TenantGroupEntry::default())
        );
    }
}
