use bytes::Bytes;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use tracing::warn;

use crate::codec::{self, parser, ProtocolVersion, RecordWriter};
use crate::error::{
    FdbError, FdbResult, CLUSTER_NO_CAPACITY, INVALID_CONFIGURATION_PARAMETER,
    INVALID_NUMBER_OF_TENANT_GROUPS,
};
use crate::tenant::printable;

/// Amount of data cluster resources, measured in tenant groups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ClusterUsage {
    num_tenant_groups: i32,
}

impl ClusterUsage {
    /// Create a [`ClusterUsage`] of `num_tenant_groups`.
    pub fn new(num_tenant_groups: i32) -> ClusterUsage {
        ClusterUsage { num_tenant_groups }
    }

    /// Get number of tenant groups.
    pub fn num_tenant_groups(&self) -> i32 {
        self.num_tenant_groups
    }
}

/// Capacity and allocation of a data cluster.
///
/// Every committed entry satisfies `allocated <= capacity`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DataClusterEntry {
    capacity: ClusterUsage,
    allocated: ClusterUsage,
}

impl DataClusterEntry {
    /// Create a [`DataClusterEntry`] with nothing allocated.
    pub fn new(capacity: ClusterUsage) -> DataClusterEntry {
        DataClusterEntry {
            capacity,
            allocated: ClusterUsage::default(),
        }
    }

    /// Get capacity.
    pub fn capacity(&self) -> ClusterUsage {
        self.capacity
    }

    /// Get allocation.
    pub fn allocated(&self) -> ClusterUsage {
        self.allocated
    }

    /// Set capacity.
    pub fn set_capacity(&mut self, capacity: ClusterUsage) {
        self.capacity = capacity;
    }

    /// Set allocation.
    pub fn set_allocated(&mut self, allocated: ClusterUsage) {
        self.allocated = allocated;
    }

    /// Returns `true` if another tenant group can be allocated.
    pub fn has_capacity(&self) -> bool {
        self.allocated.num_tenant_groups < self.capacity.num_tenant_groups
    }

    /// Number of tenant groups that can still be allocated.
    pub fn free_capacity(&self) -> i32 {
        self.capacity.num_tenant_groups - self.allocated.num_tenant_groups
    }
}

/// A data cluster record as stored in the cluster directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataClusterMetadata {
    entry: DataClusterEntry,
    connection_string: Bytes,
}

impl DataClusterMetadata {
    /// Create a [`DataClusterMetadata`].
    pub fn new(entry: DataClusterEntry, connection_string: Bytes) -> DataClusterMetadata {
        DataClusterMetadata {
            entry,
            connection_string,
        }
    }

    /// Get a reference to the [`DataClusterEntry`].
    pub fn entry(&self) -> &DataClusterEntry {
        &self.entry
    }

    /// Get a mutable reference to the [`DataClusterEntry`].
    pub fn entry_mut(&mut self) -> &mut DataClusterEntry {
        &mut self.entry
    }

    /// Get connection string.
    pub fn connection_string(&self) -> &Bytes {
        &self.connection_string
    }

    /// Replace the capacity. Fails with `cluster_no_capacity` if
    /// `capacity` is below the current allocation.
    pub fn update_capacity(&mut self, capacity: ClusterUsage) -> FdbResult<()> {
        if capacity.num_tenant_groups < self.entry.allocated.num_tenant_groups {
            return Err(FdbError::new(CLUSTER_NO_CAPACITY));
        }
        self.entry.capacity = capacity;
        Ok(())
    }

    /// Replace the connection string.
    pub fn update_connection_string(&mut self, connection_string: Bytes) {
        self.connection_string = connection_string;
    }

    /// Encode the record at [`ProtocolVersion::CURRENT`].
    pub fn encode(&self) -> Bytes {
        RecordWriter::new(ProtocolVersion::CURRENT)
            .put_bytes(&self.connection_string[..])
            .put_i32(self.entry.capacity.num_tenant_groups)
            .put_i32(self.entry.allocated.num_tenant_groups)
            .finish()
    }

    /// Decode a record. Data cluster records first appeared in
    /// [`ProtocolVersion::WITH_TENANT_GROUPS`].
    pub fn decode(value: &[u8]) -> FdbResult<DataClusterMetadata> {
        codec::decode_record(value, ProtocolVersion::WITH_TENANT_GROUPS, |_, i| {
            let (i, connection_string) = parser::bytes(i)?;
            let (i, capacity) = parser::i32(i)?;
            let (i, allocated) = parser::i32(i)?;
            Ok((
                i,
                DataClusterMetadata {
                    entry: DataClusterEntry {
                        capacity: ClusterUsage::new(capacity),
                        allocated: ClusterUsage::new(allocated),
                    },
                    connection_string,
                },
            ))
        })
    }

    /// Render the record as a JSON object.
    ///
    /// ```json
    /// {
    ///   "connection_string": "...",
    ///   "capacity": { "num_tenant_groups": 5 },
    ///   "allocated": { "num_tenant_groups": 0 }
    /// }
    /// ```
    pub fn to_json(&self) -> JsonValue {
        json!({
            "connection_string": printable(&self.connection_string[..]),
            "capacity": self.entry.capacity,
            "allocated": self.entry.allocated,
        })
    }
}

/// Changes to a data cluster, parsed from `name=value` tokens.
///
/// Only parameters present in the tokens are set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterConfiguration {
    connection_string: Option<Bytes>,
    capacity: Option<ClusterUsage>,
}

impl ClusterConfiguration {
    /// Create an empty [`ClusterConfiguration`].
    pub fn new() -> ClusterConfiguration {
        ClusterConfiguration::default()
    }

    /// Set the connection string.
    pub fn with_connection_string(mut self, connection_string: impl Into<Bytes>) -> ClusterConfiguration {
        self.connection_string = Some(connection_string.into());
        self
    }

    /// Set the capacity.
    pub fn with_capacity(mut self, capacity: ClusterUsage) -> ClusterConfiguration {
        self.capacity = Some(capacity);
        self
    }

    /// Parse `max_tenant_groups=<N>` and `connection_string=<S>`
    /// tokens.
    ///
    /// `N` must be a whole non-negative `i32`, otherwise
    /// [`INVALID_NUMBER_OF_TENANT_GROUPS`] is returned. Any other
    /// parameter fails with [`INVALID_CONFIGURATION_PARAMETER`]. A
    /// later token overrides an earlier one.
    ///
    /// [`INVALID_NUMBER_OF_TENANT_GROUPS`]: crate::error::INVALID_NUMBER_OF_TENANT_GROUPS
    /// [`INVALID_CONFIGURATION_PARAMETER`]: crate::error::INVALID_CONFIGURATION_PARAMETER
    pub fn parse(tokens: &[Bytes]) -> FdbResult<ClusterConfiguration> {
        let mut config = ClusterConfiguration::new();

        for token in tokens {
            let (param, value) = match token.iter().position(|x| *x == b'=') {
                Some(pos) => (token.slice(..pos), token.slice((pos + 1)..)),
                None => (token.clone(), Bytes::new()),
            };

            match &param[..] {
                b"max_tenant_groups" => {
                    let n = std::str::from_utf8(&value[..])
                        .ok()
                        .filter(|s| s.bytes().all(|x| x.is_ascii_digit()) && !s.is_empty())
                        .and_then(|s| s.parse::<i32>().ok())
                        .ok_or_else(|| {
                            warn!(value = %printable(&value[..]), "invalid number of tenant groups");
                            FdbError::new(INVALID_NUMBER_OF_TENANT_GROUPS)
                        })?;
                    config.capacity = Some(ClusterUsage::new(n));
                }
                b"connection_string" => config.connection_string = Some(value),
                _ => {
                    warn!(
                        parameter = %printable(&param[..]),
                        "unrecognized configuration parameter"
                    );
                    return Err(FdbError::new(INVALID_CONFIGURATION_PARAMETER));
                }
            }
        }

        Ok(config)
    }

    /// Get connection string, if set.
    pub fn connection_string(&self) -> Option<&Bytes> {
        self.connection_string.as_ref()
    }

    /// Get capacity, if set.
    pub fn capacity(&self) -> Option<ClusterUsage> {
        self.capacity
    }

    /// Apply the present parameters to `metadata`.
    pub fn apply(&self, metadata: &mut DataClusterMetadata) -> FdbResult<()> {
        if let Some(capacity) = self.capacity {
            metadata.update_capacity(capacity)?;
        }
        if let Some(connection_string) = &self.connection_string {
            metadata.update_connection_string(connection_string.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use serde_json::json;

    use crate::codec::{ProtocolVersion, RecordWriter};
    use crate::error::{
        FdbError, CLUSTER_NO_CAPACITY, INVALID_CONFIGURATION_PARAMETER,
        INVALID_NUMBER_OF_TENANT_GROUPS, RECORD_UNKNOWN_PROTOCOL_VERSION,
    };

    use super::{ClusterConfiguration, ClusterUsage, DataClusterEntry, DataClusterMetadata};

    fn tokens(v: &[&'static str]) -> Vec<Bytes> {
        v.iter().map(|s| Bytes::from_static(s.as_bytes())).collect()
    }

    #[test]
    fn capacity() {
        let mut entry = DataClusterEntry::new(ClusterUsage::new(2));
        assert!(entry.has_capacity());
        assert_eq!(entry.free_capacity(), 2);

        entry.set_allocated(ClusterUsage::new(2));
        assert!(!entry.has_capacity());
        assert_eq!(entry.free_capacity(), 0);
    }

    #[test]
    fn encode_decode() {
        let mut entry = DataClusterEntry::new(ClusterUsage::new(5));
        entry.set_allocated(ClusterUsage::new(3));
        let metadata = DataClusterMetadata::new(entry, Bytes::from_static(&b"conn:1@x"[..]));

        assert_eq!(
            DataClusterMetadata::decode(&metadata.encode()[..]),
            Ok(metadata)
        );

        let legacy = RecordWriter::new(ProtocolVersion::WITH_TENANTS)
            .put_bytes(&b"conn"[..])
            .put_i32(1)
            .put_i32(0)
            .finish();
        assert_eq!(
            DataClusterMetadata::decode(&legacy[..]),
            Err(FdbError::new(RECORD_UNKNOWN_PROTOCOL_VERSION))
        );
    }

    #[test]
    fn to_json() {
        let metadata = DataClusterMetadata::new(
            DataClusterEntry::new(ClusterUsage::new(5)),
            Bytes::from_static(&b"X"[..]),
        );

        assert_eq!(
            metadata.to_json(),
            json!({
                "connection_string": "X",
                "capacity": { "num_tenant_groups": 5 },
                "allocated": { "num_tenant_groups": 0 },
            })
        );
    }

    #[test]
    fn parse() {
        let config =
            ClusterConfiguration::parse(&tokens(&["connection_string=a=b", "max_tenant_groups=7"]))
                .unwrap();
        assert_eq!(
            config,
            ClusterConfiguration::new()
                .with_connection_string(Bytes::from_static(&b"a=b"[..]))
                .with_capacity(ClusterUsage::new(7))
        );

        assert_eq!(
            ClusterConfiguration::parse(&[]).unwrap(),
            ClusterConfiguration::new()
        );

        for bad in &[
            "max_tenant_groups=",
            "max_tenant_groups",
            "max_tenant_groups=-1",
            "max_tenant_groups=5x",
            "max_tenant_groups= 5",
            "max_tenant_groups=99999999999",
        ] {
            assert_eq!(
                ClusterConfiguration::parse(&tokens(&[*bad])),
                Err(FdbError::new(INVALID_NUMBER_OF_TENANT_GROUPS)),
                "{}",
                bad
            );
        }

        assert_eq!(
            ClusterConfiguration::parse(&tokens(&["max_tenants=5"])),
            Err(FdbError::new(INVALID_CONFIGURATION_PARAMETER))
        );
    }

    #[test]
    fn apply() {
        let mut metadata = DataClusterMetadata::new(
            DataClusterEntry::new(ClusterUsage::new(5)),
            Bytes::from_static(&b"X"[..]),
        );

        ClusterConfiguration::new()
            .with_capacity(ClusterUsage::new(2))
            .apply(&mut metadata)
            .unwrap();
        assert_eq!(metadata.entry().capacity(), ClusterUsage::new(2));
        assert_eq!(metadata.connection_string(), &Bytes::from_static(&b"X"[..]));

        ClusterConfiguration::new()
            .with_connection_string(Bytes::from_static(&b"Y"[..]))
            .apply(&mut metadata)
            .unwrap();
        assert_eq!(metadata.entry().capacity(), ClusterUsage::new(2));
        assert_eq!(metadata.connection_string(), &Bytes::from_static(&b"Y"[..]));

        metadata.entry_mut().set_allocated(ClusterUsage::new(2));
        assert_eq!(
            ClusterConfiguration::new()
                .with_capacity(ClusterUsage::new(1))
                .apply(&mut metadata),
            Err(FdbError::new(CLUSTER_NO_CAPACITY))
        );
        assert_eq!(metadata.entry().capacity(), ClusterUsage::new(2));
    }
}
