use bytes::Bytes;

use std::fmt;

use crate::tenant::printable;

/// [`ClusterName`] names a data cluster registered in a metacluster.
///
/// [`ClusterName`] can be converted from and into [`Bytes`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterName(Bytes);

impl ClusterName {
    /// Returns the name as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

impl From<Bytes> for ClusterName {
    fn from(b: Bytes) -> ClusterName {
        ClusterName(b)
    }
}

impl From<&'static str> for ClusterName {
    fn from(s: &'static str) -> ClusterName {
        ClusterName(Bytes::from_static(s.as_bytes()))
    }
}

impl From<ClusterName> for Bytes {
    fn from(c: ClusterName) -> Bytes {
        c.0
    }
}

impl fmt::Display for ClusterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&printable(&self.0[..]))
    }
}
