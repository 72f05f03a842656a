// We name this module `tenant_inner` in order to avoid
// `module_inception` lint. We need to do this because we want to
// expose `TenantName` type as `crate::TenantName`.

use bytes::Bytes;

use std::fmt;

/// [`TenantName`] names a tenant in the tenant map.
///
/// [`TenantName`] can be converted from and into [`Bytes`].
///
/// **Note:** Tenant names should not begin with `\xFF`. We do not
/// enforce this check when creating a value of type [`TenantName`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TenantName(Bytes);

impl TenantName {
    /// Returns the name as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

impl From<Bytes> for TenantName {
    fn from(b: Bytes) -> TenantName {
        TenantName(b)
    }
}

impl From<&'static str> for TenantName {
    fn from(s: &'static str) -> TenantName {
        TenantName(Bytes::from_static(s.as_bytes()))
    }
}

impl From<TenantName> for Bytes {
    fn from(t: TenantName) -> Bytes {
        t.0
    }
}

impl fmt::Display for TenantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&printable(&self.0[..]))
    }
}

/// [`TenantGroupName`] names a tenant group. Tenants in the same
/// group share one unit of data cluster capacity.
///
/// [`TenantGroupName`] can be converted from and into [`Bytes`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TenantGroupName(Bytes);

impl TenantGroupName {
    /// Returns the name as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

impl From<Bytes> for TenantGroupName {
    fn from(b: Bytes) -> TenantGroupName {
        TenantGroupName(b)
    }
}

impl From<&'static str> for TenantGroupName {
    fn from(s: &'static str) -> TenantGroupName {
        TenantGroupName(Bytes::from_static(s.as_bytes()))
    }
}

impl From<TenantGroupName> for Bytes {
    fn from(t: TenantGroupName) -> Bytes {
        t.0
    }
}

impl fmt::Display for TenantGroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&printable(&self.0[..]))
    }
}

/// Render bytes for humans. Printable ASCII is kept, `\` is doubled
/// and every other byte is written as `\xNN`.
pub fn printable(b: &[u8]) -> String {
    let mut res = String::with_capacity(b.len());

    b.iter().for_each(|x| match *x {
        b'\\' => res.push_str("\\\\"),
        32..=126 => res.push(char::from(*x)),
        _ => res.push_str(&format!("\\x{:02x}", x)),
    });

    res
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::{printable, TenantGroupName, TenantName};

    #[test]
    fn printable_escapes() {
        assert_eq!(printable(&b"cluster_a"[..]), "cluster_a");
        assert_eq!(printable(&b"a\\b"[..]), "a\\\\b");
        assert_eq!(printable(&b"\xFF/\x00"[..]), "\\xff/\\x00");
    }

    #[test]
    fn names() {
        let t = TenantName::from(Bytes::from_static(&b"t\x01"[..]));
        assert_eq!(t.to_string(), "t\\x01");
        assert_eq!(Bytes::from(t), Bytes::from_static(&b"t\x01"[..]));

        assert!(TenantGroupName::from("a") < TenantGroupName::from("b"));
    }
}
