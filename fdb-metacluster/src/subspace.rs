//! Provides a convenient way to define namespaces for different
//! categories of data.
//!
//! The namespace is specified by a raw byte prefix which is prepended
//! to all tuples packed by the subspace. When unpacking a key with the
//! subspace, the prefix will be removed from the result.
//!
//! See [general subspace documentation] for information about how
//! subspaces work and interact with other parts of the keyspace.
//!
//! [general subspace documentation]: https://apple.github.io/foundationdb/developer-guide.html#developer-guide-sub-keyspaces

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FdbError, FdbResult, SUBSPACE_UNPACK_KEY_MISMATCH};
use crate::range::Range;
use crate::tuple::Tuple;
use crate::Key;

/// Subspace provides a convenient way to use [`Tuple`] to define
/// namespaces for different categories of data.
#[derive(Debug, Clone, Eq, Ord, PartialEq, PartialOrd)]
pub struct Subspace {
    raw_prefix: Bytes,
}

impl Subspace {
    /// Create a new [`Subspace`] with prefix [`Bytes`].
    pub fn new(prefix_bytes: Bytes) -> Subspace {
        Subspace {
            raw_prefix: prefix_bytes,
        }
    }

    /// Gets a new subspace whose prefix is this subspace's prefix
    /// followed by the raw bytes `suffix`.
    pub fn with_suffix(&self, suffix: &[u8]) -> Subspace {
        let mut raw_prefix = BytesMut::new();
        raw_prefix.put(self.raw_prefix.clone());
        raw_prefix.put(suffix);

        Subspace {
            raw_prefix: raw_prefix.into(),
        }
    }

    /// Gets a new subspace which is equivalent of this subspace with
    /// its prefix extended by the specified [`Tuple`].
    pub fn subspace(&self, tuple: &Tuple) -> Subspace {
        self.with_suffix(&tuple.pack()[..])
    }

    /// Tests whether the specified key starts with this
    /// [`Subspace`]'s prefix, indicating that the [`Subspace`]
    /// logically contains key.
    pub fn contains(&self, key: &Bytes) -> bool {
        key.starts_with(&self.raw_prefix[..])
    }

    /// Get the key encoding prefix used for this [`Subspace`].
    pub fn raw_prefix(&self) -> Bytes {
        self.raw_prefix.clone()
    }

    /// Get the key encoding of the specified [`Tuple`] in this
    /// [`Subspace`].
    pub fn pack(&self, tuple: &Tuple) -> Key {
        let mut b = BytesMut::new();
        b.put(self.raw_prefix.clone());
        b.put(tuple.pack());
        Bytes::from(b).into()
    }

    /// Gets a [`Range`] representing all keys in the [`Subspace`]
    /// strictly starting with the specified [`Tuple`].
    pub fn range(&self, tuple: &Tuple) -> Range {
        tuple.range(self.raw_prefix.clone())
    }

    /// Gets a [`Range`] representing every key in the [`Subspace`].
    pub fn all(&self) -> Range {
        Range::starts_with(self.raw_prefix.clone())
    }

    /// Gets the [`Tuple`] encoded by the given key, with this
    /// [`Subspace`]'s prefix removed.
    pub fn unpack(&self, key: &Bytes) -> FdbResult<Tuple> {
        if !self.contains(key) {
            Err(FdbError::new(SUBSPACE_UNPACK_KEY_MISMATCH))
        } else {
            Tuple::from_bytes(key.slice(self.raw_prefix.len()..))
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, Bytes, BytesMut};

    use crate::error::{FdbError, SUBSPACE_UNPACK_KEY_MISMATCH};
    use crate::range::Range;
    use crate::tuple::Tuple;
    use crate::Key;

    use super::Subspace;

    fn hello() -> Tuple {
        let mut t = Tuple::new();
        t.add_string("hello".to_string());
        t
    }

    #[test]
    fn with_suffix() {
        let s = Subspace::new(Bytes::from_static(&b"\xFF/"[..])).with_suffix(b"tenant/map/");
        assert_eq!(
            s.raw_prefix(),
            Bytes::from_static(&b"\xFF/tenant/map/"[..])
        );
    }

    #[test]
    fn contains() {
        let s = Subspace::new(Bytes::from_static(&b"prefix"[..]));

        // length mismatch
        assert!(!s.contains(&Bytes::from_static(&b"p"[..])));

        assert!(!s.contains(&Subspace::new(Bytes::from_static(&b"wrong_prefix"[..])).pack(&hello()).into()));

        assert!(s.contains(&s.pack(&hello()).into()));
    }

    #[test]
    fn pack() {
        let s = Subspace::new(Bytes::from_static(&b"prefix"[..]));

        assert_eq!(s.pack(&hello()), {
            let mut b = BytesMut::new();

            b.put(&b"prefix"[..]);
            b.put(hello().pack());
            Key::from(Into::<Bytes>::into(b))
        });
        assert_eq!(s.subspace(&hello()).raw_prefix(), Bytes::from(s.pack(&hello())));
    }

    #[test]
    fn range() {
        let s = Subspace::new(Bytes::from_static(&b"prefix"[..]));

        assert_eq!(
            s.range(&{
                let mut t = Tuple::new();
                t.add_bytes(Bytes::from_static(&b"foo"[..]));
                t
            }),
            Range::new(
                Bytes::from_static(&b"prefix\x01foo\x00\x00"[..]),
                Bytes::from_static(&b"prefix\x01foo\x00\xFF"[..])
            )
        );

        assert_eq!(
            s.all(),
            Range::new(
                Bytes::from_static(&b"prefix"[..]),
                Bytes::from_static(&b"prefiy"[..])
            )
        );
    }

    #[test]
    fn unpack() {
        let s = Subspace::new(Bytes::from_static(&b"prefix"[..]));

        let key = Subspace::new(Bytes::from_static(&b"wrong_prefix"[..])).pack(&hello());

        assert_eq!(
            s.unpack(&key.into()),
            Err(FdbError::new(SUBSPACE_UNPACK_KEY_MISMATCH))
        );

        let key = s.pack(&hello());

        assert_eq!(s.unpack(&key.into()), Ok(hello()));
    }
}
