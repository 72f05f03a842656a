//! Utility functions for operating on [`Key`].
//!
//! Although built for the tuple layer, some functions may be useful
//! otherwise.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FdbError, FdbResult, TUPLE_KEY_UTIL_STRINC_ERROR};
use crate::Key;

/// Computes the key that would sort immediately after `key`.
pub fn key_after(key: impl Into<Key>) -> Key {
    let mut res = BytesMut::new();
    res.put(Bytes::from(key.into()));
    res.put_u8(0x00);
    Bytes::from(res).into()
}

/// Checks if `key` starts with `prefix`.
pub fn starts_with(key: impl Into<Key>, prefix: impl Into<Key>) -> bool {
    let key = Bytes::from(key.into());
    let prefix = Bytes::from(prefix.into());

    key.starts_with(&prefix[..])
}

/// Computes the first key that would sort outside the range prefixed
/// by `prefix`.
///
/// The `prefix` must not be empty or contain only `0xFF` bytes. That
/// is `prefix` must contain at least one byte not equal to `0xFF`.
///
/// This resulting [`Key`] serves as the exclusive upper-bound for
/// all keys prefixed by the argument `prefix`.
pub fn strinc(prefix: impl Into<Key>) -> FdbResult<Key> {
    let prefix = Bytes::from(prefix.into());

    // Index of the last byte that is not `0xFF`. Everything after it
    // is dropped and it is incremented.
    let non_ff_byte_index = prefix
        .iter()
        .rposition(|x| *x != 0xFF)
        .ok_or_else(|| FdbError::new(TUPLE_KEY_UTIL_STRINC_ERROR))?;

    let mut res = BytesMut::new();
    res.put(&prefix[0..non_ff_byte_index]);
    res.put_u8(prefix[non_ff_byte_index] + 1);

    Ok(Bytes::from(res).into())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use crate::error::{FdbError, TUPLE_KEY_UTIL_STRINC_ERROR};
    use crate::Key;

    use super::{key_after, starts_with, strinc};

    #[test]
    fn test_key_after() {
        assert_eq!(
            key_after(Bytes::new()),
            Key::from(Bytes::from_static(&b"\x00"[..]))
        );
        assert_eq!(
            key_after(Bytes::from_static(&b"hello_world"[..])),
            Key::from(Bytes::from_static(&b"hello_world\x00"[..])),
        );
    }

    #[test]
    fn test_starts_with() {
        // length mismatch
        assert!(!starts_with(
            Bytes::from_static(&b"p"[..]),
            Bytes::from_static(&b"prefix"[..])
        ));

        assert!(!starts_with(
            Bytes::from_static(&b"wrong_prefix"[..]),
            Bytes::from_static(&b"prefix"[..])
        ));

        assert!(starts_with(
            Bytes::from_static(&b"prefix_plus_something_else"[..]),
            Bytes::from_static(&b"prefix"[..])
        ));
    }

    #[test]
    fn test_strinc() {
        assert_eq!(
            strinc(Bytes::new()),
            Err(FdbError::new(TUPLE_KEY_UTIL_STRINC_ERROR))
        );
        assert_eq!(
            strinc(Bytes::from_static(&b"\xFF\xFF"[..])),
            Err(FdbError::new(TUPLE_KEY_UTIL_STRINC_ERROR))
        );
        assert_eq!(
            strinc(Bytes::from_static(&b"\xFE"[..])),
            Ok(Key::from(Bytes::from_static(&b"\xFF"[..])))
        );
        assert_eq!(
            strinc(Bytes::from_static(&b"a\xFF"[..])),
            Ok(Key::from(Bytes::from_static(&b"b"[..])))
        );
        assert_eq!(
            strinc(Bytes::from_static(&b"hello1\xFF\xFF"[..])),
            Ok(Key::from(Bytes::from_static(&b"hello2"[..])))
        );
    }
}
