//! Provides types for working with key ranges.

use bytes::Bytes;

use crate::future::FdbStreamKeyValue;
use crate::transaction::ReadTransaction;
use crate::tuple::key_util;
use crate::Key;

/// [`Range`] describes an exact range of keyspace, specified by a
/// begin and end key.
///
/// As with all store APIs, begin is inclusive, and end exclusive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Range {
    begin: Key,
    end: Key,
}

impl Range {
    /// Construct a new [`Range`] with an inclusive begin key an
    /// exclusive end key.
    pub fn new(begin: impl Into<Key>, end: impl Into<Key>) -> Range {
        Range {
            begin: begin.into(),
            end: end.into(),
        }
    }

    /// Return a [`Range`] that describes all possible keys that are
    /// prefixed with the specified key.
    ///
    /// # Panic
    ///
    /// Panics if the supplied [`Key`] is empty or contains only
    /// `0xFF` bytes.
    pub fn starts_with(prefix_key: impl Into<Key>) -> Range {
        let prefix_key = prefix_key.into();
        Range::new(
            prefix_key.clone(),
            key_util::strinc(prefix_key).unwrap_or_else(|err| {
                panic!("Error occurred during `key_util::strinc`: {:?}", err)
            }),
        )
    }

    /// Return the beginning of the range.
    pub fn begin(&self) -> &Key {
        &self.begin
    }

    /// Return the end of the range.
    pub fn end(&self) -> &Key {
        &self.end
    }

    /// Returns `true` if `key` is inside the range.
    pub fn contains(&self, key: &Bytes) -> bool {
        self.begin.as_bytes() <= &key[..] && &key[..] < self.end.as_bytes()
    }

    /// Returns `true` if the two ranges share at least one key.
    pub fn intersects(&self, other: &Range) -> bool {
        self.begin < other.end && other.begin < self.end
    }

    /// Gets an ordered range of keys and values from the store.
    ///
    /// The returned [`FdbStreamKeyValue`] implements [`Stream`] trait
    /// that yields a [`KeyValue`] item.
    ///
    /// [`Stream`]: futures::Stream
    /// [`KeyValue`]: crate::KeyValue
    pub fn into_stream<T>(self, rt: &T, options: RangeOptions) -> FdbStreamKeyValue
    where
        T: ReadTransaction,
    {
        rt.get_range(self, options)
    }

    pub(crate) fn deconstruct(self) -> (Key, Key) {
        let Range { begin, end } = self;
        (begin, end)
    }
}

/// [`RangeOptions`] specify how a range read is carried out.
///
/// 1. Limit restricts the number of key-value pairs returned as part
///    of a range read. A value of zero indicates no limit.
///
/// 2. Reverse indicates that the read should be performed
///    lexicographic order (when false) or reverse lexicographic (when
///    true). When reverse is true and limit is non-zero, last limit
///    key-value pairs in the range are returned.
///
/// To create a value of [`RangeOptions`] type, use
/// [`Default::default`] method. The default value represents no limit
/// and lexicographic order.
#[derive(Clone, Debug, Default)]
pub struct RangeOptions {
    limit: i32,
    reverse: bool,
}

impl RangeOptions {
    /// Set limit
    pub fn set_limit(&mut self, limit: i32) {
        self.limit = limit;
    }

    /// Get limit
    pub fn get_limit(&self) -> i32 {
        self.limit
    }

    /// Set the read order (lexicographic or non-lexicographic)
    pub fn set_reverse(&mut self, reverse: bool) {
        self.reverse = reverse;
    }

    /// Get the read order (lexicographic or non-lexicographic)
    pub fn get_reverse(&self) -> bool {
        self.reverse
    }
}
