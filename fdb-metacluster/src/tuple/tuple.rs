use bytes::{BufMut, Bytes, BytesMut};

use std::cmp::Ordering;

use crate::error::{FdbError, FdbResult, TUPLE_GET};
use crate::range::Range;
use crate::tuple::element::{self, TupleValue};

/// Represents a set of elements that make up a sortable, typed key.
///
/// [`Tuple`] is comparable with other [`Tuple`]s and will sort in
/// Rust in the same order in which their packed representations sort
/// in the store. [`Tuple`]s sort first by the first element, then by
/// the second, etc.
///
/// [`Tuple`] can contain [`Bytes`], [`String`] and [`i64`] values.
//
// NOTE: We do not implement `Iterator` trait, as that would mean we
//       will have to expose `TupleValue` type to the client. Instead
//       we provide `size()` method and let the client call appropriate
//       `get_<type>(...)` methods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tuple {
    elements: Vec<TupleValue>,
}

impl Tuple {
    /// Create a new empty [`Tuple`].
    pub fn new() -> Tuple {
        Tuple {
            elements: Vec::new(),
        }
    }

    /// Construct a new [`Tuple`] with elements decoded from a
    /// supplied [`Bytes`].
    pub fn from_bytes(b: impl Into<Bytes>) -> FdbResult<Tuple> {
        element::from_bytes(b.into())
    }

    /// Append FDB Tuple [`Bytes`] value to the [`Tuple`].
    pub fn add_bytes(&mut self, b: Bytes) {
        self.elements.push(TupleValue::ByteString(b));
    }

    /// Append FDB Tuple [`String`] value to the [`Tuple`].
    pub fn add_string(&mut self, s: String) {
        self.elements.push(TupleValue::UnicodeString(s));
    }

    /// Append FDB Tuple [`i64`] value to the [`Tuple`].
    pub fn add_i64(&mut self, i: i64) {
        self.elements.push(TupleValue::Integer(i));
    }

    /// Append elements of [`Tuple`] `t` to [`Tuple`] `Self`
    pub fn append(&mut self, mut t: Tuple) {
        self.elements.append(&mut t.elements);
    }

    /// Gets an indexed item as FDB Tuple [`Bytes`] ref.
    pub fn get_bytes_ref(&self, index: usize) -> FdbResult<&Bytes> {
        self.elements
            .get(index)
            .and_then(|x| match x {
                TupleValue::ByteString(b) => Some(b),
                _ => None,
            })
            .ok_or_else(Tuple::tuple_get_error)
    }

    /// Gets an indexed item as [`String`] ref.
    pub fn get_string_ref(&self, index: usize) -> FdbResult<&String> {
        self.elements
            .get(index)
            .and_then(|x| match x {
                TupleValue::UnicodeString(s) => Some(s),
                _ => None,
            })
            .ok_or_else(Tuple::tuple_get_error)
    }

    /// Gets an indexed item as [`i64`].
    pub fn get_i64(&self, index: usize) -> FdbResult<i64> {
        self.elements
            .get(index)
            .and_then(|x| match x {
                TupleValue::Integer(i) => Some(*i),
                _ => None,
            })
            .ok_or_else(Tuple::tuple_get_error)
    }

    /// Determine if this [`Tuple`] contains no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Gets the number of elements in this [`Tuple`].
    pub fn size(&self) -> usize {
        self.elements.len()
    }

    /// Get an encoded representation of this [`Tuple`].
    pub fn pack(&self) -> Bytes {
        element::to_bytes(self)
    }

    /// Returns a range representing all keys that encode [`Tuple`]s
    /// strictly starting with this [`Tuple`], under `prefix`.
    pub fn range(&self, prefix: Bytes) -> Range {
        let packed = self.pack();

        let begin = {
            let mut x = BytesMut::new();
            x.put(prefix.clone());
            x.put(packed.clone());
            x.put_u8(0x00);
            Into::<Bytes>::into(x)
        };

        let end = {
            let mut x = BytesMut::new();
            x.put(prefix);
            x.put(packed);
            x.put_u8(0xFF);
            Into::<Bytes>::into(x)
        };

        Range::new(begin, end)
    }

    pub(crate) fn from_elements(elements: Vec<TupleValue>) -> Tuple {
        Tuple { elements }
    }

    pub(crate) fn elements(&self) -> &[TupleValue] {
        &self.elements
    }

    fn tuple_get_error() -> FdbError {
        FdbError::new(TUPLE_GET)
    }
}

impl PartialOrd for Tuple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tuple {
    fn cmp(&self, other: &Self) -> Ordering {
        self.pack().cmp(&other.pack())
    }
}
