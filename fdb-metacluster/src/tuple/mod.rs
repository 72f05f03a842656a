//! Provides a set of utilities for serializing and deserializing
//! typed data for use as keys.
//!
//! When data is packed together into a [`Tuple`] it is suitable for
//! use as an index or organizational structure within the store. Only
//! the tuple element types needed by the metadata layout are
//! supported: byte strings, unicode strings and 64-bit integers. They
//! are encoded using the FoundationDB [tuple layer] typecodes, so
//! packed tuples sort in the same order as their elements.
//!
//! [tuple layer]: https://github.com/apple/foundationdb/blob/main/design/tuple.md
mod element;

// We do this in order to preserve consistency with Java and Go
// bindings.
#[allow(clippy::module_inception)]
mod tuple;

pub mod key_util;

pub use tuple::Tuple;
