use crate::error::{FdbError, FdbResult};
use crate::future::{FdbFutureI64, FdbFutureMaybeValue, FdbFutureUnit, FdbStreamKeyValue};
use crate::range::{Range, RangeOptions};
use crate::transaction::TransactionOption;
use crate::Key;

/// A read-only subset of a [`Transaction`].
///
/// [`Transaction`]: crate::transaction::Transaction
//
// NOTE: `on_error` is on `ReadTransaction` trait, as its used to
//       implement the retry loop in `database::read`.
pub trait ReadTransaction {
    /// Determines whether an error returned by a [`Transaction`] or
    /// [`ReadTransaction`] method is retryable. Waiting on the
    /// returned future will return the same error when fatal, or
    /// return `()` for retryable errors after a backoff delay.
    ///
    /// Typical code will not use this method directly. It is used by
    /// [`run`] and [`read`] functions when they need to implement
    /// correct retry loop.
    ///
    /// Equivalent to:
    ///
    /// ```ignore
    /// async fn on_error(&self, e: FdbError) -> FdbResult<()>
    /// ```
    ///
    /// [`Transaction`]: crate::transaction::Transaction
    /// [`run`]: crate::database::run
    /// [`read`]: crate::database::read
    fn on_error(&self, e: FdbError) -> FdbFutureUnit;

    /// Gets a value from the store.
    ///
    /// Equivalent to:
    ///
    /// ```ignore
    /// async fn get(&self, key: impl Into<Key>) -> FdbResult<Option<Value>>
    /// ```
    fn get(&self, key: impl Into<Key>) -> FdbFutureMaybeValue;

    /// Gets an ordered range of keys and values from the store.
    ///
    /// The returned [`FdbStreamKeyValue`] implements [`Stream`] trait
    /// that yields a [`KeyValue`] item.
    ///
    /// [`Stream`]: futures::Stream
    /// [`KeyValue`]: crate::KeyValue
    fn get_range(&self, range: Range, options: RangeOptions) -> FdbStreamKeyValue;

    /// Gets the version at which the reads for this [`Transaction`]
    /// or [`ReadTransaction`] will access the store.
    ///
    /// Equivalent to:
    ///
    /// ```ignore
    /// async fn get_read_version(&self) -> FdbResult<i64>
    /// ```
    ///
    /// [`Transaction`]: crate::transaction::Transaction
    fn get_read_version(&self) -> FdbFutureI64;

    /// Set options on a [`Transaction`] or [`ReadTransaction`]
    ///
    /// [`Transaction`]: crate::transaction::Transaction
    fn set_option(&self, option: TransactionOption) -> FdbResult<()>;
}
