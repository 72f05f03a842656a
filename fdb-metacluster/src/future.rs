//! Provides [`FdbFuture`] and [`FdbStreamKeyValue`] types returned
//! by the store APIs.
//!
//! Store operations are *lazy*. Calling [`get`] or [`commit`] only
//! captures the request. Nothing happens until the returned future
//! is polled, which is also the only point where an operation may
//! suspend.
//!
//! [`get`]: crate::transaction::ReadTransaction::get
//! [`commit`]: crate::transaction::Transaction::commit

use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::error::FdbResult;
use crate::{KeyValue, Value};

/// A [`FdbFuture`] represents a value (or error) to be available at
/// some other time.
///
/// Asynchronous store APIs return an [`FdbFuture`].
pub type FdbFuture<T> = BoxFuture<'static, FdbResult<T>>;

/// Represents the asynchronous result of a function that has no
/// return value.
pub type FdbFutureUnit = FdbFuture<()>;

/// Represents the asynchronous result of a function that returns a
/// database version.
pub type FdbFutureI64 = FdbFuture<i64>;

/// Represents the asynchronous result of a function that *maybe*
/// returns a [`Value`] from the store.
pub type FdbFutureMaybeValue = FdbFuture<Option<Value>>;

/// A stream of [`KeyValue`]s returned by a range read.
///
/// Use [`StreamExt`] to consume it.
///
/// [`StreamExt`]: tokio_stream::StreamExt
pub type FdbStreamKeyValue = BoxStream<'static, FdbResult<KeyValue>>;
