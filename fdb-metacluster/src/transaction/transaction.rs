use crate::error::FdbResult;
use crate::future::FdbFutureUnit;
use crate::range::Range;
use crate::transaction::ReadTransaction;
use crate::{Key, Value};

/// A [`Transaction`] represents a store transaction.
///
/// All operations on the store take place, explicity or implicity,
/// through a [`Transaction`].
///
/// A transaction is a mutable snapshot of the store. All read and
/// write operations on a transaction see and modify an
/// otherwise-unchanging version of the store and only change the
/// underlying store if and when the transaction is committed. Read
/// operations do see the effects of previous write operations on the
/// same transactions. Committing a transaction usually succeeds in
/// the absence of [conflicts].
///
/// Transactions are also causally consistent: once a transaction has
/// been successfully committed, all subsequently created transactions
/// will see the modifications made by it. The most convenient way for
/// a developer to manage the lifecycle and retrying of a transaction
/// is to use [`run`] function. Otherwise, the client must have retry
/// logic for fatal failures, failures to commit, and other transient
/// errors.
///
/// Keys and values are byte arrays. To encode other data types, see
/// the [tuple layer] documentation.
///
/// [conflicts]: https://apple.github.io/foundationdb/developer-guide.html#developer-guide-transaction-conflicts
/// [tuple layer]: crate::tuple
/// [`run`]: crate::database::run
pub trait Transaction: ReadTransaction {
    /// Snapshot view of the transaction returned by [`snapshot`].
    ///
    /// [`snapshot`]: Transaction::snapshot
    type Snapshot: ReadTransaction;

    /// Return a special-purpose, read-only view of the store. Reads
    /// done using [`snapshot`] are known as *snapshot reads*. They do
    /// not add read conflict ranges, relaxing isolation.
    ///
    /// [`snapshot`]: Transaction::snapshot
    fn snapshot(&self) -> Self::Snapshot;

    /// Adds a key to the transaction's read conflict ranges as if you
    /// had read the key.
    fn add_read_conflict_key(&self, key: impl Into<Key>) -> FdbResult<()>;

    /// Adds a range of keys to the transaction's read conflict ranges
    /// as if you had read the range.
    fn add_read_conflict_range(&self, range: Range) -> FdbResult<()>;

    /// Adds a key to the transaction's write conflict ranges as if
    /// you had written the key.
    fn add_write_conflict_key(&self, key: impl Into<Key>) -> FdbResult<()>;

    /// Adds a range of keys to the transaction's write conflict
    /// ranges as if you had cleared the range.
    fn add_write_conflict_range(&self, range: Range) -> FdbResult<()>;

    /// Clears a given key from the store.
    fn clear(&self, key: impl Into<Key>);

    /// Clears a range of keys from the store.
    fn clear_range(&self, range: Range);

    /// Commit this [`Transaction`].
    ///
    /// Equivalent to:
    ///
    /// ```ignore
    /// async fn commit(&self) -> FdbResult<()>
    /// ```
    fn commit(&self) -> FdbFutureUnit;

    /// Gets the version number at which a successful commit modified
    /// the store.
    ///
    /// Returns `None` if the transaction has not committed, or was
    /// read-only.
    fn get_committed_version(&self) -> Option<i64>;

    /// Reset the [`Transaction`] to its initial state, discarding
    /// writes, conflict ranges and options.
    fn reset(&self);

    /// Sets the value for a given key.
    fn set(&self, key: impl Into<Key>, value: impl Into<Value>);
}
