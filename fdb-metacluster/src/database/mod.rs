//! Provides [`Database`] trait and the [`run`] and [`read`] retry
//! loops.
//!
//! Clients operating on a [`Database`] should, in most cases use the
//! [`run`] function. This implements a proper retry loop around the
//! work that needs to be done and, assure that [`commit`] has
//! returned successfully before returning.
//!
//! [`commit`]: crate::transaction::Transaction::commit

mod mem_database;

use std::future::Future;

use tracing::debug;

use crate::error::{FdbError, FdbResult};
use crate::transaction::{ReadTransaction, Transaction};

pub use mem_database::MemDatabase;

pub(crate) use mem_database::MemStore;

/// A mutable, lexicographically ordered mapping from binary keys to
/// binary values.
///
/// Transactions are used to manipulate data within a single
/// [`Database`]. Multiple concurrent transactions on a [`Database`]
/// enforce **ACID** properties.
pub trait Database {
    /// Transaction type created by this [`Database`].
    type Transaction: Transaction + Clone + Send + Sync + 'static;

    /// Creates a [`Transaction`] that operates on this [`Database`].
    fn create_transaction(&self) -> FdbResult<Self::Transaction>;
}

/// Runs a closure in the context that takes a [`Transaction`].
///
/// # Note
///
/// The closure `FnMut: FnMut(D::Transaction) -> Fut` will run
/// multiple times (retry) when certain errors are
/// encountered. Therefore the closure should be prepared to be
/// called more than once. This consideration means that the closure
/// should use caution when modifying state.
pub async fn run<D, T, F, Fut>(db: &D, mut f: F) -> FdbResult<T>
where
    D: Database,
    F: FnMut(D::Transaction) -> Fut,
    Fut: Future<Output = FdbResult<T>>,
{
    let t = db.create_transaction()?;

    loop {
        let ret_val = f(t.clone()).await;

        // Closure returned an error
        if let Err(e) = ret_val {
            if FdbError::layer_error(e.code()) {
                // Check if it is a layer error. If so, just return
                // it.
                return Err(e);
            } else if let Err(e1) = t.on_error(e).await {
                // Check if `on_error` returned an error. This means
                // we have a non-retryable error.
                return Err(e1);
            } else {
                debug!(error = %e, "retrying transaction");
                continue;
            }
        }

        // No error from closure. Attempt to commit the transaction.
        if let Err(e) = t.commit().await {
            // Commit returned an error
            if let Err(e1) = t.on_error(e).await {
                // Check if `on_error` returned an error. This means
                // we have a non-retryable error.
                return Err(e1);
            } else {
                debug!(error = %e, "retrying commit");
                continue;
            }
        }

        // Commit successful, return `Ok(T)`
        return ret_val;
    }
}

/// Runs a closure in the context that takes a snapshot of a
/// [`Transaction`].
///
/// # Note
///
/// The closure will run multiple times (retry) when certain errors
/// are encountered. Therefore the closure should be prepared to be
/// called more than once.
//
// It is okay to for `F` to have the signature `FnMut(Snapshot) ->
// Fut` because we are not allowing any mutations to occur. We are
// only concerned about retrying in case of retryable errors.
pub async fn read<D, T, F, Fut>(db: &D, mut f: F) -> FdbResult<T>
where
    D: Database,
    <D::Transaction as Transaction>::Snapshot: Clone,
    F: FnMut(<D::Transaction as Transaction>::Snapshot) -> Fut,
    Fut: Future<Output = FdbResult<T>>,
{
    let t = db.create_transaction()?.snapshot();

    loop {
        let ret_val = f(t.clone()).await;

        // Closure returned an error
        if let Err(e) = ret_val {
            if FdbError::layer_error(e.code()) {
                return Err(e);
            } else if let Err(e1) = t.on_error(e).await {
                return Err(e1);
            } else {
                debug!(error = %e, "retrying read");
                continue;
            }
        }

        // We don't need to commit read transaction, return `Ok(T)`
        return ret_val;
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::{
        FdbError, NOT_COMMITTED, TENANT_NOT_FOUND, TRANSACTION_TIMED_OUT, TUPLE_FROM_BYTES,
    };
    use crate::transaction::{ReadTransaction, Transaction, TransactionOption};
    use crate::Value;

    use super::{read, run, MemDatabase};

    #[tokio::test]
    async fn run_commits_once() {
        let db = MemDatabase::new();

        let attempts = AtomicUsize::new(0);
        let attempts_ref = &attempts;

        run(&db, |tr| async move {
            attempts_ref.fetch_add(1, Ordering::SeqCst);
            tr.set(Bytes::from_static(&b"hello"[..]), Bytes::from_static(&b"world"[..]));
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        let v = read(&db, |rtr| async move { rtr.get(Bytes::from_static(&b"hello"[..])).await })
            .await
            .unwrap();

        assert_eq!(v, Some(Value::from(Bytes::from_static(&b"world"[..]))));
    }

    #[tokio::test]
    async fn run_retries_injected_conflicts() {
        let db = MemDatabase::new();
        db.fail_next_commits(2);

        let attempts = AtomicUsize::new(0);
        let attempts_ref = &attempts;

        run(&db, |tr| async move {
            attempts_ref.fetch_add(1, Ordering::SeqCst);
            tr.set(Bytes::from_static(&b"k"[..]), Bytes::new());
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn run_returns_layer_and_terminal_errors() {
        let db = MemDatabase::new();

        let attempts = AtomicUsize::new(0);
        let attempts_ref = &attempts;

        let res: Result<(), FdbError> = run(&db, |_tr| async move {
            attempts_ref.fetch_add(1, Ordering::SeqCst);
            Err(FdbError::new(TUPLE_FROM_BYTES))
        })
        .await;
        assert_eq!(res, Err(FdbError::new(TUPLE_FROM_BYTES)));

        let res: Result<(), FdbError> = run(&db, |_tr| async move {
            attempts_ref.fetch_add(1, Ordering::SeqCst);
            Err(FdbError::new(TENANT_NOT_FOUND))
        })
        .await;
        assert_eq!(res, Err(FdbError::new(TENANT_NOT_FOUND)));

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_limit_surfaces_timeout() {
        let db = MemDatabase::new();
        db.fail_next_commits(10);

        let attempts = AtomicUsize::new(0);
        let attempts_ref = &attempts;

        let res = run(&db, |tr| async move {
            tr.set_option(TransactionOption::RetryLimit(2))?;
            attempts_ref.fetch_add(1, Ordering::SeqCst);
            tr.set(Bytes::from_static(&b"k"[..]), Bytes::new());
            Ok(())
        })
        .await;

        assert_eq!(res, Err(FdbError::new(TRANSACTION_TIMED_OUT)));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn read_retries_retryable_errors() {
        let db = MemDatabase::new();

        let attempts = AtomicUsize::new(0);
        let attempts_ref = &attempts;

        let res = read(&db, |_rtr| async move {
            if attempts_ref.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(FdbError::new(NOT_COMMITTED))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(res, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
