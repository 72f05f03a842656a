use bytes::Bytes;
use futures::future::{self, FutureExt};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, trace};
use uuid::Uuid;

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use crate::database::MemStore;
use crate::error::{
    FdbError, FdbResult, NOT_COMMITTED, TRANSACTION_TIMED_OUT, TRANSACTION_TOO_OLD,
};
use crate::future::{FdbFutureI64, FdbFutureMaybeValue, FdbFutureUnit, FdbStreamKeyValue};
use crate::range::{Range, RangeOptions};
use crate::transaction::{ReadTransaction, Transaction, TransactionOption};
use crate::tuple::key_util;
use crate::{Key, KeyValue, Value};

const INITIAL_BACKOFF_MS: u64 = 1;
const DEFAULT_MAX_RETRY_DELAY_MS: i32 = 100;

/// A handle to a [`MemDatabase`] transaction.
///
/// [`create_transaction`] method on [`MemDatabase`] can be used to
/// create a [`MemTransaction`]. Clones share the same transaction.
///
/// [`create_transaction`]: crate::database::Database::create_transaction
/// [`MemDatabase`]: crate::database::MemDatabase
#[derive(Clone, Debug)]
pub struct MemTransaction {
    store: Arc<Mutex<MemStore>>,
    state: Arc<Mutex<TransactionState>>,
    debug_id: Uuid,
}

impl MemTransaction {
    pub(crate) fn new(store: Arc<Mutex<MemStore>>) -> MemTransaction {
        MemTransaction {
            store,
            state: Arc::new(Mutex::new(TransactionState::default())),
            debug_id: Uuid::new_v4(),
        }
    }
}

/// A handle for snapshot reads on a [`MemTransaction`].
///
/// Created with [`Transaction::snapshot`]. Reads through this handle
/// do not add read conflict ranges.
#[derive(Clone, Debug)]
pub struct MemReadTransaction {
    inner: MemTransaction,
}

#[derive(Debug)]
struct TransactionOptions {
    retry_limit: i32,
    timeout_ms: i32,
    max_retry_delay_ms: i32,
}

impl Default for TransactionOptions {
    fn default() -> TransactionOptions {
        TransactionOptions {
            retry_limit: -1,
            timeout_ms: 0,
            max_retry_delay_ms: DEFAULT_MAX_RETRY_DELAY_MS,
        }
    }
}

#[derive(Debug)]
struct TransactionState {
    read_version: Option<(i64, Arc<BTreeMap<Bytes, Bytes>>)>,
    // `None` marks a cleared key.
    writes: BTreeMap<Bytes, Option<Bytes>>,
    cleared: Vec<Range>,
    read_conflicts: Vec<Range>,
    write_conflicts: Vec<Range>,
    committed_version: Option<i64>,
    options: TransactionOptions,
    retries: i32,
    backoff_ms: u64,
    started: Option<Instant>,
}

impl Default for TransactionState {
    fn default() -> TransactionState {
        TransactionState {
            read_version: None,
            writes: BTreeMap::new(),
            cleared: Vec::new(),
            read_conflicts: Vec::new(),
            write_conflicts: Vec::new(),
            committed_version: None,
            options: TransactionOptions::default(),
            retries: 0,
            backoff_ms: INITIAL_BACKOFF_MS,
            started: None,
        }
    }
}

impl TransactionState {
    // Options, retry count, backoff and the timeout clock survive a
    // retry.
    fn reset_for_retry(&mut self) {
        self.read_version = None;
        self.writes.clear();
        self.cleared.clear();
        self.read_conflicts.clear();
        self.write_conflicts.clear();
        self.committed_version = None;
    }

    fn check_timeout(&mut self) -> FdbResult<()> {
        let started = *self.started.get_or_insert_with(Instant::now);

        if self.options.timeout_ms > 0
            && started.elapsed() >= Duration::from_millis(self.options.timeout_ms as u64)
        {
            Err(FdbError::new(TRANSACTION_TIMED_OUT))
        } else {
            Ok(())
        }
    }

    fn is_cleared(&self, key: &Bytes) -> bool {
        self.cleared.iter().any(|r| r.contains(key))
    }
}

pub(self) mod internal {
    use super::*;

    fn read_snapshot(
        store: &Mutex<MemStore>,
        st: &mut TransactionState,
    ) -> FdbResult<Arc<BTreeMap<Bytes, Bytes>>> {
        st.check_timeout()?;

        if let Some((_, data)) = &st.read_version {
            return Ok(data.clone());
        }

        let store = store.lock();
        st.read_version = Some((store.version, store.data.clone()));
        Ok(store.data.clone())
    }

    pub(super) fn get(
        store: Arc<Mutex<MemStore>>,
        state: Arc<Mutex<TransactionState>>,
        key: Key,
        snapshot: bool,
    ) -> FdbFutureMaybeValue {
        async move {
            tokio::task::yield_now().await;

            let key = Bytes::from(key);
            let mut st = state.lock();
            let data = read_snapshot(&store, &mut st)?;

            if !snapshot {
                st.read_conflicts.push(Range::new(
                    key.clone(),
                    key_util::key_after(key.clone()),
                ));
            }

            if let Some(w) = st.writes.get(&key) {
                return Ok(w.clone().map(Value::from));
            }

            if st.is_cleared(&key) {
                return Ok(None);
            }

            Ok(data.get(&key).cloned().map(Value::from))
        }
        .boxed()
    }

    fn read_range(
        store: &Mutex<MemStore>,
        state: &Mutex<TransactionState>,
        range: Range,
        options: RangeOptions,
        snapshot: bool,
    ) -> FdbResult<Vec<KeyValue>> {
        let mut st = state.lock();
        let data = read_snapshot(store, &mut st)?;

        if !snapshot {
            st.read_conflicts.push(range.clone());
        }

        let (begin, end) = range.deconstruct();
        let (begin, end) = (Bytes::from(begin), Bytes::from(end));

        if begin >= end {
            return Ok(Vec::new());
        }

        let bounds = (Bound::Included(begin), Bound::Excluded(end));

        let mut merged = data
            .range::<Bytes, _>(bounds.clone())
            .filter(|(k, _)| !st.is_cleared(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<BTreeMap<_, _>>();

        for (k, v) in st.writes.range::<Bytes, _>(bounds) {
            match v {
                Some(v) => {
                    merged.insert(k.clone(), v.clone());
                }
                None => {
                    merged.remove(k);
                }
            }
        }

        let limit = if options.get_limit() > 0 {
            options.get_limit() as usize
        } else {
            usize::MAX
        };

        let to_key_value = |(k, v): (Bytes, Bytes)| KeyValue::new(Key::from(k), Value::from(v));

        Ok(if options.get_reverse() {
            merged.into_iter().rev().take(limit).map(to_key_value).collect()
        } else {
            merged.into_iter().take(limit).map(to_key_value).collect()
        })
    }

    pub(super) fn get_range(
        store: Arc<Mutex<MemStore>>,
        state: Arc<Mutex<TransactionState>>,
        range: Range,
        options: RangeOptions,
        snapshot: bool,
    ) -> FdbStreamKeyValue {
        let fut = async move {
            tokio::task::yield_now().await;
            read_range(&store, &state, range, options, snapshot)
        };

        fut.into_stream()
            .map(|res| match res {
                Ok(kvs) => stream::iter(kvs.into_iter().map(Ok)).left_stream(),
                Err(e) => stream::once(future::ready(Err(e))).right_stream(),
            })
            .flatten()
            .boxed()
    }

    pub(super) fn get_read_version(
        store: Arc<Mutex<MemStore>>,
        state: Arc<Mutex<TransactionState>>,
    ) -> FdbFutureI64 {
        async move {
            let mut st = state.lock();
            read_snapshot(&store, &mut st)?;
            Ok(st.read_version.as_ref().map(|(v, _)| *v).unwrap_or_default())
        }
        .boxed()
    }

    pub(super) fn on_error(
        state: Arc<Mutex<TransactionState>>,
        debug_id: Uuid,
        e: FdbError,
    ) -> FdbFutureUnit {
        async move {
            if !e.is_retryable() {
                return Err(e);
            }

            let delay = {
                let mut st = state.lock();

                st.retries += 1;
                if st.options.retry_limit >= 0 && st.retries > st.options.retry_limit {
                    debug!(%debug_id, retries = st.retries, error = %e, "retry limit exceeded");
                    return Err(FdbError::new(TRANSACTION_TIMED_OUT));
                }

                st.check_timeout()?;

                let delay = st.backoff_ms;
                st.backoff_ms =
                    (delay * 2).min(st.options.max_retry_delay_ms.max(1) as u64);
                st.reset_for_retry();
                delay
            };

            trace!(%debug_id, delay_ms = delay, error = %e, "backing off");
            tokio::time::sleep(Duration::from_millis(delay)).await;

            state.lock().check_timeout()
        }
        .boxed()
    }

    pub(super) fn set_option(
        state: &Mutex<TransactionState>,
        option: TransactionOption,
    ) -> FdbResult<()> {
        let mut st = state.lock();

        match option {
            TransactionOption::RetryLimit(n) => st.options.retry_limit = n,
            TransactionOption::Timeout(ms) => st.options.timeout_ms = ms,
            TransactionOption::MaxRetryDelay(ms) => st.options.max_retry_delay_ms = ms,
        }

        Ok(())
    }
}

impl ReadTransaction for MemTransaction {
    fn on_error(&self, e: FdbError) -> FdbFutureUnit {
        internal::on_error(self.state.clone(), self.debug_id, e)
    }

    fn get(&self, key: impl Into<Key>) -> FdbFutureMaybeValue {
        internal::get(self.store.clone(), self.state.clone(), key.into(), false)
    }

    fn get_range(&self, range: Range, options: RangeOptions) -> FdbStreamKeyValue {
        internal::get_range(
            self.store.clone(),
            self.state.clone(),
            range,
            options,
            false,
        )
    }

    fn get_read_version(&self) -> FdbFutureI64 {
        internal::get_read_version(self.store.clone(), self.state.clone())
    }

    fn set_option(&self, option: TransactionOption) -> FdbResult<()> {
        internal::set_option(&self.state, option)
    }
}

impl Transaction for MemTransaction {
    type Snapshot = MemReadTransaction;

    fn snapshot(&self) -> MemReadTransaction {
        MemReadTransaction {
            inner: self.clone(),
        }
    }

    fn add_read_conflict_key(&self, key: impl Into<Key>) -> FdbResult<()> {
        let begin_key = key.into();
        // `key_util::key_after` appends `0x00`, making the range
        // contain only `begin_key`.
        let end_key = key_util::key_after(begin_key.clone());

        self.add_read_conflict_range(Range::new(begin_key, end_key))
    }

    fn add_read_conflict_range(&self, range: Range) -> FdbResult<()> {
        self.state.lock().read_conflicts.push(range);
        Ok(())
    }

    fn add_write_conflict_key(&self, key: impl Into<Key>) -> FdbResult<()> {
        let begin_key = key.into();
        let end_key = key_util::key_after(begin_key.clone());

        self.add_write_conflict_range(Range::new(begin_key, end_key))
    }

    fn add_write_conflict_range(&self, range: Range) -> FdbResult<()> {
        self.state.lock().write_conflicts.push(range);
        Ok(())
    }

    fn clear(&self, key: impl Into<Key>) {
        self.state.lock().writes.insert(Bytes::from(key.into()), None);
    }

    fn clear_range(&self, range: Range) {
        let mut st = self.state.lock();

        let keys = st
            .writes
            .keys()
            .filter(|k| range.contains(k))
            .cloned()
            .collect::<Vec<_>>();
        for k in keys {
            st.writes.remove(&k);
        }

        st.cleared.push(range);
    }

    fn commit(&self) -> FdbFutureUnit {
        let store = self.store.clone();
        let state = self.state.clone();
        let debug_id = self.debug_id;

        async move {
            tokio::task::yield_now().await;

            let mut st = state.lock();
            st.check_timeout()?;

            let mut write_ranges = st.write_conflicts.clone();
            write_ranges.extend(st.cleared.iter().cloned());
            write_ranges.extend(st.writes.keys().map(|k| {
                Range::new(k.clone(), key_util::key_after(k.clone()))
            }));

            // Read-only transactions always commit.
            if write_ranges.is_empty() {
                return Ok(());
            }

            let mut store = store.lock();

            if store.injected_failures > 0 {
                store.injected_failures -= 1;
                debug!(%debug_id, "injected commit failure");
                return Err(FdbError::new(NOT_COMMITTED));
            }

            if let Some((read_version, _)) = &st.read_version {
                if *read_version < store.oldest_version {
                    return Err(FdbError::new(TRANSACTION_TOO_OLD));
                }

                if store.conflicts(*read_version, &st.read_conflicts) {
                    debug!(%debug_id, read_version = *read_version, "transaction conflict");
                    return Err(FdbError::new(NOT_COMMITTED));
                }
            }

            let version = store.apply(&st.cleared, &st.writes, write_ranges);
            st.committed_version = Some(version);

            trace!(%debug_id, version, "transaction committed");
            Ok(())
        }
        .boxed()
    }

    fn get_committed_version(&self) -> Option<i64> {
        self.state.lock().committed_version
    }

    fn reset(&self) {
        *self.state.lock() = TransactionState::default();
    }

    fn set(&self, key: impl Into<Key>, value: impl Into<Value>) {
        self.state
            .lock()
            .writes
            .insert(Bytes::from(key.into()), Some(Bytes::from(value.into())));
    }
}

impl ReadTransaction for MemReadTransaction {
    fn on_error(&self, e: FdbError) -> FdbFutureUnit {
        internal::on_error(self.inner.state.clone(), self.inner.debug_id, e)
    }

    fn get(&self, key: impl Into<Key>) -> FdbFutureMaybeValue {
        internal::get(
            self.inner.store.clone(),
            self.inner.state.clone(),
            key.into(),
            true,
        )
    }

    fn get_range(&self, range: Range, options: RangeOptions) -> FdbStreamKeyValue {
        internal::get_range(
            self.inner.store.clone(),
            self.inner.state.clone(),
            range,
            options,
            true,
        )
    }

    fn get_read_version(&self) -> FdbFutureI64 {
        internal::get_read_version(self.inner.store.clone(), self.inner.state.clone())
    }

    fn set_option(&self, option: TransactionOption) -> FdbResult<()> {
        internal::set_option(&self.inner.state, option)
    }
}
