use bytes::Bytes;
use parking_lot::Mutex;

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use crate::database::Database;
use crate::error::FdbResult;
use crate::range::Range;
use crate::transaction::MemTransaction;

/// Number of recent commits whose write ranges are remembered for
/// conflict detection.
const DEFAULT_COMMIT_HISTORY: usize = 1024;

/// An in-process, multi-version transactional key-value store.
///
/// Transactions read from a snapshot taken at their read version and
/// buffer writes locally. At commit, a transaction's read conflict
/// ranges are checked against the write ranges of every commit newer
/// than its read version. On overlap the commit fails with
/// `not_committed` and the retry loop starts the attempt over.
///
/// [`MemDatabase`] is cheap to clone. Clones share the same store.
#[derive(Clone, Debug)]
pub struct MemDatabase {
    store: Arc<Mutex<MemStore>>,
}

impl MemDatabase {
    /// Create an empty [`MemDatabase`].
    pub fn new() -> MemDatabase {
        MemDatabase::with_history_limit(DEFAULT_COMMIT_HISTORY)
    }

    /// Create an empty [`MemDatabase`] that remembers write ranges of
    /// at most `limit` recent commits. Transactions whose read
    /// version predates the remembered history fail with
    /// `transaction_too_old`.
    pub fn with_history_limit(limit: usize) -> MemDatabase {
        MemDatabase {
            store: Arc::new(Mutex::new(MemStore::new(limit.max(1)))),
        }
    }

    /// Make the next `n` commits that carry writes fail with
    /// `not_committed`, as if they had conflicted.
    pub fn fail_next_commits(&self, n: u32) {
        self.store.lock().injected_failures = n;
    }

    /// Returns the version of the most recent commit.
    pub fn current_version(&self) -> i64 {
        self.store.lock().version
    }
}

impl Default for MemDatabase {
    fn default() -> MemDatabase {
        MemDatabase::new()
    }
}

impl Database for MemDatabase {
    type Transaction = MemTransaction;

    fn create_transaction(&self) -> FdbResult<MemTransaction> {
        Ok(MemTransaction::new(self.store.clone()))
    }
}

/// Committed state shared by every transaction of a [`MemDatabase`].
#[derive(Debug)]
pub(crate) struct MemStore {
    pub(crate) data: Arc<BTreeMap<Bytes, Bytes>>,
    pub(crate) version: i64,
    // Write ranges of recent commits, oldest first.
    history: VecDeque<(i64, Vec<Range>)>,
    history_limit: usize,
    // Reads at versions below this one may have missed a conflict.
    pub(crate) oldest_version: i64,
    pub(crate) injected_failures: u32,
}

impl MemStore {
    fn new(history_limit: usize) -> MemStore {
        MemStore {
            data: Arc::new(BTreeMap::new()),
            version: 0,
            history: VecDeque::new(),
            history_limit,
            oldest_version: 0,
            injected_failures: 0,
        }
    }

    /// Returns `true` if any range in `read_conflicts` overlaps a
    /// range written by a commit newer than `read_version`.
    pub(crate) fn conflicts(&self, read_version: i64, read_conflicts: &[Range]) -> bool {
        self.history
            .iter()
            .filter(|(v, _)| *v > read_version)
            .any(|(_, writes)| {
                writes
                    .iter()
                    .any(|w| read_conflicts.iter().any(|r| r.intersects(w)))
            })
    }

    /// Apply cleared ranges followed by point writes, and record the
    /// commit. Returns the commit version.
    pub(crate) fn apply(
        &mut self,
        cleared: &[Range],
        writes: &BTreeMap<Bytes, Option<Bytes>>,
        write_ranges: Vec<Range>,
    ) -> i64 {
        let data = Arc::make_mut(&mut self.data);

        for r in cleared {
            let keys = data
                .keys()
                .filter(|k| r.contains(k))
                .cloned()
                .collect::<Vec<_>>();
            for k in keys {
                data.remove(&k);
            }
        }

        for (k, v) in writes {
            match v {
                Some(v) => {
                    data.insert(k.clone(), v.clone());
                }
                None => {
                    data.remove(k);
                }
            }
        }

        self.version += 1;
        self.history.push_back((self.version, write_ranges));

        while self.history.len() > self.history_limit {
            if let Some((v, _)) = self.history.pop_front() {
                self.oldest_version = v;
            }
        }

        self.version
    }
}
