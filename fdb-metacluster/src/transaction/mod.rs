//! Provides types and traits for working with store Transactions and
//! Snapshots.

mod mem_transaction;
mod read_transaction;

// We do this in order to preserve consistency with Java and Go
// bindings.
#[allow(clippy::module_inception)]
mod transaction;

pub use crate::option::TransactionOption;

pub use mem_transaction::{MemReadTransaction, MemTransaction};

pub use read_transaction::ReadTransaction;
pub use transaction::Transaction;
