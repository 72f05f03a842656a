//! Provides [`MetaclusterConfig`] type.

use bytes::Bytes;

use crate::transaction::TransactionOption;

/// Root of the metadata key-space used when none is configured.
pub const DEFAULT_ROOT: &[u8] = b"\xFF/";

/// Number of entries returned by list operations when the caller
/// does not supply a limit.
pub const DEFAULT_LIST_LIMIT: i32 = 100;

/// Configuration threaded through every management operation.
///
/// Two values with different roots describe independent metadata
/// namespaces in the same store.
#[derive(Clone, Debug, PartialEq)]
pub struct MetaclusterConfig {
    root: Bytes,
    transaction_options: Vec<TransactionOption>,
    default_list_limit: i32,
}

impl MetaclusterConfig {
    /// Create a [`MetaclusterConfig`] rooted at `root`.
    pub fn new(root: impl Into<Bytes>) -> MetaclusterConfig {
        MetaclusterConfig {
            root: root.into(),
            transaction_options: Vec::new(),
            default_list_limit: DEFAULT_LIST_LIMIT,
        }
    }

    /// Add an option applied to every transaction attempt, such as a
    /// [`TransactionOption::RetryLimit`] or a
    /// [`TransactionOption::Timeout`].
    pub fn with_transaction_option(mut self, option: TransactionOption) -> MetaclusterConfig {
        self.transaction_options.push(option);
        self
    }

    /// Set the number of entries returned by list operations when no
    /// limit is given.
    pub fn with_default_list_limit(mut self, limit: i32) -> MetaclusterConfig {
        self.default_list_limit = limit;
        self
    }

    /// Get the root prefix.
    pub fn root(&self) -> &Bytes {
        &self.root
    }

    /// Get the per-attempt transaction options.
    pub fn transaction_options(&self) -> &[TransactionOption] {
        &self.transaction_options
    }

    /// Get the default list limit.
    pub fn default_list_limit(&self) -> i32 {
        self.default_list_limit
    }
}

impl Default for MetaclusterConfig {
    fn default() -> MetaclusterConfig {
        MetaclusterConfig::new(Bytes::from_static(DEFAULT_ROOT))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use crate::transaction::TransactionOption;

    use super::{MetaclusterConfig, DEFAULT_LIST_LIMIT};

    #[test]
    fn builder() {
        let config = MetaclusterConfig::default();
        assert_eq!(config.root(), &Bytes::from_static(&b"\xFF/"[..]));
        assert!(config.transaction_options().is_empty());
        assert_eq!(config.default_list_limit(), DEFAULT_LIST_LIMIT);

        let config = MetaclusterConfig::new(Bytes::from_static(&b"test/"[..]))
            .with_transaction_option(TransactionOption::RetryLimit(5))
            .with_default_list_limit(10);
        assert_eq!(config.root(), &Bytes::from_static(&b"test/"[..]));
        assert_eq!(
            config.transaction_options(),
            &[TransactionOption::RetryLimit(5)][..]
        );
        assert_eq!(config.default_list_limit(), 10);
    }
}
