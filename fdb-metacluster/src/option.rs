/// Options that bound the behavior of a transaction and its retry
/// loop.
///
/// Options persist across [`on_error`] and are cleared by [`reset`].
///
/// [`on_error`]: crate::transaction::ReadTransaction::on_error
/// [`reset`]: crate::transaction::Transaction::reset
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransactionOption {
    /// Set a maximum number of retries after which additional calls
    /// to `on_error` will throw the most recently seen error code.
    ///
    /// Exhausting the limit surfaces `transaction_timed_out`. Valid
    /// parameter values are `[-1, i32::MAX]`. If set to -1, will
    /// disable the retry limit.
    RetryLimit(i32),

    /// Set a timeout in milliseconds which, when elapsed, will cause
    /// the transaction automatically to be cancelled.
    ///
    /// The timeout is measured from the first use of the transaction
    /// and is not reset by `on_error`. Operations issued after the
    /// deadline fail with `transaction_timed_out`. If set to 0, will
    /// disable all timeouts.
    Timeout(i32),

    /// Set the maximum amount of backoff delay incurred in the call
    /// to `on_error` if the error is retryable.
    ///
    /// Defaults to 100 ms.
    MaxRetryDelay(i32),
}
