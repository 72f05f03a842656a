//! Provides [`FdbError`] type, [`FdbResult`] type alias and error
//! constants.

use std::error::Error;
use std::fmt::{self, Display};

/// Error code indicating that [`Subspace::unpack`] was called with a
/// key that does not belong to the subspace.
///
/// [`Subspace::unpack`]: crate::subspace::Subspace::unpack
pub const SUBSPACE_UNPACK_KEY_MISMATCH: i32 = 100;

/// Error code indicating that a byte string could not be parsed into
/// a [`Tuple`].
///
/// [`Tuple`]: crate::tuple::Tuple
pub const TUPLE_FROM_BYTES: i32 = 110;

/// Error code indicating that a [`Tuple`] element accessor was used
/// on an element of a different type or out of bounds.
///
/// [`Tuple`]: crate::tuple::Tuple
pub const TUPLE_GET: i32 = 111;

/// Error code indicating that [`strinc`] was called with an empty key
/// or a key made entirely of `0xFF` bytes.
///
/// [`strinc`]: crate::tuple::key_util::strinc
pub const TUPLE_KEY_UTIL_STRINC_ERROR: i32 = 112;

/// Error code indicating that a tenant prefix was not exactly 8 bytes
/// long.
pub const TENANT_PREFIX_INVALID_LENGTH: i32 = 120;

/// Error code indicating that a persisted record could not be
/// decoded.
pub const RECORD_DECODE: i32 = 121;

/// Error code indicating that a persisted record was written with a
/// protocol version this crate does not understand.
pub const RECORD_UNKNOWN_PROTOCOL_VERSION: i32 = 122;

/// Error code indicating that a persisted tenant entry carries a
/// tenant state outside of the known states.
pub const TENANT_ENTRY_INVALID_STATE: i32 = 123;

/// Error code indicating an unrecognized `name=value` configuration
/// parameter.
pub const INVALID_CONFIGURATION_PARAMETER: i32 = 130;

/// Error code indicating that `max_tenant_groups` was not a
/// non-negative integer.
pub const INVALID_NUMBER_OF_TENANT_GROUPS: i32 = 131;

/// Error code indicating that a data cluster was registered without a
/// connection string.
pub const CONNECTION_STRING_REQUIRED: i32 = 132;

/// Error code indicating an invalid `LIMIT` argument.
pub const INVALID_LIMIT: i32 = 133;

/// Error code indicating a malformed administrative command.
pub const INVALID_COMMAND_USAGE: i32 = 134;

/// `transaction_too_old`
pub const TRANSACTION_TOO_OLD: i32 = 1007;

/// `future_version`
pub const FUTURE_VERSION: i32 = 1009;

/// `not_committed`
pub const NOT_COMMITTED: i32 = 1020;

/// `commit_unknown_result`
pub const COMMIT_UNKNOWN_RESULT: i32 = 1021;

/// `transaction_cancelled`
pub const TRANSACTION_CANCELLED: i32 = 1025;

/// `transaction_timed_out`
pub const TRANSACTION_TIMED_OUT: i32 = 1031;

/// `used_during_commit`
pub const USED_DURING_COMMIT: i32 = 2017;

/// `tenant_not_found`
pub const TENANT_NOT_FOUND: i32 = 2131;

/// `tenant_already_exists`
pub const TENANT_ALREADY_EXISTS: i32 = 2132;

/// `tenant_prefix_allocator_conflict`
pub const TENANT_PREFIX_ALLOCATOR_CONFLICT: i32 = 2135;

/// `invalid_tenant_configuration`
pub const INVALID_TENANT_CONFIGURATION: i32 = 2140;

/// `cluster_no_capacity`
pub const CLUSTER_NO_CAPACITY: i32 = 2141;

/// `tenant_removed`
pub const TENANT_REMOVED: i32 = 2142;

/// `invalid_tenant_state`
pub const INVALID_TENANT_STATE: i32 = 2143;

/// `invalid_metacluster_operation`
pub const INVALID_METACLUSTER_OPERATION: i32 = 2151;

/// `cluster_already_exists`
pub const CLUSTER_ALREADY_EXISTS: i32 = 2152;

/// `cluster_not_found`
pub const CLUSTER_NOT_FOUND: i32 = 2153;

/// `cluster_not_empty`
pub const CLUSTER_NOT_EMPTY: i32 = 2154;

/// `metacluster_no_capacity`
pub const METACLUSTER_NO_CAPACITY: i32 = 2156;

/// Broad classification of an [`FdbError`].
///
/// Administrative tooling uses this to decide how to report a failure
/// without matching on individual error codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A parameter or argument was malformed or unknown.
    Validation,
    /// The named cluster or tenant does not exist.
    NotFound,
    /// The name is already in use.
    AlreadyExists,
    /// The operation would exceed a configured capacity.
    CapacityExceeded,
    /// Removal is blocked by existing assignments.
    NotEmpty,
    /// Transient conflict detected by the store. The retry loop
    /// absorbs these.
    Conflict,
    /// A retry limit or deadline was exceeded.
    Timeout,
    /// Unrecoverable failure, such as malformed persisted state.
    Fatal,
}

/// Error type for this crate.
///
/// Internally it wraps an error code. Codes in the range `100..=999`
/// are *layer* errors raised by this crate itself. Other codes follow
/// the numbering used by FoundationDB.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FdbError {
    error_code: i32,
}

impl FdbError {
    /// Create new [`FdbError`] from error code.
    pub fn new(error_code: i32) -> FdbError {
        FdbError { error_code }
    }

    /// Return the error code.
    pub fn code(self) -> i32 {
        self.error_code
    }

    /// Returns `true` if the error code belongs to this crate rather
    /// than to the store. The retry loop returns these errors without
    /// consulting [`on_error`].
    ///
    /// [`on_error`]: crate::transaction::ReadTransaction::on_error
    pub fn layer_error(e: i32) -> bool {
        (100..=999).contains(&e)
    }

    /// Returns `true` if the transaction that produced this error may
    /// be retried from the beginning.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.error_code,
            TRANSACTION_TOO_OLD | FUTURE_VERSION | NOT_COMMITTED | COMMIT_UNKNOWN_RESULT
        )
    }

    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self.error_code {
            INVALID_CONFIGURATION_PARAMETER
            | INVALID_NUMBER_OF_TENANT_GROUPS
            | CONNECTION_STRING_REQUIRED
            | INVALID_LIMIT
            | INVALID_COMMAND_USAGE
            | INVALID_TENANT_CONFIGURATION
            | INVALID_TENANT_STATE
            | INVALID_METACLUSTER_OPERATION => ErrorKind::Validation,
            TENANT_NOT_FOUND | TENANT_REMOVED | CLUSTER_NOT_FOUND => ErrorKind::NotFound,
            TENANT_ALREADY_EXISTS | CLUSTER_ALREADY_EXISTS => ErrorKind::AlreadyExists,
            CLUSTER_NO_CAPACITY | METACLUSTER_NO_CAPACITY => ErrorKind::CapacityExceeded,
            CLUSTER_NOT_EMPTY => ErrorKind::NotEmpty,
            TRANSACTION_TOO_OLD | FUTURE_VERSION | NOT_COMMITTED | COMMIT_UNKNOWN_RESULT => {
                ErrorKind::Conflict
            }
            TRANSACTION_TIMED_OUT => ErrorKind::Timeout,
            _ => ErrorKind::Fatal,
        }
    }

    /// Short, human readable description of the error code.
    pub fn description(&self) -> &'static str {
        match self.error_code {
            SUBSPACE_UNPACK_KEY_MISMATCH => "Key is not contained in the subspace",
            TUPLE_FROM_BYTES => "Unable to parse tuple from bytes",
            TUPLE_GET => "Tuple element has an unexpected type or is missing",
            TUPLE_KEY_UTIL_STRINC_ERROR => "Key must contain at least one byte not equal to 0xFF",
            TENANT_PREFIX_INVALID_LENGTH => "Tenant prefix has an invalid length",
            RECORD_DECODE => "Persisted record is malformed",
            RECORD_UNKNOWN_PROTOCOL_VERSION => "Persisted record has an unknown protocol version",
            TENANT_ENTRY_INVALID_STATE => "Persisted tenant entry has an invalid tenant state",
            INVALID_CONFIGURATION_PARAMETER => "Unrecognized configuration parameter",
            INVALID_NUMBER_OF_TENANT_GROUPS => "Invalid number of tenant groups",
            CONNECTION_STRING_REQUIRED => {
                "connection_string must be configured when registering a cluster"
            }
            INVALID_LIMIT => "Invalid limit",
            INVALID_COMMAND_USAGE => "Invalid command usage",
            TRANSACTION_TOO_OLD => "Transaction is too old to perform reads or be committed",
            FUTURE_VERSION => "Request for future version",
            NOT_COMMITTED => "Transaction not committed due to conflict with another transaction",
            COMMIT_UNKNOWN_RESULT => "Transaction may or may not have committed",
            TRANSACTION_CANCELLED => "Operation aborted because the transaction was cancelled",
            TRANSACTION_TIMED_OUT => "Operation aborted because the transaction timed out",
            USED_DURING_COMMIT => "Operation issued while a commit was outstanding",
            TENANT_NOT_FOUND => "Tenant does not exist",
            TENANT_ALREADY_EXISTS => "A tenant with the given name already exists",
            TENANT_PREFIX_ALLOCATOR_CONFLICT => {
                "The database already has keys stored at the prefix allocated for the tenant"
            }
            INVALID_TENANT_CONFIGURATION => "Tenant configuration is invalid",
            CLUSTER_NO_CAPACITY => {
                "Cluster does not have capacity to perform the specified operation"
            }
            TENANT_REMOVED => "The tenant was removed",
            INVALID_TENANT_STATE => "Operation cannot be applied to tenant in its current state",
            INVALID_METACLUSTER_OPERATION => "Operation is not supported in a metacluster",
            CLUSTER_ALREADY_EXISTS => "The data cluster being created already exists",
            CLUSTER_NOT_FOUND => "The data cluster being used does not exist",
            CLUSTER_NOT_EMPTY => "The data cluster being removed has tenant groups assigned",
            METACLUSTER_NO_CAPACITY => "Metacluster does not have capacity to create new tenants",
            _ => "Unknown error",
        }
    }
}

impl Display for FdbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.error_code)
    }
}

impl Error for FdbError {}

/// Alias for [`Result`]`<T, `[`FdbError`]`>`
///
/// [`Result`]: std::result::Result
/// [`FdbError`]: crate::error::FdbError
pub type FdbResult<T> = Result<T, FdbError>;

#[cfg(test)]
mod tests {
    use impls::impls;

    use super::{
        ErrorKind, FdbError, CLUSTER_NOT_EMPTY, CLUSTER_NO_CAPACITY, NOT_COMMITTED,
        RECORD_DECODE, TRANSACTION_TIMED_OUT, TUPLE_FROM_BYTES,
    };

    #[test]
    fn impls() {
        #[rustfmt::skip]
	assert!(impls!(
	    FdbError:
	        Send &
		Sync &
		Copy &
		std::error::Error));
    }

    #[test]
    fn layer_error() {
        assert!(FdbError::layer_error(TUPLE_FROM_BYTES));
        assert!(FdbError::layer_error(RECORD_DECODE));
        assert!(!FdbError::layer_error(NOT_COMMITTED));
        assert!(!FdbError::layer_error(CLUSTER_NOT_EMPTY));
    }

    #[test]
    fn kind() {
        assert!(FdbError::new(NOT_COMMITTED).is_retryable());
        assert_eq!(FdbError::new(NOT_COMMITTED).kind(), ErrorKind::Conflict);
        assert!(!FdbError::new(TRANSACTION_TIMED_OUT).is_retryable());
        assert_eq!(
            FdbError::new(TRANSACTION_TIMED_OUT).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            FdbError::new(CLUSTER_NO_CAPACITY).kind(),
            ErrorKind::CapacityExceeded
        );
        assert_eq!(FdbError::new(RECORD_DECODE).kind(), ErrorKind::Fatal);
    }

    #[test]
    fn display() {
        assert_eq!(
            FdbError::new(CLUSTER_NOT_EMPTY).to_string(),
            "The data cluster being removed has tenant groups assigned (2154)"
        );
    }
}
