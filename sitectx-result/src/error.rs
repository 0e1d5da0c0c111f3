use std::fmt;
use thiserror::Error;

/// Unified error type for the execution context stack.
///
/// The execution context performs no I/O, so almost every failure it reports is
/// a defect in the calling engine code rather than a runtime condition. Those
/// are kept in their own variant ([`Error::ContractViolation`]) so callers never
/// confuse them with ordinary control flow or with failures raised by operators.
///
/// # Thread Safety
///
/// `Error` implements `Send` and `Sync` so it can cross the worker-thread
/// boundary together with the fragment result.
#[derive(Error, Debug)]
pub enum Error {
    /// A caller broke a precondition of the execution context.
    ///
    /// Raised for:
    /// - looking up the current context on a thread with no binding
    /// - inserting the same subquery id into the result cache twice
    /// - installing an executor table while subquery results are still cached
    /// - running a subquery id that was never registered
    /// - attempting replication writes without an active transaction
    ///
    /// # Recovery
    ///
    /// None. The calling code is wrong and must be fixed; retrying the same call
    /// fails the same way.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// Invalid input value supplied through a public API.
    ///
    /// Used for configuration values that fail to parse, parameter indexes past
    /// the end of the parameter set, and batches whose schema does not match the
    /// temp table they are appended to.
    #[error("Invalid argument: {0}")]
    InvalidArgumentError(String),

    /// Arrow library error while building or combining temp table batches.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Internal error indicating a bug or an unexpected state, such as a lock
    /// poisoned by a panicking operator.
    #[error("An internal operation failed: {0}")]
    Internal(String),
}

impl Error {
    /// Create a contract violation error from any displayable message.
    ///
    /// # Examples
    ///
    /// ```
    /// use sitectx_result::Error;
    ///
    /// let err = Error::contract_violation("no execution context bound to this thread");
    /// assert!(err.is_contract_violation());
    /// ```
    #[inline]
    pub fn contract_violation<M: fmt::Display>(msg: M) -> Self {
        Error::ContractViolation(msg.to_string())
    }

    /// Create an internal error from any displayable error.
    #[inline]
    pub fn internal<E: fmt::Display>(err: E) -> Self {
        Error::Internal(err.to_string())
    }

    /// True when the error reports a caller defect rather than a runtime failure.
    #[inline]
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Error::ContractViolation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_violation_is_distinct_from_internal() {
        let violation = Error::contract_violation("duplicate subquery id 3");
        let internal = Error::internal("lock poisoned");

        assert!(violation.is_contract_violation());
        assert!(!internal.is_contract_violation());
        assert_eq!(
            violation.to_string(),
            "contract violation: duplicate subquery id 3"
        );
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
