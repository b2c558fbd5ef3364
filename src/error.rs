use thiserror::Error;

#[derive(Debug, Error)]
pub enum MssqlMiddlewareError {
    #[cfg(feature = "mssql")]
    #[error(transparent)]
    MssqlError(#[from] tiberius::error::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Not connected: call connect() before issuing requests")]
    NotConnected,

    #[error("Parameter binding error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Bulk load error: {0}")]
    BulkLoadError(String),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("Caller contract violation: {0}")]
    ContractViolation(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl MssqlMiddlewareError {
    /// True for failures raised before the request reached the driver.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::NotConnected | Self::ContractViolation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_driver_message() {
        let err = MssqlMiddlewareError::ExecutionError("Invalid object name 'nope'.".into());
        assert_eq!(
            err.to_string(),
            "SQL execution error: Invalid object name 'nope'."
        );
    }

    #[test]
    fn contract_violations_are_classified() {
        assert!(MssqlMiddlewareError::NotConnected.is_contract_violation());
        assert!(MssqlMiddlewareError::ContractViolation("x".into()).is_contract_violation());
        assert!(!MssqlMiddlewareError::ExecutionError("x".into()).is_contract_violation());
    }
}
