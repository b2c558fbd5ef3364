use crate::error::MssqlMiddlewareError;

use super::Database;

#[derive(Debug, Clone, Copy)]
enum TxStep {
    Begin,
    Commit,
    Rollback,
}

impl TxStep {
    fn label(self) -> &'static str {
        match self {
            TxStep::Begin => "begin",
            TxStep::Commit => "commit",
            TxStep::Rollback => "rollback",
        }
    }
}

impl Database {
    /// Start a transaction on the connection.
    ///
    /// Begin, commit and rollback are independent calls: nesting and ordering
    /// are not tracked here, the server decides what each one means.
    ///
    /// # Errors
    /// Returns `NotConnected` or the driver's error.
    pub async fn begin_transaction(&self) -> Result<(), MssqlMiddlewareError> {
        self.transaction_step(TxStep::Begin).await
    }

    /// # Errors
    /// Returns `NotConnected` or the driver's error.
    pub async fn commit_transaction(&self) -> Result<(), MssqlMiddlewareError> {
        self.transaction_step(TxStep::Commit).await
    }

    /// # Errors
    /// Returns `NotConnected` or the driver's error.
    pub async fn rollback_transaction(&self) -> Result<(), MssqlMiddlewareError> {
        self.transaction_step(TxStep::Rollback).await
    }

    async fn transaction_step(&self, step: TxStep) -> Result<(), MssqlMiddlewareError> {
        let mut slot = self.lock_slot().await;
        let session = slot.session_mut()?;
        let result = match step {
            TxStep::Begin => session.begin_transaction().await,
            TxStep::Commit => session.commit_transaction().await,
            TxStep::Rollback => session.rollback_transaction().await,
        };
        match &result {
            Ok(()) => self
                .logger()
                .info(&format!("transaction {}", step.label())),
            Err(err) => self
                .logger()
                .warn(&format!("transaction {} failed: {err}", step.label())),
        }
        result
    }
}
