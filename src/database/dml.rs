use crate::driver::{ResultShape, StatementRequest};
use crate::error::MssqlMiddlewareError;
use crate::request::Counted;
use crate::types::Parameter;

use super::{Database, Slot, run_sql_batch, run_statement};

impl Database {
    /// Run a statement for its affected-row count.
    ///
    /// The count is the one carried by the request-completed event; counts of
    /// individual statements reported earlier are not final and are ignored.
    ///
    /// # Errors
    /// Returns `NotConnected`, a binding error from the driver, or the execution error.
    pub async fn execute(&self, sql: &str, params: &[Parameter]) -> Result<u64, MssqlMiddlewareError> {
        let mut slot = self.lock_slot().await;
        self.execute_in(&mut slot, sql, params).await
    }

    /// [`Database::execute`] with one `Int` parameter named `id`, e.g.
    /// `execute_int("delete from tbl where id_primary=@id", 1)`.
    ///
    /// # Errors
    /// Same as [`Database::execute`].
    pub async fn execute_int(&self, sql: &str, id: i32) -> Result<u64, MssqlMiddlewareError> {
        self.execute(sql, &[Parameter::int_id(id)]).await
    }

    /// Run raw SQL on the driver's batch path, without parameters.
    ///
    /// Temporary tables created here stay visible to later requests on this
    /// connection; the parameterized path runs each statement in its own scope,
    /// so temporary objects created there vanish when it returns.
    ///
    /// # Errors
    /// Returns `NotConnected` or the execution error reported by the driver.
    pub async fn execute_batch(&self, sql: &str) -> Result<u64, MssqlMiddlewareError> {
        let mut slot = self.lock_slot().await;
        let session = slot.session_mut()?;

        let started = self.log_start("execute_batch", sql, &[]);
        let result = run_sql_batch(session, sql, Counted).await;
        self.log_finish("execute_batch", &result, |n| *n, started);
        result
    }

    /// Execute path on an already acquired slot, shared with the batch sequencer.
    pub(super) async fn execute_in(
        &self,
        slot: &mut Slot,
        sql: &str,
        params: &[Parameter],
    ) -> Result<u64, MssqlMiddlewareError> {
        let session = slot.session_mut()?;
        let request = StatementRequest::new(sql, params, ResultShape::Count);

        let started = self.log_start("execute", sql, params);
        let result = run_statement(session, &request, Counted).await;
        self.log_finish("execute", &result, |n| *n, started);
        result
    }
}
