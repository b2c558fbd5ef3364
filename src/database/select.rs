use crate::driver::{ResultShape, StatementRequest};
use crate::error::MssqlMiddlewareError;
use crate::request::{Buffered, Scalar, Streamed};
use crate::results::{QueryOptions, QueryResult, Row};
use crate::types::{Parameter, RowValues};

use super::{Database, run_statement};

pub(crate) const IDENTITY_SQL: &str = "select @@identity";

impl Database {
    /// Run a statement and buffer every row it returns, in arrival order.
    ///
    /// With `options.columns` set the result also carries the column metadata.
    /// The whole result is held in memory; use [`Database::query_lm`] for
    /// results that should not be.
    ///
    /// # Errors
    /// Returns `NotConnected` before touching the driver, a binding error from the
    /// driver, or the execution error reported for the statement (rows are discarded).
    pub async fn query(
        &self,
        sql: &str,
        params: &[Parameter],
        options: QueryOptions,
    ) -> Result<QueryResult, MssqlMiddlewareError> {
        let mut slot = self.lock_slot().await;
        let session = slot.session_mut()?;
        let request = StatementRequest::new(sql, params, ResultShape::Rows);

        let started = self.log_start("query", sql, params);
        let result = run_statement(session, &request, Buffered::new(options.columns)).await;
        self.log_finish("query", &result, |r| r.len() as u64, started);
        result
    }

    /// [`Database::query`] with one `Int` parameter named `id`, e.g.
    /// `query_int("select * from tbl where id_primary=@id", 1)`.
    ///
    /// # Errors
    /// Same as [`Database::query`].
    pub async fn query_int(&self, sql: &str, id: i32) -> Result<QueryResult, MssqlMiddlewareError> {
        self.query(sql, &[Parameter::int_id(id)], QueryOptions::default())
            .await
    }

    /// Low-memory query: each row goes to `consumer` as it arrives and is not
    /// kept. Resolves to the row count reported at completion.
    ///
    /// # Errors
    /// Same as [`Database::query`]. Rows already handed to `consumer` before a
    /// failure are not recalled.
    pub async fn query_lm<F>(
        &self,
        sql: &str,
        params: &[Parameter],
        consumer: F,
    ) -> Result<u64, MssqlMiddlewareError>
    where
        F: FnMut(Row) + Send,
    {
        let mut slot = self.lock_slot().await;
        let session = slot.session_mut()?;
        let request = StatementRequest::new(sql, params, ResultShape::Rows);

        let started = self.log_start("query_lm", sql, params);
        let result = run_statement(session, &request, Streamed::new(consumer)).await;
        self.log_finish("query_lm", &result, |n| *n, started);
        result
    }

    /// Last identity value generated on this connection (`select @@identity`).
    /// `Int(0)` when nothing has been inserted yet.
    ///
    /// # Errors
    /// Returns `NotConnected` or the execution error reported by the driver.
    pub async fn identity(&self) -> Result<RowValues, MssqlMiddlewareError> {
        let mut slot = self.lock_slot().await;
        let session = slot.session_mut()?;
        let request = StatementRequest::new(IDENTITY_SQL, &[], ResultShape::Rows);

        let started = self.log_start("identity", IDENTITY_SQL, &[]);
        let result = run_statement(session, &request, Scalar::new()).await;
        self.log_finish("identity", &result, |_| 1, started);
        result
    }
}
