//! The seam between the adapter and the wire driver.
//!
//! A [`Driver`] opens [`Session`]s; a session runs one request at a time and
//! reports results through an [`EventSink`] as discrete events, in order:
//! optional column metadata, rows, intermediate statement counts, an optional
//! error, and finally exactly one [`DriverEvent::RequestCompleted`].

use async_trait::async_trait;

use crate::bulk::BulkLoad;
use crate::config::ConnectionConfig;
use crate::error::MssqlMiddlewareError;
use crate::results::{ColumnDescriptor, Row};
use crate::types::Parameter;

/// What the caller expects back from a statement. Drivers may use it to pick
/// a cheaper protocol path; the event contract is the same either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    Rows,
    Count,
}

/// One statement submitted on the parameterized path.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementRequest {
    pub sql: String,
    pub parameters: Vec<Parameter>,
    pub shape: ResultShape,
}

impl StatementRequest {
    pub fn new(sql: impl Into<String>, parameters: &[Parameter], shape: ResultShape) -> Self {
        Self {
            sql: sql.into(),
            parameters: parameters.to_vec(),
            shape,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    /// Column metadata for the statement; replaces any earlier set.
    ColumnMetadata(Vec<ColumnDescriptor>),
    Row(Row),
    /// A statement inside the request finished. The count is not final.
    StatementDone { row_count: u64 },
    /// The server reported an error; the request still completes afterwards.
    Error(String),
    /// The request is fully finished; `row_count` is the final count.
    RequestCompleted { row_count: u64 },
}

pub trait EventSink: Send {
    fn on_event(&mut self, event: DriverEvent);
}

#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// Open one physical connection.
    async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn Session>, MssqlMiddlewareError>;
}

#[async_trait]
pub trait Session: Send {
    /// Run a statement on the parameterized path.
    ///
    /// Returning `Err` means the request never reached the server (for example
    /// a parameter could not be bound); no events are emitted in that case.
    async fn exec_sql(
        &mut self,
        request: &StatementRequest,
        sink: &mut dyn EventSink,
    ) -> Result<(), MssqlMiddlewareError>;

    /// Run raw SQL on the batch path (no parameters). Statements that create
    /// temporary objects only survive on this path.
    async fn exec_sql_batch(
        &mut self,
        sql: &str,
        sink: &mut dyn EventSink,
    ) -> Result<(), MssqlMiddlewareError>;

    /// Stream a bulk-insert session and return the number of rows committed.
    async fn exec_bulk_load(&mut self, bulk: &BulkLoad) -> Result<u64, MssqlMiddlewareError>;

    async fn begin_transaction(&mut self) -> Result<(), MssqlMiddlewareError>;

    async fn commit_transaction(&mut self) -> Result<(), MssqlMiddlewareError>;

    async fn rollback_transaction(&mut self) -> Result<(), MssqlMiddlewareError>;

    /// Start closing the connection without waiting for acknowledgement.
    fn close(self: Box<Self>);
}
