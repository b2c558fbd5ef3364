//! Async client-side adapter over a single SQL Server connection.
//!
//! A [`Database`] owns one connection and serializes every request on it.
//! Results are rebuilt from the driver's event stream by a small per-request
//! state machine, so callers get plain values: buffered rows, streamed rows,
//! affected-row counts, per-statement batch outcomes, or bulk-load totals.
//!
//! The wire protocol lives behind the [`driver::Driver`] seam. The `mssql`
//! feature (on by default) provides [`mssql::TdsDriver`] over tiberius;
//! `test-utils` adds an in-memory scripted driver.

pub mod bulk;
pub mod config;
pub mod database;
pub mod driver;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod registry;
pub mod request;
pub mod results;
pub mod script;
pub mod types;

#[cfg(feature = "mssql")]
pub mod mssql;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use bulk::{BulkColumn, BulkColumnOptions, BulkLoadOptions, BulkRow, bulk_row};
pub use config::{Authentication, ConnectionConfig, ConnectionConfigBuilder, ConnectionOptions};
pub use database::{BatchOutcome, ConnectionState, Database};
pub use error::MssqlMiddlewareError;
pub use logging::{LogSink, TracingSink};
pub use registry::TypeTag;
pub use results::{ColumnDescriptor, QueryOptions, QueryResult, Row};
pub use types::{Parameter, RowValues};
