//! Convenient imports for common functionality.
//!
//! ```rust,ignore
//! use mssql_middleware::prelude::*;
//! ```

pub use crate::bulk::{BulkColumn, BulkColumnOptions, BulkLoadOptions, BulkRow, bulk_row};
pub use crate::config::{Authentication, ConnectionConfig};
pub use crate::database::{BatchOutcome, ConnectionState, Database};
pub use crate::error::MssqlMiddlewareError;
pub use crate::logging::LogSink;
pub use crate::registry::TypeTag;
pub use crate::results::{ColumnDescriptor, QueryOptions, QueryResult, Row};
pub use crate::script::split_batches;
pub use crate::types::{Parameter, RowValues};

#[cfg(feature = "mssql")]
pub use crate::mssql::TdsDriver;
