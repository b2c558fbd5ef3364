use std::time::Instant;

use crate::bulk::{BulkColumn, BulkLoad, BulkLoadOptions, BulkRow};
use crate::error::MssqlMiddlewareError;
use crate::logging::elapsed_ms;

use super::Database;

impl Database {
    /// Insert `rows` into `table` through the driver's bulk-insert session.
    ///
    /// Columns are declared in the given order and rows are appended in input
    /// order. The load either commits and resolves to the committed row count,
    /// or fails with the driver's error; no partial counts are reported.
    ///
    /// # Errors
    /// Returns `ContractViolation` (no columns, duplicate column names) or
    /// `NotConnected` before the driver is involved, otherwise the driver's
    /// bulk-load error.
    pub async fn bulk_load(
        &self,
        table: &str,
        options: BulkLoadOptions,
        columns: &[BulkColumn],
        rows: &[BulkRow],
    ) -> Result<u64, MssqlMiddlewareError> {
        let bulk = BulkLoad::new(table, options, columns, rows)?;
        let mut slot = self.lock_slot().await;
        let session = slot.session_mut()?;

        self.logger().debug(&format!(
            "bulk load start: {table} ({} columns, {} rows)",
            bulk.columns.len(),
            bulk.rows.len()
        ));
        let started = Instant::now();
        let result = session.exec_bulk_load(&bulk).await;
        let elapsed = elapsed_ms(started.elapsed());
        match &result {
            Ok(count) => self
                .logger()
                .debug(&format!("bulk load done: {count} rows into {table} in {elapsed}")),
            Err(err) => self
                .logger()
                .warn(&format!("bulk load into {table} failed after {elapsed}: {err}")),
        }
        result
    }
}
