// MSSQL module - the TDS driver behind the adapter, built on tiberius
//
// - client: connection setup from a ConnectionConfig
// - params: named parameter binding through sp_executesql
// - query: turning tiberius result streams into driver events
// - bulk: bulk insert sessions

pub mod bulk;
pub mod client;
pub mod params;
pub mod query;

use async_trait::async_trait;

use crate::bulk::BulkLoad;
use crate::config::ConnectionConfig;
use crate::driver::{Driver, DriverEvent, EventSink, ResultShape, Session, StatementRequest};
use crate::error::MssqlMiddlewareError;

pub use client::{TdsClient, build_tiberius_config, create_mssql_client};
pub use params::bind_statement;

/// Driver that speaks TDS to SQL Server through tiberius.
#[derive(Debug, Clone, Copy, Default)]
pub struct TdsDriver;

#[async_trait]
impl Driver for TdsDriver {
    async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn Session>, MssqlMiddlewareError> {
        let client = create_mssql_client(config).await?;
        Ok(Box::new(TdsSession { client }))
    }
}

pub struct TdsSession {
    client: TdsClient,
}

impl TdsSession {
    async fn run_simple(&mut self, sql: &str) -> Result<(), MssqlMiddlewareError> {
        self.client
            .simple_query(sql)
            .await
            .map_err(|e| MssqlMiddlewareError::TransactionError(format!("{sql}: {e}")))?
            .into_results()
            .await
            .map_err(|e| MssqlMiddlewareError::TransactionError(format!("{sql}: {e}")))?;
        Ok(())
    }
}

fn fail_request(sink: &mut dyn EventSink, err: &tiberius::error::Error) {
    sink.on_event(DriverEvent::Error(err.to_string()));
    sink.on_event(DriverEvent::RequestCompleted { row_count: 0 });
}

#[async_trait]
impl Session for TdsSession {
    async fn exec_sql(
        &mut self,
        request: &StatementRequest,
        sink: &mut dyn EventSink,
    ) -> Result<(), MssqlMiddlewareError> {
        let query = bind_statement(request)?;
        match request.shape {
            ResultShape::Rows => match query.query(&mut self.client).await {
                Ok(stream) => query::forward_stream(stream, sink).await,
                Err(e) => fail_request(sink, &e),
            },
            ResultShape::Count => match query.execute(&mut self.client).await {
                Ok(result) => {
                    let mut total = 0;
                    for count in result.rows_affected() {
                        sink.on_event(DriverEvent::StatementDone { row_count: *count });
                        total += *count;
                    }
                    sink.on_event(DriverEvent::RequestCompleted { row_count: total });
                }
                Err(e) => fail_request(sink, &e),
            },
        }
        Ok(())
    }

    async fn exec_sql_batch(
        &mut self,
        sql: &str,
        sink: &mut dyn EventSink,
    ) -> Result<(), MssqlMiddlewareError> {
        // SQL batch, not RPC: session-scoped objects such as #temp tables persist
        match self.client.simple_query(sql).await {
            Ok(stream) => query::forward_stream(stream, sink).await,
            Err(e) => fail_request(sink, &e),
        }
        Ok(())
    }

    async fn exec_bulk_load(&mut self, bulk: &BulkLoad) -> Result<u64, MssqlMiddlewareError> {
        bulk::bulk_insert(&mut self.client, bulk).await
    }

    async fn begin_transaction(&mut self) -> Result<(), MssqlMiddlewareError> {
        self.run_simple("BEGIN TRANSACTION").await
    }

    async fn commit_transaction(&mut self) -> Result<(), MssqlMiddlewareError> {
        self.run_simple("COMMIT TRANSACTION").await
    }

    async fn rollback_transaction(&mut self) -> Result<(), MssqlMiddlewareError> {
        self.run_simple("ROLLBACK TRANSACTION").await
    }

    fn close(self: Box<Self>) {
        let client = self.client;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = client.close().await {
                        tracing::debug!(error = %e, "SQL Server close did not complete cleanly");
                    }
                });
            }
            Err(_) => drop(client),
        }
    }
}
