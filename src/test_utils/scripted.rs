use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::bulk::BulkLoad;
use crate::config::ConnectionConfig;
use crate::database::IDENTITY_SQL;
use crate::driver::{Driver, DriverEvent, EventSink, Session, StatementRequest};
use crate::error::MssqlMiddlewareError;
use crate::results::{ColumnDescriptor, Row};
use crate::types::{Parameter, RowValues};

/// How the scripted server answers one SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Metadata (derived from the first row when empty), the rows, then completion.
    Rows {
        columns: Vec<ColumnDescriptor>,
        rows: Vec<Row>,
    },
    /// One `StatementDone` per entry; the completion carries their sum.
    Count(Vec<u64>),
    /// Like `Count(vec![count])`, and `@@identity` reads `identity` afterwards.
    Inserted { count: u64, identity: i64 },
    /// Rows stream out, then the server reports an error.
    RowsThenFail { rows: Vec<Row>, message: String },
    /// An error event followed by completion.
    Fail(String),
    /// The driver refuses to bind the parameters; nothing reaches the server.
    RejectBinding(String),
    /// One row whose columns are the bound parameters, as received.
    EchoParams,
}

impl Reply {
    #[must_use]
    pub fn rows(rows: Vec<Row>) -> Self {
        Reply::Rows {
            columns: Vec::new(),
            rows,
        }
    }

    #[must_use]
    pub fn count(count: u64) -> Self {
        Reply::Count(vec![count])
    }

    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Reply::Fail(message.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionPath {
    Statement,
    Batch,
}

/// One request as it reached the scripted server.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub sql: String,
    pub parameters: Vec<Parameter>,
    pub path: SubmissionPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxCall {
    Begin,
    Commit,
    Rollback,
}

#[derive(Default)]
struct Script {
    replies: HashMap<String, Reply>,
    connect_failure: Option<String>,
    bulk_failure: Option<String>,
    transaction_failure: Option<String>,
    latency: Option<Duration>,
    identity: Option<i64>,
    connects: usize,
    closes: usize,
    submissions: Vec<Submission>,
    bulk_loads: Vec<BulkLoad>,
    transactions: Vec<TxCall>,
}

#[derive(Default)]
struct Shared {
    script: Mutex<Script>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// In-memory driver with scripted replies. Clones share the script and the
/// recorded history, so a test keeps one clone and hands another to the
/// database.
#[derive(Clone, Default)]
pub struct ScriptedDriver {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ScriptedDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedDriver").finish_non_exhaustive()
    }
}

impl ScriptedDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        // poisoned by a panicking test; the history stays readable
        self.shared
            .script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Answer `sql` (matched exactly) with `reply`.
    #[must_use]
    pub fn on(self, sql: impl Into<String>, reply: Reply) -> Self {
        self.script().replies.insert(sql.into(), reply);
        self
    }

    #[must_use]
    pub fn failing_connect(self, message: impl Into<String>) -> Self {
        self.script().connect_failure = Some(message.into());
        self
    }

    #[must_use]
    pub fn failing_bulk_load(self, message: impl Into<String>) -> Self {
        self.script().bulk_failure = Some(message.into());
        self
    }

    #[must_use]
    pub fn failing_transactions(self, message: impl Into<String>) -> Self {
        self.script().transaction_failure = Some(message.into());
        self
    }

    /// Delay every request by `latency` so concurrent callers get a chance to overlap.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.script().latency = Some(latency);
        self
    }

    #[must_use]
    pub fn connects(&self) -> usize {
        self.script().connects
    }

    #[must_use]
    pub fn closes(&self) -> usize {
        self.script().closes
    }

    #[must_use]
    pub fn submissions(&self) -> Vec<Submission> {
        self.script().submissions.clone()
    }

    #[must_use]
    pub fn submitted_sql(&self) -> Vec<String> {
        self.script()
            .submissions
            .iter()
            .map(|s| s.sql.clone())
            .collect()
    }

    #[must_use]
    pub fn bulk_loads(&self) -> Vec<BulkLoad> {
        self.script().bulk_loads.clone()
    }

    #[must_use]
    pub fn transactions(&self) -> Vec<TxCall> {
        self.script().transactions.clone()
    }

    /// Highest number of requests the server saw at the same time.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.shared.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn connect(
        &self,
        _config: &ConnectionConfig,
    ) -> Result<Box<dyn Session>, MssqlMiddlewareError> {
        let mut script = self.script();
        if let Some(message) = &script.connect_failure {
            return Err(MssqlMiddlewareError::ConnectionError(message.clone()));
        }
        script.connects += 1;
        script.identity = None;
        Ok(Box::new(ScriptedSession {
            driver: self.clone(),
        }))
    }
}

struct ScriptedSession {
    driver: ScriptedDriver,
}

struct InFlight<'a>(&'a Shared);

impl<'a> InFlight<'a> {
    fn enter(shared: &'a Shared) -> Self {
        let now = shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        shared.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(shared)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn derived_columns(rows: &[Row]) -> Vec<ColumnDescriptor> {
    rows.first().map_or_else(Vec::new, |row| {
        row.iter()
            .map(|(name, value)| ColumnDescriptor::new(name, None, 0, value.kind()))
            .collect()
    })
}

fn emit_rows(sink: &mut dyn EventSink, columns: Vec<ColumnDescriptor>, rows: Vec<Row>) -> u64 {
    let columns = if columns.is_empty() {
        derived_columns(&rows)
    } else {
        columns
    };
    sink.on_event(DriverEvent::ColumnMetadata(columns));
    let count = rows.len() as u64;
    for row in rows {
        sink.on_event(DriverEvent::Row(row));
    }
    count
}

impl ScriptedSession {
    async fn answer(
        &mut self,
        sql: &str,
        parameters: &[Parameter],
        path: SubmissionPath,
        sink: &mut dyn EventSink,
    ) -> Result<(), MssqlMiddlewareError> {
        let shared = Arc::clone(&self.driver.shared);
        let _guard = InFlight::enter(&shared);

        let (reply, latency, identity) = {
            let mut script = self.driver.script();
            script.submissions.push(Submission {
                sql: sql.to_string(),
                parameters: parameters.to_vec(),
                path,
            });
            (script.replies.get(sql).cloned(), script.latency, script.identity)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let reply = match reply {
            Some(reply) => reply,
            None if sql.trim().eq_ignore_ascii_case(IDENTITY_SQL) => {
                let value = identity.map_or(RowValues::Null, RowValues::Int);
                Reply::rows(vec![Row::from_pairs([("", value)])])
            }
            None => Reply::Fail(format!("no scripted reply for: {sql}")),
        };

        match reply {
            Reply::Rows { columns, rows } => {
                let count = emit_rows(sink, columns, rows);
                sink.on_event(DriverEvent::StatementDone { row_count: count });
                sink.on_event(DriverEvent::RequestCompleted { row_count: count });
            }
            Reply::Count(counts) => {
                for count in &counts {
                    sink.on_event(DriverEvent::StatementDone { row_count: *count });
                }
                sink.on_event(DriverEvent::RequestCompleted {
                    row_count: counts.iter().sum(),
                });
            }
            Reply::Inserted { count, identity } => {
                self.driver.script().identity = Some(identity);
                sink.on_event(DriverEvent::StatementDone { row_count: count });
                sink.on_event(DriverEvent::RequestCompleted { row_count: count });
            }
            Reply::RowsThenFail { rows, message } => {
                let count = emit_rows(sink, Vec::new(), rows);
                sink.on_event(DriverEvent::Error(message));
                sink.on_event(DriverEvent::RequestCompleted { row_count: count });
            }
            Reply::Fail(message) => {
                sink.on_event(DriverEvent::Error(message));
                sink.on_event(DriverEvent::RequestCompleted { row_count: 0 });
            }
            Reply::RejectBinding(message) => {
                return Err(MssqlMiddlewareError::ParameterError(message));
            }
            Reply::EchoParams => {
                let row = Row::from_pairs(
                    parameters
                        .iter()
                        .map(|p| (p.name.clone(), p.value.clone())),
                );
                let count = emit_rows(sink, Vec::new(), vec![row]);
                sink.on_event(DriverEvent::RequestCompleted { row_count: count });
            }
        }
        Ok(())
    }

    fn transaction(&self, call: TxCall) -> Result<(), MssqlMiddlewareError> {
        let mut script = self.driver.script();
        if let Some(message) = &script.transaction_failure {
            return Err(MssqlMiddlewareError::TransactionError(message.clone()));
        }
        script.transactions.push(call);
        Ok(())
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn exec_sql(
        &mut self,
        request: &StatementRequest,
        sink: &mut dyn EventSink,
    ) -> Result<(), MssqlMiddlewareError> {
        self.answer(
            &request.sql,
            &request.parameters,
            SubmissionPath::Statement,
            sink,
        )
        .await
    }

    async fn exec_sql_batch(
        &mut self,
        sql: &str,
        sink: &mut dyn EventSink,
    ) -> Result<(), MssqlMiddlewareError> {
        self.answer(sql, &[], SubmissionPath::Batch, sink).await
    }

    async fn exec_bulk_load(&mut self, bulk: &BulkLoad) -> Result<u64, MssqlMiddlewareError> {
        let shared = Arc::clone(&self.driver.shared);
        let _guard = InFlight::enter(&shared);
        bulk.validate_rows()?;
        let mut script = self.driver.script();
        if let Some(message) = &script.bulk_failure {
            return Err(MssqlMiddlewareError::BulkLoadError(message.clone()));
        }
        script.bulk_loads.push(bulk.clone());
        Ok(bulk.rows.len() as u64)
    }

    async fn begin_transaction(&mut self) -> Result<(), MssqlMiddlewareError> {
        self.transaction(TxCall::Begin)
    }

    async fn commit_transaction(&mut self) -> Result<(), MssqlMiddlewareError> {
        self.transaction(TxCall::Commit)
    }

    async fn rollback_transaction(&mut self) -> Result<(), MssqlMiddlewareError> {
        self.transaction(TxCall::Rollback)
    }

    fn close(self: Box<Self>) {
        self.driver.script().closes += 1;
    }
}
