// Database module - the request adapter over one driver connection
//
// - core (this file): lifecycle, the per-connection request queue, statement runners
// - select: buffered, streaming and scalar queries
// - dml: execute paths
// - batch: the per-statement batch sequencer
// - bulk: bulk load
// - tx: transaction control

mod batch;
mod bulk;
mod dml;
mod select;
mod tx;

pub use batch::BatchOutcome;
#[cfg(feature = "test-utils")]
pub(crate) use select::IDENTITY_SQL;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, MutexGuard};

use crate::config::ConnectionConfig;
use crate::driver::{Driver, Session, StatementRequest};
use crate::error::MssqlMiddlewareError;
use crate::logging::{LogSink, Logger, elapsed_ms};
use crate::registry::TypeTag;
use crate::request::{Collector, PendingRequest};
use crate::types::{Parameter, describe_params};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Unconnected,
    Connecting,
    Connected,
    Closed,
}

#[derive(Default)]
pub(crate) struct Slot {
    state: ConnectionState,
    session: Option<Box<dyn Session>>,
}

impl Slot {
    pub(crate) fn session_mut(
        &mut self,
    ) -> Result<&mut (dyn Session + 'static), MssqlMiddlewareError> {
        self.session
            .as_deref_mut()
            .ok_or(MssqlMiddlewareError::NotConnected)
    }
}

struct Inner {
    driver: Arc<dyn Driver>,
    config: ConnectionConfig,
    logger: Logger,
    slot: Mutex<Slot>,
}

/// One logical database session over a single physical connection.
///
/// Clones share the connection. Every operation waits its turn on a FIFO
/// queue (a fair `tokio::sync::Mutex`) and holds the connection until its
/// result is settled, so requests from concurrent callers never overlap on
/// the wire. There is no timeout or cancellation: a request the server never
/// answers keeps the queue blocked.
///
/// ```rust,ignore
/// use mssql_middleware::prelude::*;
///
/// let db = Database::mssql(ConnectionConfig::from_path("db.json")?);
/// db.connect().await?;
/// let rows = db.query_int("select * from tbl where id_primary=@id", 1).await?;
/// db.disconnect().await;
/// ```
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("server", &self.inner.config.describe())
            .field("driver", &"<Driver>")
            .finish()
    }
}

impl Database {
    /// The configuration is normalized on the way in (see
    /// [`ConnectionConfig::normalized`]).
    pub fn new(config: ConnectionConfig, driver: impl Driver) -> Self {
        Self::build(config, Arc::new(driver), Logger::default())
    }

    /// Like [`Database::new`], with log lines going to `sink` instead of `tracing`.
    pub fn with_log_sink(
        config: ConnectionConfig,
        driver: impl Driver,
        sink: impl LogSink + 'static,
    ) -> Self {
        Self::build(config, Arc::new(driver), Logger::new(Arc::new(sink)))
    }

    /// A database over the built-in TDS driver.
    #[cfg(feature = "mssql")]
    #[must_use]
    pub fn mssql(config: ConnectionConfig) -> Self {
        Self::new(config, crate::mssql::TdsDriver)
    }

    fn build(config: ConnectionConfig, driver: Arc<dyn Driver>, logger: Logger) -> Self {
        Self {
            inner: Arc::new(Inner {
                driver,
                config: config.normalized(),
                logger,
                slot: Mutex::new(Slot::default()),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// The type tags parameters and bulk columns can be declared with.
    #[must_use]
    pub fn types(&self) -> &'static [TypeTag] {
        TypeTag::ALL
    }

    /// Current connection state; waits for any in-flight request to settle.
    pub async fn state(&self) -> ConnectionState {
        self.lock_slot().await.state
    }

    /// Open the connection.
    ///
    /// Calling this while connected replaces the open handle with a new one;
    /// the old handle is dropped without an orderly close.
    ///
    /// # Errors
    /// Returns the driver's connection error; the database is then `Unconnected`.
    pub async fn connect(&self) -> Result<(), MssqlMiddlewareError> {
        let mut slot = self.lock_slot().await;
        if slot.session.take().is_some() {
            tracing::debug!("connect while connected: previous handle abandoned");
        }
        slot.state = ConnectionState::Connecting;
        let target = self.inner.config.describe();
        match self.inner.driver.connect(&self.inner.config).await {
            Ok(session) => {
                slot.session = Some(session);
                slot.state = ConnectionState::Connected;
                self.inner.logger.info(&format!("connected to {target}"));
                Ok(())
            }
            Err(err) => {
                slot.state = ConnectionState::Unconnected;
                self.inner
                    .logger
                    .error(&format!("connection to {target} failed: {err}"));
                Err(err)
            }
        }
    }

    /// Close the connection without waiting for the server to acknowledge.
    /// Does nothing when there is no open connection.
    pub async fn disconnect(&self) {
        let mut slot = self.lock_slot().await;
        if let Some(session) = slot.session.take() {
            session.close();
            slot.state = ConnectionState::Closed;
            self.inner
                .logger
                .info(&format!("disconnected from {}", self.inner.config.describe()));
        }
    }

    pub(crate) async fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.inner.slot.lock().await
    }

    pub(crate) fn logger(&self) -> &Logger {
        &self.inner.logger
    }

    pub(crate) fn log_start(&self, op: &str, sql: &str, params: &[Parameter]) -> Instant {
        self.inner.logger.debug(&format!(
            "{op} start: {sql} params: {}",
            describe_params(params)
        ));
        Instant::now()
    }

    pub(crate) fn log_finish<T>(
        &self,
        op: &str,
        result: &Result<T, MssqlMiddlewareError>,
        count: impl FnOnce(&T) -> u64,
        started: Instant,
    ) {
        let elapsed = elapsed_ms(started.elapsed());
        match result {
            Ok(value) => self.inner.logger.debug(&format!(
                "{op} done: {} rows in {elapsed}",
                count(value)
            )),
            Err(err) => self
                .inner
                .logger
                .warn(&format!("{op} failed after {elapsed}: {err}")),
        }
    }
}

/// Submit on the parameterized path and wait for the single settle.
pub(crate) async fn run_statement<C: Collector>(
    session: &mut dyn Session,
    request: &StatementRequest,
    collector: C,
) -> Result<C::Output, MssqlMiddlewareError> {
    let mut pending = PendingRequest::new(collector);
    pending.mark_sent();
    if let Err(err) = session.exec_sql(request, &mut pending).await {
        pending.abort(err);
    }
    tracing::trace!(state = ?pending.state(), "statement request finished");
    pending.into_outcome()
}

/// Submit raw SQL on the batch path and wait for the single settle.
pub(crate) async fn run_sql_batch<C: Collector>(
    session: &mut dyn Session,
    sql: &str,
    collector: C,
) -> Result<C::Output, MssqlMiddlewareError> {
    let mut pending = PendingRequest::new(collector);
    pending.mark_sent();
    if let Err(err) = session.exec_sql_batch(sql, &mut pending).await {
        pending.abort(err);
    }
    tracing::trace!(state = ?pending.state(), "batch request finished");
    pending.into_outcome()
}
