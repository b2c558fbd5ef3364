//! Per-request state machine turning driver events into one result.
//!
//! `Idle -> Sent -> Accumulating -> Completed | Failed`. The two terminal
//! states are entered from exactly one place (`PendingRequest::settle`),
//! and anything that arrives afterwards is dropped.

use crate::driver::{DriverEvent, EventSink};
use crate::error::MssqlMiddlewareError;
use crate::results::{ColumnDescriptor, QueryResult, Row};
use crate::types::RowValues;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Sent,
    Accumulating,
    Completed,
    Failed,
}

impl RequestState {
    #[must_use]
    pub fn is_settled(self) -> bool {
        matches!(self, RequestState::Completed | RequestState::Failed)
    }
}

/// What a request does with metadata and rows while it is accumulating.
pub(crate) trait Collector: Send {
    type Output: Send;

    fn on_columns(&mut self, _columns: Vec<ColumnDescriptor>) {}

    fn on_row(&mut self, row: Row);

    /// `row_count` is the count carried by the completion event.
    fn finish(self, row_count: u64) -> Self::Output;
}

pub(crate) struct PendingRequest<C: Collector> {
    state: RequestState,
    collector: Option<C>,
    error: Option<String>,
    outcome: Option<Result<C::Output, MssqlMiddlewareError>>,
}

impl<C: Collector> PendingRequest<C> {
    pub(crate) fn new(collector: C) -> Self {
        Self {
            state: RequestState::Idle,
            collector: Some(collector),
            error: None,
            outcome: None,
        }
    }

    pub(crate) fn state(&self) -> RequestState {
        self.state
    }

    /// Handlers are in place; the request is about to be handed to the driver.
    pub(crate) fn mark_sent(&mut self) {
        if self.state == RequestState::Idle {
            self.state = RequestState::Sent;
        }
    }

    /// Settle as failed unless a completion event already settled the request.
    pub(crate) fn abort(&mut self, err: MssqlMiddlewareError) {
        self.settle(Err(err));
    }

    fn settle(&mut self, outcome: Result<C::Output, MssqlMiddlewareError>) {
        if self.state.is_settled() {
            tracing::debug!("ignoring second settle for an already settled request");
            return;
        }
        self.state = if outcome.is_ok() {
            RequestState::Completed
        } else {
            RequestState::Failed
        };
        self.collector = None;
        self.outcome = Some(outcome);
    }

    fn complete(&mut self, row_count: u64) {
        if let Some(message) = self.error.take() {
            // buffered rows are discarded with the collector
            self.settle(Err(MssqlMiddlewareError::ExecutionError(message)));
            return;
        }
        match self.collector.take() {
            Some(collector) => self.settle(Ok(collector.finish(row_count))),
            None => self.settle(Err(MssqlMiddlewareError::Other(
                "request completed without a result collector".into(),
            ))),
        }
    }

    pub(crate) fn into_outcome(self) -> Result<C::Output, MssqlMiddlewareError> {
        match self.outcome {
            Some(outcome) => outcome,
            None => Err(MssqlMiddlewareError::ExecutionError(
                "driver finished the request without a completion event".into(),
            )),
        }
    }
}

impl<C: Collector> EventSink for PendingRequest<C> {
    fn on_event(&mut self, event: DriverEvent) {
        if self.state.is_settled() {
            tracing::warn!(state = ?self.state, "driver event after request settled; dropped");
            return;
        }
        match event {
            DriverEvent::ColumnMetadata(columns) => {
                self.state = RequestState::Accumulating;
                if let Some(collector) = self.collector.as_mut() {
                    collector.on_columns(columns);
                }
            }
            DriverEvent::Row(row) => {
                self.state = RequestState::Accumulating;
                if let Some(collector) = self.collector.as_mut() {
                    collector.on_row(row);
                }
            }
            DriverEvent::StatementDone { row_count } => {
                tracing::trace!(row_count, "statement done (count not final)");
            }
            DriverEvent::Error(message) => {
                if self.error.is_none() {
                    self.error = Some(message);
                } else {
                    tracing::debug!(%message, "additional driver error for the same request");
                }
            }
            DriverEvent::RequestCompleted { row_count } => self.complete(row_count),
        }
    }
}

/// Buffers every row, and the metadata when asked to.
pub(crate) struct Buffered {
    want_columns: bool,
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Row>,
}

impl Buffered {
    pub(crate) fn new(want_columns: bool) -> Self {
        Self {
            want_columns,
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }
}

impl Collector for Buffered {
    type Output = QueryResult;

    fn on_columns(&mut self, columns: Vec<ColumnDescriptor>) {
        self.columns = columns;
    }

    fn on_row(&mut self, row: Row) {
        self.rows.push(row);
    }

    fn finish(self, _row_count: u64) -> QueryResult {
        if self.want_columns {
            QueryResult::WithColumns {
                columns: self.columns,
                rows: self.rows,
            }
        } else {
            QueryResult::Rows(self.rows)
        }
    }
}

/// Ignores rows; the result is the count from the completion event.
pub(crate) struct Counted;

impl Collector for Counted {
    type Output = u64;

    fn on_row(&mut self, _row: Row) {}

    fn finish(self, row_count: u64) -> u64 {
        row_count
    }
}

/// Hands each row to the caller as it arrives.
pub(crate) struct Streamed<F> {
    consumer: F,
    delivered: u64,
}

impl<F> Streamed<F> {
    pub(crate) fn new(consumer: F) -> Self {
        Self {
            consumer,
            delivered: 0,
        }
    }
}

impl<F: FnMut(Row) + Send> Collector for Streamed<F> {
    type Output = u64;

    fn on_row(&mut self, row: Row) {
        self.delivered += 1;
        (self.consumer)(row);
    }

    fn finish(self, row_count: u64) -> u64 {
        if row_count != self.delivered {
            tracing::debug!(
                row_count,
                delivered = self.delivered,
                "completion count differs from rows delivered"
            );
        }
        row_count
    }
}

/// Keeps the first column of the most recent row. NULL or no row reads as 0.
pub(crate) struct Scalar {
    value: Option<RowValues>,
}

impl Scalar {
    pub(crate) fn new() -> Self {
        Self { value: None }
    }
}

impl Collector for Scalar {
    type Output = RowValues;

    fn on_row(&mut self, row: Row) {
        self.value = row.into_values().into_iter().next();
    }

    fn finish(self, _row_count: u64) -> RowValues {
        match self.value {
            Some(value) if !value.is_null() => value,
            _ => RowValues::Int(0),
        }
    }
}
