//! Interface to the query-processing backend.
//!
//! The command layer never executes SQL itself. Parse asks the backend to
//! describe a query, SimpleQuery and Execute submit work through
//! [`Backend::execute`]. A backend answers either inline with
//! [`Submission::Ready`] or later through the [`Completion`] it was handed.

use tokio::sync::oneshot;

use crate::error::{ErrorFields, sqlstate};
use crate::protocol::types::{FormatCode, Oid};
use crate::session::SessionContext;
use crate::statement::{ColumnInfo, StatementDescription, check_width};

/// One result row: a value per column, `None` for SQL NULL.
pub type Row = Vec<Option<Vec<u8>>>;

/// Work submitted to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecuteRequest {
    /// A Query message: one or more `;`-separated statements run as a unit.
    Simple {
        /// Query text
        query: String,
    },
    /// A bound portal from the extended protocol.
    Portal {
        /// Query text of the prepared statement
        query: String,
        /// Parameter type OIDs of the prepared statement
        param_types: Vec<Oid>,
        /// Parameter values, `None` for SQL NULL
        params: Vec<Option<Vec<u8>>>,
        /// Format of each parameter value (one entry per parameter)
        param_formats: Vec<FormatCode>,
        /// Requested format of each result column (one entry per column)
        result_formats: Vec<FormatCode>,
    },
}

impl ExecuteRequest {
    /// The query text of this request.
    pub fn query(&self) -> &str {
        match self {
            ExecuteRequest::Simple { query } | ExecuteRequest::Portal { query, .. } => query,
        }
    }
}

/// Result of one statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    /// Result columns, or `None` for statements that return no rows
    pub columns: Option<Vec<ColumnInfo>>,
    /// Result rows
    pub rows: Vec<Row>,
    /// Command tag (e.g. "SELECT 3", "INSERT 0 1", "BEGIN")
    pub tag: String,
}

impl QueryResult {
    /// A row-returning result tagged `SELECT <n>`.
    pub fn rows(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        let tag = format!("SELECT {}", rows.len());
        Self {
            columns: Some(columns),
            rows,
            tag,
        }
    }

    /// A result without rows (DDL, DML, transaction control).
    pub fn command(tag: impl Into<String>) -> Self {
        Self {
            columns: None,
            rows: Vec::new(),
            tag: tag.into(),
        }
    }

    /// Replace the command tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Check that RowDescription and every DataRow can encode this result.
    pub fn check_width(&self) -> Result<(), ErrorFields> {
        check_width("column", self.columns.as_ref().map_or(0, Vec::len))?;
        check_width("column", self.rows.iter().map(Vec::len).max().unwrap_or(0))
    }
}

/// Everything the backend produced for one submission.
///
/// Results are replied in order. If `error` is set it is reported after the
/// results and ends the submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub results: Vec<QueryResult>,
    pub error: Option<ErrorFields>,
}

impl ExecOutcome {
    /// Successful outcome.
    pub fn ok(results: Vec<QueryResult>) -> Self {
        Self {
            results,
            error: None,
        }
    }

    /// Successful outcome with a single result.
    pub fn single(result: QueryResult) -> Self {
        Self::ok(vec![result])
    }

    /// Failed outcome with no results.
    pub fn error(fields: ErrorFields) -> Self {
        Self {
            results: Vec::new(),
            error: Some(fields),
        }
    }

    /// Append an error after the results produced so far.
    pub fn with_error(mut self, fields: ErrorFields) -> Self {
        self.error = Some(fields);
        self
    }

    fn completion_dropped() -> Self {
        Self::error(ErrorFields::error(
            sqlstate::INTERNAL_ERROR,
            "backend dropped the query without producing a result",
        ))
    }
}

/// How the backend accepted a submission.
#[derive(Debug)]
pub enum Submission {
    /// The work finished inline; the completion is dropped unused.
    Ready(ExecOutcome),
    /// The backend kept the completion and will fire it later.
    Pending,
}

/// One-shot continuation handed to [`Backend::execute`].
///
/// `complete` consumes the value, so a result is delivered at most once.
/// It may be called from any thread.
#[derive(Debug)]
pub struct Completion {
    sender: oneshot::Sender<ExecOutcome>,
}

impl Completion {
    /// Create a completion together with the receiver that observes it.
    pub fn pair() -> (Completion, ResultReceiver) {
        let (sender, receiver) = oneshot::channel();
        (Completion { sender }, ResultReceiver { receiver })
    }

    /// Deliver the result.
    ///
    /// If the connection went away meanwhile the result is discarded.
    pub fn complete(self, outcome: ExecOutcome) {
        if self.sender.send(outcome).is_err() {
            tracing::debug!("discarding completion for a closed connection");
        }
    }

    /// Returns true if the connection stopped waiting for this result.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Receiving side of a [`Completion`], held by the driver while a command is
/// suspended.
///
/// A completion dropped without a result resolves to an internal error.
#[derive(Debug)]
pub struct ResultReceiver {
    receiver: oneshot::Receiver<ExecOutcome>,
}

impl ResultReceiver {
    /// Poll without blocking.
    pub fn try_recv(&mut self) -> Option<ExecOutcome> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(ExecOutcome::completion_dropped()),
        }
    }

    /// Block the current thread until the result arrives.
    ///
    /// Must not be called from within an async runtime.
    pub fn blocking_recv(self) -> ExecOutcome {
        self.receiver
            .blocking_recv()
            .unwrap_or_else(|_| ExecOutcome::completion_dropped())
    }

    /// Wait for the result.
    pub async fn recv(self) -> ExecOutcome {
        self.receiver
            .await
            .unwrap_or_else(|_| ExecOutcome::completion_dropped())
    }
}

/// Query-processing backend.
pub trait Backend {
    /// Describe `query` for a Parse message.
    ///
    /// `param_types` holds the client's type hints (0 = unspecified). An error
    /// is reported to the client and no statement is registered.
    fn prepare(
        &mut self,
        session: &SessionContext,
        query: &str,
        param_types: &[Oid],
    ) -> core::result::Result<StatementDescription, ErrorFields>;

    /// Run `request`.
    ///
    /// Return [`Submission::Ready`] to answer inline, or keep `completion`,
    /// return [`Submission::Pending`] and call [`Completion::complete`] exactly
    /// once later.
    fn execute(
        &mut self,
        session: &SessionContext,
        request: ExecuteRequest,
        completion: Completion,
    ) -> Submission;
}
