//! Bound portals and their execution cursor.

use std::sync::Arc;

use crate::backend::{ExecuteRequest, QueryResult, Row};
use crate::error::ErrorFields;
use crate::protocol::backend::FieldDescription;
use crate::protocol::types::FormatCode;
use crate::statement::PreparedStatement;

/// Execution state of a portal.
#[derive(Debug, Clone, Default)]
pub enum PortalState {
    /// Bound but never executed.
    #[default]
    Ready,
    /// Executed; rows before `cursor` have been sent. `error` is reported
    /// once the rows run out.
    Running {
        result: QueryResult,
        cursor: usize,
        error: Option<ErrorFields>,
    },
}

/// How one Execute call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ending {
    /// The row limit was reached.
    Suspended,
    /// The portal ran to completion with this command tag.
    Complete(String),
    /// The backend failed after producing the rows sent so far.
    Failed(ErrorFields),
}

/// Rows handed out by one Execute call.
#[derive(Debug)]
pub struct Fetched<'p> {
    pub rows: &'p [Row],
    pub end: Ending,
}

/// A prepared statement bound to parameter values and result formats.
#[derive(Debug, Clone)]
pub struct Portal {
    /// Portal name (empty for the unnamed portal)
    pub name: String,
    /// Source statement
    pub statement: Arc<PreparedStatement>,
    /// Parameter values, `None` for SQL NULL
    pub params: Vec<Option<Vec<u8>>>,
    /// Format of each parameter value
    pub param_formats: Vec<FormatCode>,
    /// Format of each result column
    pub result_formats: Vec<FormatCode>,
    state: PortalState,
}

impl Portal {
    /// Create a portal. Format lists must already be expanded to one entry
    /// per parameter and per result column.
    pub fn new(
        name: &str,
        statement: Arc<PreparedStatement>,
        params: Vec<Option<Vec<u8>>>,
        param_formats: Vec<FormatCode>,
        result_formats: Vec<FormatCode>,
    ) -> Self {
        Self {
            name: name.to_string(),
            statement,
            params,
            param_formats,
            result_formats,
            state: PortalState::Ready,
        }
    }

    /// Current execution state.
    pub fn state(&self) -> &PortalState {
        &self.state
    }

    /// Returns true once the backend has produced the portal's result.
    pub fn is_started(&self) -> bool {
        matches!(self.state, PortalState::Running { .. })
    }

    /// Result columns in the portal's result formats, or `None` if the
    /// statement returns no rows.
    pub fn fields(&self) -> Option<Vec<FieldDescription<'_>>> {
        let columns = self.statement.columns.as_ref()?;
        Some(
            columns
                .iter()
                .zip(self.result_formats.iter())
                .map(|(column, &format)| column.field(format))
                .collect(),
        )
    }

    /// The backend request that runs this portal.
    pub fn request(&self) -> ExecuteRequest {
        ExecuteRequest::Portal {
            query: self.statement.query.clone(),
            param_types: self.statement.param_types.clone(),
            params: self.params.clone(),
            param_formats: self.param_formats.clone(),
            result_formats: self.result_formats.clone(),
        }
    }

    /// Buffer the backend's result; rows are handed out by [`fetch`](Self::fetch).
    /// A backend `error` is delivered after the last row.
    pub fn start(&mut self, result: QueryResult, error: Option<ErrorFields>) {
        self.state = PortalState::Running {
            result,
            cursor: 0,
            error,
        };
    }

    /// Take up to `limit` rows (`None` = all remaining).
    ///
    /// Must only be called after [`start`](Self::start); a portal that was
    /// never started yields nothing and reports completion with no tag rewrite.
    pub fn fetch(&mut self, limit: Option<usize>) -> Fetched<'_> {
        let PortalState::Running {
            result,
            cursor,
            error,
        } = &mut self.state
        else {
            return Fetched {
                rows: &[],
                end: Ending::Complete(String::new()),
            };
        };

        let start = *cursor;
        let end = match limit {
            Some(n) => start.saturating_add(n).min(result.rows.len()),
            None => result.rows.len(),
        };
        *cursor = end;

        let rows = &result.rows[start..end];
        if end < result.rows.len() {
            return Fetched {
                rows,
                end: Ending::Suspended,
            };
        }
        // A batch that fills the limit exactly still suspends.
        if limit.is_some_and(|n| n > 0 && rows.len() == n) {
            return Fetched {
                rows,
                end: Ending::Suspended,
            };
        }
        let end = match error.take() {
            Some(fields) => Ending::Failed(fields),
            None => Ending::Complete(rewrite_row_count(&result.tag, rows.len())),
        };
        Fetched { rows, end }
    }
}

/// Rewrite the row count of a `SELECT n` / `FETCH n` tag.
///
/// Other tags are returned unchanged.
pub fn rewrite_row_count(tag: &str, rows: usize) -> String {
    match tag.split_once(' ') {
        Some((command @ ("SELECT" | "FETCH"), _)) => format!("{command} {rows}"),
        None if tag == "SELECT" || tag == "FETCH" => format!("{tag} {rows}"),
        _ => tag.to_string(),
    }
}
