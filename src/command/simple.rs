//! Simple query protocol commands.

use crate::backend::{Backend, Completion, ExecOutcome, ExecuteRequest, Submission};
use crate::error::{Error, Result};
use crate::protocol::frontend::QueryMessage;
use crate::session::SessionContext;
use crate::state::{InterpreterState, Transition};
use crate::statement::is_blank_query;
use crate::writer::PacketWriter;

use super::{Continuation, Empty, SimpleQuery, check_not_aborted};

impl SimpleQuery<'_> {
    pub(super) fn exec<B: Backend>(
        mut self,
        interpreter: &mut InterpreterState,
        out: &mut PacketWriter<'_>,
        backend: &mut B,
        session: &mut SessionContext,
    ) -> Result<Transition> {
        let msg = QueryMessage::decode(&mut self.input)?;

        // A Query message discards the unnamed statement and portal.
        session.remove_statement("");
        session.remove_portal("");

        if is_blank_query(msg.query) {
            return finish_simple_query(out, session, ExecOutcome::default());
        }
        check_not_aborted(session, msg.query)?;

        let request = ExecuteRequest::Simple {
            query: msg.query.to_string(),
        };
        let (completion, receiver) = Completion::pair();
        match backend.execute(session, request, completion) {
            Submission::Ready(outcome) => finish_simple_query(out, session, outcome),
            Submission::Pending => {
                interpreter.suspend(Continuation::SimpleQuery, receiver);
                Ok(Transition::NeedResult)
            }
        }
    }
}

impl Empty<'_> {
    pub(super) fn exec(
        mut self,
        out: &mut PacketWriter<'_>,
        session: &mut SessionContext,
    ) -> Result<Transition> {
        if !self.input.is_empty() && self.input.read_u8()? != 0 {
            return Err(Error::Framing(
                "read_cstr: no null terminator found".into(),
            ));
        }
        session.remove_statement("");
        session.remove_portal("");
        finish_simple_query(out, session, ExecOutcome::default())
    }
}

/// Reply to a Query message once the backend produced its outcome.
///
/// Shared by the inline path and [`resume`](crate::state::ProtocolInterpreter::resume).
/// A backend error is returned after the preceding results have been written;
/// the interpreter reports it and sends ReadyForQuery.
pub(crate) fn finish_simple_query(
    out: &mut PacketWriter<'_>,
    session: &mut SessionContext,
    outcome: ExecOutcome,
) -> Result<Transition> {
    if outcome.results.is_empty() && outcome.error.is_none() {
        out.write_empty_query_response();
    }

    for result in &outcome.results {
        result.check_width().map_err(Error::Backend)?;
        if let Some(columns) = &result.columns {
            out.write_row_description(columns);
        }
        for row in &result.rows {
            out.write_data_row(row);
        }
        out.write_command_complete(&result.tag);
        session.apply_command_tag(&result.tag);
    }

    if let Some(fields) = outcome.error {
        return Err(Error::Backend(fields));
    }

    session.finish_implicit_transaction();
    out.write_ready_for_query(session.transaction_status());
    Ok(Transition::Proceed)
}
