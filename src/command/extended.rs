//! Extended query protocol commands.

use crate::backend::{Backend, Completion, ExecOutcome, Submission};
use crate::error::{Error, ErrorFields, Result, sqlstate};
use crate::portal::{Ending, Fetched, Portal};
use crate::protocol::frontend::{
    BindMessage, CloseMessage, DescribeMessage, ExecuteMessage, ParseMessage, Target,
};
use crate::protocol::types::FormatCode;
use crate::session::SessionContext;
use crate::state::{InterpreterState, Transition};
use crate::statement::{PreparedStatement, StatementDescription, is_blank_query};
use crate::writer::PacketWriter;

use super::{Bind, Close, Continuation, Describe, Execute, Parse, Sync, check_not_aborted};

impl Parse<'_> {
    pub(super) fn exec<B: Backend>(
        mut self,
        out: &mut PacketWriter<'_>,
        backend: &mut B,
        session: &mut SessionContext,
    ) -> Result<Transition> {
        let msg = ParseMessage::decode(&mut self.input)?;
        session.start_implicit();
        check_not_aborted(session, msg.query)?;

        if !msg.name.is_empty() && session.statement(msg.name).is_ok() {
            return Err(Error::DuplicateStatement(msg.name.to_string()));
        }

        let description = if is_blank_query(msg.query) {
            StatementDescription::no_data(msg.param_types)
        } else {
            backend
                .prepare(session, msg.query, &msg.param_types)
                .map_err(Error::Backend)?
        };
        description.check_width().map_err(Error::Backend)?;

        session.insert_statement(PreparedStatement::new(msg.name, msg.query, description))?;
        out.write_parse_complete();
        Ok(Transition::Proceed)
    }
}

impl Bind<'_> {
    pub(super) fn exec(
        mut self,
        out: &mut PacketWriter<'_>,
        session: &mut SessionContext,
    ) -> Result<Transition> {
        let msg = BindMessage::decode(&mut self.input)?;
        session.start_implicit();

        let statement = session.statement(msg.statement)?;
        check_not_aborted(session, &statement.query)?;

        if msg.params.len() != statement.param_types.len() {
            return Err(Error::Protocol(format!(
                "bind message supplies {} parameters, but prepared statement \"{}\" requires {}",
                msg.params.len(),
                statement.name,
                statement.param_types.len()
            )));
        }
        let param_formats = FormatCode::expand(&msg.param_formats, msg.params.len())
            .ok_or_else(|| {
                Error::Protocol(format!(
                    "bind message has {} parameter formats but {} parameters",
                    msg.param_formats.len(),
                    msg.params.len()
                ))
            })?;
        let column_count = statement.columns.as_ref().map_or(0, Vec::len);
        let result_formats = FormatCode::expand(&msg.result_formats, column_count)
            .ok_or_else(|| {
                Error::Protocol(format!(
                    "bind message has {} result formats but query has {} columns",
                    msg.result_formats.len(),
                    column_count
                ))
            })?;

        let params = msg
            .params
            .iter()
            .map(|value| value.map(|bytes| bytes.to_vec()))
            .collect();
        session.insert_portal(Portal::new(
            msg.portal,
            statement,
            params,
            param_formats,
            result_formats,
        ));
        out.write_bind_complete();
        Ok(Transition::Proceed)
    }
}

impl Describe<'_> {
    pub(super) fn exec(
        mut self,
        out: &mut PacketWriter<'_>,
        session: &mut SessionContext,
    ) -> Result<Transition> {
        let msg = DescribeMessage::decode(&mut self.input)?;
        match msg.target {
            Target::Statement => {
                let statement = session.statement(msg.name)?;
                out.write_parameter_description(&statement.param_types);
                match &statement.columns {
                    Some(columns) => out.write_row_description(columns),
                    None => out.write_no_data(),
                }
            }
            Target::Portal => match session.portal(msg.name)?.fields() {
                Some(fields) => out.write_fields(&fields),
                None => out.write_no_data(),
            },
        }
        Ok(Transition::Proceed)
    }
}

impl Execute<'_> {
    pub(super) fn exec<B: Backend>(
        mut self,
        interpreter: &mut InterpreterState,
        out: &mut PacketWriter<'_>,
        backend: &mut B,
        session: &mut SessionContext,
    ) -> Result<Transition> {
        let msg = ExecuteMessage::decode(&mut self.input)?;
        session.start_implicit();

        let portal = session.portal(msg.portal)?;
        check_not_aborted(session, &portal.statement.query)?;
        if portal.statement.is_empty_query() {
            out.write_empty_query_response();
            return Ok(Transition::Proceed);
        }
        if portal.is_started() {
            return finish_execute(out, session, msg.portal, msg.row_limit(), None);
        }

        let request = portal.request();
        let (completion, receiver) = Completion::pair();
        match backend.execute(session, request, completion) {
            Submission::Ready(outcome) => {
                finish_execute(out, session, msg.portal, msg.row_limit(), Some(outcome))
            }
            Submission::Pending => {
                interpreter.suspend(
                    Continuation::Execute {
                        portal: msg.portal.to_string(),
                        row_limit: msg.row_limit(),
                    },
                    receiver,
                );
                Ok(Transition::NeedResult)
            }
        }
    }
}

/// Reply to an Execute message.
///
/// `outcome` is the backend result for a portal's first execution and `None`
/// when a started portal is resumed. Shared by the inline path and
/// [`resume`](crate::state::ProtocolInterpreter::resume).
pub(crate) fn finish_execute(
    out: &mut PacketWriter<'_>,
    session: &mut SessionContext,
    portal_name: &str,
    limit: Option<usize>,
    outcome: Option<ExecOutcome>,
) -> Result<Transition> {
    if let Some(ExecOutcome { results, error }) = outcome {
        let mut results = results.into_iter();
        let first = results.next();
        if results.len() > 0 {
            tracing::warn!(
                "portal {:?}: backend returned {} extra results, ignored",
                portal_name,
                results.len()
            );
        }
        let first = first.map(|result| result.check_width().map(|()| result));
        match (first, error) {
            (Some(Ok(result)), error) => session.portal_mut(portal_name)?.start(result, error),
            (Some(Err(fields)), _) => {
                session.remove_portal(portal_name);
                return Err(Error::Backend(fields));
            }
            (None, error) => {
                // A failed portal cannot be run again.
                session.remove_portal(portal_name);
                return Err(Error::Backend(error.unwrap_or_else(|| {
                    ErrorFields::error(
                        sqlstate::INTERNAL_ERROR,
                        "backend returned no result for portal",
                    )
                })));
            }
        }
    }

    let Fetched { rows, end } = session.portal_mut(portal_name)?.fetch(limit);
    for row in rows {
        out.write_data_row(row);
    }

    match end {
        Ending::Complete(tag) => {
            out.write_command_complete(&tag);
            session.apply_command_tag(&tag);
        }
        Ending::Suspended => out.write_portal_suspended(),
        Ending::Failed(fields) => {
            session.remove_portal(portal_name);
            return Err(Error::Backend(fields));
        }
    }
    Ok(Transition::Proceed)
}

impl Sync<'_> {
    pub(super) fn exec(
        self,
        interpreter: &mut InterpreterState,
        out: &mut PacketWriter<'_>,
        session: &mut SessionContext,
    ) -> Result<Transition> {
        self.input.finish()?;
        interpreter.clear_latch();
        session.finish_implicit_transaction();
        out.write_ready_for_query(session.transaction_status());
        Ok(Transition::Proceed)
    }
}

impl Close<'_> {
    pub(super) fn exec(
        mut self,
        out: &mut PacketWriter<'_>,
        session: &mut SessionContext,
    ) -> Result<Transition> {
        let msg = CloseMessage::decode(&mut self.input)?;
        let existed = match msg.target {
            Target::Statement => session.remove_statement(msg.name),
            Target::Portal => session.remove_portal(msg.name),
        };
        if !existed {
            tracing::debug!("Close of unknown {:?} {:?}", msg.target, msg.name);
        }
        out.write_close_complete();
        Ok(Transition::Proceed)
    }
}
