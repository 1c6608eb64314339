//! Typed commands, one per frontend message.
//!
//! The interpreter picks the variant from the type byte alone and hands the
//! payload over as a [`ReadView`]. [`Command::exec`] decodes the payload,
//! runs it against the session and backend, writes the replies and returns a
//! [`Transition`]. Non-fatal errors are returned to the interpreter, which
//! reports them and applies the lifecycle rules.

mod extended;
mod simple;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::protocol::frontend::msg_type;
use crate::protocol::view::ReadView;
use crate::session::SessionContext;
use crate::state::{InterpreterState, Transition};
use crate::writer::PacketWriter;

pub(crate) use extended::finish_execute;
pub(crate) use simple::finish_simple_query;

macro_rules! define_command {
    ($($(#[$doc:meta])* $name:ident => $label:literal,)+) => {
        $(
            $(#[$doc])*
            #[derive(Debug)]
            pub struct $name<'a> {
                input: ReadView<'a>,
                flush_on_complete: bool,
            }

            impl<'a> $name<'a> {
                /// Wrap a message payload.
                pub fn new(input: ReadView<'a>) -> Self {
                    Self {
                        input,
                        flush_on_complete: true,
                    }
                }

                /// Message name used in logs.
                pub const NAME: &'static str = $label;
            }
        )+
    };
}

define_command! {
    /// `Q`: one or more `;`-separated statements.
    SimpleQuery => "Query",
    /// `P`: register a prepared statement.
    Parse => "Parse",
    /// `B`: bind a prepared statement to parameters, creating a portal.
    Bind => "Bind",
    /// `D`: describe a statement or portal.
    Describe => "Describe",
    /// `E`: run a portal.
    Execute => "Execute",
    /// `S`: end an extended-query sequence.
    Sync => "Sync",
    /// `C`: drop a statement or portal.
    Close => "Close",
    /// `H`: release buffered replies.
    Flush => "Flush",
    /// `X`: close the connection.
    Terminate => "Terminate",
    /// `Q` with an empty payload.
    Empty => "EmptyQuery",
}

/// A decoded-on-demand frontend message.
#[derive(Debug)]
pub enum Command<'a> {
    SimpleQuery(SimpleQuery<'a>),
    Parse(Parse<'a>),
    Bind(Bind<'a>),
    Describe(Describe<'a>),
    Execute(Execute<'a>),
    Sync(Sync<'a>),
    Close(Close<'a>),
    Flush(Flush<'a>),
    Terminate(Terminate<'a>),
    Empty(Empty<'a>),
}

/// Work left over by a suspended command, finished by
/// [`ProtocolInterpreter::resume`](crate::state::ProtocolInterpreter::resume).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// Reply to a Query message.
    SimpleQuery,
    /// Reply to an Execute message.
    Execute {
        /// Portal name
        portal: String,
        /// Row limit from the Execute message, `None` for no limit
        row_limit: Option<usize>,
    },
}

impl Continuation {
    /// Returns true if the suspended command belongs to the extended protocol.
    pub fn is_extended(&self) -> bool {
        matches!(self, Continuation::Execute { .. })
    }
}

impl<'a> Command<'a> {
    /// Select the command for a message type byte.
    ///
    /// Returns `None` for type bytes that are not frontend commands.
    pub fn from_message(type_byte: u8, payload: &'a [u8]) -> Option<Self> {
        let input = ReadView::new(payload);
        let command = match type_byte {
            msg_type::QUERY if payload.len() <= 1 => Command::Empty(Empty::new(input)),
            msg_type::QUERY => Command::SimpleQuery(SimpleQuery::new(input)),
            msg_type::PARSE => Command::Parse(Parse::new(input)),
            msg_type::BIND => Command::Bind(Bind::new(input)),
            msg_type::DESCRIBE => Command::Describe(Describe::new(input)),
            msg_type::EXECUTE => Command::Execute(Execute::new(input)),
            msg_type::SYNC => Command::Sync(Sync::new(input)),
            msg_type::CLOSE => Command::Close(Close::new(input)),
            msg_type::FLUSH => Command::Flush(Flush::new(input)),
            msg_type::TERMINATE => Command::Terminate(Terminate::new(input)),
            _ => return None,
        };
        Some(command)
    }

    /// Message name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::SimpleQuery(_) => SimpleQuery::NAME,
            Command::Parse(_) => Parse::NAME,
            Command::Bind(_) => Bind::NAME,
            Command::Describe(_) => Describe::NAME,
            Command::Execute(_) => Execute::NAME,
            Command::Sync(_) => Sync::NAME,
            Command::Close(_) => Close::NAME,
            Command::Flush(_) => Flush::NAME,
            Command::Terminate(_) => Terminate::NAME,
            Command::Empty(_) => Empty::NAME,
        }
    }

    /// Whether replies are flushed once this command completes.
    pub fn flush_on_complete(&self) -> bool {
        match self {
            Command::SimpleQuery(c) => c.flush_on_complete,
            Command::Parse(c) => c.flush_on_complete,
            Command::Bind(c) => c.flush_on_complete,
            Command::Describe(c) => c.flush_on_complete,
            Command::Execute(c) => c.flush_on_complete,
            Command::Sync(c) => c.flush_on_complete,
            Command::Close(c) => c.flush_on_complete,
            Command::Flush(c) => c.flush_on_complete,
            Command::Terminate(c) => c.flush_on_complete,
            Command::Empty(c) => c.flush_on_complete,
        }
    }

    /// Returns true for commands that end a client round trip and are
    /// flushed even when replies are batched.
    pub fn ends_round_trip(&self) -> bool {
        matches!(
            self,
            Command::SimpleQuery(_)
                | Command::Empty(_)
                | Command::Sync(_)
                | Command::Flush(_)
                | Command::Terminate(_)
        )
    }

    /// Returns true for the extended-protocol commands whose errors set the
    /// skip-until-Sync latch.
    pub fn is_extended(&self) -> bool {
        matches!(
            self,
            Command::Parse(_)
                | Command::Bind(_)
                | Command::Describe(_)
                | Command::Execute(_)
                | Command::Close(_)
        )
    }

    /// Returns true if the latch lets this command through.
    pub fn survives_latch(&self) -> bool {
        matches!(self, Command::Sync(_) | Command::Terminate(_))
    }

    /// Run the command.
    pub fn exec<B: Backend>(
        self,
        interpreter: &mut InterpreterState,
        out: &mut PacketWriter<'_>,
        backend: &mut B,
        session: &mut SessionContext,
    ) -> Result<Transition> {
        match self {
            Command::SimpleQuery(c) => c.exec(interpreter, out, backend, session),
            Command::Parse(c) => c.exec(out, backend, session),
            Command::Bind(c) => c.exec(out, session),
            Command::Describe(c) => c.exec(out, session),
            Command::Execute(c) => c.exec(interpreter, out, backend, session),
            Command::Sync(c) => c.exec(interpreter, out, session),
            Command::Close(c) => c.exec(out, session),
            Command::Flush(c) => c.exec(),
            Command::Terminate(c) => c.exec(),
            Command::Empty(c) => c.exec(out, session),
        }
    }
}

impl Flush<'_> {
    fn exec(mut self) -> Result<Transition> {
        self.input.finish()?;
        Ok(Transition::Proceed)
    }
}

impl Terminate<'_> {
    fn exec(self) -> Result<Transition> {
        if !self.input.is_empty() {
            tracing::debug!("ignoring {} trailing bytes in Terminate", self.input.remaining());
        }
        Ok(Transition::Terminate)
    }
}

/// Returns true if the first keyword of `query` ends a transaction block.
///
/// Only these statements may run inside a failed block.
pub(crate) fn is_transaction_exit(query: &str) -> bool {
    let keyword = query
        .trim_start_matches(|c: char| c.is_whitespace() || c == ';')
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or("");
    ["ROLLBACK", "COMMIT", "END", "ABORT"]
        .iter()
        .any(|exit| keyword.eq_ignore_ascii_case(exit))
}

/// Reject statements that are not allowed in a failed transaction block.
pub(crate) fn check_not_aborted(session: &SessionContext, query: &str) -> Result<()> {
    if session.is_aborted_block() && !is_transaction_exit(query) {
        return Err(Error::InFailedTransaction);
    }
    Ok(())
}
