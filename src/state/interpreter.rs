//! Protocol interpreter: frames client bytes, dispatches commands and
//! applies the error and flush rules.

use crate::backend::{Backend, ExecOutcome, ResultReceiver};
use crate::buffer_pool::PooledBufferSet;
use crate::buffer_set::BufferSet;
use crate::command::{Command, Continuation, finish_execute, finish_simple_query};
use crate::error::{Error, ErrorFields, Result, Severity, sqlstate};
use crate::opts::{FlushPolicy, Opts};
use crate::protocol::frontend::startup::split_startup_frame;
use crate::protocol::frontend::{InputPacket, split_frame};
use crate::session::SessionContext;
use crate::writer::PacketWriter;

use super::startup::{BackendKey, StartupOutcome, handle_startup_packet};
use super::transition::Transition;

#[derive(Debug)]
struct Pending {
    continuation: Continuation,
    receiver: Option<ResultReceiver>,
}

/// Per-connection interpreter flags shared with the commands.
#[derive(Debug, Default)]
pub struct InterpreterState {
    waiting_for_sync: bool,
    pending: Option<Pending>,
}

impl InterpreterState {
    /// Returns true while messages are being discarded until the next Sync.
    pub fn is_waiting_for_sync(&self) -> bool {
        self.waiting_for_sync
    }

    pub(crate) fn set_latch(&mut self) {
        self.waiting_for_sync = true;
    }

    pub(crate) fn clear_latch(&mut self) {
        self.waiting_for_sync = false;
    }

    /// Returns true while a command waits for its backend result.
    pub fn is_suspended(&self) -> bool {
        self.pending.is_some()
    }

    /// Work left for the suspended command, if any.
    pub fn continuation(&self) -> Option<&Continuation> {
        self.pending.as_ref().map(|pending| &pending.continuation)
    }

    pub(crate) fn suspend(&mut self, continuation: Continuation, receiver: ResultReceiver) {
        self.pending = Some(Pending {
            continuation,
            receiver: Some(receiver),
        });
    }

    fn receiver_mut(&mut self) -> Option<&mut ResultReceiver> {
        self.pending.as_mut()?.receiver.as_mut()
    }

    fn take_receiver(&mut self) -> Option<ResultReceiver> {
        self.pending.as_mut()?.receiver.take()
    }

    fn take_continuation(&mut self) -> Option<Continuation> {
        self.pending.take().map(|pending| pending.continuation)
    }
}

/// How a failed command is wrapped up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Query or empty query: report and send ReadyForQuery.
    Simple,
    /// Parse/Bind/Describe/Execute/Close: report and skip until Sync.
    Extended,
    /// Sync, Flush and Terminate only fail fatally.
    Control,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Startup,
    Ready,
    Closed(Transition),
}

/// Server side of one client connection, without I/O.
///
/// The driver appends client bytes with [`feed`](Self::feed), calls
/// [`step`](Self::step) until it returns something other than
/// [`Transition::Proceed`], and writes [`output`](Self::output) to the socket.
/// Replies are only exposed through `output` once the flush policy releases
/// them.
///
/// ```
/// use zero_pgwire::backend::{Backend, Completion, ExecOutcome, ExecuteRequest, QueryResult, Submission};
/// use zero_pgwire::error::ErrorFields;
/// use zero_pgwire::protocol::frontend::write_query;
/// use zero_pgwire::protocol::types::Oid;
/// use zero_pgwire::session::SessionContext;
/// use zero_pgwire::state::{ProtocolInterpreter, Transition};
/// use zero_pgwire::statement::StatementDescription;
/// use zero_pgwire::Opts;
///
/// struct Noop;
///
/// impl Backend for Noop {
///     fn prepare(&mut self, _: &SessionContext, _: &str, types: &[Oid])
///         -> Result<StatementDescription, ErrorFields> {
///         Ok(StatementDescription::no_data(types.to_vec()))
///     }
///
///     fn execute(&mut self, _: &SessionContext, _: ExecuteRequest, _: Completion) -> Submission {
///         Submission::Ready(ExecOutcome::single(QueryResult::command("SET")))
///     }
/// }
///
/// let mut interpreter = ProtocolInterpreter::with_session(&Opts::default(), SessionContext::new());
/// let mut bytes = Vec::new();
/// write_query(&mut bytes, "SET x = 1");
/// interpreter.feed(&bytes);
///
/// assert_eq!(interpreter.step(&mut Noop), Transition::Proceed);
/// assert_eq!(interpreter.step(&mut Noop), Transition::NeedRead);
/// assert!(!interpreter.output().is_empty());
/// ```
#[derive(Debug)]
pub struct ProtocolInterpreter {
    opts: Opts,
    phase: Phase,
    key: BackendKey,
    session: SessionContext,
    state: InterpreterState,
    buffers: PooledBufferSet,
    /// Prefix of the write buffer released for the transport.
    flushed: usize,
}

impl ProtocolInterpreter {
    /// Interpreter for a fresh connection, starting with the startup handshake.
    pub fn new(opts: &Opts) -> Self {
        Self {
            opts: opts.clone(),
            phase: Phase::Startup,
            key: BackendKey::generate(),
            session: SessionContext::new(),
            state: InterpreterState::default(),
            buffers: opts.buffer_pool.get_buffer_set(),
            flushed: 0,
        }
    }

    /// Interpreter for a connection whose startup was handled elsewhere.
    pub fn with_session(opts: &Opts, session: SessionContext) -> Self {
        Self {
            phase: Phase::Ready,
            session,
            ..Self::new(opts)
        }
    }

    /// Process ID and secret key reported to the client.
    pub fn backend_key(&self) -> BackendKey {
        self.key
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionContext {
        &mut self.session
    }

    pub fn state(&self) -> &InterpreterState {
        &self.state
    }

    /// Returns true once startup finished and until the connection closes.
    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }

    /// Append bytes received from the client.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffers.read_buffer.extend_from_slice(bytes);
    }

    /// Replies ready to be written to the client.
    pub fn output(&self) -> &[u8] {
        &self.buffers.write_buffer[..self.flushed]
    }

    /// Drop the first `n` bytes of [`output`](Self::output) after they were written.
    pub fn consume_output(&mut self, n: usize) {
        let n = n.min(self.flushed);
        self.buffers.write_buffer.drain(..n);
        self.flushed -= n;
    }

    /// Process at most one buffered message.
    pub fn step<B: Backend>(&mut self, backend: &mut B) -> Transition {
        match self.phase {
            Phase::Closed(transition) => return transition,
            Phase::Startup => return self.step_startup(),
            Phase::Ready => {}
        }
        if self.state.is_suspended() {
            return Transition::NeedResult;
        }

        let BufferSet {
            read_buffer,
            write_buffer,
        } = &mut *self.buffers;
        let (transition, flush, used) = match split_frame(read_buffer, self.opts.max_message_size)
        {
            Ok(None) => return Transition::NeedRead,
            Ok(Some((packet, used))) => {
                let (transition, flush) = dispatch(
                    &mut self.state,
                    &mut self.session,
                    write_buffer,
                    self.opts.flush_policy,
                    packet,
                    backend,
                );
                (transition, flush, used)
            }
            Err(err) => (
                report(err, Flow::Control, &mut self.state, &mut self.session, write_buffer),
                true,
                0,
            ),
        };
        read_buffer.drain(..used);
        self.settle(transition, flush)
    }

    /// Process one message framed by the caller.
    ///
    /// Fails with [`Error::InvalidUsage`] before startup completed, after the
    /// connection closed, or while a command is suspended.
    pub fn process<B: Backend>(
        &mut self,
        packet: InputPacket<'_>,
        backend: &mut B,
    ) -> Result<Transition> {
        if self.phase != Phase::Ready {
            return Err(Error::InvalidUsage(
                "connection is not accepting commands".into(),
            ));
        }
        if self.state.is_suspended() {
            return Err(Error::InvalidUsage(
                "a command is waiting for its result".into(),
            ));
        }
        let (transition, flush) = dispatch(
            &mut self.state,
            &mut self.session,
            &mut self.buffers.write_buffer,
            self.opts.flush_policy,
            packet,
            backend,
        );
        Ok(self.settle(transition, flush))
    }

    /// Hand the receiver of the suspended command to the driver.
    ///
    /// Returns `None` if nothing is suspended or the receiver was taken.
    pub fn take_result_receiver(&mut self) -> Option<ResultReceiver> {
        self.state.take_receiver()
    }

    /// Resume the suspended command if its result already arrived.
    pub fn try_resume(&mut self) -> Option<Transition> {
        let outcome = self.state.receiver_mut()?.try_recv()?;
        Some(self.resume(outcome))
    }

    /// Finish the suspended command with its backend result.
    ///
    /// Output is byte-identical to the command having completed inline.
    pub fn resume(&mut self, outcome: ExecOutcome) -> Transition {
        let Some(continuation) = self.state.take_continuation() else {
            tracing::debug!("resume without a suspended command");
            return match self.phase {
                Phase::Closed(transition) => transition,
                _ => Transition::Proceed,
            };
        };

        let mut out = PacketWriter::new(&mut self.buffers.write_buffer);
        let (result, flow) = match &continuation {
            Continuation::SimpleQuery => (
                finish_simple_query(&mut out, &mut self.session, outcome),
                Flow::Simple,
            ),
            Continuation::Execute { portal, row_limit } => (
                finish_execute(&mut out, &mut self.session, portal, *row_limit, Some(outcome)),
                Flow::Extended,
            ),
        };
        let transition = complete(result, flow, &mut self.state, &mut self.session, &mut out);
        let flush = match self.opts.flush_policy {
            FlushPolicy::EveryCommand => true,
            FlushPolicy::Batched => !continuation.is_extended(),
        };
        self.settle(transition, flush)
    }

    /// Stop the connection, dropping any suspended command.
    ///
    /// A result delivered later is discarded.
    pub fn abort(&mut self) {
        if let Some(continuation) = self.state.take_continuation() {
            tracing::debug!("aborting suspended {:?}", continuation);
        }
        self.state.clear_latch();
        self.buffers.read_buffer.clear();
        self.phase = Phase::Closed(Transition::Terminate);
    }

    fn step_startup(&mut self) -> Transition {
        let BufferSet {
            read_buffer,
            write_buffer,
        } = &mut *self.buffers;
        let mut out = PacketWriter::new(write_buffer);
        let result = match split_startup_frame(read_buffer) {
            Ok(None) => return Transition::NeedRead,
            Ok(Some((payload, used))) => {
                handle_startup_packet(payload, &mut out, &self.opts.server_params, self.key)
                    .map(|outcome| (outcome, used))
            }
            Err(err) => Err(err),
        };

        let transition = match result {
            Ok((outcome, used)) => {
                read_buffer.drain(..used);
                match outcome {
                    StartupOutcome::Declined => Transition::Proceed,
                    StartupOutcome::Started(params) => {
                        tracing::debug!("session {} started", self.key.process_id);
                        self.session = SessionContext::with_startup_params(params);
                        self.phase = Phase::Ready;
                        Transition::Proceed
                    }
                    StartupOutcome::Cancel {
                        process_id,
                        secret_key: _,
                    } => {
                        tracing::debug!("ignoring cancel request for process {}", process_id);
                        Transition::Terminate
                    }
                }
            }
            Err(err) => {
                tracing::warn!("startup failed: {}", err);
                let message = err.to_fields().message.unwrap_or_default();
                let code = if matches!(err, Error::Framing(_) | Error::Protocol(_)) {
                    sqlstate::PROTOCOL_VIOLATION
                } else {
                    sqlstate::INTERNAL_ERROR
                };
                out.write_error_response(&ErrorFields::new(Severity::Fatal, code, message));
                Transition::ProtocolError
            }
        };
        self.settle(transition, true)
    }

    fn settle(&mut self, transition: Transition, flush: bool) -> Transition {
        if flush || transition.is_final() {
            self.flushed = self.buffers.write_buffer.len();
        }
        if transition.is_final() {
            self.phase = Phase::Closed(transition);
        }
        transition
    }
}

/// Run one message. Returns the transition and whether to flush.
fn dispatch<B: Backend>(
    state: &mut InterpreterState,
    session: &mut SessionContext,
    write_buffer: &mut Vec<u8>,
    policy: FlushPolicy,
    packet: InputPacket<'_>,
    backend: &mut B,
) -> (Transition, bool) {
    let mut out = PacketWriter::new(write_buffer);
    let Some(command) = Command::from_message(packet.type_byte, packet.payload) else {
        tracing::warn!("invalid frontend message type {}", packet.type_byte);
        out.write_error_response(&ErrorFields::new(
            Severity::Fatal,
            sqlstate::PROTOCOL_VIOLATION,
            format!("invalid frontend message type {}", packet.type_byte),
        ));
        return (Transition::ProtocolError, true);
    };

    if state.is_waiting_for_sync() && !command.survives_latch() {
        tracing::debug!("discarding {} until Sync", command.name());
        return (Transition::Proceed, false);
    }

    tracing::debug!("{} ({} bytes)", command.name(), packet.payload.len());
    let flow = match command {
        Command::SimpleQuery(_) | Command::Empty(_) => Flow::Simple,
        _ if command.is_extended() => Flow::Extended,
        _ => Flow::Control,
    };
    let flush = match policy {
        FlushPolicy::EveryCommand => command.flush_on_complete(),
        FlushPolicy::Batched => command.ends_round_trip(),
    };

    let result = command.exec(state, &mut out, backend, session);
    let transition = complete(result, flow, state, session, &mut out);
    (transition, flush && transition != Transition::NeedResult)
}

fn complete(
    result: Result<Transition>,
    flow: Flow,
    state: &mut InterpreterState,
    session: &mut SessionContext,
    out: &mut PacketWriter<'_>,
) -> Transition {
    match result {
        Ok(transition) => {
            if transition == Transition::Terminate {
                tracing::debug!("client terminated the session");
            }
            transition
        }
        Err(err) => report_into(err, flow, state, session, out),
    }
}

fn report(
    err: Error,
    flow: Flow,
    state: &mut InterpreterState,
    session: &mut SessionContext,
    write_buffer: &mut Vec<u8>,
) -> Transition {
    report_into(err, flow, state, session, &mut PacketWriter::new(write_buffer))
}

/// Write the ErrorResponse for `err` and apply the lifecycle rules.
fn report_into(
    err: Error,
    flow: Flow,
    state: &mut InterpreterState,
    session: &mut SessionContext,
    out: &mut PacketWriter<'_>,
) -> Transition {
    out.write_error_response(&err.to_fields());
    if err.is_fatal() {
        tracing::warn!("closing connection: {}", err);
        return Transition::ProtocolError;
    }

    tracing::debug!("command failed with {}: {}", err.sqlstate(), err);
    session.fail_transaction();
    match flow {
        Flow::Extended => state.set_latch(),
        Flow::Simple => {
            session.finish_implicit_transaction();
            out.write_ready_for_query(session.transaction_status());
        }
        Flow::Control => {}
    }
    Transition::Proceed
}
