//! Synchronous client connection.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::session::SessionContext;
use crate::state::{ProtocolInterpreter, Transition};

use super::stream::Stream;

const READ_CHUNK: usize = 8192;

/// One client connection served on the current thread.
///
/// Suspended commands block the thread until the backend completes them.
#[derive(Debug)]
pub struct Conn<B> {
    stream: Stream,
    interpreter: ProtocolInterpreter,
    backend: B,
}

impl<B: Backend> Conn<B> {
    /// Serve `stream`, starting with the startup handshake.
    pub fn new(stream: Stream, opts: &Opts, backend: B) -> Self {
        Self {
            stream,
            interpreter: ProtocolInterpreter::new(opts),
            backend,
        }
    }

    /// Serve `stream` whose startup was already handled.
    pub fn with_session(stream: Stream, opts: &Opts, session: SessionContext, backend: B) -> Self {
        Self {
            stream,
            interpreter: ProtocolInterpreter::with_session(opts, session),
            backend,
        }
    }

    pub fn session(&self) -> &SessionContext {
        self.interpreter.session()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run until the client terminates or disconnects.
    ///
    /// A fatal protocol error is reported to the client and ends the
    /// connection with `Ok`; only I/O failures are returned.
    pub fn run(mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let transition = self.interpreter.step(&mut self.backend);
            self.write_output()?;
            match transition {
                Transition::Proceed => {}
                Transition::NeedRead => {
                    let n = self.stream.read(&mut chunk)?;
                    if n == 0 {
                        tracing::info!("client disconnected");
                        self.interpreter.abort();
                        return Ok(());
                    }
                    self.interpreter.feed(&chunk[..n]);
                }
                Transition::NeedResult => {
                    let receiver = self.interpreter.take_result_receiver().ok_or_else(|| {
                        Error::InvalidUsage("suspended command has no result receiver".into())
                    })?;
                    let outcome = receiver.blocking_recv();
                    self.interpreter.resume(outcome);
                }
                Transition::Terminate | Transition::ProtocolError => return Ok(()),
            }
        }
    }

    fn write_output(&mut self) -> Result<()> {
        let output = self.interpreter.output();
        if output.is_empty() {
            return Ok(());
        }
        let n = output.len();
        self.stream.write_all(output)?;
        self.stream.flush()?;
        self.interpreter.consume_output(n);
        Ok(())
    }
}
