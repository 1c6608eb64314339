//! Result vocabulary of command execution.

/// What the connection should do after a command ran.
///
/// The caller acts on it immediately; it is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Continue with the next buffered message.
    Proceed,
    /// No complete message is buffered; read more bytes from the client.
    NeedRead,
    /// A command is suspended until its backend result arrives.
    NeedResult,
    /// The client asked to close the connection; flush and close.
    Terminate,
    /// Fatal protocol error; flush the FATAL ErrorResponse and close.
    ProtocolError,
}

impl Transition {
    /// Returns true if the connection must be closed.
    pub fn is_final(self) -> bool {
        matches!(self, Transition::Terminate | Transition::ProtocolError)
    }
}
