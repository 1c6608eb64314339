//! Sans-I/O connection state machine.
//!
//! [`ProtocolInterpreter`] owns the session and the connection buffers. It
//! never touches a socket; drivers move bytes in and out and act on the
//! returned [`Transition`].

pub mod interpreter;
pub mod startup;
pub mod transition;

pub use interpreter::{InterpreterState, ProtocolInterpreter};
pub use startup::{BackendKey, write_startup_reply};
pub use transition::Transition;
