//! Server-side PostgreSQL wire protocol command layer.
//!
//! # Features
//!
//! - **Zero-copy decoding**: commands read their fields straight from the
//!   framed payload
//! - **Sans-I/O interpreter**: protocol logic is separated from sockets
//! - **Deferred results**: a backend may answer inline or complete later from
//!   any thread, with identical bytes on the wire
//! - **Sync and async drivers**: thread-per-connection or tokio tasks
//!
//! # Example
//!
//! ```no_run
//! use zero_pgwire::backend::{Backend, Completion, ExecOutcome, ExecuteRequest, QueryResult, Submission};
//! use zero_pgwire::error::ErrorFields;
//! use zero_pgwire::protocol::types::Oid;
//! use zero_pgwire::session::SessionContext;
//! use zero_pgwire::statement::{ColumnInfo, StatementDescription};
//! use zero_pgwire::sync::Server;
//!
//! struct Hello;
//!
//! impl Backend for Hello {
//!     fn prepare(&mut self, _: &SessionContext, _: &str, types: &[Oid])
//!         -> Result<StatementDescription, ErrorFields> {
//!         Ok(StatementDescription::rows(types.to_vec(), vec![ColumnInfo::new("greeting", 25, -1)]))
//!     }
//!
//!     fn execute(&mut self, _: &SessionContext, _: ExecuteRequest, _: Completion) -> Submission {
//!         let columns = vec![ColumnInfo::new("greeting", 25, -1)];
//!         let rows = vec![vec![Some(b"hello".to_vec())]];
//!         Submission::Ready(ExecOutcome::single(QueryResult::rows(columns, rows)))
//!     }
//! }
//!
//! fn main() -> zero_pgwire::Result<()> {
//!     let server = Server::bind("postgres://127.0.0.1:5433")?;
//!     server.serve(|| Hello)
//! }
//! ```

pub mod backend;
pub mod buffer_pool;
pub mod buffer_set;
pub mod command;
pub mod error;
pub mod opts;
pub mod portal;
pub mod protocol;
pub mod session;
pub mod state;
pub mod statement;
pub mod writer;

#[cfg(feature = "sync")]
pub mod sync;

#[cfg(feature = "rt-tokio")]
pub mod tokio;

pub use backend::{
    Backend, Completion, ExecOutcome, ExecuteRequest, QueryResult, ResultReceiver, Row, Submission,
};
pub use buffer_pool::BufferPool;
pub use buffer_set::BufferSet;
pub use command::{Command, Continuation};
pub use error::{Error, ErrorFields, Result};
pub use opts::{FlushPolicy, Opts};
pub use protocol::types::{FormatCode, Oid, TransactionStatus};
pub use session::SessionContext;
pub use state::{ProtocolInterpreter, Transition};
pub use statement::{ColumnInfo, PreparedStatement, StatementDescription};
pub use writer::PacketWriter;
