//! PostgreSQL wire protocol implementation.
//!
//! This module contains the low-level protocol encoding and decoding.
//!
//! # Structure
//!
//! - `frontend`: Client → Server messages (decoded by the server, encoded by tests and tools)
//! - `backend`: Server → Client messages (encoded by the server, parsed by tests and tools)
//! - `codec`: Low-level encoding primitives
//! - `view`: Bounds-checked decoding cursor
//! - `types`: Common protocol types (FormatCode, Oid, TransactionStatus)

pub mod backend;
pub mod codec;
pub mod frontend;
pub mod types;
pub mod view;

// Re-export commonly used types
pub use backend::RawMessage;
pub use frontend::InputPacket;
pub use types::{FormatCode, Oid, TransactionStatus};
pub use view::ReadView;
