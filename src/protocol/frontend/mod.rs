//! PostgreSQL frontend (client → server) messages.
//!
//! Each message module pairs a decoder over [`ReadView`](super::view::ReadView),
//! used by the server command layer, with the matching `write_*` encoder.

pub mod extended;
pub mod simple;
pub mod startup;

pub use extended::{
    BindMessage, CloseMessage, DescribeMessage, ExecuteMessage, ParseMessage, Target,
    write_bind, write_close_portal, write_close_statement, write_describe_portal,
    write_describe_statement, write_execute, write_flush, write_parse, write_sync,
};
pub use simple::{QueryMessage, write_query};
pub use startup::{StartupRequest, write_cancel_request, write_ssl_request, write_startup, write_terminate};

use crate::error::{Error, Result};

/// Frontend message type bytes.
pub mod msg_type {
    /// Query (simple query protocol)
    pub const QUERY: u8 = b'Q';
    /// Parse (extended query protocol)
    pub const PARSE: u8 = b'P';
    /// Bind (extended query protocol)
    pub const BIND: u8 = b'B';
    /// Execute (extended query protocol)
    pub const EXECUTE: u8 = b'E';
    /// Describe (extended query protocol)
    pub const DESCRIBE: u8 = b'D';
    /// Close (extended query protocol)
    pub const CLOSE: u8 = b'C';
    /// Sync (extended query protocol)
    pub const SYNC: u8 = b'S';
    /// Flush (extended query protocol)
    pub const FLUSH: u8 = b'H';
    /// Terminate
    pub const TERMINATE: u8 = b'X';
}

/// A single framed message from the client.
///
/// The framer has already stripped the type byte and the length field;
/// `payload.len()` is the declared payload length.
#[derive(Debug, Clone, Copy)]
pub struct InputPacket<'a> {
    /// Message type byte
    pub type_byte: u8,
    /// Message payload (after length field)
    pub payload: &'a [u8],
}

impl<'a> InputPacket<'a> {
    /// Create a new InputPacket.
    pub fn new(type_byte: u8, payload: &'a [u8]) -> Self {
        Self { type_byte, payload }
    }
}

/// Frame one regular message from the front of `buf`.
///
/// Returns the packet and the total number of bytes it occupies
/// (type byte + length field + payload), or `None` if more bytes are needed.
pub fn split_frame(buf: &[u8], max_message_size: usize) -> Result<Option<(InputPacket<'_>, usize)>> {
    if buf.len() < 5 {
        return Ok(None);
    }
    let type_byte = buf[0];
    let length = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;

    if length < 4 {
        return Err(Error::Framing(format!(
            "invalid message length: {}",
            length
        )));
    }
    if length > max_message_size {
        return Err(Error::Framing(format!(
            "message length {} exceeds limit {}",
            length, max_message_size
        )));
    }

    let total = 1 + length;
    if buf.len() < total {
        return Ok(None);
    }
    Ok(Some((InputPacket::new(type_byte, &buf[5..total]), total)))
}
